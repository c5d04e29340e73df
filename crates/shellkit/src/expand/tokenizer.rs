//! Single-pass state machine over word text
//!
//! Classifies the characters of one word into expansion tokens: literal
//! runs, `$VAR`, `${...}`, `$((...))`, `$(...)`, backquotes, quoted
//! segments, escapes, and `{...}` brace patterns. The driver expands
//! each token by type afterwards.

/// Kinds of expansion tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpTokenKind {
    /// Plain text
    Literal,
    /// `$VAR` or a special parameter like `$?`
    Variable,
    /// `${VAR...}` with optional modifier
    BraceVariable,
    /// `$((expr))`
    Arithmetic,
    /// `$(cmd)`
    CommandSub,
    /// `` `cmd` ``
    Backtick,
    /// `'text'`
    SingleQuoted,
    /// `"text"`
    DoubleQuoted,
    /// `\x`
    EscapedChar,
    /// `{a,b}` or `{1..5}`
    BracePattern,
}

/// One classified span of a word.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpToken {
    pub kind: ExpTokenKind,
    /// Raw text including delimiters (`${`, quotes, backticks).
    pub text: String,
    /// True when the span lies inside double quotes, which suppresses
    /// field splitting of its expansion.
    pub quoted: bool,
}

impl ExpToken {
    fn new(kind: ExpTokenKind, text: String, quoted: bool) -> Self {
        Self { kind, text, quoted }
    }
}

/// Machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Dollar,
    Variable,
    BraceVariable,
    Command,
    Arithmetic,
    Backtick,
    SingleQuote,
    DoubleQuote,
    Escape,
    BracePattern,
}

struct Machine {
    chars: Vec<char>,
    pos: usize,
    state: State,
    /// Start of the span being accumulated.
    token_start: usize,
    /// Nesting counters disambiguating `$((...))` from `$(...)`.
    brace_depth: usize,
    paren_depth: usize,
    /// True while the current nested construct began inside double
    /// quotes; the machine returns to `DoubleQuote` when it closes.
    in_double: bool,
    tokens: Vec<ExpToken>,
}

impl Machine {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            state: State::Normal,
            token_start: 0,
            brace_depth: 0,
            paren_depth: 0,
            in_double: false,
            tokens: Vec::new(),
        }
    }

    fn current(&self) -> char {
        self.chars[self.pos]
    }

    fn next_char(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn span(&self, from: usize, to: usize) -> String {
        self.chars[from..to].iter().collect()
    }

    fn emit(&mut self, kind: ExpTokenKind) {
        if self.pos > self.token_start {
            let text = self.span(self.token_start, self.pos);
            let quoted = self.in_double
                || matches!(kind, ExpTokenKind::SingleQuoted | ExpTokenKind::DoubleQuoted);
            self.tokens.push(ExpToken::new(kind, text, quoted));
        }
        self.token_start = self.pos;
    }

    /// Flush pending literal text before a construct starts.
    fn flush_literal(&mut self) {
        let kind = if self.in_double { ExpTokenKind::DoubleQuoted } else { ExpTokenKind::Literal };
        self.emit(kind);
    }

    /// State to return to once a nested construct closes.
    fn resume(&self) -> State {
        if self.in_double {
            State::DoubleQuote
        } else {
            State::Normal
        }
    }

    fn run(mut self) -> Vec<ExpToken> {
        while self.pos < self.chars.len() {
            match self.state {
                State::Normal => self.on_normal(),
                State::Dollar => self.on_dollar(),
                State::Variable => self.on_variable(),
                State::BraceVariable => self.on_brace_variable(),
                State::Command => self.on_command(),
                State::Arithmetic => self.on_arithmetic(),
                State::Backtick => self.on_backtick(),
                State::SingleQuote => self.on_single_quote(),
                State::DoubleQuote => self.on_double_quote(),
                State::Escape => self.on_escape(),
                State::BracePattern => self.on_brace_pattern(),
            }
        }
        self.finish()
    }

    fn finish(mut self) -> Vec<ExpToken> {
        if self.pos > self.token_start {
            let kind = match self.state {
                State::Normal => ExpTokenKind::Literal,
                // A trailing bare `$` is literal text.
                State::Dollar => ExpTokenKind::Literal,
                State::Variable => ExpTokenKind::Variable,
                // Unterminated constructs are taken literally; the lexer
                // rejects them before execution in strict contexts.
                State::BraceVariable => ExpTokenKind::Literal,
                State::Command => ExpTokenKind::Literal,
                State::Arithmetic => ExpTokenKind::Literal,
                State::Backtick => ExpTokenKind::Literal,
                State::SingleQuote => ExpTokenKind::Literal,
                State::DoubleQuote => ExpTokenKind::DoubleQuoted,
                State::Escape => ExpTokenKind::EscapedChar,
                State::BracePattern => ExpTokenKind::Literal,
            };
            self.emit(kind);
        }
        self.tokens
    }

    fn on_normal(&mut self) {
        match self.current() {
            '$' => {
                self.flush_literal();
                self.state = State::Dollar;
                self.pos += 1;
            }
            '`' => {
                self.flush_literal();
                self.state = State::Backtick;
                self.pos += 1;
            }
            '\'' => {
                self.flush_literal();
                self.state = State::SingleQuote;
                self.pos += 1;
            }
            '"' => {
                self.flush_literal();
                self.in_double = true;
                self.state = State::DoubleQuote;
                self.pos += 1;
            }
            '\\' => {
                self.flush_literal();
                self.state = State::Escape;
                self.pos += 1;
            }
            '{' => {
                self.flush_literal();
                self.brace_depth = 1;
                self.state = State::BracePattern;
                self.pos += 1;
            }
            _ => self.pos += 1,
        }
    }

    fn on_dollar(&mut self) {
        let ch = self.current();
        match ch {
            '{' => {
                self.brace_depth = 1;
                self.state = State::BraceVariable;
                self.pos += 1;
            }
            '(' => {
                if self.next_char() == Some('(') {
                    self.paren_depth = 2;
                    self.state = State::Arithmetic;
                    self.pos += 2;
                } else {
                    self.paren_depth = 1;
                    self.state = State::Command;
                    self.pos += 1;
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                self.state = State::Variable;
                self.pos += 1;
            }
            c if "*@#?$!-".contains(c) || c.is_ascii_digit() => {
                self.pos += 1;
                self.emit(ExpTokenKind::Variable);
                self.state = self.resume();
            }
            _ => {
                // A bare dollar sign is literal text.
                self.emit(ExpTokenKind::Literal);
                self.state = self.resume();
            }
        }
    }

    fn on_variable(&mut self) {
        let ch = self.current();
        if ch.is_ascii_alphanumeric() || ch == '_' {
            self.pos += 1;
        } else {
            self.emit(ExpTokenKind::Variable);
            self.state = self.resume();
        }
    }

    fn on_brace_variable(&mut self) {
        match self.current() {
            '}' => {
                self.brace_depth -= 1;
                self.pos += 1;
                if self.brace_depth == 0 {
                    self.emit(ExpTokenKind::BraceVariable);
                    self.state = self.resume();
                }
            }
            '{' => {
                self.brace_depth += 1;
                self.pos += 1;
            }
            _ => self.pos += 1,
        }
    }

    fn on_command(&mut self) {
        match self.current() {
            ')' => {
                self.paren_depth -= 1;
                self.pos += 1;
                if self.paren_depth == 0 {
                    self.emit(ExpTokenKind::CommandSub);
                    self.state = self.resume();
                }
            }
            '(' => {
                self.paren_depth += 1;
                self.pos += 1;
            }
            _ => self.pos += 1,
        }
    }

    fn on_arithmetic(&mut self) {
        let ch = self.current();
        if ch == ')' && self.next_char() == Some(')') && self.paren_depth == 2 {
            self.paren_depth = 0;
            self.pos += 2;
            self.emit(ExpTokenKind::Arithmetic);
            self.state = self.resume();
        } else {
            if ch == '(' {
                self.paren_depth += 1;
            } else if ch == ')' {
                self.paren_depth -= 1;
            }
            self.pos += 1;
        }
    }

    fn on_backtick(&mut self) {
        match self.current() {
            '`' => {
                self.pos += 1;
                self.emit(ExpTokenKind::Backtick);
                self.state = self.resume();
            }
            '\\' if matches!(self.next_char(), Some('`') | Some('\\') | Some('$')) => {
                self.pos += 2;
            }
            _ => self.pos += 1,
        }
    }

    fn on_single_quote(&mut self) {
        if self.current() == '\'' {
            self.pos += 1;
            self.emit(ExpTokenKind::SingleQuoted);
            self.state = State::Normal;
        } else {
            self.pos += 1;
        }
    }

    fn on_double_quote(&mut self) {
        match self.current() {
            '"' => {
                self.pos += 1;
                self.emit(ExpTokenKind::DoubleQuoted);
                self.in_double = false;
                self.state = State::Normal;
            }
            '\\' if matches!(self.next_char(), Some('"') | Some('\\') | Some('$') | Some('`')) => {
                // Flush preceding text, then emit the escape on its own.
                self.emit(ExpTokenKind::DoubleQuoted);
                self.pos += 2;
                self.emit(ExpTokenKind::EscapedChar);
            }
            '$' => {
                self.emit(ExpTokenKind::DoubleQuoted);
                self.state = State::Dollar;
                self.pos += 1;
            }
            '`' => {
                self.emit(ExpTokenKind::DoubleQuoted);
                self.state = State::Backtick;
                self.pos += 1;
            }
            _ => self.pos += 1,
        }
    }

    fn on_escape(&mut self) {
        // token_start sits on the backslash.
        self.pos += 1;
        self.emit(ExpTokenKind::EscapedChar);
        self.state = State::Normal;
    }

    fn on_brace_pattern(&mut self) {
        match self.current() {
            '}' => {
                self.brace_depth -= 1;
                self.pos += 1;
                if self.brace_depth == 0 {
                    self.emit(ExpTokenKind::BracePattern);
                    self.state = State::Normal;
                }
            }
            '{' => {
                self.brace_depth += 1;
                self.pos += 1;
            }
            _ => self.pos += 1,
        }
    }
}

/// Tokenize word text for expansion.
pub fn tokenize(text: &str) -> Vec<ExpToken> {
    Machine::new(text).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<(ExpTokenKind, String)> {
        tokenize(text).into_iter().map(|t| (t.kind, t.text)).collect()
    }

    #[test]
    fn literal_only() {
        assert_eq!(kinds("hello"), vec![(ExpTokenKind::Literal, "hello".into())]);
    }

    #[test]
    fn simple_variable() {
        assert_eq!(
            kinds("$HOME/bin"),
            vec![
                (ExpTokenKind::Variable, "$HOME".into()),
                (ExpTokenKind::Literal, "/bin".into()),
            ]
        );
    }

    #[test]
    fn adjacent_variables() {
        assert_eq!(
            kinds("$a$b"),
            vec![
                (ExpTokenKind::Variable, "$a".into()),
                (ExpTokenKind::Variable, "$b".into()),
            ]
        );
    }

    #[test]
    fn special_parameters() {
        assert_eq!(kinds("$?"), vec![(ExpTokenKind::Variable, "$?".into())]);
        assert_eq!(kinds("$1"), vec![(ExpTokenKind::Variable, "$1".into())]);
        assert_eq!(kinds("$#"), vec![(ExpTokenKind::Variable, "$#".into())]);
    }

    #[test]
    fn brace_variable_with_modifier() {
        assert_eq!(
            kinds("${f%.*}"),
            vec![(ExpTokenKind::BraceVariable, "${f%.*}".into())]
        );
    }

    #[test]
    fn arithmetic_vs_command_sub() {
        assert_eq!(
            kinds("$((1 + 2))"),
            vec![(ExpTokenKind::Arithmetic, "$((1 + 2))".into())]
        );
        assert_eq!(
            kinds("$(echo hi)"),
            vec![(ExpTokenKind::CommandSub, "$(echo hi)".into())]
        );
    }

    #[test]
    fn nested_parens_in_arithmetic() {
        assert_eq!(
            kinds("$(( (1+2) * 3 ))"),
            vec![(ExpTokenKind::Arithmetic, "$(( (1+2) * 3 ))".into())]
        );
    }

    #[test]
    fn nested_command_substitution() {
        assert_eq!(
            kinds("$(echo $(date))"),
            vec![(ExpTokenKind::CommandSub, "$(echo $(date))".into())]
        );
    }

    #[test]
    fn quoted_segments() {
        assert_eq!(
            kinds("'no $x'"),
            vec![(ExpTokenKind::SingleQuoted, "'no $x'".into())]
        );
        assert_eq!(
            kinds("\"plain\""),
            vec![(ExpTokenKind::DoubleQuoted, "\"plain\"".into())]
        );
    }

    #[test]
    fn variable_inside_double_quotes_is_quoted() {
        let toks = tokenize("\"a $b c\"");
        assert_eq!(toks.len(), 3);
        assert_eq!(toks[0].kind, ExpTokenKind::DoubleQuoted);
        assert_eq!(toks[1].kind, ExpTokenKind::Variable);
        assert!(toks[1].quoted);
        assert_eq!(toks[2].kind, ExpTokenKind::DoubleQuoted);
        assert_eq!(toks[2].text, " c\"");
    }

    #[test]
    fn text_after_quoted_variable_returns_to_quote_state() {
        // The tail after the inner variable must stay quoted.
        let toks = tokenize("\"$a-tail\"");
        assert_eq!(toks[0].kind, ExpTokenKind::Variable);
        assert!(toks[1].quoted);
        assert_eq!(toks[1].text, "-tail\"");
    }

    #[test]
    fn escape_token() {
        assert_eq!(
            kinds("a\\$b"),
            vec![
                (ExpTokenKind::Literal, "a".into()),
                (ExpTokenKind::EscapedChar, "\\$".into()),
                (ExpTokenKind::Literal, "b".into()),
            ]
        );
    }

    #[test]
    fn brace_pattern() {
        assert_eq!(
            kinds("{a,b}"),
            vec![(ExpTokenKind::BracePattern, "{a,b}".into())]
        );
    }

    #[test]
    fn bare_dollar_is_literal() {
        assert_eq!(
            kinds("$ x"),
            vec![
                (ExpTokenKind::Literal, "$".into()),
                (ExpTokenKind::Literal, " x".into()),
            ]
        );
    }

    #[test]
    fn trailing_variable_is_flushed() {
        assert_eq!(kinds("$abc"), vec![(ExpTokenKind::Variable, "$abc".into())]);
    }
}
