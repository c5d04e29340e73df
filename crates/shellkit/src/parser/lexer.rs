//! Lexer for shell source text
//!
//! A direct DFA over input characters. Words keep their quotes in the
//! lexeme so the expander can apply per-segment rules later; the token
//! value carries the text with surrounding quotes removed.

use super::tokens::{Position, Quoting, Token};
use crate::error::{Error, Result};

/// Multi-character operators, longest first.
const MULTI_OPERATORS: &[&str] = &["&&", "||", ";;", ">>", "<<", ">&", "<&", "|&", "&>"];

/// Characters that terminate an unquoted word.
const OPERATOR_STARTS: &[char] = &['|', '&', ';', '(', ')', '<', '>'];

/// Lexer over shell source text.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    position: Position,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self { chars: input.chars().collect(), pos: 0, position: Position::start() }
    }

    /// Tokenize the whole input, ending with an EOF token.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        if self.chars.contains(&'\0') {
            return Err(Error::Lex("NUL byte in input".into()));
        }

        let mut tokens = Vec::new();

        loop {
            self.skip_blanks()?;

            let Some(ch) = self.peek() else {
                break;
            };

            if ch == '\n' {
                tokens.push(Token::newline(self.position));
                self.advance();
                continue;
            }

            if ch == '#' {
                self.skip_comment();
                continue;
            }

            // Standalone brace tokens open and close groups; a brace glued
            // to other characters stays inside the word for the expander.
            if ch == '{' && self.is_group_brace() {
                tokens.push(Token::word("{", "{", Quoting::Unquoted, self.position));
                self.advance();
                continue;
            }
            if ch == '}' && self.is_group_brace() {
                tokens.push(Token::word("}", "}", Quoting::Unquoted, self.position));
                self.advance();
                continue;
            }

            // Digit immediately followed by a redirection operator forms a
            // fd-prefixed operator (2>, 2>>, 2>&, 1<, ...).
            if ch.is_ascii_digit() {
                if let Some(op) = self.peek_fd_redirect() {
                    let position = self.position;
                    for _ in 0..op.chars().count() {
                        self.advance();
                    }
                    tokens.push(Token::operator(op, position));
                    continue;
                }
            }

            if OPERATOR_STARTS.contains(&ch) {
                tokens.push(self.read_operator());
                continue;
            }

            tokens.push(self.read_word()?);
        }

        tokens.push(Token::eof(self.position));
        tracing::trace!(count = tokens.len(), "lexed tokens");
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied();
        if let Some(c) = ch {
            self.position.advance(c);
            self.pos += 1;
        }
        ch
    }

    /// Skip spaces, tabs, and backslash-newline continuations.
    fn skip_blanks(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') => {
                    self.advance();
                }
                Some('\\') if self.peek_at(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                    if self.peek().is_none() {
                        return Err(Error::Incomplete("line continuation".into()));
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// A brace is a group delimiter only when it stands alone as a word.
    fn is_group_brace(&self) -> bool {
        matches!(self.peek_at(1), None | Some(' ') | Some('\t') | Some('\n') | Some(';') | Some('&') | Some('|'))
    }

    /// Look for `N>`, `N>>`, `N>&`, `N<`, `N<&` at the current position.
    fn peek_fd_redirect(&self) -> Option<String> {
        let digit = self.peek()?;
        let next = self.peek_at(1)?;
        if next != '>' && next != '<' {
            return None;
        }
        match (next, self.peek_at(2)) {
            ('>', Some('>')) => Some(format!("{digit}>>")),
            ('>', Some('&')) => Some(format!("{digit}>&")),
            ('<', Some('&')) => Some(format!("{digit}<&")),
            ('>', _) => Some(format!("{digit}>")),
            ('<', _) => Some(format!("{digit}<")),
            _ => unreachable!(),
        }
    }

    fn read_operator(&mut self) -> Token {
        let position = self.position;
        let rest: String = self.chars[self.pos..self.pos + 2.min(self.chars.len() - self.pos)]
            .iter()
            .collect();

        for op in MULTI_OPERATORS {
            if rest.starts_with(op) {
                self.advance();
                self.advance();
                return Token::operator(*op, position);
            }
        }

        let ch = self.advance().expect("operator start");
        Token::operator(ch.to_string(), position)
    }

    fn read_word(&mut self) -> Result<Token> {
        let position = self.position;
        let mut lexeme = String::new();
        let mut value = String::new();
        let mut has_single = false;
        let mut has_double = false;
        let mut has_unquoted = false;

        while let Some(ch) = self.peek() {
            match ch {
                ' ' | '\t' | '\n' => break,
                c if OPERATOR_STARTS.contains(&c) => break,
                '\'' => {
                    has_single = true;
                    self.read_single_quoted(&mut lexeme, &mut value)?;
                }
                '"' => {
                    has_double = true;
                    self.read_double_quoted(&mut lexeme, &mut value)?;
                }
                '\\' => {
                    if self.peek_at(1) == Some('\n') {
                        // Line continuation inside a word: splice the lines.
                        self.advance();
                        self.advance();
                        if self.peek().is_none() {
                            return Err(Error::Incomplete("line continuation".into()));
                        }
                        continue;
                    }
                    has_unquoted = true;
                    self.advance();
                    lexeme.push('\\');
                    value.push('\\');
                    match self.advance() {
                        Some(c) => {
                            lexeme.push(c);
                            value.push(c);
                        }
                        None => return Err(Error::Incomplete("escape at end of input".into())),
                    }
                }
                '$' => {
                    has_unquoted = true;
                    self.read_dollar(&mut lexeme, &mut value)?;
                }
                '`' => {
                    has_unquoted = true;
                    self.read_backquoted(&mut lexeme, &mut value)?;
                }
                c => {
                    has_unquoted = true;
                    self.advance();
                    lexeme.push(c);
                    value.push(c);
                }
            }
        }

        let quoting = match (has_single, has_double, has_unquoted) {
            (true, false, false) => Quoting::SingleQuoted,
            (false, true, false) => Quoting::DoubleQuoted,
            (false, false, _) => Quoting::Unquoted,
            _ => Quoting::Mixed,
        };

        Ok(Token::word(lexeme, value, quoting, position))
    }

    fn read_single_quoted(&mut self, lexeme: &mut String, value: &mut String) -> Result<()> {
        self.advance();
        lexeme.push('\'');
        loop {
            match self.advance() {
                Some('\'') => {
                    lexeme.push('\'');
                    return Ok(());
                }
                Some(c) => {
                    lexeme.push(c);
                    value.push(c);
                }
                None => return Err(Error::Incomplete("unterminated single quote".into())),
            }
        }
    }

    fn read_double_quoted(&mut self, lexeme: &mut String, value: &mut String) -> Result<()> {
        self.advance();
        lexeme.push('"');
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    lexeme.push('"');
                    return Ok(());
                }
                Some('\\') => {
                    // Backslash inside double quotes is only special before
                    // $ " \ ` and newline; otherwise it stays literal.
                    self.advance();
                    lexeme.push('\\');
                    value.push('\\');
                    if let Some(c) = self.advance() {
                        lexeme.push(c);
                        value.push(c);
                    } else {
                        return Err(Error::Incomplete("unterminated double quote".into()));
                    }
                }
                Some('$') if self.peek_at(1) == Some('(') => {
                    // Balance the substitution so its `)` and `"` do not
                    // terminate the surrounding quote early.
                    self.read_dollar(lexeme, value)?;
                }
                Some(c) => {
                    self.advance();
                    lexeme.push(c);
                    value.push(c);
                }
                None => return Err(Error::Incomplete("unterminated double quote".into())),
            }
        }
    }

    /// Consume `$`, `$name`, `${...}`, `$(...)`, or `$((...))` into the word.
    fn read_dollar(&mut self, lexeme: &mut String, value: &mut String) -> Result<()> {
        self.advance();
        lexeme.push('$');
        value.push('$');

        match self.peek() {
            Some('(') if self.peek_at(1) == Some('(') => self.read_arith(lexeme, value),
            Some('(') => self.read_command_sub(lexeme, value),
            Some('{') => self.read_brace_param(lexeme, value),
            _ => Ok(()),
        }
    }

    fn read_arith(&mut self, lexeme: &mut String, value: &mut String) -> Result<()> {
        // Past "$((", closed only by a precisely matching "))".
        for _ in 0..2 {
            let c = self.advance().expect("arith open");
            lexeme.push(c);
            value.push(c);
        }
        let mut depth = 2;
        loop {
            match self.peek() {
                Some(')') if self.peek_at(1) == Some(')') && depth == 2 => {
                    for _ in 0..2 {
                        let c = self.advance().expect("arith close");
                        lexeme.push(c);
                        value.push(c);
                    }
                    return Ok(());
                }
                Some(c) => {
                    if c == '(' {
                        depth += 1;
                    } else if c == ')' {
                        depth -= 1;
                    }
                    self.advance();
                    lexeme.push(c);
                    value.push(c);
                }
                None => return Err(Error::Incomplete("unterminated arithmetic expansion".into())),
            }
        }
    }

    fn read_command_sub(&mut self, lexeme: &mut String, value: &mut String) -> Result<()> {
        let c = self.advance().expect("cmdsub open");
        lexeme.push(c);
        value.push(c);
        let mut depth = 1;
        let mut in_single = false;
        let mut in_double = false;
        loop {
            match self.advance() {
                Some(c) => {
                    lexeme.push(c);
                    value.push(c);
                    match c {
                        '\'' if !in_double => in_single = !in_single,
                        '"' if !in_single => in_double = !in_double,
                        '(' if !in_single && !in_double => depth += 1,
                        ')' if !in_single && !in_double => {
                            depth -= 1;
                            if depth == 0 {
                                return Ok(());
                            }
                        }
                        _ => {}
                    }
                }
                None => return Err(Error::Incomplete("unterminated command substitution".into())),
            }
        }
    }

    fn read_backquoted(&mut self, lexeme: &mut String, value: &mut String) -> Result<()> {
        self.advance();
        lexeme.push('`');
        value.push('`');
        loop {
            match self.advance() {
                Some('`') => {
                    lexeme.push('`');
                    value.push('`');
                    return Ok(());
                }
                Some('\\') => {
                    lexeme.push('\\');
                    value.push('\\');
                    if let Some(c) = self.advance() {
                        lexeme.push(c);
                        value.push(c);
                    } else {
                        return Err(Error::Incomplete("unterminated backquote".into()));
                    }
                }
                Some(c) => {
                    lexeme.push(c);
                    value.push(c);
                }
                None => return Err(Error::Incomplete("unterminated backquote".into())),
            }
        }
    }

    fn read_brace_param(&mut self, lexeme: &mut String, value: &mut String) -> Result<()> {
        let c = self.advance().expect("brace open");
        lexeme.push(c);
        value.push(c);
        let mut depth = 1;
        loop {
            match self.advance() {
                Some(c) => {
                    lexeme.push(c);
                    value.push(c);
                    match c {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                return Ok(());
                            }
                        }
                        _ => {}
                    }
                }
                None => return Err(Error::Incomplete("unterminated parameter expansion".into())),
            }
        }
    }

}

/// Tokenize a full source string.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokens::TokenKind;

    fn words(input: &str) -> Vec<String> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind == TokenKind::Word)
            .map(|t| t.lexeme)
            .collect()
    }

    #[test]
    fn simple_words() {
        assert_eq!(words("echo hello world"), vec!["echo", "hello", "world"]);
    }

    #[test]
    fn operators_longest_match() {
        let toks = tokenize("a | b && c || d; e &").unwrap();
        let ops: Vec<&str> = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.value.as_str())
            .collect();
        assert_eq!(ops, vec!["|", "&&", "||", ";", "&"]);
    }

    #[test]
    fn fd_redirect_operators() {
        let toks = tokenize("cmd 2> err 2>> err2 2>&1").unwrap();
        let ops: Vec<&str> = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.value.as_str())
            .collect();
        assert_eq!(ops, vec!["2>", "2>>", "2>&"]);
    }

    #[test]
    fn word_starting_with_digit_is_a_word() {
        assert_eq!(words("echo 2fast"), vec!["echo", "2fast"]);
    }

    #[test]
    fn single_quotes_preserved_in_lexeme() {
        let toks = tokenize("echo 'hello world'").unwrap();
        assert_eq!(toks[1].lexeme, "'hello world'");
        assert_eq!(toks[1].value, "hello world");
        assert_eq!(toks[1].quoting, Quoting::SingleQuoted);
    }

    #[test]
    fn mixed_quoting_detected() {
        let toks = tokenize(r#"a"b"'c'"#).unwrap();
        assert_eq!(toks[0].quoting, Quoting::Mixed);
        assert_eq!(toks[0].value, "abc");
    }

    #[test]
    fn dollar_stays_in_word() {
        assert_eq!(words("echo $HOME$USER"), vec!["echo", "$HOME$USER"]);
    }

    #[test]
    fn command_substitution_kept_whole() {
        assert_eq!(words("echo $(ls -l | wc)"), vec!["echo", "$(ls -l | wc)"]);
    }

    #[test]
    fn arithmetic_kept_whole() {
        assert_eq!(words("echo $((1 + (2 * 3)))"), vec!["echo", "$((1 + (2 * 3)))"]);
    }

    #[test]
    fn comment_skipped() {
        let toks = tokenize("echo hi # not this\necho yes").unwrap();
        let ws: Vec<&str> = toks.iter().filter(|t| t.is_word()).map(|t| t.value.as_str()).collect();
        assert_eq!(ws, vec!["echo", "hi", "echo", "yes"]);
    }

    #[test]
    fn hash_inside_word_is_literal() {
        assert_eq!(words("echo a#b"), vec!["echo", "a#b"]);
    }

    #[test]
    fn line_continuation_joins_lines() {
        let toks = tokenize("echo a \\\nb").unwrap();
        let ws: Vec<&str> = toks.iter().filter(|t| t.is_word()).map(|t| t.value.as_str()).collect();
        assert_eq!(ws, vec!["echo", "a", "b"]);
        assert!(!toks.iter().any(|t| t.is_newline()));
    }

    #[test]
    fn trailing_continuation_is_incomplete() {
        let err = tokenize("echo a \\\n").unwrap_err();
        assert!(err.is_incomplete());
    }

    #[test]
    fn unterminated_quote_is_incomplete() {
        assert!(tokenize("echo 'oops").unwrap_err().is_incomplete());
        assert!(tokenize("echo \"oops").unwrap_err().is_incomplete());
        assert!(tokenize("echo `oops").unwrap_err().is_incomplete());
        assert!(tokenize("echo $(oops").unwrap_err().is_incomplete());
        assert!(tokenize("echo $((1 +").unwrap_err().is_incomplete());
    }

    #[test]
    fn nul_byte_is_a_lex_error() {
        let err = tokenize("echo \0 hi").unwrap_err();
        assert!(matches!(err, crate::error::Error::Lex(_)));
    }

    #[test]
    fn group_braces_stand_alone() {
        let toks = tokenize("{ echo hi; }").unwrap();
        assert_eq!(toks[0].value, "{");
        assert!(toks.iter().any(|t| t.value == "}"));
        // Brace expansion text stays a single word.
        assert_eq!(words("echo {a,b}.txt"), vec!["echo", "{a,b}.txt"]);
    }

    #[test]
    fn positions_are_tracked() {
        let toks = tokenize("echo hi\nfoo").unwrap();
        assert_eq!(toks[0].position.line, 1);
        let foo = toks.iter().find(|t| t.value == "foo").unwrap();
        assert_eq!(foo.position.line, 2);
        assert_eq!(foo.position.column, 1);
    }
}
