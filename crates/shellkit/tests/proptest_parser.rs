//! Property-based tests: the parser and the pure expansion stages never
//! panic, and structural invariants hold over generated input.

use proptest::prelude::*;
use shellkit::expand::{arith, braces, pattern};
use shellkit::parser::parse;

mod strategies {
    use proptest::prelude::*;

    /// Arbitrary strings, most of which are invalid shell input.
    pub fn arbitrary_input() -> impl Strategy<Value = String> {
        prop::string::string_regex(".{0,80}").unwrap()
    }

    /// Text biased toward shell metacharacters.
    pub fn shell_flavored() -> impl Strategy<Value = String> {
        prop::string::string_regex(r#"[a-z0-9 $\{\}()|&;<>'"`!*?\[\]=~.\\-]{0,60}"#).unwrap()
    }

    pub fn identifier() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z_][a-zA-Z0-9_]{0,12}").unwrap()
    }

    /// Words free of quoting and expansion metacharacters.
    pub fn plain_word() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9_./:-]{1,20}").unwrap()
    }

    pub fn arith_expr() -> impl Strategy<Value = String> {
        prop::string::string_regex(r"[0-9a-z+\-*/%()<>=&|!~^ ]{0,40}").unwrap()
    }

    pub fn glob_pattern() -> impl Strategy<Value = String> {
        prop::string::string_regex(r"[a-z0-9*?\[\]!.\\-]{0,25}").unwrap()
    }
}

proptest! {
    #[test]
    fn parser_never_panics_on_arbitrary_input(input in strategies::arbitrary_input()) {
        let _ = parse(&input);
    }

    #[test]
    fn parser_never_panics_on_shell_flavored_input(input in strategies::shell_flavored()) {
        let _ = parse(&input);
    }

    #[test]
    fn plain_commands_parse_and_roundtrip(
        name in strategies::plain_word(),
        args in prop::collection::vec(strategies::plain_word(), 0..5),
    ) {
        let input = if args.is_empty() {
            name.clone()
        } else {
            format!("{} {}", name, args.join(" "))
        };
        // Skip inputs where a word is a reserved one in command position.
        prop_assume!(!shellkit::parser::RESERVED_WORDS.contains(&name.as_str()));

        let script = parse(&input).unwrap();
        let reparsed = parse(&script.to_string()).unwrap();
        prop_assert_eq!(script, reparsed);
    }

    #[test]
    fn brace_expansion_never_panics_and_never_empties(input in strategies::shell_flavored()) {
        let out = braces::expand_braces(&input);
        prop_assert!(!out.is_empty());
    }

    #[test]
    fn brace_expansion_of_brace_free_text_is_identity(input in strategies::plain_word()) {
        prop_assert_eq!(braces::expand_braces(&input), vec![input]);
    }

    #[test]
    fn pattern_conversion_never_panics(pattern_text in strategies::glob_pattern(), text in strategies::plain_word()) {
        let _ = pattern::matches(&text, &pattern_text);
    }

    #[test]
    fn star_matches_everything(text in strategies::plain_word()) {
        prop_assert!(pattern::matches(&text, "*"));
    }

    #[test]
    fn exact_patterns_match_themselves(text in strategies::plain_word()) {
        prop_assume!(!text.contains(['*', '?', '[', '\\']));
        prop_assert!(pattern::matches(&text, &text));
    }

    #[test]
    fn arithmetic_never_panics(expr in strategies::arith_expr()) {
        struct NoVars;
        impl arith::ArithEnv for NoVars {
            fn get(&mut self, _name: &str) -> Option<String> { None }
            fn set(&mut self, _name: &str, _value: i64) {}
        }
        let _ = arith::eval(&expr, &mut NoVars);
    }

    #[test]
    fn arithmetic_literals_evaluate_to_themselves(n in 0i64..1_000_000) {
        struct NoVars;
        impl arith::ArithEnv for NoVars {
            fn get(&mut self, _name: &str) -> Option<String> { None }
            fn set(&mut self, _name: &str, _value: i64) {}
        }
        prop_assert_eq!(arith::eval(&n.to_string(), &mut NoVars).unwrap(), n);
    }

    #[test]
    fn assignments_with_identifiers_parse(name in strategies::identifier(), value in strategies::plain_word()) {
        let script = parse(&format!("{name}={value}")).unwrap();
        prop_assert_eq!(script.commands.len(), 1);
    }
}
