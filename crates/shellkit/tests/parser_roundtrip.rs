//! Structural parser invariants: canonical printing round-trips, and
//! resumable parsing agrees with single-shot parsing.

use shellkit::parser::{parse, ParseOutcome, ParseSession};

/// Programs covering every node kind and operator.
const CORPUS: &[&str] = &[
    "echo hello",
    "echo 'single quoted' \"double $x\" mixed'seg'\"ment\"",
    "a=1 b='two words' cmd arg1 arg2",
    "x=42",
    "ls -l | grep foo | wc -l",
    "! false",
    "true && echo yes || echo no",
    "a; b; c",
    "cmd >out.txt 2>err.txt",
    "cmd >>append.log 2>&1",
    "cmd <input.txt",
    "cmd &>both.log",
    "if cond; then body; fi",
    "if a; then b; elif c; then d; elif e; then f; else g; fi",
    "while check; do work; done",
    "until check; do work; done",
    "for i in 1 2 3; do echo $i; done",
    "for arg; do echo $arg; done",
    "case $x in a) one;; b|c) two;; *) other;; esac",
    "f() { echo body; }",
    "function g { echo body; }",
    "outer() { inner() { echo deep; }; inner; }",
    "(echo in subshell)",
    "{ echo grouped; echo twice; }",
    "sleep 9 &",
    "job one & job two & echo fg",
    "if a; then for i in x; do echo $i; done; fi",
    "echo ${var:-default} ${#len} ${p%%.*} $((1 + 2)) $(inner cmd) `ticks`",
];

#[test]
fn printing_then_reparsing_is_isomorphic() {
    for input in CORPUS {
        let first = parse(input).unwrap_or_else(|e| panic!("parse of {input:?} failed: {e}"));
        let printed = first.to_string();
        let second =
            parse(&printed).unwrap_or_else(|e| panic!("reparse of {printed:?} failed: {e}"));
        assert_eq!(first, second, "round-trip changed the tree for {input:?} -> {printed:?}");

        // The canonical form is a fixed point.
        assert_eq!(printed, second.to_string());
    }
}

#[test]
fn resumable_parse_equals_single_shot() {
    let multi_line_programs: &[&[&str]] = &[
        &["if true; then", "echo yes", "fi"],
        &["for i in 1 2 3; do", "  echo $i", "done"],
        &["while check; do", "work", "done"],
        &["case $x in", "a) one;;", "*) other;;", "esac"],
        &["f() {", "echo body", "}"],
        &["echo one &&", "echo two"],
        &["echo a |", "cat"],
        &["{ echo open", "echo close; }"],
        &["(echo sub", "echo done)"],
        &["echo 'spanning", "quote'"],
    ];

    for chunks in multi_line_programs {
        let mut session = ParseSession::new();
        let mut completed = None;
        for (i, chunk) in chunks.iter().enumerate() {
            match session.feed_line(chunk).unwrap() {
                ParseOutcome::Complete(script) => {
                    assert_eq!(i, chunks.len() - 1, "completed early on {chunk:?}");
                    completed = Some(script);
                }
                ParseOutcome::NeedsMore => {
                    assert!(i < chunks.len() - 1, "still open after last chunk of {chunks:?}");
                }
            }
        }

        let accumulated = completed.expect("program should complete");
        let single_shot = parse(&format!("{}\n", chunks.join("\n"))).unwrap();
        assert_eq!(accumulated, single_shot, "resumable mismatch for {chunks:?}");
    }
}

#[test]
fn pending_construct_names_what_is_open() {
    let mut session = ParseSession::new();
    session.feed_line("if true; then").unwrap();
    let pending = session.pending_construct().expect("something should be open");
    assert!(pending.contains("fi"), "unexpected pending construct: {pending}");

    session.reset();
    session.feed_line("echo 'open quote").unwrap();
    let pending = session.pending_construct().expect("quote should be open");
    assert!(pending.contains("quote"), "unexpected pending construct: {pending}");
}

#[test]
fn quote_free_words_are_preserved_exactly() {
    let script = parse("cmd one two-three four.five /a/b:c").unwrap();
    assert_eq!(script.to_string(), "cmd one two-three four.five /a/b:c");
}
