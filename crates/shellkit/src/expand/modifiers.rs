//! Parameter expansion modifiers
//!
//! Parses the body of `${...}` into a parameter reference plus modifier,
//! and provides the pure string transforms the driver applies: pattern
//! removal, substitution, case conversion, and substring extraction.

use regex::{NoExpand, Regex};

use super::pattern;
use crate::error::{Error, Result};

/// Where a substitution pattern is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    None,
    /// `/#pat` - match only at the start
    Start,
    /// `/%pat` - match only at the end
    End,
}

/// A parsed parameter modifier. Word operands are stored unexpanded;
/// the driver expands them lazily, per POSIX.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    None,
    /// `${#P}`
    Length,
    /// `${P:-word}`
    UseDefault(String),
    /// `${P:=word}`
    AssignDefault(String),
    /// `${P:?word}`
    ErrorIfEmpty(String),
    /// `${P:+word}`
    UseAlternate(String),
    /// `${P:offset}` / `${P:offset:length}`
    Substring { offset: i64, length: Option<i64> },
    /// `${P#pat}` / `${P##pat}`
    RemovePrefix { pattern: String, longest: bool },
    /// `${P%pat}` / `${P%%pat}`
    RemoveSuffix { pattern: String, longest: bool },
    /// `${P/pat/repl}` and variants
    Replace { pattern: String, replacement: String, all: bool, anchor: Anchor },
    /// `${P^}` / `${P^^}` / `${P,}` / `${P,,}`
    CaseConvert { upper: bool, all_chars: bool },
}

/// A parameter reference with its modifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRef {
    pub name: String,
    pub modifier: Modifier,
}

/// Parse the text between `${` and `}`.
pub fn parse(content: &str) -> Result<ParameterRef> {
    if content.is_empty() {
        return Err(Error::Expansion("bad substitution: ${}".into()));
    }

    // ${#P} - length of P. A lone `#` or `#` followed by a modifier
    // character is parameter `#` itself.
    if let Some(rest) = content.strip_prefix('#') {
        if !rest.is_empty() && parameter_name(rest).map(|(n, r)| r.is_empty() && n == rest) == Some(true) {
            return Ok(ParameterRef { name: rest.to_string(), modifier: Modifier::Length });
        }
    }

    let Some((name, rest)) = parameter_name(content) else {
        return Err(Error::Expansion(format!("bad substitution: ${{{content}}}")));
    };

    let modifier = parse_modifier(rest)
        .ok_or_else(|| Error::Expansion(format!("bad substitution: ${{{content}}}")))?;
    Ok(ParameterRef { name: name.to_string(), modifier })
}

/// Split a parameter name off the front: an identifier, a digit run, or
/// one special character.
fn parameter_name(content: &str) -> Option<(&str, &str)> {
    let mut chars = content.char_indices();
    let (_, first) = chars.next()?;

    if first.is_ascii_alphabetic() || first == '_' {
        let end = content
            .char_indices()
            .find(|(_, c)| !c.is_ascii_alphanumeric() && *c != '_')
            .map(|(i, _)| i)
            .unwrap_or(content.len());
        Some(content.split_at(end))
    } else if first.is_ascii_digit() {
        let end = content
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(content.len());
        Some(content.split_at(end))
    } else if "*@#?$!-".contains(first) {
        Some(content.split_at(first.len_utf8()))
    } else {
        None
    }
}

fn parse_modifier(rest: &str) -> Option<Modifier> {
    if rest.is_empty() {
        return Some(Modifier::None);
    }

    if let Some(word) = rest.strip_prefix(":-") {
        return Some(Modifier::UseDefault(word.to_string()));
    }
    if let Some(word) = rest.strip_prefix(":=") {
        return Some(Modifier::AssignDefault(word.to_string()));
    }
    if let Some(word) = rest.strip_prefix(":?") {
        return Some(Modifier::ErrorIfEmpty(word.to_string()));
    }
    if let Some(word) = rest.strip_prefix(":+") {
        return Some(Modifier::UseAlternate(word.to_string()));
    }
    if let Some(spec) = rest.strip_prefix(':') {
        return parse_substring(spec);
    }

    if let Some(pattern) = rest.strip_prefix("##") {
        return Some(Modifier::RemovePrefix { pattern: pattern.to_string(), longest: true });
    }
    if let Some(pattern) = rest.strip_prefix('#') {
        return Some(Modifier::RemovePrefix { pattern: pattern.to_string(), longest: false });
    }
    if let Some(pattern) = rest.strip_prefix("%%") {
        return Some(Modifier::RemoveSuffix { pattern: pattern.to_string(), longest: true });
    }
    if let Some(pattern) = rest.strip_prefix('%') {
        return Some(Modifier::RemoveSuffix { pattern: pattern.to_string(), longest: false });
    }

    if let Some(spec) = rest.strip_prefix('/') {
        let (all, anchor, spec) = if let Some(s) = spec.strip_prefix('/') {
            (true, Anchor::None, s)
        } else if let Some(s) = spec.strip_prefix('#') {
            (false, Anchor::Start, s)
        } else if let Some(s) = spec.strip_prefix('%') {
            (false, Anchor::End, s)
        } else {
            (false, Anchor::None, spec)
        };
        let (pattern, replacement) = split_substitution(spec);
        return Some(Modifier::Replace { pattern, replacement, all, anchor });
    }

    match rest {
        "^^" => Some(Modifier::CaseConvert { upper: true, all_chars: true }),
        "^" => Some(Modifier::CaseConvert { upper: true, all_chars: false }),
        ",," => Some(Modifier::CaseConvert { upper: false, all_chars: true }),
        "," => Some(Modifier::CaseConvert { upper: false, all_chars: false }),
        _ => None,
    }
}

/// `offset[:length]`, both possibly negative.
fn parse_substring(spec: &str) -> Option<Modifier> {
    let (offset_str, length_str) = match spec.find(':') {
        Some(i) => (&spec[..i], Some(&spec[i + 1..])),
        None => (spec, None),
    };
    let offset = offset_str.trim().parse::<i64>().ok()?;
    let length = match length_str {
        Some(s) if !s.trim().is_empty() => Some(s.trim().parse::<i64>().ok()?),
        _ => None,
    };
    Some(Modifier::Substring { offset, length })
}

/// Split `pat/repl` at the first unescaped slash; a missing replacement
/// deletes the match.
fn split_substitution(spec: &str) -> (String, String) {
    let mut pattern = String::new();
    let mut chars = spec.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    if next == '/' {
                        pattern.push('/');
                    } else {
                        pattern.push('\\');
                        pattern.push(next);
                    }
                } else {
                    pattern.push('\\');
                }
            }
            '/' => return (pattern, chars.collect()),
            _ => pattern.push(c),
        }
    }
    (pattern, String::new())
}

/// Remove the shortest or longest prefix/suffix matching a shell pattern.
///
/// Candidate split points are tried in order of match length so that
/// shortest/longest selection is exact, not an artifact of regex
/// greediness.
pub fn remove_pattern(value: &str, pat: &str, prefix: bool, longest: bool) -> String {
    if value.is_empty() || pat.is_empty() {
        return value.to_string();
    }
    let Ok(re) = pattern::compile_anchored(pat) else {
        return value.to_string();
    };

    let boundaries: Vec<usize> = {
        let mut b: Vec<usize> = value.char_indices().map(|(i, _)| i).collect();
        b.push(value.len());
        b
    };

    if prefix {
        // Matching prefix value[..i]; shortest tries small i first.
        let candidates: Box<dyn Iterator<Item = &usize>> = if longest {
            Box::new(boundaries.iter().rev())
        } else {
            Box::new(boundaries.iter())
        };
        for &i in candidates {
            if re.is_match(&value[..i]) {
                return value[i..].to_string();
            }
        }
    } else {
        // Matching suffix value[i..]; shortest tries large i first.
        let candidates: Box<dyn Iterator<Item = &usize>> = if longest {
            Box::new(boundaries.iter())
        } else {
            Box::new(boundaries.iter().rev())
        };
        for &i in candidates {
            if re.is_match(&value[i..]) {
                return value[..i].to_string();
            }
        }
    }
    value.to_string()
}

/// `${P/pat/repl}` family.
pub fn substitute(value: &str, pat: &str, replacement: &str, all: bool, anchor: Anchor) -> String {
    if value.is_empty() || pat.is_empty() {
        return value.to_string();
    }
    let body = pattern::pattern_to_regex(pat);
    let source = match anchor {
        Anchor::None => format!("(?s:{body})"),
        Anchor::Start => format!("^(?s:{body})"),
        Anchor::End => format!("(?s:{body})$"),
    };
    let Ok(re) = Regex::new(&source) else {
        return value.to_string();
    };
    if all {
        re.replace_all(value, NoExpand(replacement)).into_owned()
    } else {
        re.replace(value, NoExpand(replacement)).into_owned()
    }
}

/// `${P^}` family. ASCII-only case conversion.
pub fn case_convert(value: &str, upper: bool, all_chars: bool) -> String {
    if all_chars {
        if upper {
            value.to_ascii_uppercase()
        } else {
            value.to_ascii_lowercase()
        }
    } else {
        let mut chars = value.chars();
        match chars.next() {
            Some(first) => {
                let converted =
                    if upper { first.to_ascii_uppercase() } else { first.to_ascii_lowercase() };
                let mut out = String::with_capacity(value.len());
                out.push(converted);
                out.extend(chars);
                out
            }
            None => String::new(),
        }
    }
}

/// `${P:offset:length}`, character-based, negative values count from the
/// end. Out-of-range slices are empty rather than errors.
pub fn substring(value: &str, offset: i64, length: Option<i64>) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len() as i64;

    let start = if offset < 0 { (len + offset).max(0) } else { offset.min(len) };
    let end = match length {
        Some(l) if l < 0 => (len + l).max(start),
        Some(l) => (start + l).min(len),
        None => len,
    };

    chars[start as usize..end as usize].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(content: &str) -> ParameterRef {
        parse(content).unwrap()
    }

    #[test]
    fn plain_reference() {
        assert_eq!(parsed("HOME"), ParameterRef { name: "HOME".into(), modifier: Modifier::None });
    }

    #[test]
    fn length_reference() {
        assert_eq!(parsed("#HOME").modifier, Modifier::Length);
        // `#` alone is the positional-count parameter.
        assert_eq!(parsed("#"), ParameterRef { name: "#".into(), modifier: Modifier::None });
    }

    #[test]
    fn colon_modifiers() {
        assert_eq!(parsed("x:-fallback").modifier, Modifier::UseDefault("fallback".into()));
        assert_eq!(parsed("x:=v").modifier, Modifier::AssignDefault("v".into()));
        assert_eq!(parsed("x:?msg").modifier, Modifier::ErrorIfEmpty("msg".into()));
        assert_eq!(parsed("x:+alt").modifier, Modifier::UseAlternate("alt".into()));
    }

    #[test]
    fn substring_modifiers() {
        assert_eq!(parsed("x:2").modifier, Modifier::Substring { offset: 2, length: None });
        assert_eq!(parsed("x:2:3").modifier, Modifier::Substring { offset: 2, length: Some(3) });
        // `:-` wins over a substring reading of `-0`.
        assert_eq!(parsed("x:-0").modifier, Modifier::UseDefault("0".into()));
    }

    #[test]
    fn pattern_modifiers() {
        assert_eq!(
            parsed("f%.*").modifier,
            Modifier::RemoveSuffix { pattern: ".*".into(), longest: false }
        );
        assert_eq!(
            parsed("f%%.*").modifier,
            Modifier::RemoveSuffix { pattern: ".*".into(), longest: true }
        );
        assert_eq!(
            parsed("p#*/").modifier,
            Modifier::RemovePrefix { pattern: "*/".into(), longest: false }
        );
        assert_eq!(
            parsed("p##*/").modifier,
            Modifier::RemovePrefix { pattern: "*/".into(), longest: true }
        );
    }

    #[test]
    fn replace_modifiers() {
        assert_eq!(
            parsed("v/a/b").modifier,
            Modifier::Replace { pattern: "a".into(), replacement: "b".into(), all: false, anchor: Anchor::None }
        );
        assert_eq!(
            parsed("v//a/b").modifier,
            Modifier::Replace { pattern: "a".into(), replacement: "b".into(), all: true, anchor: Anchor::None }
        );
        assert_eq!(
            parsed("v/#a/b").modifier,
            Modifier::Replace { pattern: "a".into(), replacement: "b".into(), all: false, anchor: Anchor::Start }
        );
        assert_eq!(
            parsed("v/%a/b").modifier,
            Modifier::Replace { pattern: "a".into(), replacement: "b".into(), all: false, anchor: Anchor::End }
        );
        // Missing replacement deletes.
        assert_eq!(
            parsed("v/a").modifier,
            Modifier::Replace { pattern: "a".into(), replacement: String::new(), all: false, anchor: Anchor::None }
        );
    }

    #[test]
    fn escaped_slash_in_pattern() {
        let Modifier::Replace { pattern, replacement, .. } = parsed("v/\\//:").modifier else {
            panic!()
        };
        assert_eq!(pattern, "/");
        assert_eq!(replacement, ":");
    }

    #[test]
    fn case_modifiers() {
        assert_eq!(parsed("x^^").modifier, Modifier::CaseConvert { upper: true, all_chars: true });
        assert_eq!(parsed("x,").modifier, Modifier::CaseConvert { upper: false, all_chars: false });
    }

    #[test]
    fn bad_substitution_rejected() {
        assert!(parse("").is_err());
        assert!(parse("x~oops").is_err());
        assert!(parse("%weird").is_err());
    }

    #[test]
    fn suffix_removal_shortest_vs_longest() {
        assert_eq!(remove_pattern("document.tar.gz", ".*", false, false), "document.tar");
        assert_eq!(remove_pattern("document.tar.gz", ".*", false, true), "document");
    }

    #[test]
    fn prefix_removal_shortest_vs_longest() {
        assert_eq!(remove_pattern("/usr/local/bin", "*/", true, false), "usr/local/bin");
        assert_eq!(remove_pattern("/usr/local/bin", "*/", true, true), "bin");
    }

    #[test]
    fn removal_without_match_returns_value() {
        assert_eq!(remove_pattern("hello", "x*", true, true), "hello");
        assert_eq!(remove_pattern("hello", "", false, false), "hello");
    }

    #[test]
    fn removal_with_character_class() {
        assert_eq!(remove_pattern("123abc", "[0-9]*", true, true), "abc");
        assert_eq!(remove_pattern("abcdef", "a?c", true, false), "def");
    }

    #[test]
    fn substitution_first_and_all() {
        assert_eq!(substitute("a-b-c", "-", "_", false, Anchor::None), "a_b-c");
        assert_eq!(substitute("a-b-c", "-", "_", true, Anchor::None), "a_b_c");
    }

    #[test]
    fn substitution_anchors() {
        assert_eq!(substitute("aba", "a", "X", false, Anchor::Start), "Xba");
        assert_eq!(substitute("aba", "a", "X", false, Anchor::End), "abX");
        assert_eq!(substitute("bab", "a", "X", false, Anchor::Start), "bab");
    }

    #[test]
    fn substitution_replacement_is_literal() {
        assert_eq!(substitute("x", "x", "$0", false, Anchor::None), "$0");
    }

    #[test]
    fn case_conversions() {
        assert_eq!(case_convert("hello", true, false), "Hello");
        assert_eq!(case_convert("hello", true, true), "HELLO");
        assert_eq!(case_convert("HELLO", false, false), "hELLO");
        assert_eq!(case_convert("HELLO", false, true), "hello");
        assert_eq!(case_convert("", true, false), "");
    }

    #[test]
    fn substring_extraction() {
        assert_eq!(substring("abcdef", 2, None), "cdef");
        assert_eq!(substring("abcdef", 2, Some(2)), "cd");
        assert_eq!(substring("abcdef", -2, None), "ef");
        assert_eq!(substring("abcdef", 10, None), "");
        assert_eq!(substring("abcdef", 0, Some(-2)), "abcd");
    }
}
