//! Shell pattern matching
//!
//! Converts shell glob patterns (`*`, `?`, `[set]`) to regular
//! expressions with proper escaping of regex metacharacters, and
//! implements pathname expansion against the host filesystem.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{Error, Result};

/// Convert one shell pattern to an unanchored regex fragment.
pub fn pattern_to_regex(pattern: &str) -> String {
    let star = ".*";
    let mut out = String::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(star),
            '?' => out.push('.'),
            '[' => {
                // Find the closing bracket; `]` first in the set is literal.
                let mut j = i + 1;
                if matches!(chars.get(j), Some('!') | Some('^')) {
                    j += 1;
                }
                if chars.get(j) == Some(&']') {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j < chars.len() {
                    out.push('[');
                    let mut k = i + 1;
                    if matches!(chars.get(k), Some('!') | Some('^')) {
                        out.push('^');
                        k += 1;
                    }
                    while k < j {
                        let c = chars[k];
                        if c == '\\' || (c == '[' && chars.get(k + 1) == Some(&':')) {
                            out.push('\\');
                        }
                        out.push(c);
                        k += 1;
                    }
                    out.push(']');
                    i = j;
                } else {
                    out.push_str(r"\[");
                }
            }
            '\\' => {
                i += 1;
                match chars.get(i) {
                    Some(c) => out.push_str(&regex::escape(&c.to_string())),
                    None => out.push_str(r"\\"),
                }
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    out
}

/// Anchored match of a whole string against a shell pattern, as used by
/// `case` clauses and parameter modifiers.
pub fn matches(text: &str, pattern: &str) -> bool {
    compile_anchored(pattern)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

/// Compile a fully anchored matcher for a shell pattern.
pub fn compile_anchored(pattern: &str) -> Result<Regex> {
    let source = format!("^(?s:{})$", pattern_to_regex(pattern));
    Regex::new(&source)
        .map_err(|e| Error::Expansion(format!("bad pattern '{pattern}': {e}")))
}

/// Escape glob metacharacters so text from a quoted word matches
/// literally.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// True when the string contains unescaped glob metacharacters.
pub fn has_glob_chars(s: &str) -> bool {
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '*' | '?' | '[' => return true,
            _ => {}
        }
    }
    false
}

/// Pathname expansion for one field.
///
/// Matches are returned sorted; a pattern with no matches expands to
/// itself literally. Hidden entries match only when the pattern
/// component explicitly starts with a dot.
pub fn expand_pathnames(field: &str, cwd: &Path) -> Vec<String> {
    if !has_glob_chars(field) {
        return vec![field.to_string()];
    }

    let absolute = field.starts_with('/');
    let components: Vec<&str> = field.split('/').filter(|c| !c.is_empty()).collect();
    let start = if absolute { PathBuf::from("/") } else { cwd.to_path_buf() };

    let mut matched = vec![String::new()];
    for (i, component) in components.iter().enumerate() {
        let last = i == components.len() - 1;
        let mut next = Vec::new();
        for prefix in &matched {
            for name in match_component(&start, prefix, component, last) {
                let joined = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
                next.push(joined);
            }
        }
        matched = next;
        if matched.is_empty() {
            return vec![field.to_string()];
        }
    }

    let mut results: Vec<String> = matched
        .into_iter()
        .map(|rel| if absolute { format!("/{rel}") } else { rel })
        .collect();
    results.sort();
    results
}

/// Match one path component in a directory, or pass it through when it
/// has no metacharacters.
fn match_component(start: &Path, prefix: &str, component: &str, last: bool) -> Vec<String> {
    let dir = if prefix.is_empty() { start.to_path_buf() } else { start.join(prefix) };

    if !has_glob_chars(component) {
        let candidate = dir.join(component);
        let exists = if last { candidate.exists() } else { candidate.is_dir() };
        return if exists { vec![component.to_string()] } else { Vec::new() };
    }

    let Ok(re) = compile_anchored(component) else {
        return Vec::new();
    };
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };

    let allow_hidden = component.starts_with('.');
    let mut names = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') && !allow_hidden {
            continue;
        }
        if !last && !entry.path().is_dir() {
            continue;
        }
        if re.is_match(&name) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_and_question() {
        assert!(matches("document.tar.gz", "*.gz"));
        assert!(matches("abc", "a?c"));
        assert!(!matches("abc", "a?d"));
    }

    #[test]
    fn star_matches_empty() {
        assert!(matches("ab", "a*b"));
        assert!(matches("", "*"));
    }

    #[test]
    fn character_classes() {
        assert!(matches("a1", "a[0-9]"));
        assert!(!matches("ax", "a[0-9]"));
        assert!(matches("ax", "a[!0-9]"));
    }

    #[test]
    fn regex_metacharacters_are_escaped() {
        assert!(matches("a.b", "a.b"));
        assert!(!matches("axb", "a.b"));
        assert!(matches("a+b", "a+b"));
        assert!(matches("(x)", "(x)"));
    }

    #[test]
    fn escaped_glob_chars_are_literal() {
        assert!(matches("a*b", "a\\*b"));
        assert!(!matches("axb", "a\\*b"));
    }

    #[test]
    fn unterminated_class_is_literal() {
        assert!(matches("a[b", "a[b"));
    }

    #[test]
    fn escaped_pattern_matches_literally() {
        assert!(matches("*", &escape("*")));
        assert!(!matches("anything", &escape("*")));
        assert!(matches("a?b", &escape("a?b")));
    }

    #[test]
    fn alternation_pattern_detection() {
        assert!(has_glob_chars("*.txt"));
        assert!(has_glob_chars("a?c"));
        assert!(has_glob_chars("[ab]"));
        assert!(!has_glob_chars("plain.txt"));
        assert!(!has_glob_chars("a\\*b"));
    }

    #[test]
    fn pathname_expansion_in_temp_dir() {
        let dir = std::env::temp_dir().join(format!("shellkit_glob_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["alpha.txt", "beta.txt", "gamma.log", ".hidden.txt"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let mut results = expand_pathnames("*.txt", &dir);
        results.sort();
        assert_eq!(results, vec!["alpha.txt", "beta.txt"]);

        // Hidden files need an explicit leading dot.
        let hidden = expand_pathnames(".*.txt", &dir);
        assert_eq!(hidden, vec![".hidden.txt"]);

        // No match expands to the pattern itself.
        assert_eq!(expand_pathnames("*.missing", &dir), vec!["*.missing"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
