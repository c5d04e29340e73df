//! Brace expansion
//!
//! The first expansion step: `{a,b,c}` lists, `{1..5}` ranges with
//! optional step and zero-padding, `{a..e}` character ranges, nesting,
//! and cartesian combination with surrounding text. Unbalanced or
//! single-item braces pass through literally, and text inside single
//! quotes never expands.

/// Expand every brace pattern in `text`, producing one or more words.
pub fn expand_braces(text: &str) -> Vec<String> {
    if !text.contains('{') {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    let Some((open, close)) = find_brace_span(&chars) else {
        return vec![text.to_string()];
    };

    let prefix: String = chars[..open].iter().collect();
    let content: String = chars[open + 1..close].iter().collect();
    let suffix: String = chars[close + 1..].iter().collect();

    let items = match brace_items(&content) {
        Some(items) => items,
        None => {
            // `{}` or `{single}` stays literal; later braces may still expand.
            let mut out = Vec::new();
            for rest in expand_braces(&suffix) {
                out.push(format!("{prefix}{{{content}}}{rest}"));
            }
            return out;
        }
    };

    let mut out = Vec::new();
    for item in items {
        for expanded in expand_braces(&format!("{prefix}{item}{suffix}")) {
            out.push(expanded);
        }
    }
    out
}

/// Locate the first expandable brace and its matching close, skipping
/// escaped braces and single-quoted regions.
fn find_brace_span(chars: &[char]) -> Option<(usize, usize)> {
    let mut i = 0;
    let mut in_single = false;

    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '\'' => in_single = !in_single,
            '{' if !in_single => {
                let mut depth = 1;
                let mut j = i + 1;
                while j < chars.len() {
                    match chars[j] {
                        '\\' => j += 1,
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                return Some((i, j));
                            }
                        }
                        _ => {}
                    }
                    j += 1;
                }
                return None;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Items of one brace body, or `None` when the body does not expand.
fn brace_items(content: &str) -> Option<Vec<String>> {
    if content.is_empty() {
        return None;
    }
    if let Some(items) = range_items(content) {
        return Some(items);
    }
    if top_level_comma(content) {
        return Some(split_on_commas(content));
    }
    None
}

/// `start..end` or `start..end..step` ranges.
fn range_items(content: &str) -> Option<Vec<String>> {
    if content.contains(',') {
        return None;
    }
    let parts: Vec<&str> = content.split("..").collect();
    let (start, end, step) = match parts.as_slice() {
        [s, e] => (*s, *e, None),
        [s, e, st] => (*s, *e, Some(*st)),
        _ => return None,
    };

    if let (Ok(a), Ok(b)) = (start.parse::<i64>(), end.parse::<i64>()) {
        let step = match step {
            Some(s) => s.parse::<i64>().ok().filter(|v| *v > 0)?,
            None => 1,
        };
        let width = zero_pad_width(start, end);
        let mut items = Vec::new();
        let mut v = a;
        if a <= b {
            while v <= b {
                items.push(pad_number(v, width));
                v += step;
            }
        } else {
            while v >= b {
                items.push(pad_number(v, width));
                v -= step;
            }
        }
        return Some(items);
    }

    // Single-character alphabetic ranges: {a..e}
    let (sc, ec) = (single_alpha(start)?, single_alpha(end)?);
    let step = match step {
        Some(s) => s.parse::<u32>().ok().filter(|v| *v > 0)?,
        None => 1,
    };
    let (a, b) = (sc as u32, ec as u32);
    let mut items = Vec::new();
    let mut v = a;
    if a <= b {
        while v <= b {
            items.push(char::from_u32(v)?.to_string());
            v += step;
        }
    } else {
        while v >= b {
            items.push(char::from_u32(v)?.to_string());
            if v < step {
                break;
            }
            v -= step;
        }
    }
    Some(items)
}

fn single_alpha(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let c = chars.next()?;
    if chars.next().is_none() && c.is_ascii_alphabetic() {
        Some(c)
    } else {
        None
    }
}

/// Zero-padding is preserved when either endpoint carries it.
fn zero_pad_width(start: &str, end: &str) -> usize {
    fn bare(s: &str) -> &str {
        s.strip_prefix('-').unwrap_or(s)
    }
    let padded = |s: &str| bare(s).len() > 1 && bare(s).starts_with('0');
    if padded(start) || padded(end) {
        bare(start).len().max(bare(end).len())
    } else {
        0
    }
}

fn pad_number(v: i64, width: usize) -> String {
    if width == 0 {
        v.to_string()
    } else if v < 0 {
        format!("-{:0width$}", -v, width = width)
    } else {
        format!("{v:0width$}")
    }
}

fn top_level_comma(content: &str) -> bool {
    let mut depth = 0usize;
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// Split on commas, respecting nested braces.
fn split_on_commas(content: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut chars = content.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    items.push(current);
    items
}
