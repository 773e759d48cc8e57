//! Static script scanning
//!
//! Counts `test()` call sites and extracts the `expect_events(N)`
//! declaration without executing anything. The scan is lexical: comments
//! and string literals are blanked out first so `test(` inside either never
//! counts. The predictor shares this scan with nothing else; the runner
//! never consults it except for aborted event-script replay.

/// Count `test(` call sites in a script body
///
/// Method calls (`x.test(...)`) are not assertion call sites and are
/// excluded.
pub fn count_test_calls(source: &str) -> usize {
    let stripped = strip_comments_and_strings(source);
    find_calls(&stripped, "test").len()
}

/// Extract the statically declared expected event count, if any
///
/// Looks for `expect_events(N)` with an integer literal argument. Returns
/// `None` when no declaration exists or the argument is not a literal;
/// both mean the count cannot be statically determined.
pub fn expected_event_count(source: &str) -> Option<u64> {
    let stripped = strip_comments_and_strings(source);
    let chars: Vec<char> = stripped.chars().collect();

    for open in find_calls(&stripped, "expect_events") {
        let mut i = open + 1;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let digits_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits_start {
            // Declared, but the argument is an expression: indeterminate
            return None;
        }
        let literal: String = chars[digits_start..i].iter().collect();
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if chars.get(i) != Some(&')') {
            return None;
        }
        return literal.parse().ok();
    }

    None
}

/// Positions of the opening parenthesis of each bare `name(` call site
fn find_calls(stripped: &str, name: &str) -> Vec<usize> {
    let chars: Vec<char> = stripped.chars().collect();
    let mut calls = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if !is_ident_start(chars[i]) {
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && is_ident_part(chars[i]) {
            i += 1;
        }
        let ident: String = chars[start..i].iter().collect();
        if ident != name {
            continue;
        }

        // A preceding '.' makes this a method call, not the global
        let prev = chars[..start]
            .iter()
            .rev()
            .find(|c| !c.is_whitespace())
            .copied();
        if prev == Some('.') {
            continue;
        }

        let mut j = i;
        while j < chars.len() && chars[j].is_whitespace() {
            j += 1;
        }
        if chars.get(j) == Some(&'(') {
            calls.push(j);
        }
    }

    calls
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Replace comments and string/char literal contents with spaces,
/// preserving character positions
fn strip_comments_and_strings(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = vec![' '; chars.len()];
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                // Block comments nest
                let mut depth = 1;
                i += 2;
                while i < chars.len() && depth > 0 {
                    if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
                        depth += 1;
                        i += 2;
                    } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        depth -= 1;
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
            }
            quote @ ('"' | '\'' | '`') => {
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    // Skip escaped characters inside the literal
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            c => {
                out[i] = c;
                i += 1;
            }
        }
    }

    out.into_iter().collect()
}
