// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Glob-style matching of names and paths.
//!
//! Three operations are provided:
//!
//! * [`match_pattern`] matches a single name against a pattern containing `*` (any run of
//!   characters, including none) and `?` (exactly one character).
//! * [`match_path`] matches a path against a path pattern. Both are split into segments on `/` and
//!   the platform separator. Each pattern segment is matched with [`match_pattern`], except for
//!   `**`, which matches zero or more whole segments.
//! * [`match_pattern_start`] answers "could anything below this directory match the pattern?".
//!   It is used to prune directory walks.

use std::path::MAIN_SEPARATOR;

/// The segment that matches zero or more whole path segments.
pub const DEEP_WILDCARD: &str = "**";

/// Returns true if `candidate` matches `pattern`.
///
/// `*` matches any run of characters and `?` matches exactly one character. Path separators have
/// no special meaning here.
pub fn match_pattern(pattern: &str, candidate: &str, case_sensitive: bool) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();
    match_chars(&pattern, &candidate, case_sensitive)
}

/// Returns true if `path` matches the path pattern `pattern`.
pub fn match_path(pattern: &str, path: &str, case_sensitive: bool) -> bool {
    if starts_with_separator(pattern) != starts_with_separator(path) {
        return false;
    }

    let pattern = tokenize_path(pattern);
    let path = tokenize_path(path);
    match_segments(&pattern, &path, case_sensitive)
}

/// Returns true if some path below `path` could match `pattern`.
///
/// This is true if every segment of `path` matches the corresponding segment of `pattern` up to
/// the first `**`, or `path` runs out of segments before `pattern` does. It is false if `pattern`
/// runs out of segments first.
pub fn match_pattern_start(pattern: &str, path: &str, case_sensitive: bool) -> bool {
    if starts_with_separator(pattern) != starts_with_separator(path) {
        return false;
    }

    let pattern = tokenize_path(pattern);
    let path = tokenize_path(path);

    let mut pattern = pattern.as_slice();
    let mut path = path.as_slice();
    while let (Some((p, pattern_rest)), Some((s, path_rest))) =
        (pattern.split_first(), path.split_first())
    {
        if *p == DEEP_WILDCARD {
            return true;
        }
        if !match_pattern(p, s, case_sensitive) {
            return false;
        }
        pattern = pattern_rest;
        path = path_rest;
    }

    // Either the path is exhausted (a deeper path may still match), or the pattern is exhausted
    // while path segments remain.
    path.is_empty()
}

/// Splits a path into its non-empty segments, on both `/` and the platform separator.
pub fn tokenize_path(path: &str) -> Vec<&str> {
    path.split(is_separator).filter(|s| !s.is_empty()).collect()
}

/// Returns true if the pattern contains any wildcard characters.
pub fn has_wildcards(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

fn is_separator(c: char) -> bool {
    c == '/' || c == MAIN_SEPARATOR
}

fn starts_with_separator(s: &str) -> bool {
    s.starts_with(is_separator)
}

fn chars_eq(a: char, b: char, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a == b || a.to_lowercase().eq(b.to_lowercase())
    }
}

fn match_chars(pattern: &[char], candidate: &[char], case_sensitive: bool) -> bool {
    // Greedy matching that backtracks to the most recent `*`.
    let (mut p, mut c) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while c < candidate.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, c));
                p += 1;
            }
            Some('?') => {
                p += 1;
                c += 1;
            }
            Some(&pc) if chars_eq(pc, candidate[c], case_sensitive) => {
                p += 1;
                c += 1;
            }
            _ => match backtrack {
                Some((star_p, star_c)) => {
                    // Let the last `*` absorb one more character.
                    backtrack = Some((star_p, star_c + 1));
                    p = star_p + 1;
                    c = star_c + 1;
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&pc| pc == '*')
}

fn all_deep(pattern: &[&str]) -> bool {
    pattern.iter().all(|p| *p == DEEP_WILDCARD)
}

fn match_segments(pattern: &[&str], path: &[&str], case_sensitive: bool) -> bool {
    let mut pattern = pattern;
    let mut path = path;

    // Match leading segments up to the first `**`.
    while let (Some((p, pattern_rest)), Some((s, path_rest))) =
        (pattern.split_first(), path.split_first())
    {
        if *p == DEEP_WILDCARD {
            break;
        }
        if !match_pattern(p, s, case_sensitive) {
            return false;
        }
        pattern = pattern_rest;
        path = path_rest;
    }
    if path.is_empty() {
        return all_deep(pattern);
    }
    if pattern.is_empty() {
        return false;
    }

    // Match trailing segments back to the last `**`.
    while let (Some((p, pattern_rest)), Some((s, path_rest))) =
        (pattern.split_last(), path.split_last())
    {
        if *p == DEEP_WILDCARD {
            break;
        }
        if !match_pattern(p, s, case_sensitive) {
            return false;
        }
        pattern = pattern_rest;
        path = path_rest;
    }
    if path.is_empty() {
        return all_deep(pattern);
    }

    // The pattern now starts and ends with `**`. Each bounded run of literal segments between two
    // `**`s must appear as a contiguous run in what's left of the path.
    while pattern.len() > 1 && !path.is_empty() {
        let Some(next_deep) = pattern[1..]
            .iter()
            .position(|p| *p == DEEP_WILDCARD)
            .map(|i| i + 1)
        else {
            break;
        };

        if next_deep == 1 {
            // `**/**` collapses to `**`.
            pattern = &pattern[1..];
            continue;
        }

        let literal = &pattern[1..next_deep];
        let found = path.windows(literal.len()).position(|window| {
            window
                .iter()
                .zip(literal)
                .all(|(s, p)| match_pattern(p, s, case_sensitive))
        });

        match found {
            Some(index) => {
                pattern = &pattern[next_deep..];
                path = &path[index + literal.len()..];
            }
            None => return false,
        }
    }

    all_deep(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;
    use test_strategy::proptest;

    #[test_case("*", "", true; "star matches empty")]
    #[test_case("*", "anything", true; "star matches anything")]
    #[test_case("*Test", "CalculatorTest", true; "suffix")]
    #[test_case("*Test", "CalculatorTests", false; "suffix mismatch")]
    #[test_case("Calc*Test", "CalcTest", true; "empty middle")]
    #[test_case("?ab", "xab", true; "question mark")]
    #[test_case("?ab", "ab", false; "question mark needs a character")]
    #[test_case("a*b*c", "aXXbYYbZc", true; "multiple stars backtrack")]
    #[test_case("a*b*c", "aXXbYYbZ", false; "multiple stars no match")]
    #[test_case("*.class", "Foo.class", true; "extension")]
    #[test_case("*.class", "Foo.class.bak", false; "extension is anchored")]
    #[test_case("abc", "abc", true; "literal")]
    #[test_case("abc", "ABC", false; "literal is case sensitive")]
    fn match_pattern_cases(pattern: &str, candidate: &str, expected: bool) {
        assert_eq!(
            match_pattern(pattern, candidate, true),
            expected,
            "pattern {pattern:?} against {candidate:?}"
        );
    }

    #[test]
    fn match_pattern_case_insensitive() {
        assert!(match_pattern("abc", "ABC", false));
        assert!(match_pattern("*test", "CalculatorTEST", false));
        assert!(!match_pattern("*test", "CalculatorTEST", true));
    }

    #[test_case("**/*.class", "a/b/Foo.class", true; "deep prefix")]
    #[test_case("**/*.class", "Foo.class", true; "deep prefix matches zero segments")]
    #[test_case("**/*.class", "Foo.txt", false; "deep prefix wrong extension")]
    #[test_case("a/**", "a/b/c", true; "deep suffix")]
    #[test_case("a/**", "a", true; "deep suffix matches zero segments")]
    #[test_case("a/**", "b/c", false; "deep suffix wrong prefix")]
    #[test_case("a/**/Foo.class", "a/x/y/Foo.class", true; "deep middle")]
    #[test_case("a/**/Foo.class", "a/Foo.class", true; "deep middle zero segments")]
    #[test_case("**/b/c/**", "x/b/c/y", true; "bounded literal run")]
    #[test_case("**/b/c/**", "x/b/y/c", false; "bounded literal run must be contiguous")]
    #[test_case("**/b/**/d/**", "b/x/d", true; "two bounded runs")]
    #[test_case("**/**/x", "a/b/x", true; "adjacent deep wildcards")]
    #[test_case("**", "anything/at/all", true; "only deep wildcard")]
    #[test_case("**/**", "", true; "all deep wildcards match empty")]
    #[test_case("", "", true; "empty pattern matches empty path")]
    #[test_case("", "a", false; "empty pattern does not match non-empty path")]
    #[test_case("a/b", "a/b/c", false; "pattern exhausted")]
    #[test_case("a/b/c", "a/b", false; "path exhausted")]
    #[test_case("/a/b", "a/b", false; "leading separator mismatch")]
    #[test_case("a/b", "/a/b", false; "leading separator mismatch reversed")]
    #[test_case("/a/*", "/a/b", true; "both absolute")]
    fn match_path_cases(pattern: &str, path: &str, expected: bool) {
        assert_eq!(
            match_path(pattern, path, true),
            expected,
            "pattern {pattern:?} against {path:?}"
        );
    }

    #[test_case("a/b/*.class", "a", true; "directory prefix")]
    #[test_case("a/b/*.class", "a/b", true; "full directory")]
    #[test_case("a/b/*.class", "a/c", false; "directory mismatch")]
    #[test_case("a/b/*.class", "a/b/c", false; "last segment mismatch")]
    #[test_case("a/**/*.class", "a/x/y/z", true; "deep wildcard reached")]
    #[test_case("**/*.class", "anything", true; "leading deep wildcard")]
    #[test_case("/a/**", "a", false; "leading separator mismatch")]
    fn match_pattern_start_cases(pattern: &str, path: &str, expected: bool) {
        assert_eq!(
            match_pattern_start(pattern, path, true),
            expected,
            "pattern {pattern:?} against {path:?}"
        );
    }

    #[test]
    fn tokenize() {
        assert_eq!(tokenize_path("a//b/c/"), vec!["a", "b", "c"]);
        assert_eq!(tokenize_path(""), Vec::<&str>::new());
        assert!(has_wildcards("a/*.class"));
        assert!(!has_wildcards("a/B.class"));
    }

    #[proptest]
    fn star_matches_everything(s: String, case_sensitive: bool) {
        prop_assert!(match_pattern("*", &s, case_sensitive));
    }

    #[proptest]
    fn literal_requires_equal_length(
        #[strategy("[a-zA-Z0-9.?]{0,8}")] pattern: String,
        #[strategy("[a-zA-Z0-9.]{0,8}")] candidate: String,
    ) {
        if match_pattern(&pattern, &candidate, true) {
            prop_assert_eq!(pattern.chars().count(), candidate.chars().count());
        }
    }

    #[proptest]
    fn literal_matches_itself(#[strategy("[a-zA-Z0-9._-]{0,12}")] s: String) {
        prop_assert!(match_pattern(&s, &s, true));
    }

    #[proptest]
    fn case_insensitive_matches_lowercased(
        #[strategy("[a-zA-Z*?]{0,8}")] pattern: String,
        #[strategy("[a-zA-Z]{0,8}")] candidate: String,
    ) {
        prop_assert_eq!(
            match_pattern(&pattern, &candidate, false),
            match_pattern(
                &pattern.to_lowercase(),
                &candidate.to_lowercase(),
                true
            ),
        );
    }

    #[proptest]
    fn case_sensitive_implies_case_insensitive(
        #[strategy("[a-zA-Z*?]{0,8}")] pattern: String,
        #[strategy("[a-zA-Z]{0,8}")] candidate: String,
    ) {
        if match_pattern(&pattern, &candidate, true) {
            prop_assert!(match_pattern(&pattern, &candidate, false));
        }
    }
}
