// ABOUTME: Glob compilation and specificity ranking for partial injection
// ABOUTME: Scores glob patterns so the most specific match for a path wins deterministically

use globset::{GlobBuilder, GlobMatcher};
use std::cmp::Reverse;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum GlobError {
    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

pub type Result<T> = std::result::Result<T, GlobError>;

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Glob(GlobMatcher),
}

/// A compiled glob together with the scores used to rank competing matches.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    matcher: Matcher,
    wildcard_weight: usize,
    double_stars: usize,
    literal_length: usize,
}

impl GlobPattern {
    /// Compile a pattern. Patterns without glob metacharacters become anchored
    /// exact matches against the normalized path.
    pub fn compile(pattern: &str) -> Result<Self> {
        let trimmed = pattern.strip_prefix("./").unwrap_or(pattern);

        let matcher = if is_glob(trimmed) {
            let glob = GlobBuilder::new(trimmed)
                .literal_separator(true)
                .build()
                .map_err(|e| GlobError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?;
            Matcher::Glob(glob.compile_matcher())
        } else {
            Matcher::Exact(normalize_path(trimmed))
        };

        let score = Score::of(trimmed);
        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
            wildcard_weight: score.weight,
            double_stars: score.double_stars,
            literal_length: score.literal,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn wildcard_weight(&self) -> usize {
        self.wildcard_weight
    }

    pub fn literal_length(&self) -> usize {
        self.literal_length
    }

    /// Test an already-normalized path against this pattern
    pub fn is_match(&self, normalized_path: &str) -> bool {
        match &self.matcher {
            Matcher::Exact(expected) => expected == normalized_path,
            Matcher::Glob(glob) => glob.is_match(normalized_path),
        }
    }
}

/// Check whether a pattern contains glob metacharacters
pub fn is_glob(pattern: &str) -> bool {
    pattern.chars().any(|c| matches!(c, '*' | '?' | '[' | '{'))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Score {
    weight: usize,
    double_stars: usize,
    literal: usize,
}

impl Score {
    fn of(pattern: &str) -> Self {
        let mut score = Score::default();
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    chars.next();
                    score.literal += 1;
                }
                '*' => {
                    if chars.peek() == Some(&'*') {
                        while chars.peek() == Some(&'*') {
                            chars.next();
                        }
                        score.double_stars += 1;
                    }
                    score.weight += 2;
                }
                '?' => score.weight += 1,
                '[' => {
                    // a leading `]` is part of the class
                    if chars.peek() == Some(&']') {
                        chars.next();
                    }
                    for c in chars.by_ref() {
                        if c == ']' {
                            break;
                        }
                    }
                    score.weight += 1;
                }
                '{' => {
                    let mut depth = 1;
                    for c in chars.by_ref() {
                        match c {
                            '{' => depth += 1,
                            '}' => depth -= 1,
                            _ => {}
                        }
                        if depth == 0 {
                            break;
                        }
                    }
                    score.weight += 1;
                }
                _ => score.literal += 1,
            }
        }
        score
    }
}

/// 2 per `*` or `**`, 1 per `?`, character class or alternation. Lower is more specific.
pub fn wildcard_weight(pattern: &str) -> usize {
    Score::of(pattern).weight
}

/// Number of characters matched literally, excluding classes and alternations
pub fn literal_length(pattern: &str) -> usize {
    Score::of(pattern).literal
}

/// Normalize a path to forward slashes with `.` and `..` segments resolved.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ if !absolute => parts.push(".."),
                _ => {}
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Pick the best-ranked candidate among those whose pattern matches `path`.
///
/// Lowest wildcard weight wins, then fewer `**` segments, then the longest
/// literal length. Remaining ties resolve to the earliest candidate in
/// iteration order.
pub fn best_match<'a, T, I>(path: &str, candidates: I) -> Option<(&'a GlobPattern, T)>
where
    I: IntoIterator<Item = (&'a GlobPattern, T)>,
{
    let normalized = normalize_path(path);
    candidates
        .into_iter()
        .filter(|(pattern, _)| pattern.is_match(&normalized))
        .min_by_key(|(pattern, _)| {
            (
                pattern.wildcard_weight,
                pattern.double_stars,
                Reverse(pattern.literal_length),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_weight() {
        assert_eq!(wildcard_weight("reports/x.sql"), 0);
        assert_eq!(wildcard_weight("reports/*.sql"), 2);
        assert_eq!(wildcard_weight("**/*.sql"), 4);
        assert_eq!(wildcard_weight("**/**/?.sql"), 5);
        assert_eq!(wildcard_weight("a/{x,y}.sql"), 1);
        assert_eq!(wildcard_weight("a/[xy].sql"), 1);
        assert!(wildcard_weight("reports/*.sql") < wildcard_weight("**/*.sql"));
    }

    #[test]
    fn test_literal_length_skips_groups() {
        assert_eq!(literal_length("a/x.sql"), 7);
        assert_eq!(literal_length("a/{x,y}.sql"), 6);
        assert_eq!(literal_length("a/[xy].sql"), 6);
        assert_eq!(literal_length("a/\\*.sql"), 7);
    }

    #[test]
    fn test_alternation_loses_to_exact_path() {
        let alternation = GlobPattern::compile("a/{x,y}.sql").unwrap();
        let exact = GlobPattern::compile("a/x.sql").unwrap();
        let (_, label) =
            best_match("a/x.sql", vec![(&alternation, "alternation"), (&exact, "exact")]).unwrap();
        assert_eq!(label, "exact");

        let (_, label) = best_match("a/y.sql", vec![(&alternation, "alternation"), (&exact, "exact")]).unwrap();
        assert_eq!(label, "alternation");
    }

    #[test]
    fn test_double_star_loses_weight_ties() {
        let deep = GlobPattern::compile("a/**").unwrap();
        let shallow = GlobPattern::compile("a/*").unwrap();
        assert_eq!(deep.wildcard_weight(), shallow.wildcard_weight());

        let (_, label) = best_match("a/x", vec![(&deep, "deep"), (&shallow, "shallow")]).unwrap();
        assert_eq!(label, "shallow");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./reports/x.sql"), "reports/x.sql");
        assert_eq!(normalize_path("reports\\daily\\x.sql"), "reports/daily/x.sql");
        assert_eq!(normalize_path("a/b/../c//d.sql"), "a/c/d.sql");
        assert_eq!(normalize_path("../x.sql"), "../x.sql");
        assert_eq!(normalize_path("/tmp/./x"), "/tmp/x");
    }

    #[test]
    fn test_exact_pattern_is_anchored() {
        let pattern = GlobPattern::compile("reports/x.sql").unwrap();
        assert!(pattern.is_match("reports/x.sql"));
        assert!(!pattern.is_match("old/reports/x.sql"));
        assert!(!pattern.is_match("reports/x.sql.bak"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let pattern = GlobPattern::compile("reports/*.sql").unwrap();
        assert!(pattern.is_match("reports/x.sql"));
        assert!(!pattern.is_match("reports/daily/x.sql"));
    }

    #[test]
    fn test_best_match_prefers_specific_glob() {
        let broad = GlobPattern::compile("**/*.sql").unwrap();
        let narrow = GlobPattern::compile("reports/*.sql").unwrap();
        let candidates = vec![(&broad, "broad"), (&narrow, "narrow")];

        let (pattern, label) = best_match("reports/x.sql", candidates.clone()).unwrap();
        assert_eq!(label, "narrow");
        assert_eq!(pattern.pattern(), "reports/*.sql");

        let (_, label) = best_match("other/x.sql", candidates).unwrap();
        assert_eq!(label, "broad");
    }

    #[test]
    fn test_best_match_tie_breaks_on_literal_length_then_order() {
        let short = GlobPattern::compile("r/*.sql").unwrap();
        let long = GlobPattern::compile("r/*x.sql").unwrap();
        let (_, label) = best_match("r/ax.sql", vec![(&short, 1), (&long, 2)]).unwrap();
        assert_eq!(label, 2);

        let first = GlobPattern::compile("r/*.sql").unwrap();
        let second = GlobPattern::compile("r/*.sql").unwrap();
        let (_, label) = best_match("r/a.sql", vec![(&first, "first"), (&second, "second")]).unwrap();
        assert_eq!(label, "first");
    }

    #[test]
    fn test_invalid_glob_is_reported() {
        let err = GlobPattern::compile("reports/[.sql").unwrap_err();
        assert!(err.to_string().contains("reports/[.sql"));
    }
}
