// ABOUTME: Explicit recursion stack of in-flight partial expansions
// ABOUTME: Value-semantics stack; pushing returns a new stack so sibling calls never share frames

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecursionFrame {
    pub identity: String,
    pub template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecursionStack {
    frames: Vec<RecursionFrame>,
}

impl RecursionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, identity: impl Into<String>, template: impl Into<String>) -> Self {
        let mut frames = self.frames.clone();
        frames.push(RecursionFrame {
            identity: identity.into(),
            template: template.into(),
        });
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Partial identities from outermost to innermost, joined by ` -> `
    pub fn chain(&self) -> String {
        self.frames
            .iter()
            .map(|frame| frame.identity.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Text rendered instead of a template once the stack exceeds `limit`
    pub fn limit_diagnostic(&self, limit: usize) -> String {
        let mut out = format!(
            "/* recursion limit of {} exceeded after {} nested partials: {}",
            limit,
            self.len(),
            self.chain()
        );
        for (depth, frame) in self.frames.iter().enumerate() {
            out.push_str(&format!("\n  [{}] {}: {}", depth + 1, frame.identity, first_line(&frame.template)));
        }
        out.push_str(" */");
        out
    }
}

fn first_line(template: &str) -> &str {
    template.lines().next().unwrap_or_default()
}

impl fmt::Display for RecursionStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.chain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_does_not_mutate() {
        let root = RecursionStack::new();
        let one = root.push("a", "${partial('b')}");
        let two = one.push("b", "leaf");

        assert!(root.is_empty());
        assert_eq!(one.len(), 1);
        assert_eq!(two.chain(), "a -> b");
    }

    #[test]
    fn test_limit_diagnostic_names_limit_and_templates() {
        let stack = RecursionStack::new()
            .push("a", "${partial('a')}\nmore")
            .push("a", "${partial('a')}\nmore");
        let diagnostic = stack.limit_diagnostic(1);

        assert!(diagnostic.starts_with("/* recursion limit of 1 exceeded"));
        assert!(diagnostic.contains("a -> a"));
        assert!(diagnostic.contains("[2] a: ${partial('a')}"));
        assert!(!diagnostic.contains("more"));
    }
}
