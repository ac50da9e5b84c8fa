//! Prompt patterns and placeholder substitution.
//!
//! A pattern is a role plus a template with `{key}` placeholders. Resolution
//! substitutes context values into the template; placeholders without a
//! matching context key pass through literally so a partially seeded context
//! still produces a usable prompt.

use std::collections::HashMap;

use crate::relay::context::ExecutionContext;

/// A named prompt template with the role it should be issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPattern {
    /// Role the completion should adopt.
    pub role: String,
    /// Template text with `{key}` placeholders.
    pub template: String,
}

/// Substitute `{key}` placeholders with rendered context values.
///
/// A placeholder key is one or more word characters (letters, digits or
/// underscores). Anything else between braces, an unknown key, or an
/// unclosed brace is left in the output untouched.
#[must_use]
pub fn substitute(template: &str, context: &ExecutionContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let key_len = after
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        if key_len > 0 && after[key_len..].starts_with('}') {
            let key = &after[..key_len];
            match context.get(key) {
                Some(value) => out.push_str(&value.render()),
                None => {
                    out.push('{');
                    out.push_str(key);
                    out.push('}');
                }
            }
            rest = &after[key_len + 1..];
        } else {
            out.push('{');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// Lookup table of prompt patterns keyed by name.
#[derive(Debug, Clone, Default)]
pub struct PatternLibrary {
    patterns: HashMap<String, PromptPattern>,
}

impl PatternLibrary {
    /// Create an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Library with the built-in patterns used by the stock workflows.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with_pattern(
                "summarize",
                "analyst",
                "Summarize the following updates for {audience}. Keep it under \
                 three paragraphs.\n\n{content}",
            )
            .with_pattern(
                "review_content",
                "moderator",
                "Review this submission against the content policy and reply \
                 with a verdict and your reasons.\n\nSubmission: {content}",
            )
            .with_pattern(
                "draft_announcement",
                "writer",
                "Draft a short announcement about {topic} for {audience}.",
            )
    }

    /// Add or replace a pattern.
    #[must_use]
    pub fn with_pattern(
        mut self,
        name: impl Into<String>,
        role: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        self.patterns.insert(
            name.into(),
            PromptPattern {
                role: role.into(),
                template: template.into(),
            },
        );
        self
    }

    /// Look up a pattern by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PromptPattern> {
        self.patterns.get(name)
    }

    /// Returns `true` when the named pattern exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    /// Pattern names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.patterns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
