//! Search criteria for CRM record queries.

use std::fmt;

/// A conjunction of `equals` clauses in the CRM search syntax.
///
/// Renders as `(Field:equals:Value)` clauses joined with `and`, the
/// only composition the sync paths use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    clauses: Vec<(String, String)>,
}

impl Criteria {
    /// Create an empty criteria set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an `equals` clause.
    #[must_use]
    pub fn equals(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// Add an `equals` clause only when a value is present.
    #[must_use]
    pub fn equals_opt(self, field: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => self.equals(field, v),
            _ => self,
        }
    }

    /// Whether any clause was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Render the criteria string, or `None` when no clause was added.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        if self.clauses.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .clauses
            .iter()
            .map(|(field, value)| format!("({field}:equals:{value})"))
            .collect();
        Some(parts.join("and"))
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render().unwrap_or_default())
    }
}
