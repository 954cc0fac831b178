use serde::Serialize;
use std::fmt;

/// A non-fatal problem found while building a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    MalformedRecord { index: usize, reason: String },
    MissingName { id: String },
    MissingHref { id: String, name: Option<String> },
    InvalidHref { id: String, href: String },
}

impl Issue {
    pub fn reason(&self) -> &'static str {
        match self {
            Issue::MalformedRecord { .. } => "malformed_record",
            Issue::MissingName { .. } => "missing_name",
            Issue::MissingHref { .. } => "missing_href",
            Issue::InvalidHref { .. } => "invalid_href",
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::MalformedRecord { index, reason } => {
                write!(f, "record #{index} could not be read: {reason}")
            }
            Issue::MissingName { id } => write!(f, "link {id} has no name"),
            Issue::MissingHref { id, name } => write!(
                f,
                "link {id} ({}) has no href",
                name.as_deref().unwrap_or("unnamed")
            ),
            Issue::InvalidHref { id, href } => write!(f, "link {id} has invalid href {href:?}"),
        }
    }
}

/// A value together with the issues collected while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub issues: Vec<Issue>,
}

impl<T> Outcome<T> {
    pub fn with_issues(value: T, issues: Vec<Issue>) -> Self {
        Self { value, issues }
    }

    pub fn into_parts(self) -> (T, Vec<Issue>) {
        (self.value, self.issues)
    }

    /// Emits one warning per issue and counts it in the drop metric.
    pub fn report(&self, stage: &'static str) {
        for issue in &self.issues {
            nav_core::metrics::inc_links_dropped(issue.reason());
            tracing::warn!(stage, reason = issue.reason(), "{issue}");
        }
    }
}
