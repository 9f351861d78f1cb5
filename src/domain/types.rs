//! Shared domain enumerations.

use serde::{Deserialize, Serialize};

/// Which todos a list view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl TodoFilter {
    /// Unknown or missing values select every todo.
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("active") => Self::Active,
            Some("completed") => Self::Completed,
            _ => Self::All,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TodoFilter::All => "all",
            TodoFilter::Active => "active",
            TodoFilter::Completed => "completed",
        }
    }

    /// Value carried in `?filter=` links; empty for [`TodoFilter::All`].
    pub fn query_value(self) -> &'static str {
        match self {
            TodoFilter::All => "",
            other => other.as_str(),
        }
    }

    /// `None` matches both states.
    pub fn completed(self) -> Option<bool> {
        match self {
            TodoFilter::All => None,
            TodoFilter::Active => Some(false),
            TodoFilter::Completed => Some(true),
        }
    }
}
