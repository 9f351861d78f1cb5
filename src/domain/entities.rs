//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::error::DomainError;

pub const MAX_TITLE_LEN: usize = 512;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoRecord {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl TodoRecord {
    /// A fresh, incomplete todo. The title is trimmed and must not be blank.
    pub fn new(title: &str) -> Result<Self, DomainError> {
        let title = validate_title(title)?;
        Ok(Self {
            id: Uuid::new_v4(),
            title,
            completed: false,
            created_at: OffsetDateTime::now_utc(),
        })
    }

    pub fn toggle(&mut self) {
        self.completed = !self.completed;
    }
}

pub fn validate_title(title: &str) -> Result<String, DomainError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("title must not be blank"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}
