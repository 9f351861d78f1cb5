//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::TodoRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Todo storage. Listings are ordered by creation time, oldest first.
#[async_trait]
pub trait TodosRepo: Send + Sync {
    /// Insert or replace the record with the same id.
    async fn save(&self, todo: &TodoRecord) -> Result<(), RepoError>;

    /// Flip completion of an existing record in one step. Never inserts;
    /// `None` when no record has the id.
    async fn toggle(&self, id: Uuid) -> Result<Option<TodoRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TodoRecord>, RepoError>;

    /// `completed = None` lists every todo.
    async fn list(&self, completed: Option<bool>) -> Result<Vec<TodoRecord>, RepoError>;

    /// Returns the removed record, if there was one.
    async fn delete(&self, id: Uuid) -> Result<Option<TodoRecord>, RepoError>;

    async fn delete_completed(&self) -> Result<u64, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}
