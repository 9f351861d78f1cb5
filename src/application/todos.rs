//! Todo use cases shared by every client flavour.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, TodosRepo},
    domain::{entities::TodoRecord, error::DomainError, types::TodoFilter},
};

#[derive(Debug, Error)]
pub enum TodoError {
    #[error("todo `{0}` not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Submitted new-todo form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoForm {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoDto {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
}

impl From<TodoRecord> for TodoDto {
    fn from(record: TodoRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            completed: record.completed,
        }
    }
}

/// Counters and the active filter shown alongside any todo list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub filter: TodoFilter,
    pub number_of_incomplete: usize,
    pub number_of_todos: usize,
}

/// Everything a full list view needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoListing {
    pub todos: Vec<TodoDto>,
    pub reference: ReferenceData,
}

#[derive(Clone)]
pub struct TodoService {
    repo: Arc<dyn TodosRepo>,
}

impl TodoService {
    pub fn new(repo: Arc<dyn TodosRepo>) -> Self {
        Self { repo }
    }

    pub async fn reference_data(&self, filter: TodoFilter) -> Result<ReferenceData, TodoError> {
        let all = self.repo.list(None).await?;
        let number_of_incomplete = all.iter().filter(|todo| !todo.completed).count();
        Ok(ReferenceData {
            filter,
            number_of_incomplete,
            number_of_todos: all.len(),
        })
    }

    pub async fn list(&self, filter: TodoFilter) -> Result<Vec<TodoDto>, TodoError> {
        let todos = self.repo.list(filter.completed()).await?;
        Ok(todos.into_iter().map(TodoDto::from).collect())
    }

    pub async fn listing(&self, filter: TodoFilter) -> Result<TodoListing, TodoError> {
        let todos = self.list(filter).await?;
        let reference = self.reference_data(filter).await?;
        Ok(TodoListing { todos, reference })
    }

    pub async fn create(&self, form: &TodoForm) -> Result<TodoDto, TodoError> {
        let record = TodoRecord::new(&form.title)?;
        self.repo.save(&record).await?;
        info!(target = "mosaic::todos", id = %record.id, "todo created");
        Ok(record.into())
    }

    /// Flip completion and return the updated todo.
    pub async fn toggle(&self, id: Uuid) -> Result<TodoDto, TodoError> {
        let record = self
            .repo
            .toggle(id)
            .await?
            .ok_or(TodoError::NotFound(id))?;
        info!(
            target = "mosaic::todos",
            id = %id,
            completed = record.completed,
            "todo toggled"
        );
        Ok(record.into())
    }

    /// Remove the todo and return what was removed.
    pub async fn delete(&self, id: Uuid) -> Result<TodoDto, TodoError> {
        let record = self
            .repo
            .delete(id)
            .await?
            .ok_or(TodoError::NotFound(id))?;
        info!(target = "mosaic::todos", id = %id, "todo deleted");
        Ok(record.into())
    }

    pub async fn delete_completed(&self) -> Result<u64, TodoError> {
        let removed = self.repo.delete_completed().await?;
        info!(target = "mosaic::todos", removed, "completed todos cleared");
        Ok(removed)
    }

    pub async fn health_check(&self) -> Result<(), TodoError> {
        self.repo.health_check().await.map_err(TodoError::from)
    }
}
