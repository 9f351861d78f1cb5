//! Process-local todo store used when no database is configured.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, TodosRepo},
    domain::entities::TodoRecord,
};

/// Entries carry an insertion sequence so equal timestamps keep creation order.
#[derive(Debug, Default)]
pub struct InMemoryTodos {
    entries: DashMap<Uuid, (u64, TodoRecord)>,
    sequence: AtomicU64,
}

impl InMemoryTodos {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TodosRepo for InMemoryTodos {
    async fn save(&self, todo: &TodoRecord) -> Result<(), RepoError> {
        self.entries
            .entry(todo.id)
            .and_modify(|entry| entry.1 = todo.clone())
            .or_insert_with(|| (self.sequence.fetch_add(1, Ordering::Relaxed), todo.clone()));
        Ok(())
    }

    async fn toggle(&self, id: Uuid) -> Result<Option<TodoRecord>, RepoError> {
        Ok(self.entries.get_mut(&id).map(|mut entry| {
            entry.1.toggle();
            entry.1.clone()
        }))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TodoRecord>, RepoError> {
        Ok(self.entries.get(&id).map(|entry| entry.1.clone()))
    }

    async fn list(&self, completed: Option<bool>) -> Result<Vec<TodoRecord>, RepoError> {
        let mut rows: Vec<(u64, TodoRecord)> = self
            .entries
            .iter()
            .filter(|entry| completed.is_none_or(|wanted| entry.1.completed == wanted))
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(|(a_seq, a), (b_seq, b)| {
            a.created_at.cmp(&b.created_at).then(a_seq.cmp(b_seq))
        });
        Ok(rows.into_iter().map(|(_, todo)| todo).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<TodoRecord>, RepoError> {
        Ok(self.entries.remove(&id).map(|(_, (_, todo))| todo))
    }

    async fn delete_completed(&self) -> Result<u64, RepoError> {
        let mut removed = 0u64;
        self.entries.retain(|_, (_, todo)| {
            if todo.completed {
                removed += 1;
            }
            !todo.completed
        });
        Ok(removed)
    }
}
