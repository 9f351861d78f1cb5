use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, TodosRepo},
    domain::entities::TodoRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct TodoRow {
    id: Uuid,
    title: String,
    completed: bool,
    created_at: OffsetDateTime,
}

impl From<TodoRow> for TodoRecord {
    fn from(row: TodoRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            completed: row.completed,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl TodosRepo for PostgresRepositories {
    async fn save(&self, todo: &TodoRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO todos (id, title, completed, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title, completed = EXCLUDED.completed
            "#,
        )
        .bind(todo.id)
        .bind(&todo.title)
        .bind(todo.completed)
        .bind(todo.created_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn toggle(&self, id: Uuid) -> Result<Option<TodoRecord>, RepoError> {
        let row = sqlx::query_as::<_, TodoRow>(
            r#"
            UPDATE todos
            SET completed = NOT completed
            WHERE id = $1
            RETURNING id, title, completed, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TodoRecord::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TodoRecord>, RepoError> {
        let row = sqlx::query_as::<_, TodoRow>(
            r#"
            SELECT id, title, completed, created_at
            FROM todos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TodoRecord::from))
    }

    async fn list(&self, completed: Option<bool>) -> Result<Vec<TodoRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TodoRow>(
            r#"
            SELECT id, title, completed, created_at
            FROM todos
            WHERE ($1::boolean IS NULL OR completed = $1)
            ORDER BY created_at, id
            "#,
        )
        .bind(completed)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TodoRecord::from).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<TodoRecord>, RepoError> {
        let row = sqlx::query_as::<_, TodoRow>(
            r#"
            DELETE FROM todos
            WHERE id = $1
            RETURNING id, title, completed, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TodoRecord::from))
    }

    async fn delete_completed(&self) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM todos WHERE completed")
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}
