use anyhow::Result;
use tad_core::models::{NewTaskDefinition, TaskDefinition};

use super::core::SqliteDatabase;

impl SqliteDatabase {
    pub(super) async fn seed_task_definitions_impl(
        &self,
        defs: &[NewTaskDefinition],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for def in defs {
            sqlx::query(
                r#"INSERT INTO task_definitions (key, name, description)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO NOTHING"#,
            )
            .bind(def.key)
            .bind(def.name)
            .bind(def.description)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub(super) async fn list_task_definitions_impl(&self) -> Result<Vec<TaskDefinition>> {
        let tasks = sqlx::query_as::<_, TaskDefinition>(
            "SELECT * FROM task_definitions ORDER BY key ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    pub(super) async fn get_task_definition_impl(&self, key: &str) -> Result<TaskDefinition> {
        let task = sqlx::query_as::<_, TaskDefinition>(
            "SELECT * FROM task_definitions WHERE key = ?",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await?;
        Ok(task)
    }
}
