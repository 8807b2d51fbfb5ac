use anyhow::Result;
use tad_core::models::{LogLevel, RunLog};
use uuid::Uuid;

use super::core::SqliteDatabase;

impl SqliteDatabase {
    pub(super) async fn append_run_log_impl(
        &self,
        run_id: Uuid,
        level: LogLevel,
        message: &str,
    ) -> Result<RunLog> {
        let log = sqlx::query_as::<_, RunLog>(
            r#"INSERT INTO run_logs (run_id, level, message)
            VALUES (?, ?, ?)
            RETURNING *"#,
        )
        .bind(run_id)
        .bind(level.as_str())
        .bind(message)
        .fetch_one(&self.pool)
        .await?;
        Ok(log)
    }

    pub(super) async fn list_run_logs_impl(&self, run_id: Uuid) -> Result<Vec<RunLog>> {
        let logs = sqlx::query_as::<_, RunLog>(
            r#"SELECT * FROM run_logs WHERE run_id = ?
            ORDER BY ts ASC, id ASC"#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }
}
