use anyhow::Result;
use chrono::{DateTime, Utc};
use tad_core::models::{LifecycleJobKind, LifecycleJobStatus, LogLevel, Run, RunStatus};
use uuid::Uuid;

use super::core::{fmt_ts, SqliteDatabase};

impl SqliteDatabase {
    pub(super) async fn create_run_impl(&self, task_key: &str, user_id: Uuid) -> Result<Run> {
        let run = sqlx::query_as::<_, Run>(
            r#"INSERT INTO runs (id, task_key, user_id, status)
            VALUES (?, ?, ?, ?)
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(task_key)
        .bind(user_id)
        .bind(RunStatus::Queued.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(run)
    }

    /// One transaction for the run row, its first log line, and its jobs; a
    /// failure after the run insert rolls everything back instead of leaving
    /// an orphaned queued run no worker will ever pick up.
    pub(super) async fn create_run_with_jobs_impl(
        &self,
        task_key: &str,
        user_id: Uuid,
        log: (LogLevel, &str),
        jobs: &[(LifecycleJobKind, DateTime<Utc>)],
        max_retries: i32,
    ) -> Result<Run> {
        let mut tx = self.pool.begin().await?;
        let run = sqlx::query_as::<_, Run>(
            r#"INSERT INTO runs (id, task_key, user_id, status)
            VALUES (?, ?, ?, ?)
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(task_key)
        .bind(user_id)
        .bind(RunStatus::Queued.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let (level, message) = log;
        sqlx::query("INSERT INTO run_logs (run_id, level, message) VALUES (?, ?, ?)")
            .bind(run.id)
            .bind(level.as_str())
            .bind(message)
            .execute(&mut *tx)
            .await?;

        for (kind, due_at) in jobs {
            sqlx::query(
                r#"INSERT INTO lifecycle_jobs (id, run_id, kind, status, due_at, max_retries)
                VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(Uuid::new_v4())
            .bind(run.id)
            .bind(kind.as_str())
            .bind(LifecycleJobStatus::Pending.as_str())
            .bind(fmt_ts(*due_at))
            .bind(max_retries)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(run)
    }

    pub(super) async fn get_run_impl(&self, run_id: Uuid) -> Result<Run> {
        let run = sqlx::query_as::<_, Run>("SELECT * FROM runs WHERE id = ?")
            .bind(run_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(run)
    }

    pub(super) async fn list_recent_runs_impl(
        &self,
        task_key: &str,
        limit: i64,
    ) -> Result<Vec<Run>> {
        let runs = sqlx::query_as::<_, Run>(
            r#"SELECT * FROM runs WHERE task_key = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?"#,
        )
        .bind(task_key)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(runs)
    }

    /// Compare-and-swap on the current status; the transition and its log
    /// lines commit atomically so a crash cannot separate them.
    pub(super) async fn advance_run_status_impl(
        &self,
        run_id: Uuid,
        from: RunStatus,
        to: RunStatus,
        logs: &[(LogLevel, &str)],
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"UPDATE runs SET status = ?,
            started_at = CASE WHEN ? = 'running' AND started_at IS NULL
                THEN STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now') ELSE started_at END,
            finished_at = CASE WHEN ? IN ('success', 'failed') AND finished_at IS NULL
                THEN STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now') ELSE finished_at END
            WHERE id = ? AND status = ?"#,
        )
        .bind(to.as_str())
        .bind(to.as_str())
        .bind(to.as_str())
        .bind(run_id)
        .bind(from.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for (level, message) in logs {
            sqlx::query("INSERT INTO run_logs (run_id, level, message) VALUES (?, ?, ?)")
                .bind(run_id)
                .bind(level.as_str())
                .bind(message)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    pub(super) async fn fail_run_impl(&self, run_id: Uuid, error: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"UPDATE runs SET status = ?, error = ?,
            finished_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE id = ? AND status IN (?, ?)"#,
        )
        .bind(RunStatus::Failed.as_str())
        .bind(error)
        .bind(run_id)
        .bind(RunStatus::Queued.as_str())
        .bind(RunStatus::Running.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("INSERT INTO run_logs (run_id, level, message) VALUES (?, ?, ?)")
            .bind(run_id)
            .bind(LogLevel::Error.as_str())
            .bind(error)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
