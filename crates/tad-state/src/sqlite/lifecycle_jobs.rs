use anyhow::Result;
use chrono::{DateTime, Utc};
use tad_core::models::{LifecycleJob, LifecycleJobKind, LifecycleJobStatus};
use uuid::Uuid;

use super::core::{fmt_ts, SqliteDatabase};

impl SqliteDatabase {
    pub(super) async fn create_lifecycle_job_impl(
        &self,
        run_id: Uuid,
        kind: LifecycleJobKind,
        due_at: DateTime<Utc>,
        max_retries: i32,
    ) -> Result<LifecycleJob> {
        let job = sqlx::query_as::<_, LifecycleJob>(
            r#"INSERT INTO lifecycle_jobs (id, run_id, kind, status, due_at, max_retries)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(run_id)
        .bind(kind.as_str())
        .bind(LifecycleJobStatus::Pending.as_str())
        .bind(fmt_ts(due_at))
        .bind(max_retries)
        .fetch_one(&self.pool)
        .await?;
        Ok(job)
    }

    /// Oldest due first so same-run transitions apply in schedule order.
    /// julianday comparison keeps sub-second precision across the stored
    /// text formats.
    pub(super) async fn get_due_lifecycle_jobs_impl(
        &self,
        limit: i64,
    ) -> Result<Vec<LifecycleJob>> {
        let jobs = sqlx::query_as::<_, LifecycleJob>(
            r#"SELECT * FROM lifecycle_jobs
            WHERE status = ? AND julianday(due_at) <= julianday(?)
            ORDER BY julianday(due_at) ASC
            LIMIT ?"#,
        )
        .bind(LifecycleJobStatus::Pending.as_str())
        .bind(fmt_ts(Utc::now()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    pub(super) async fn list_lifecycle_jobs_for_run_impl(
        &self,
        run_id: Uuid,
    ) -> Result<Vec<LifecycleJob>> {
        let jobs = sqlx::query_as::<_, LifecycleJob>(
            r#"SELECT * FROM lifecycle_jobs WHERE run_id = ?
            ORDER BY julianday(due_at) ASC"#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    pub(super) async fn complete_lifecycle_job_impl(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"UPDATE lifecycle_jobs
            SET status = ?, finished_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE id = ?"#,
        )
        .bind(LifecycleJobStatus::Completed.as_str())
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub(super) async fn reset_lifecycle_job_for_retry_impl(
        &self,
        job_id: Uuid,
        error: &str,
        due_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE lifecycle_jobs
            SET status = ?, attempts = attempts + 1, error = ?, due_at = ?
            WHERE id = ?"#,
        )
        .bind(LifecycleJobStatus::Pending.as_str())
        .bind(error)
        .bind(fmt_ts(due_at))
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub(super) async fn fail_lifecycle_job_impl(&self, job_id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            r#"UPDATE lifecycle_jobs
            SET status = ?, error = ?, attempts = attempts + 1,
                finished_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE id = ?"#,
        )
        .bind(LifecycleJobStatus::Failed.as_str())
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
