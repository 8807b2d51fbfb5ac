// Database trait for dashboard state
// Implementations: SqliteDatabase (tad-state)

use chrono::{DateTime, Utc};
use uuid::Uuid;

use async_trait::async_trait;

use crate::models::{
    LifecycleJob, LifecycleJobKind, LogLevel, NewTaskDefinition, Run, RunLog, RunStatus,
    TaskDefinition, User,
};

/// Storage interface for dashboard state.
///
/// Constructed once in `main` and injected into the HTTP handlers and the
/// lifecycle simulator; there is no process-global handle.
#[async_trait]
pub trait Database: Send + Sync {
    // Task catalog operations
    async fn seed_task_definitions(&self, defs: &[NewTaskDefinition]) -> anyhow::Result<()>;
    async fn list_task_definitions(&self) -> anyhow::Result<Vec<TaskDefinition>>;
    async fn get_task_definition(&self, key: &str) -> anyhow::Result<TaskDefinition>;

    // User operations
    async fn upsert_user_by_email(&self, email: &str, password_hash: &str)
        -> anyhow::Result<User>;

    // Run operations
    async fn create_run(&self, task_key: &str, user_id: Uuid) -> anyhow::Result<Run>;

    /// Creates a `queued` run together with its initial log line and its
    /// lifecycle jobs in one transaction; a failure part-way leaves no
    /// orphaned run behind.
    async fn create_run_with_jobs(
        &self,
        task_key: &str,
        user_id: Uuid,
        log: (LogLevel, &str),
        jobs: &[(LifecycleJobKind, DateTime<Utc>)],
        max_retries: i32,
    ) -> anyhow::Result<Run>;

    async fn get_run(&self, run_id: Uuid) -> anyhow::Result<Run>;

    /// Most recent runs for one task, newest first.
    async fn list_recent_runs(&self, task_key: &str, limit: i64) -> anyhow::Result<Vec<Run>>;

    /// Guarded status transition: moves the run from `from` to `to` and, in
    /// the same transaction, appends the given log lines. Returns false when
    /// the run is not currently in `from` (already advanced, terminal, or
    /// missing) — in that case nothing is written.
    async fn advance_run_status(
        &self,
        run_id: Uuid,
        from: RunStatus,
        to: RunStatus,
        logs: &[(LogLevel, &str)],
    ) -> anyhow::Result<bool>;

    /// Terminal failure: marks any non-terminal run `failed` with a
    /// diagnostic error and an error-level log line. Returns false when the
    /// run is already terminal or missing.
    async fn fail_run(&self, run_id: Uuid, error: &str) -> anyhow::Result<bool>;

    // Run log operations
    async fn append_run_log(
        &self,
        run_id: Uuid,
        level: LogLevel,
        message: &str,
    ) -> anyhow::Result<RunLog>;

    /// Log lines for a run in non-decreasing timestamp order; insertion
    /// order breaks ties.
    async fn list_run_logs(&self, run_id: Uuid) -> anyhow::Result<Vec<RunLog>>;

    // Lifecycle job operations
    async fn create_lifecycle_job(
        &self,
        run_id: Uuid,
        kind: LifecycleJobKind,
        due_at: DateTime<Utc>,
        max_retries: i32,
    ) -> anyhow::Result<LifecycleJob>;

    /// Pending jobs whose due time has passed, oldest due first.
    async fn get_due_lifecycle_jobs(&self, limit: i64) -> anyhow::Result<Vec<LifecycleJob>>;

    async fn list_lifecycle_jobs_for_run(&self, run_id: Uuid)
        -> anyhow::Result<Vec<LifecycleJob>>;

    async fn complete_lifecycle_job(&self, job_id: Uuid) -> anyhow::Result<()>;

    /// Pushes a job back to pending with an incremented attempt counter and
    /// a new due time.
    async fn reset_lifecycle_job_for_retry(
        &self,
        job_id: Uuid,
        error: &str,
        due_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    async fn fail_lifecycle_job(&self, job_id: Uuid, error: &str) -> anyhow::Result<()>;
}
