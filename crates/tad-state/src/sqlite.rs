mod catalog;
mod core;
mod lifecycle_jobs;
mod run_logs;
mod runs;
mod users;

pub use core::SqliteDatabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tad_core::database::Database;
use tad_core::models::{
    LifecycleJob, LifecycleJobKind, LogLevel, NewTaskDefinition, Run, RunLog, RunStatus,
    TaskDefinition, User,
};

#[async_trait]
impl Database for SqliteDatabase {
    async fn seed_task_definitions(&self, defs: &[NewTaskDefinition]) -> anyhow::Result<()> {
        self.seed_task_definitions_impl(defs).await
    }

    async fn list_task_definitions(&self) -> anyhow::Result<Vec<TaskDefinition>> {
        self.list_task_definitions_impl().await
    }

    async fn get_task_definition(&self, key: &str) -> anyhow::Result<TaskDefinition> {
        self.get_task_definition_impl(key).await
    }

    async fn upsert_user_by_email(
        &self,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        self.upsert_user_by_email_impl(email, password_hash).await
    }

    async fn create_run(&self, task_key: &str, user_id: Uuid) -> anyhow::Result<Run> {
        self.create_run_impl(task_key, user_id).await
    }

    async fn create_run_with_jobs(
        &self,
        task_key: &str,
        user_id: Uuid,
        log: (LogLevel, &str),
        jobs: &[(LifecycleJobKind, DateTime<Utc>)],
        max_retries: i32,
    ) -> anyhow::Result<Run> {
        self.create_run_with_jobs_impl(task_key, user_id, log, jobs, max_retries)
            .await
    }

    async fn get_run(&self, run_id: Uuid) -> anyhow::Result<Run> {
        self.get_run_impl(run_id).await
    }

    async fn list_recent_runs(&self, task_key: &str, limit: i64) -> anyhow::Result<Vec<Run>> {
        self.list_recent_runs_impl(task_key, limit).await
    }

    async fn advance_run_status(
        &self,
        run_id: Uuid,
        from: RunStatus,
        to: RunStatus,
        logs: &[(LogLevel, &str)],
    ) -> anyhow::Result<bool> {
        self.advance_run_status_impl(run_id, from, to, logs).await
    }

    async fn fail_run(&self, run_id: Uuid, error: &str) -> anyhow::Result<bool> {
        self.fail_run_impl(run_id, error).await
    }

    async fn append_run_log(
        &self,
        run_id: Uuid,
        level: LogLevel,
        message: &str,
    ) -> anyhow::Result<RunLog> {
        self.append_run_log_impl(run_id, level, message).await
    }

    async fn list_run_logs(&self, run_id: Uuid) -> anyhow::Result<Vec<RunLog>> {
        self.list_run_logs_impl(run_id).await
    }

    async fn create_lifecycle_job(
        &self,
        run_id: Uuid,
        kind: LifecycleJobKind,
        due_at: DateTime<Utc>,
        max_retries: i32,
    ) -> anyhow::Result<LifecycleJob> {
        self.create_lifecycle_job_impl(run_id, kind, due_at, max_retries)
            .await
    }

    async fn get_due_lifecycle_jobs(&self, limit: i64) -> anyhow::Result<Vec<LifecycleJob>> {
        self.get_due_lifecycle_jobs_impl(limit).await
    }

    async fn list_lifecycle_jobs_for_run(
        &self,
        run_id: Uuid,
    ) -> anyhow::Result<Vec<LifecycleJob>> {
        self.list_lifecycle_jobs_for_run_impl(run_id).await
    }

    async fn complete_lifecycle_job(&self, job_id: Uuid) -> anyhow::Result<()> {
        self.complete_lifecycle_job_impl(job_id).await
    }

    async fn reset_lifecycle_job_for_retry(
        &self,
        job_id: Uuid,
        error: &str,
        due_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.reset_lifecycle_job_for_retry_impl(job_id, error, due_at)
            .await
    }

    async fn fail_lifecycle_job(&self, job_id: Uuid, error: &str) -> anyhow::Result<()> {
        self.fail_lifecycle_job_impl(job_id, error).await
    }
}
