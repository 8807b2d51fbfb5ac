use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tad_core::catalog::seed_catalog;
use tad_core::config::SimulatorConfig;
use tad_core::database::Database;
use tad_core::error::CreateRunError;
use tad_core::models::{
    LifecycleJob, LifecycleJobKind, LifecycleJobStatus, LogLevel, NewTaskDefinition, Run, RunLog,
    RunStatus, TaskDefinition, User,
};
use tad_core::simulator::{self, LifecycleSimulator};
use tad_state::SqliteDatabase;

fn fast_config() -> SimulatorConfig {
    SimulatorConfig {
        poll_interval: Duration::from_millis(10),
        start_delay: Duration::from_millis(40),
        finish_delay: Duration::from_millis(120),
        max_jobs_per_cycle: 100,
        max_retries: 3,
    }
}

async fn setup() -> Arc<SqliteDatabase> {
    let db = Arc::new(SqliteDatabase::new(":memory:").await.expect("db"));
    db.run_migrations().await.expect("migrations");
    seed_catalog(&*db).await.expect("seed");
    db
}

#[tokio::test]
async fn test_create_run_returns_queued_and_persists_jobs() {
    let db = setup().await;
    let config = fast_config();

    let run = simulator::create_run(&*db, &config, "csv_export")
        .await
        .expect("create run");
    assert_eq!(run.status(), RunStatus::Queued);
    assert_eq!(run.task_key, "csv_export");
    assert!(run.started_at.is_none());
    assert!(run.finished_at.is_none());

    let logs = db.list_run_logs(run.id).await.expect("logs");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, "Queued");

    let jobs = db.list_lifecycle_jobs_for_run(run.id).await.expect("jobs");
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].kind(), LifecycleJobKind::Start);
    assert_eq!(jobs[1].kind(), LifecycleJobKind::Finish);
    assert!(jobs.iter().all(|j| j.status() == LifecycleJobStatus::Pending));
    assert!(jobs[0].due_at < jobs[1].due_at);
}

#[tokio::test]
async fn test_create_run_unknown_task_key() {
    let db = setup().await;
    let err = simulator::create_run(&*db, &fast_config(), "no_such_task")
        .await
        .expect_err("unknown task");
    assert!(matches!(err, CreateRunError::TaskNotFound(_)));
}

#[tokio::test]
async fn test_full_lifecycle_reaches_success_with_ordered_logs() {
    let db = setup().await;
    let config = fast_config();

    let run = simulator::create_run(&*db, &config, "health_check")
        .await
        .expect("create run");

    let handle = LifecycleSimulator::with_config(db.clone(), config.clone()).start();

    // Wait well past both delays.
    tokio::time::sleep(Duration::from_millis(500)).await;
    handle.abort();

    let finished = db.get_run(run.id).await.expect("run");
    assert_eq!(finished.status(), RunStatus::Success);
    assert!(finished.started_at.is_some());
    assert!(finished.finished_at.is_some());
    assert!(finished.started_at <= finished.finished_at);

    let logs = db.list_run_logs(run.id).await.expect("logs");
    let messages: Vec<&str> = logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Queued",
            "Started",
            "Performing task steps…",
            "Finished successfully"
        ]
    );
    for pair in logs.windows(2) {
        assert!(pair[0].ts <= pair[1].ts);
    }
    assert!(logs.iter().all(|l| l.level() == LogLevel::Info));

    let jobs = db.list_lifecycle_jobs_for_run(run.id).await.expect("jobs");
    assert!(jobs.iter().all(|j| j.status() == LifecycleJobStatus::Completed));
}

#[tokio::test]
async fn test_transitions_skip_runs_that_already_failed() {
    let db = setup().await;
    let config = fast_config();

    let run = simulator::create_run(&*db, &config, "data_sync")
        .await
        .expect("create run");
    assert!(db.fail_run(run.id, "operator abort").await.expect("fail"));

    let jobs = db.list_lifecycle_jobs_for_run(run.id).await.expect("jobs");
    for job in &jobs {
        simulator::execute_job(&*db, job, config.poll_interval).await;
    }

    // Terminal run untouched, jobs settled without side effects.
    let fetched = db.get_run(run.id).await.expect("run");
    assert_eq!(fetched.status(), RunStatus::Failed);
    assert!(fetched.started_at.is_none());

    let logs = db.list_run_logs(run.id).await.expect("logs");
    let messages: Vec<&str> = logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(messages, vec!["Queued", "operator abort"]);

    let jobs = db.list_lifecycle_jobs_for_run(run.id).await.expect("jobs");
    assert!(jobs.iter().all(|j| j.status() == LifecycleJobStatus::Completed));
}

#[tokio::test]
async fn test_start_transition_is_idempotent() {
    let db = setup().await;
    let config = fast_config();

    let run = simulator::create_run(&*db, &config, "csv_export")
        .await
        .expect("create run");

    // The run already moved past queued by other means.
    assert!(db
        .advance_run_status(run.id, RunStatus::Queued, RunStatus::Running, &[])
        .await
        .expect("manual advance"));

    let jobs = db.list_lifecycle_jobs_for_run(run.id).await.expect("jobs");
    let start = jobs
        .iter()
        .find(|j| j.kind() == LifecycleJobKind::Start)
        .expect("start job");
    simulator::execute_job(&*db, start, config.poll_interval).await;

    let logs = db.list_run_logs(run.id).await.expect("logs");
    let messages: Vec<&str> = logs.iter().map(|l| l.message.as_str()).collect();
    // No duplicate "Started" lines.
    assert_eq!(messages, vec!["Queued"]);

    let jobs = db.list_lifecycle_jobs_for_run(run.id).await.expect("jobs");
    let start = jobs
        .iter()
        .find(|j| j.kind() == LifecycleJobKind::Start)
        .expect("start job");
    assert_eq!(start.status(), LifecycleJobStatus::Completed);
}

/// Delegates to a real backend but fails every run read, standing in for a
/// storage outage hitting the guard re-read.
struct BrokenRunReads {
    inner: Arc<SqliteDatabase>,
}

#[async_trait]
impl Database for BrokenRunReads {
    async fn seed_task_definitions(&self, defs: &[NewTaskDefinition]) -> anyhow::Result<()> {
        self.inner.seed_task_definitions(defs).await
    }

    async fn list_task_definitions(&self) -> anyhow::Result<Vec<TaskDefinition>> {
        self.inner.list_task_definitions().await
    }

    async fn get_task_definition(&self, key: &str) -> anyhow::Result<TaskDefinition> {
        self.inner.get_task_definition(key).await
    }

    async fn upsert_user_by_email(
        &self,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        self.inner.upsert_user_by_email(email, password_hash).await
    }

    async fn create_run(&self, task_key: &str, user_id: Uuid) -> anyhow::Result<Run> {
        self.inner.create_run(task_key, user_id).await
    }

    async fn create_run_with_jobs(
        &self,
        task_key: &str,
        user_id: Uuid,
        log: (LogLevel, &str),
        jobs: &[(LifecycleJobKind, DateTime<Utc>)],
        max_retries: i32,
    ) -> anyhow::Result<Run> {
        self.inner
            .create_run_with_jobs(task_key, user_id, log, jobs, max_retries)
            .await
    }

    async fn get_run(&self, _run_id: Uuid) -> anyhow::Result<Run> {
        anyhow::bail!("storage unavailable")
    }

    async fn list_recent_runs(&self, task_key: &str, limit: i64) -> anyhow::Result<Vec<Run>> {
        self.inner.list_recent_runs(task_key, limit).await
    }

    async fn advance_run_status(
        &self,
        run_id: Uuid,
        from: RunStatus,
        to: RunStatus,
        logs: &[(LogLevel, &str)],
    ) -> anyhow::Result<bool> {
        self.inner.advance_run_status(run_id, from, to, logs).await
    }

    async fn fail_run(&self, run_id: Uuid, error: &str) -> anyhow::Result<bool> {
        self.inner.fail_run(run_id, error).await
    }

    async fn append_run_log(
        &self,
        run_id: Uuid,
        level: LogLevel,
        message: &str,
    ) -> anyhow::Result<RunLog> {
        self.inner.append_run_log(run_id, level, message).await
    }

    async fn list_run_logs(&self, run_id: Uuid) -> anyhow::Result<Vec<RunLog>> {
        self.inner.list_run_logs(run_id).await
    }

    async fn create_lifecycle_job(
        &self,
        run_id: Uuid,
        kind: LifecycleJobKind,
        due_at: DateTime<Utc>,
        max_retries: i32,
    ) -> anyhow::Result<LifecycleJob> {
        self.inner
            .create_lifecycle_job(run_id, kind, due_at, max_retries)
            .await
    }

    async fn get_due_lifecycle_jobs(&self, limit: i64) -> anyhow::Result<Vec<LifecycleJob>> {
        self.inner.get_due_lifecycle_jobs(limit).await
    }

    async fn list_lifecycle_jobs_for_run(
        &self,
        run_id: Uuid,
    ) -> anyhow::Result<Vec<LifecycleJob>> {
        self.inner.list_lifecycle_jobs_for_run(run_id).await
    }

    async fn complete_lifecycle_job(&self, job_id: Uuid) -> anyhow::Result<()> {
        self.inner.complete_lifecycle_job(job_id).await
    }

    async fn reset_lifecycle_job_for_retry(
        &self,
        job_id: Uuid,
        error: &str,
        due_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.inner
            .reset_lifecycle_job_for_retry(job_id, error, due_at)
            .await
    }

    async fn fail_lifecycle_job(&self, job_id: Uuid, error: &str) -> anyhow::Result<()> {
        self.inner.fail_lifecycle_job(job_id, error).await
    }
}

#[tokio::test]
async fn test_finish_guard_reread_failure_is_retried() {
    let db = setup().await;
    let config = fast_config();

    let run = simulator::create_run(&*db, &config, "csv_export")
        .await
        .expect("create run");

    // The CAS guard fails (run still queued) and the follow-up read errors;
    // the job must be rescheduled, not settled as completed.
    let flaky = BrokenRunReads { inner: db.clone() };
    let jobs = db.list_lifecycle_jobs_for_run(run.id).await.expect("jobs");
    let finish = jobs
        .iter()
        .find(|j| j.kind() == LifecycleJobKind::Finish)
        .expect("finish job");
    simulator::execute_job(&flaky, finish, config.poll_interval).await;

    let jobs = db.list_lifecycle_jobs_for_run(run.id).await.expect("jobs");
    let finish = jobs
        .iter()
        .find(|j| j.kind() == LifecycleJobKind::Finish)
        .expect("finish job");
    assert_eq!(finish.status(), LifecycleJobStatus::Pending);
    assert_eq!(finish.attempts, 1);
    assert_eq!(finish.error.as_deref(), Some("storage unavailable"));

    let fetched = db.get_run(run.id).await.expect("run");
    assert_eq!(fetched.status(), RunStatus::Queued);
}

#[tokio::test]
async fn test_finish_retry_exhaustion_marks_run_failed() {
    let db = setup().await;
    let mut config = fast_config();
    config.max_retries = 2;

    let run = simulator::create_run(&*db, &config, "health_check")
        .await
        .expect("create run");

    // Execute the finish job while the run is still queued: the guard keeps
    // failing, so the job burns through its retry budget.
    for _ in 0..=config.max_retries {
        let jobs = db.list_lifecycle_jobs_for_run(run.id).await.expect("jobs");
        let finish = jobs
            .iter()
            .find(|j| j.kind() == LifecycleJobKind::Finish)
            .expect("finish job");
        simulator::execute_job(&*db, finish, config.poll_interval).await;
    }

    let jobs = db.list_lifecycle_jobs_for_run(run.id).await.expect("jobs");
    let finish = jobs
        .iter()
        .find(|j| j.kind() == LifecycleJobKind::Finish)
        .expect("finish job");
    assert_eq!(finish.status(), LifecycleJobStatus::Failed);
    assert!(finish.error.is_some());

    let failed = db.get_run(run.id).await.expect("run");
    assert_eq!(failed.status(), RunStatus::Failed);
    assert!(failed.finished_at.is_some());

    let logs = db.list_run_logs(run.id).await.expect("logs");
    let last = logs.last().expect("diagnostic log");
    assert_eq!(last.level(), LogLevel::Error);
    assert!(last.message.contains("failed after"));
}
