//! Run lifecycle simulator.
//!
//! There is no real task execution: a run "executes" by moving through
//! `queued → running → success` on a fixed schedule. Each transition is a
//! persisted [`LifecycleJob`] row rather than a bare in-process timer, so
//! transitions survive restarts, retry on storage failures, and leave a
//! durable `failed` record when the retry budget is exhausted.
//!
//! Key responsibilities:
//! - Create runs and enqueue their two transition jobs
//! - Poll for due jobs and execute them in due order
//! - Guard every transition with a compare-and-swap on the current status
//! - Retry failed jobs with backoff, then fail the run with a diagnostic

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::SimulatorConfig;
use crate::database::Database;
use crate::error::{CreateRunError, CreateRunResult};
use crate::models::{LifecycleJob, LifecycleJobKind, LogLevel, Run, RunStatus};

/// The dashboard runs without authentication; every run is attributed to
/// this development identity.
pub const DEV_USER_EMAIL: &str = "dev@local";
pub const DEV_USER_PASSWORD_HASH: &str = "dev";

/// Matches the row-not-found failures surfaced by the storage backends.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("row not found") || msg.contains("no rows") || msg.contains("not found")
}

/// Create a run for `task_key` and schedule its lifecycle transitions.
///
/// Returns immediately with the run still `queued`; the background
/// simulator picks up the persisted jobs once they come due.
pub async fn create_run(
    db: &dyn Database,
    config: &SimulatorConfig,
    task_key: &str,
) -> CreateRunResult<Run> {
    let task = match db.get_task_definition(task_key).await {
        Ok(task) => task,
        Err(err) if is_not_found(&err) => {
            return Err(CreateRunError::TaskNotFound(task_key.to_string()));
        }
        Err(err) => return Err(CreateRunError::Storage(err)),
    };

    let user = db
        .upsert_user_by_email(DEV_USER_EMAIL, DEV_USER_PASSWORD_HASH)
        .await?;

    // Both delays are measured from run creation, not from each other. The
    // run, its "Queued" log line, and both jobs land in one transaction.
    let now = Utc::now();
    let jobs = [
        (
            LifecycleJobKind::Start,
            now + chrono::Duration::milliseconds(config.start_delay.as_millis() as i64),
        ),
        (
            LifecycleJobKind::Finish,
            now + chrono::Duration::milliseconds(config.finish_delay.as_millis() as i64),
        ),
    ];
    let run = db
        .create_run_with_jobs(
            &task.key,
            user.id,
            (LogLevel::Info, "Queued"),
            &jobs,
            config.max_retries,
        )
        .await?;

    tracing::info!(run_id = %run.id, task_key = %task.key, "run created");
    Ok(run)
}

/// Background worker that executes due lifecycle jobs.
///
/// Runs as a polling loop (one cycle per `poll_interval`); each cycle fetches
/// due jobs and executes them in due order. Cycle errors are logged and the
/// loop keeps going — a storage outage must never take the process down.
pub struct LifecycleSimulator<D: Database + 'static> {
    db: Arc<D>,
    config: SimulatorConfig,
}

impl<D: Database> LifecycleSimulator<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self::with_config(db, SimulatorConfig::default())
    }

    pub fn with_config(db: Arc<D>, config: SimulatorConfig) -> Self {
        Self { db, config }
    }

    /// Start the polling loop. The returned handle never resolves on its
    /// own; abort it to stop the simulator.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        tracing::info!("lifecycle simulator started");

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            if let Err(e) = self.poll_cycle().await {
                tracing::error!("error in simulator poll cycle: {}", e);
            }
        }
    }

    /// Perform one polling cycle.
    pub async fn poll_cycle(&self) -> anyhow::Result<()> {
        let jobs = self
            .db
            .get_due_lifecycle_jobs(self.config.max_jobs_per_cycle)
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        tracing::debug!(count = jobs.len(), "executing due lifecycle jobs");

        // Due order matters: a run's start transition must apply before its
        // finish transition, so jobs execute sequentially.
        for job in jobs {
            execute_job(&*self.db, &job, self.config.poll_interval).await;
        }

        Ok(())
    }
}

/// Execute a single due job, then settle its row: completed on success or
/// idempotent skip, retried with backoff on storage failure, failed (with
/// the run marked failed) once the retry budget is spent.
pub async fn execute_job<D: Database + ?Sized>(
    db: &D,
    job: &LifecycleJob,
    backoff_base: Duration,
) {
    match apply_transition(db, job).await {
        Ok(applied) => {
            if !applied {
                // The run was already past this transition (or gone). The
                // job is done either way; never clobber a terminal run.
                tracing::debug!(
                    job_id = %job.id,
                    run_id = %job.run_id,
                    kind = job.kind().as_str(),
                    "transition guard failed, skipping"
                );
            }
            if let Err(e) = db.complete_lifecycle_job(job.id).await {
                tracing::warn!(job_id = %job.id, "failed to complete lifecycle job: {}", e);
            }
        }
        Err(err) => {
            if job.attempts < job.max_retries {
                let backoff = retry_backoff(backoff_base, job.attempts + 1);
                let due_at =
                    Utc::now() + chrono::Duration::milliseconds(backoff.as_millis() as i64);
                tracing::warn!(
                    job_id = %job.id,
                    run_id = %job.run_id,
                    attempt = job.attempts + 1,
                    "lifecycle job failed, retrying: {}",
                    err
                );
                if let Err(e) = db
                    .reset_lifecycle_job_for_retry(job.id, &err.to_string(), due_at)
                    .await
                {
                    tracing::error!(job_id = %job.id, "failed to reschedule job: {}", e);
                }
            } else {
                tracing::error!(
                    job_id = %job.id,
                    run_id = %job.run_id,
                    "lifecycle job exhausted retries: {}",
                    err
                );
                if let Err(e) = db.fail_lifecycle_job(job.id, &err.to_string()).await {
                    tracing::error!(job_id = %job.id, "failed to mark job failed: {}", e);
                }
                let diagnostic = format!(
                    "Lifecycle transition '{}' failed after {} attempts: {}",
                    job.kind().as_str(),
                    job.attempts + 1,
                    err
                );
                if let Err(e) = mark_run_failed(db, job.run_id, &diagnostic).await {
                    tracing::error!(run_id = %job.run_id, "failed to mark run failed: {}", e);
                }
            }
        }
    }
}

async fn apply_transition<D: Database + ?Sized>(
    db: &D,
    job: &LifecycleJob,
) -> anyhow::Result<bool> {
    match job.kind() {
        LifecycleJobKind::Start => {
            db.advance_run_status(
                job.run_id,
                RunStatus::Queued,
                RunStatus::Running,
                &[
                    (LogLevel::Info, "Started"),
                    (LogLevel::Info, "Performing task steps…"),
                ],
            )
            .await
        }
        LifecycleJobKind::Finish => {
            let advanced = db
                .advance_run_status(
                    job.run_id,
                    RunStatus::Running,
                    RunStatus::Success,
                    &[(LogLevel::Info, "Finished successfully")],
                )
                .await?;
            if advanced {
                return Ok(true);
            }
            // A queued run means the start transition has not applied yet
            // (still retrying); surface an error so this job retries too
            // instead of silently leaving the run stuck. Storage failures on
            // the re-read must also reach the retry path, not settle the job.
            match db.get_run(job.run_id).await {
                Ok(run) if run.status() == RunStatus::Queued => {
                    anyhow::bail!("run {} has not started yet", job.run_id)
                }
                Ok(_) => Ok(false),
                Err(e) if is_not_found(&e) => Ok(false),
                Err(e) => Err(e),
            }
        }
    }
}

async fn mark_run_failed<D: Database + ?Sized>(
    db: &D,
    run_id: Uuid,
    diagnostic: &str,
) -> anyhow::Result<()> {
    if db.fail_run(run_id, diagnostic).await? {
        tracing::warn!(run_id = %run_id, "run marked failed: {}", diagnostic);
    }
    Ok(())
}

/// Exponential backoff scaled from the polling interval, capped at a minute.
fn retry_backoff(base: Duration, attempt: i32) -> Duration {
    let capped = attempt.clamp(1, 10) as u32;
    let backoff = base.saturating_mul(2_u32.saturating_pow(capped - 1));
    backoff.min(Duration::from_secs(60))
}
