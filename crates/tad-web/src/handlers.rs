use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use tad_core::error::CreateRunError;
use tad_core::models::{Run, RunLog};
use tad_core::simulator::{self, is_not_found};

use crate::api::{fmt_time, ApiServer};

/// Number of recent runs embedded per task in the list view.
const RECENT_RUNS_PER_TASK: i64 = 5;

// Wire DTOs are camelCase for compatibility with the dashboard client.

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RunDto {
    id: String,
    task_key: String,
    status: String,
    created_at: String,
    started_at: Option<String>,
    finished_at: Option<String>,
}

impl RunDto {
    fn from_run(run: &Run) -> Self {
        Self {
            id: run.id.to_string(),
            task_key: run.task_key.clone(),
            status: run.status_str().to_string(),
            created_at: fmt_time(run.created_at),
            started_at: run.started_at.map(fmt_time),
            finished_at: run.finished_at.map(fmt_time),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskWithRuns {
    key: String,
    name: String,
    description: String,
    recent_runs: Vec<RunDto>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunLogDto {
    id: i64,
    run_id: String,
    ts: String,
    level: String,
    message: String,
}

impl RunLogDto {
    fn from_log(log: &RunLog) -> Self {
        Self {
            id: log.id,
            run_id: log.run_id.to_string(),
            ts: fmt_time(log.ts),
            level: log.level.clone(),
            message: log.message.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunDetail {
    #[serde(flatten)]
    run: RunDto,
    logs: Vec<RunLogDto>,
}

pub(crate) async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

pub(crate) async fn list_tasks(State(api): State<ApiServer>) -> impl IntoResponse {
    let tasks = match api.db.list_task_definitions().await {
        Ok(tasks) => tasks,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let mut items = Vec::with_capacity(tasks.len());
    for task in tasks {
        let runs = match api.db.list_recent_runs(&task.key, RECENT_RUNS_PER_TASK).await {
            Ok(runs) => runs,
            Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        };
        items.push(TaskWithRuns {
            key: task.key,
            name: task.name,
            description: task.description,
            recent_runs: runs.iter().map(RunDto::from_run).collect(),
        });
    }

    Json(items).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateRunRequest {
    task_key: Option<String>,
}

pub(crate) async fn create_run(
    State(api): State<ApiServer>,
    Json(payload): Json<CreateRunRequest>,
) -> impl IntoResponse {
    let task_key = match payload.task_key {
        Some(key) => key,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "taskKey is required" })),
            )
                .into_response();
        }
    };

    match simulator::create_run(&*api.db, &api.config, &task_key).await {
        Ok(run) => (StatusCode::CREATED, Json(RunDto::from_run(&run))).into_response(),
        Err(CreateRunError::TaskNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "task not found" })),
        )
            .into_response(),
        Err(CreateRunError::Storage(err)) => {
            tracing::error!("failed to create run: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub(crate) async fn run_detail(
    State(api): State<ApiServer>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let run_id = match Uuid::parse_str(&id) {
        Ok(rid) => rid,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid run id" })),
            )
                .into_response();
        }
    };

    let run = match api.db.get_run(run_id).await {
        Ok(run) => run,
        Err(err) => {
            if is_not_found(&err) {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": "run not found" })),
                )
                    .into_response();
            }
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let logs = match api.db.list_run_logs(run_id).await {
        Ok(logs) => logs,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    Json(RunDetail {
        run: RunDto::from_run(&run),
        logs: logs.iter().map(RunLogDto::from_log).collect(),
    })
    .into_response()
}
