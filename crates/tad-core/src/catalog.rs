//! Built-in task catalog.
//!
//! Task definitions are seeded once at startup and read-only afterwards;
//! the dashboard offers no way to create or edit them at runtime.

use crate::database::Database;
use crate::models::NewTaskDefinition;

pub fn default_catalog() -> Vec<NewTaskDefinition> {
    vec![
        NewTaskDefinition {
            key: "health_check",
            name: "Health Check",
            description: "Calls a public API and logs status/latency.",
        },
        NewTaskDefinition {
            key: "csv_export",
            name: "CSV Export",
            description: "Generates a small CSV report and stores it locally.",
        },
        NewTaskDefinition {
            key: "data_sync",
            name: "Data Sync",
            description: "Fetches paginated data from a public API and stores a summary.",
        },
    ]
}

/// Idempotent: existing rows keep their current values.
pub async fn seed_catalog(db: &dyn Database) -> anyhow::Result<()> {
    let defs = default_catalog();
    db.seed_task_definitions(&defs).await?;
    tracing::info!(count = defs.len(), "task catalog seeded");
    Ok(())
}
