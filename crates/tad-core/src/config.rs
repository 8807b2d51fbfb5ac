use std::time::Duration;

/// Simulator configuration for timing and retry tuning
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Interval between job polling cycles
    pub poll_interval: Duration,

    /// Delay from run creation to the `running` transition
    pub start_delay: Duration,

    /// Delay from run creation to the `success` transition
    pub finish_delay: Duration,

    /// Maximum number of jobs to execute per polling cycle
    pub max_jobs_per_cycle: i64,

    /// Retry budget for a single lifecycle job before it is marked failed
    pub max_retries: i32,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(
                std::env::var("SIM_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(100),
            ),
            start_delay: Duration::from_millis(
                std::env::var("SIM_START_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
            ),
            finish_delay: Duration::from_millis(
                std::env::var("SIM_FINISH_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1500),
            ),
            max_jobs_per_cycle: std::env::var("SIM_MAX_JOBS_PER_CYCLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            max_retries: std::env::var("SIM_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
        }
    }
}
