//! Environment-driven configuration: `dotenvy` picks up a `.env` file if
//! present, `std::env` supplies overrides, and every option falls back to a
//! documented default.

use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    dotenvy::dotenv().ok();
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string_or(key: &str, default: impl Into<String>) -> String {
    dotenvy::dotenv().ok();
    std::env::var(key).unwrap_or_else(|_| default.into())
}

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub port: u16,
    pub heartbeat_timeout: Duration,
    pub check_interval: Duration,
    pub checkpoint_interval_steps: u64,
    pub auto_migration_cpu_threshold: f32,
    pub auto_migration_duration: Duration,
    pub snapshot_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            port: env_or("COORDINATOR_PORT", 3001u16),
            heartbeat_timeout: Duration::from_millis(env_or("HEARTBEAT_TIMEOUT", 4000u64)),
            check_interval: Duration::from_millis(env_or("CHECK_INTERVAL", 2000u64)),
            checkpoint_interval_steps: env_or("CHECKPOINT_INTERVAL_STEPS", 10u64),
            auto_migration_cpu_threshold: env_or("AUTO_MIGRATION_CPU_THRESHOLD", 90.0f32),
            auto_migration_duration: Duration::from_millis(env_or(
                "AUTO_MIGRATION_DURATION_MS",
                5000u64,
            )),
            snapshot_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub worker_id: Option<String>,
    pub worker_name: String,
    pub coordinator_url: String,
    pub heartbeat_interval: Duration,
    /// Runtime checkpoint cadence; only consulted for strong-migration tasks
    /// (§4.5 — checkpointing is disabled outright for weak tasks).
    pub checkpoint_interval_steps: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: std::env::var("WORKER_ID").ok(),
            worker_name: env_string_or("WORKER_NAME", "worker"),
            coordinator_url: env_string_or("COORDINATOR_URL", "ws://127.0.0.1:3001/ws"),
            heartbeat_interval: Duration::from_millis(env_or("HEARTBEAT_INTERVAL", 1000u64)),
            checkpoint_interval_steps: env_or("CHECKPOINT_INTERVAL_STEPS", 10u64),
        }
    }
}
