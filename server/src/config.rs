//! Server runtime configuration, filled from command-line arguments.

use std::time::Duration;

use shared::{DEFAULT_PORT, DEFAULT_TICK_RATE, MOVE_STEP};

/// Skins handed out when none are configured.
pub const DEFAULT_SKINS: [&str; 4] = [
    "trollface_1.bmp",
    "trollface_2.bmp",
    "trollface_3.bmp",
    "trollface_4.bmp",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the TCP listener binds to
    pub bind_addr: String,
    /// Interval between two drains of the event queue
    pub tick_duration: Duration,
    /// Maximum number of concurrent connections
    pub max_clients: usize,
    /// Connections silent for longer than this are dropped; zero disables
    pub idle_timeout: Duration,
    /// Displacement applied per movement intent
    pub step: f32,
    pub skins: Vec<String>,
}

impl ServerConfig {
    pub fn tick_duration_from_rate(tick_rate: u32) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(tick_rate.max(1)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            tick_duration: Self::tick_duration_from_rate(DEFAULT_TICK_RATE),
            max_clients: 32,
            idle_timeout: Duration::from_secs(5),
            step: MOVE_STEP,
            skins: DEFAULT_SKINS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
