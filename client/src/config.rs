//! Client runtime configuration

use shared::{DEFAULT_PORT, DEFAULT_TICK_RATE};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Address of the server to connect to
    pub server_addr: String,
    pub tick_duration: Duration,
    /// Drive movement with a random walk instead of staying idle
    pub bot: bool,
    /// Seed for the bot's random walk; entropy when unset
    pub seed: Option<u64>,
    /// Visual smoothing window; zero shows every update as it arrives
    pub interpolation: Duration,
    /// Silence after which a heartbeat is sent
    pub heartbeat_interval: Duration,
}

impl ClientConfig {
    pub fn tick_duration_from_rate(tick_rate: u32) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(tick_rate.max(1)))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            tick_duration: Self::tick_duration_from_rate(DEFAULT_TICK_RATE),
            bot: false,
            seed: None,
            interpolation: Duration::ZERO,
            heartbeat_interval: Duration::from_millis(1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.server_addr, "127.0.0.1:8080");
        assert!(!config.bot);
        assert!(config.seed.is_none());
        assert!(config.interpolation.is_zero());
        assert_eq!(config.heartbeat_interval, Duration::from_secs(1));
        assert_eq!(
            config.tick_duration,
            ClientConfig::tick_duration_from_rate(DEFAULT_TICK_RATE)
        );
    }

    #[test]
    fn test_tick_duration_from_rate() {
        assert_eq!(
            ClientConfig::tick_duration_from_rate(50),
            Duration::from_millis(20)
        );
        assert_eq!(
            ClientConfig::tick_duration_from_rate(1),
            Duration::from_secs(1)
        );
        assert_eq!(
            ClientConfig::tick_duration_from_rate(0),
            Duration::from_secs(1)
        );
    }
}
