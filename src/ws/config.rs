#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::backoff::Constant;

const DEFAULT_RECONNECT_DELAY_DURATION: Duration = Duration::from_millis(2500);

/// Configuration for WebSocket client behavior.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Reconnection strategy configuration
    pub reconnect: ReconnectConfig,
}

/// Configuration for automatic reconnection behavior.
///
/// Every close, clean or not, waits the same `delay` before the next attempt.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive failed attempts before giving up.
    /// `None` means infinite retries.
    pub max_attempts: Option<u32>,
    /// Fixed wait between a close and the next connection attempt
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            delay: DEFAULT_RECONNECT_DELAY_DURATION,
        }
    }
}

impl From<ReconnectConfig> for Constant {
    fn from(config: ReconnectConfig) -> Self {
        Constant::new(config.delay)
    }
}
