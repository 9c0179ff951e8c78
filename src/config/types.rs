use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub optimistic: OptimisticConfig,
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Defaults for every poller built from this config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Refresh interval in milliseconds, 0 disables polling (default: 10000).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Issue a fetch as soon as the poller starts (default: true).
    #[serde(default = "default_true")]
    pub fetch_on_mount: bool,
    /// Start with polling enabled (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Keep the last good data when a fetch fails (default: true).
    #[serde(default = "default_true")]
    pub keep_previous_data: bool,
    /// Revalidate when the window regains focus (default: true).
    #[serde(default = "default_true")]
    pub refetch_on_focus: bool,
    /// Stop the interval timer while the window is blurred (default: false).
    #[serde(default)]
    pub pause_on_blur: bool,
}

/// Defaults for optimistic engines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimisticConfig {
    /// Delay before the optimistic patch becomes visible (default: 0).
    #[serde(default)]
    pub optimistic_delay_ms: u64,
}

/// Defaults for debounced callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Quiet period in milliseconds (default: 300).
    #[serde(default = "default_debounce_delay_ms")]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_true() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    10_000
}

fn default_debounce_delay_ms() -> u64 {
    300
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl OptimisticConfig {
    pub fn optimistic_delay(&self) -> Duration {
        Duration::from_millis(self.optimistic_delay_ms)
    }
}

impl DebounceConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            fetch_on_mount: true,
            enabled: true,
            keep_previous_data: true,
            refetch_on_focus: true,
            pause_on_blur: false,
        }
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_debounce_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}
