mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{DebounceConfig, LoggingConfig, OptimisticConfig, PollerConfig, SyncConfig};
