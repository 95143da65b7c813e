//! Order service configuration loaded from environment variables.

use std::time::Duration;

/// How domain events are handed to the publisher after a write commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Publish on the calling task and await the outcome before returning.
    #[default]
    Inline,

    /// Spawn publication onto the runtime and return immediately.
    Detached,
}

impl std::str::FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(DispatchMode::Inline),
            "detached" => Ok(DispatchMode::Detached),
            other => Err(format!("unknown dispatch mode: {other}")),
        }
    }
}

/// Order service settings with sensible defaults.
///
/// Reads from environment variables:
/// - `ORDER_DEFAULT_PAGE_SIZE` — page size when a caller passes `limit <= 0` (default: `10`)
/// - `ORDER_OPERATION_TIMEOUT_MS` — deadline for calls whose context has none (default: `5000`)
/// - `ORDER_EVENT_DISPATCH` — `inline` or `detached` (default: `inline`)
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub default_page_size: i64,
    pub operation_timeout: Duration,
    pub dispatch: DispatchMode,
}

const DEFAULT_PAGE_SIZE: i64 = 10;
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 5000;

impl ServiceConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            default_page_size: lookup("ORDER_DEFAULT_PAGE_SIZE")
                .and_then(|n| n.parse().ok())
                .filter(|n: &i64| *n > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            operation_timeout: Duration::from_millis(
                lookup("ORDER_OPERATION_TIMEOUT_MS")
                    .and_then(|ms| ms.parse().ok())
                    .unwrap_or(DEFAULT_OPERATION_TIMEOUT_MS),
            ),
            dispatch: lookup("ORDER_EVENT_DISPATCH")
                .and_then(|mode| mode.parse().ok())
                .unwrap_or_default(),
        }
    }

    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
            dispatch: DispatchMode::Inline,
        }
    }
}
