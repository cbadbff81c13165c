//! Failure Injection for the Mock Service
//!
//! Supports configurable per-route failures for testing error paths.

use std::collections::HashMap;
use std::time::Duration;

use super::service::Route;

/// Failure configuration for a route
#[derive(Debug, Clone, Default)]
pub struct FailureConfig {
    /// HTTP status to answer with
    pub status: Option<u16>,
    /// Response body for the injected status
    pub body: String,
    /// Extra response headers
    pub headers: Vec<(String, String)>,
    /// Fail at the transport level instead of answering
    pub transport_error: Option<String>,
    /// Delay to add before responding
    pub delay: Option<Duration>,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
    /// Let this many calls through before failing
    pub skip: u32,
}

impl FailureConfig {
    /// Answer with `status` and `body`
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Fail before any response is produced
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            transport_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Just add delay
    pub fn delay(duration: Duration) -> Self {
        Self {
            delay: Some(duration),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }

    /// Succeed for the first `calls` requests, then fail
    pub fn after(mut self, calls: u32) -> Self {
        self.skip = calls;
        self
    }

    /// Whether this config changes the outcome, not just timing
    pub fn is_failure(&self) -> bool {
        self.status.is_some() || self.transport_error.is_some()
    }
}

/// Failure injector for the mock service
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<Route, FailureConfig>,
    call_counts: HashMap<Route, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for a route
    pub fn inject(&mut self, route: Route, config: FailureConfig) {
        self.configs.insert(route, config);
        self.call_counts.insert(route, 0);
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    pub fn clear_route(&mut self, route: Route) {
        self.configs.remove(&route);
        self.call_counts.remove(&route);
    }

    /// Check whether the next call on `route` should fail
    pub fn check(&mut self, route: Route) -> Option<&FailureConfig> {
        let config = self.configs.get(&route)?;
        let count = self.call_counts.entry(route).or_insert(0);
        *count += 1;

        if *count <= config.skip {
            return None;
        }
        if let Some(fail_limit) = config.fail_count {
            if *count - config.skip > fail_limit {
                return None;
            }
        }
        Some(config)
    }
}
