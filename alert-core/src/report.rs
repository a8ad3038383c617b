use async_trait::async_trait;
use std::fmt::Debug;

/// Best-effort side channel that tells maintainers about operational errors.
///
/// Implementations swallow their own failures: a report that cannot be
/// delivered is logged and dropped, never returned to the caller.
#[async_trait]
pub trait ErrorReporter: Send + Sync + Debug {
    async fn report(&self, scope: &str, error: &str);
}

/// Reporter that drops everything. Used when notifications are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

#[async_trait]
impl ErrorReporter for NoopReporter {
    async fn report(&self, _scope: &str, _error: &str) {}
}
