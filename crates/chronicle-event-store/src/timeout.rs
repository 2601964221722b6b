//! Per-call time budget for remote-backed stores.

use std::future::Future;
use std::time::Duration;

use chronicle_core::error::DomainError;

/// Time budget applied to each call of a remote-backed store.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Runs `call`, turning an expired budget into `DomainError::Timeout`.
pub(crate) async fn bounded<T>(
    budget: Duration,
    operation: &'static str,
    call: impl Future<Output = Result<T, DomainError>>,
) -> Result<T, DomainError> {
    tokio::time::timeout(budget, call).await.map_err(|_elapsed| {
        DomainError::Timeout(format!(
            "{operation} did not complete within {}ms",
            budget.as_millis()
        ))
    })?
}
