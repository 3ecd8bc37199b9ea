use std::sync::Arc;

use crate::{KaldraError, KaldraSignal, Result};

/// Caller-supplied substitute for a signal the engine could not produce.
pub type SignalFallback = Arc<dyn Fn(&str) -> KaldraSignal + Send + Sync>;

/// Replaces an exhausted-retries failure with `fallback`'s value.
///
/// Only [`KaldraError::MaxRetriesExceeded`] is recovered; every other error,
/// including [`KaldraError::InvalidInput`], is returned unchanged.
pub fn recover<T, F>(result: Result<T>, fallback: F) -> Result<T>
where
    F: FnOnce(&KaldraError) -> T,
{
    match result {
        Err(err @ KaldraError::MaxRetriesExceeded { .. }) => {
            tracing::error!(error = %err, "remote call failed, substituting fallback value");
            Ok(fallback(&err))
        }
        other => other,
    }
}
