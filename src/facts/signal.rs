use core::time::Duration;
use std::time::Instant;

/// A single collected signal together with the time spent computing it.
///
/// `value` is `None` when the signal could not be computed (the operation failed, was skipped,
/// or never ran). `latency` is `None` only when the operation never ran at all.
#[derive(Debug, Clone, PartialEq)]
pub struct Measured<T> {
    pub value: Option<T>,
    pub latency: Option<Duration>,
}

impl<T> Default for Measured<T> {
    fn default() -> Self {
        Self::missing()
    }
}

impl<T> Measured<T> {
    /// A signal that was never computed.
    #[must_use]
    pub const fn missing() -> Self {
        Self { value: None, latency: None }
    }

    #[must_use]
    pub const fn new(value: Option<T>, latency: Duration) -> Self {
        Self {
            value,
            latency: Some(latency),
        }
    }

    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Elapsed time in seconds, counting a signal that never ran as zero.
    #[must_use]
    pub fn latency_secs(&self) -> f64 {
        self.latency.map_or(0.0, |d| d.as_secs_f64())
    }
}

/// Run a fallible collection step, recording its wall-clock latency.
///
/// Failures are logged at debug level under `target` and turned into a missing value, so a
/// failed step never aborts the surrounding collection.
pub async fn measure<T>(target: &str, what: &str, fut: impl Future<Output = crate::Result<T>>) -> Measured<T> {
    let start = Instant::now();
    let result = fut.await;
    let elapsed = start.elapsed();

    match result {
        Ok(value) => {
            log::debug!(target: target, "Computed {what} in {:.3}s", elapsed.as_secs_f64());
            Measured::new(Some(value), elapsed)
        }
        Err(e) => {
            log::debug!(target: target, "Could not compute {what}: {e:#}");
            Measured::new(None, elapsed)
        }
    }
}
