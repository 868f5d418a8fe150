use core::time::Duration;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Bounds the number of in-flight requests and lets any caller hold back new ones for a while.
///
/// Every host API request acquires a permit first, so one throttler shared by all collectors
/// caps the total outbound concurrency of a run. When a response reports that the rate limit
/// is exhausted, [`Throttler::pause_for`] parks every subsequent [`Throttler::acquire`] until
/// the limit resets. Overlapping pauses keep the latest deadline.
#[derive(Debug)]
pub struct Throttler {
    semaphore: Arc<Semaphore>,
    resume_at: Mutex<Option<Instant>>,
}

impl Throttler {
    /// Create a throttler that allows at most `max_concurrent` permits at a time.
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            resume_at: Mutex::new(None),
        })
    }

    /// Wait out any active pause, then take a permit. The slot is released when the permit drops.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        loop {
            if let Some(deadline) = self.active_pause() {
                tokio::time::sleep_until(deadline).await;
                continue;
            }

            return Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
        }
    }

    /// Whether new permits are currently being held back.
    pub fn is_paused(&self) -> bool {
        self.active_pause().is_some()
    }

    /// Hold back new permits for `duration`. Requests already running are not interrupted.
    ///
    /// Returns `false` when a pause ending at the same time or later is already in effect.
    pub fn pause_for(&self, duration: Duration) -> bool {
        let until = Instant::now() + duration;
        let mut resume_at = self.resume_at.lock().unwrap_or_else(PoisonError::into_inner);

        if resume_at.is_some_and(|current| current >= until) {
            return false;
        }

        *resume_at = Some(until);
        true
    }

    fn active_pause(&self) -> Option<Instant> {
        let resume_at = *self.resume_at.lock().unwrap_or_else(PoisonError::into_inner);
        resume_at.filter(|deadline| *deadline > Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn third_permit_waits_for_a_release() {
        let throttler = Throttler::new(2);
        let first = throttler.acquire().await;
        let _second = throttler.acquire().await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), throttler.acquire()).await;
        assert!(blocked.is_err(), "no permit should be available");

        drop(first);
        let third = tokio::time::timeout(Duration::from_millis(500), throttler.acquire()).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn pause_holds_back_new_permits() {
        let throttler = Throttler::new(5);
        assert!(throttler.pause_for(Duration::from_millis(200)));
        assert!(throttler.is_paused());

        let start = Instant::now();
        let _permit = throttler.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(150));
        assert!(!throttler.is_paused());
    }

    #[tokio::test]
    async fn shorter_pause_does_not_override_longer() {
        let throttler = Throttler::new(1);
        assert!(throttler.pause_for(Duration::from_secs(10)));
        assert!(!throttler.pause_for(Duration::from_millis(10)));
        assert!(throttler.pause_for(Duration::from_secs(20)));
    }
}
