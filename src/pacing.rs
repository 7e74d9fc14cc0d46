//! Call spacing for sequential provider traffic.
//!
//! Meeting-series generation and batch evaluation are deliberately
//! sequential with a fixed gap between external calls: the spacing is the
//! backpressure that keeps the upstream provider's rate limits happy.
//! `Pacer` makes that spacing a policy object instead of inline sleeps,
//! with the same externally observed cadence.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum-interval pacer shared by series/batch operations.
///
/// `acquire` returns immediately on first use, then never lets two
/// acquisitions complete closer together than the configured interval.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Wait until the configured interval has elapsed since the previous
    /// acquisition.
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
