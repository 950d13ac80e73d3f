//! Requests-per-minute throttle. Spaces calls at least `60s / rpm` apart.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// `None` for a zero rate, which would never admit a call
    pub fn per_minute(rpm: u32) -> Option<Self> {
        if rpm == 0 {
            return None;
        }
        Some(Self {
            interval: Duration::from_secs(60) / rpm,
            next_slot: Mutex::new(None),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next call is allowed
    pub async fn acquire(&self) {
        let mut next_slot = self.next_slot.lock().await;
        let now = Instant::now();
        let start = match *next_slot {
            Some(slot) if slot > now => {
                tracing::debug!(wait_ms = (slot - now).as_millis() as u64, "Rate limit wait");
                tokio::time::sleep_until(slot).await;
                slot
            }
            _ => now,
        };
        *next_slot = Some(start + self.interval);
    }
}
