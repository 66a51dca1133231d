//! Fixed-interval request gate
//!
//! Every outbound request to a host waits on the same gate, so at most one
//! request starts per `min_interval`. Slots are reserved under the lock and
//! the wait happens after it is released, which keeps callers ordered without
//! holding a mutex across an await point.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RateGate {
    min_interval: Duration,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Gate that never waits (tests, local mirrors)
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next request may start
    pub async fn acquire(&self) {
        let wait = self.reserve(Instant::now());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Claim the next slot and return how long the caller must wait for it
    fn reserve(&self, now: Instant) -> Duration {
        let mut next = self.next_slot.lock();
        let slot = match *next {
            Some(at) if at > now => at,
            _ => now,
        };
        *next = Some(slot + self.min_interval);
        slot - now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let gate = RateGate::new(Duration::from_millis(100));
        let start = Instant::now();
        gate.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_requests_are_spaced() {
        let gate = RateGate::new(Duration::from_millis(100));
        let start = Instant::now();
        for _ in 0..5 {
            gate.acquire().await;
        }
        // Slots at 0, 100, 200, 300, 400
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(400));
        assert!(elapsed < Duration::from_millis(450));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_gap_resets_wait() {
        let gate = RateGate::new(Duration::from_millis(100));
        gate.acquire().await;
        tokio::time::sleep(Duration::from_millis(250)).await;

        let before = Instant::now();
        gate.acquire().await;
        assert!(before.elapsed() < Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_one_checkpoint() {
        let gate = RateGate::new(Duration::from_millis(100));
        let other = gate.clone();
        let start = Instant::now();
        gate.acquire().await;
        other.acquire().await;
        gate.acquire().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(250));
    }

    #[test]
    fn test_reserve_accumulates_under_burst() {
        let gate = RateGate::new(Duration::from_millis(50));
        let now = Instant::now();
        assert_eq!(gate.reserve(now), Duration::ZERO);
        assert_eq!(gate.reserve(now), Duration::from_millis(50));
        assert_eq!(gate.reserve(now), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_unlimited_gate_never_waits() {
        let gate = RateGate::unlimited();
        let start = std::time::Instant::now();
        for _ in 0..50 {
            gate.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
