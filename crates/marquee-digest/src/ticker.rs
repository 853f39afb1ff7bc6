//! # Ticker
//!
//! A single re-armable deadline. Re-arming replaces the previous deadline in
//! one step, so there is never more than one pending tick.
//!
//! ```text
//!   arm(15m) ──────────────────────────────► tick
//!                  set_period(5m) ──────► tick ─────► tick
//!                  (old deadline discarded)
//! ```

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Latest deadline the ticker will arm, about 30 years out.
pub const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Repeating timer driven from the scheduler loop.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    deadline: Option<Instant>,
}

impl Ticker {
    /// Creates a disarmed ticker.
    pub fn new(period: Duration) -> Self {
        Ticker {
            period,
            deadline: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Arms the ticker to fire one period from now.
    ///
    /// Periods longer than [`FAR_FUTURE`] are clamped to it.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.period.min(FAR_FUTURE));
    }

    /// Changes the period. An armed ticker is re-armed from now.
    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
        if self.is_armed() {
            self.arm();
        }
    }

    /// Cancels the pending tick.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Waits for the deadline. Never completes while disarmed.
    ///
    /// The deadline is consumed; call [`Ticker::arm`] to schedule the next
    /// tick. Cancel-safe.
    pub async fn tick(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_period() {
        let mut ticker = Ticker::new(Duration::from_secs(60));
        ticker.arm();

        assert!(timeout(Duration::from_secs(59), ticker.tick()).await.is_err());
        assert!(ticker.is_armed());
        assert!(timeout(Duration::from_secs(2), ticker.tick()).await.is_ok());
        assert!(!ticker.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_never_fires() {
        let mut ticker = Ticker::new(Duration::from_secs(1));
        assert!(timeout(Duration::from_secs(3600), ticker.tick()).await.is_err());

        ticker.arm();
        ticker.disarm();
        assert!(timeout(Duration::from_secs(3600), ticker.tick()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_period_replaces_deadline() {
        let mut ticker = Ticker::new(Duration::from_secs(900));
        ticker.arm();

        tokio::time::advance(Duration::from_secs(100)).await;
        ticker.set_period(Duration::from_secs(300));
        ticker.set_period(Duration::from_secs(300));

        // Old 900s deadline is gone; the new one is 300s after the change
        assert!(timeout(Duration::from_secs(299), ticker.tick()).await.is_err());
        assert!(timeout(Duration::from_secs(2), ticker.tick()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_period_on_disarmed_ticker_stays_disarmed() {
        let mut ticker = Ticker::new(Duration::from_secs(10));
        ticker.set_period(Duration::from_secs(5));
        assert!(!ticker.is_armed());
        assert_eq!(ticker.period(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_period_is_clamped() {
        let mut ticker = Ticker::new(Duration::MAX);
        ticker.arm();
        assert!(ticker.is_armed());
        assert!(timeout(Duration::from_secs(86_400 * 365), ticker.tick()).await.is_err());

        ticker.set_period(Duration::from_secs(u64::MAX));
        assert!(ticker.is_armed());
    }
}
