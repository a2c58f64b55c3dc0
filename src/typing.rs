//! Partner typing indicator timer
//!
//! A single restartable deadline. The engine polls `expired()` inside its
//! select loop; because the future is rebuilt from the current deadline on
//! every iteration, restarting always replaces the previous countdown.

use std::future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Single-shot, restartable quiet-period timer
#[derive(Debug)]
pub struct TypingTimer {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl TypingTimer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    /// Start the countdown from zero, dropping any pending one
    pub fn restart(&mut self) {
        self.deadline = Some(Instant::now() + self.quiet);
    }

    /// Stop any pending countdown
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves when the pending countdown elapses; never resolves when idle.
    ///
    /// Does not clear the deadline. Callers call `cancel()` once it fires.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::time::{advance, timeout};

    const QUIET: Duration = Duration::from_millis(1200);

    fn assert_elapsed(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed <= expected + Duration::from_millis(1),
            "elapsed {:?}, expected {:?}",
            elapsed,
            expected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_quiet_period() {
        let mut timer = TypingTimer::new(QUIET);
        let start = Instant::now();

        timer.restart();
        timer.expired().await;

        assert_elapsed(start, QUIET);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_debounces() {
        let mut timer = TypingTimer::new(QUIET);
        let start = Instant::now();

        timer.restart();
        advance(Duration::from_millis(200)).await;
        timer.restart();

        // Still pending when the first countdown would have fired
        advance(Duration::from_millis(1100)).await;
        assert!(timeout(Duration::ZERO, timer.expired()).await.is_err());

        timer.expired().await;
        assert_elapsed(start, Duration::from_millis(1400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_never_fires() {
        let mut timer = TypingTimer::new(QUIET);
        timer.restart();
        timer.cancel();

        assert!(!timer.is_armed());
        assert!(timeout(Duration::from_secs(10), timer.expired()).await.is_err());
    }
}
