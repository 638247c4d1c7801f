//! Elapsed-seconds session timer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Counts whole seconds while running.
#[derive(Debug, Default)]
pub struct SessionTimer {
    elapsed: Arc<AtomicU64>,
    ticker: Option<JoinHandle<()>>,
}

impl SessionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking once per second. Calling again while running is a no-op.
    pub fn start(&mut self) {
        if self.ticker.is_some() {
            return;
        }

        let elapsed = self.elapsed.clone();
        self.ticker = Some(tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                elapsed.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    /// Halt the counter, keeping the current value.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed.load(Ordering::Relaxed)
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Format seconds as `"{minutes}m {seconds:02}s"`.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}m {:02}s", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "0m 00s");
        assert_eq!(format_elapsed(9), "0m 09s");
        assert_eq!(format_elapsed(75), "1m 15s");
        assert_eq!(format_elapsed(3600), "60m 00s");
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_second() {
        let mut timer = SessionTimer::new();
        timer.start();
        settle().await;

        tokio::time::advance(Duration::from_millis(3500)).await;
        settle().await;
        assert_eq!(timer.elapsed(), 3);

        timer.stop();
        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(timer.elapsed(), 3);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_does_not_double_tick() {
        let mut timer = SessionTimer::new();
        timer.start();
        timer.start();
        settle().await;

        tokio::time::advance(Duration::from_millis(2500)).await;
        settle().await;
        assert_eq!(timer.elapsed(), 2);
    }
}
