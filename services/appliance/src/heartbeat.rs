//! Status LED heartbeat of the main context.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

const TAG: &str = "Main";

/// LED on 200 ms, off 100 ms, on 200 ms, off 1000 ms.
pub const HEARTBEAT_PATTERN: [(bool, u64); 4] = [(true, 200), (false, 100), (true, 200), (false, 1000)];

/// Blinks a (simulated) status LED in a fixed pattern.
pub struct Heartbeat {
    pattern: Vec<(bool, Duration)>,
    led: AtomicBool,
    beats: AtomicU64,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self::with_pattern(
            HEARTBEAT_PATTERN
                .iter()
                .map(|&(on, ms)| (on, Duration::from_millis(ms)))
                .collect(),
        )
    }

    pub fn with_pattern(pattern: Vec<(bool, Duration)>) -> Self {
        Self {
            pattern,
            led: AtomicBool::new(false),
            beats: AtomicU64::new(0),
        }
    }

    pub fn led(&self) -> bool {
        self.led.load(Ordering::Acquire)
    }

    /// Completed patterns.
    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Acquire)
    }

    /// Play the pattern once.
    pub async fn beat(&self) {
        for &(on, hold) in &self.pattern {
            self.led.store(on, Ordering::Release);
            log::trace!(target: TAG, "LED {}", if on { "on" } else { "off" });
            tokio::time::sleep(hold).await;
        }
        self.beats.fetch_add(1, Ordering::AcqRel);
    }

    /// Play the pattern forever. An empty pattern just idles.
    pub async fn run(&self) {
        loop {
            if self.pattern.is_empty() {
                tokio::time::sleep(Duration::from_secs(1)).await;
            } else {
                self.beat().await;
            }
        }
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pattern() {
        let heartbeat = Heartbeat::new();
        let total: Duration = heartbeat.pattern.iter().map(|(_, d)| *d).sum();
        assert_eq!(total, Duration::from_millis(1500));
        assert_eq!(heartbeat.pattern[0], (true, Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_beat_ends_with_led_off() {
        let heartbeat = Heartbeat::with_pattern(vec![
            (true, Duration::from_millis(1)),
            (false, Duration::from_millis(1)),
        ]);
        heartbeat.beat().await;
        heartbeat.beat().await;
        assert_eq!(heartbeat.beats(), 2);
        assert!(!heartbeat.led());
    }

    #[tokio::test]
    async fn test_run_keeps_beating() {
        let heartbeat = Heartbeat::with_pattern(vec![(true, Duration::from_millis(1))]);
        let _ = tokio::time::timeout(Duration::from_millis(50), heartbeat.run()).await;
        assert!(heartbeat.beats() >= 2);
    }
}
