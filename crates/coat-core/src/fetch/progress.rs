//! Wall-clock throttled progress reporting

use std::time::{Duration, Instant};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Accumulates downloaded byte counts and emits cumulative megabytes at most
/// once per `interval`.
///
/// Each download gets its own throttle; they are never shared between
/// concurrent fetches.
pub struct ProgressThrottle<F: FnMut(f64)> {
    interval: Duration,
    last_emit: Instant,
    total_bytes: u64,
    emit: F,
}

impl<F: FnMut(f64)> ProgressThrottle<F> {
    pub fn new(interval: Duration, emit: F) -> Self {
        Self::starting_at(interval, Instant::now(), emit)
    }

    /// One emission per second
    pub fn per_second(emit: F) -> Self {
        Self::new(Duration::from_secs(1), emit)
    }

    fn starting_at(interval: Duration, start: Instant, emit: F) -> Self {
        Self {
            interval,
            last_emit: start,
            total_bytes: 0,
            emit,
        }
    }

    pub fn record(&mut self, bytes: u64) {
        self.record_at(bytes, Instant::now());
    }

    fn record_at(&mut self, bytes: u64, now: Instant) {
        self.total_bytes += bytes;
        if now.saturating_duration_since(self.last_emit) >= self.interval {
            self.last_emit = now;
            (self.emit)(self.total_bytes as f64 / BYTES_PER_MEGABYTE);
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_at_most_once_per_interval() {
        let start = Instant::now();
        let mut emitted = Vec::new();
        {
            let mut throttle =
                ProgressThrottle::starting_at(Duration::from_secs(1), start, |mb| emitted.push(mb));

            throttle.record_at(512 * 1024, start + Duration::from_millis(200));
            throttle.record_at(512 * 1024, start + Duration::from_millis(1000));
            throttle.record_at(1024 * 1024, start + Duration::from_millis(1500));
            throttle.record_at(1024 * 1024, start + Duration::from_millis(2100));
            assert_eq!(throttle.total_bytes(), 3 * 1024 * 1024);
        }
        assert_eq!(emitted, vec![1.0, 3.0]);
    }

    #[test]
    fn test_nothing_emitted_before_interval() {
        let start = Instant::now();
        let mut count = 0;
        {
            let mut throttle =
                ProgressThrottle::starting_at(Duration::from_secs(1), start, |_| count += 1);
            for ms in 0..10 {
                throttle.record_at(10, start + Duration::from_millis(ms * 50));
            }
        }
        assert_eq!(count, 0);
    }
}
