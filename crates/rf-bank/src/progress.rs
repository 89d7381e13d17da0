//! Progress Reporting
//!
//! Workers report through a throttled callback; the coordinator drains a
//! shared channel at low frequency and logs totals.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

/// Default minimum interval between progress reports
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Shortest wait the watcher will block for between drains
pub const MIN_WATCH_INTERVAL: Duration = Duration::from_millis(5);

// ═══════════════════════════════════════════════════════════════════════════════
// THROTTLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Accumulates progress and invokes the callback at most once per interval
pub struct ProgressThrottle<F: FnMut(u64)> {
    interval: Duration,
    last: Instant,
    pending: u64,
    reported: u64,
    callback: F,
}

impl<F: FnMut(u64)> ProgressThrottle<F> {
    pub fn new(interval: Duration, callback: F) -> Self {
        Self {
            interval,
            last: Instant::now(),
            pending: 0,
            reported: 0,
            callback,
        }
    }

    /// Record `delta` units, reporting if the interval has elapsed
    #[inline]
    pub fn advance(&mut self, delta: u64) {
        self.pending += delta;
        if self.pending > 0 && self.last.elapsed() >= self.interval {
            self.flush();
        }
    }

    /// Report whatever is still pending
    pub fn finish(&mut self) {
        if self.pending > 0 {
            self.flush();
        }
    }

    /// Units reported so far
    pub fn reported(&self) -> u64 {
        self.reported
    }

    /// Units recorded so far, reported or pending
    pub fn seen(&self) -> u64 {
        self.reported + self.pending
    }

    fn flush(&mut self) {
        (self.callback)(self.pending);
        self.reported += self.pending;
        self.pending = 0;
        self.last = Instant::now();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WATCHER
// ═══════════════════════════════════════════════════════════════════════════════

/// Drain progress deltas until every sender is dropped, logging totals
/// at most once per `interval`. Returns the total received.
pub fn watch_progress(label: &str, rx: Receiver<u64>, total: u64, interval: Duration) -> u64 {
    let interval = watch_interval(interval);
    let mut done = 0u64;
    let mut last_log = Instant::now();

    loop {
        match rx.recv_timeout(interval) {
            Ok(delta) => {
                done += delta;
            }
            Err(RecvTimeoutError::Timeout) => {
                // Nothing arrived, still log below
            }
            Err(RecvTimeoutError::Disconnected) => {
                break;
            }
        }

        if last_log.elapsed() >= interval {
            log_progress(label, done, total);
            last_log = Instant::now();
        }
    }

    log_progress(label, done, total);
    done
}

/// Interval clamped to [`MIN_WATCH_INTERVAL`]
fn watch_interval(interval: Duration) -> Duration {
    interval.max(MIN_WATCH_INTERVAL)
}

fn log_progress(label: &str, done: u64, total: u64) {
    if total > 0 {
        let percent = done as f64 / total as f64 * 100.0;
        log::info!("{label}: {done}/{total} ({percent:.1}%)");
    } else {
        log::info!("{label}: {done}");
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_holds_until_finish() {
        let mut calls = Vec::new();
        {
            let mut throttle = ProgressThrottle::new(Duration::from_secs(3600), |n| calls.push(n));
            throttle.advance(3);
            throttle.advance(4);
            assert_eq!(throttle.reported(), 0);
            throttle.finish();
            assert_eq!(throttle.reported(), 7);
            throttle.finish();
        }
        assert_eq!(calls, vec![7]);
    }

    #[test]
    fn test_zero_interval_reports_every_advance() {
        let mut calls = Vec::new();
        {
            let mut throttle = ProgressThrottle::new(Duration::ZERO, |n| calls.push(n));
            throttle.advance(1);
            throttle.advance(2);
            throttle.advance(0);
            throttle.finish();
        }
        assert_eq!(calls, vec![1, 2]);
    }

    #[test]
    fn test_watch_interval_has_floor() {
        assert_eq!(watch_interval(Duration::ZERO), MIN_WATCH_INTERVAL);
        assert_eq!(watch_interval(Duration::from_millis(1)), MIN_WATCH_INTERVAL);
        assert_eq!(watch_interval(DEFAULT_PROGRESS_INTERVAL), DEFAULT_PROGRESS_INTERVAL);
    }

    #[test]
    fn test_zero_interval_watcher_still_sums() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let producer = std::thread::spawn(move || {
            for _ in 0..10 {
                tx.send(3).unwrap();
            }
        });
        let done = watch_progress("zero", rx, 30, Duration::ZERO);
        producer.join().unwrap();
        assert_eq!(done, 30);
    }

    #[test]
    fn test_watcher_sums_until_disconnect() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let tx = tx.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        tx.send(5).unwrap();
                    }
                })
            })
            .collect();
        drop(tx);

        let total = watch_progress("test", rx, 200, Duration::from_millis(5));
        for producer in producers {
            producer.join().unwrap();
        }
        assert_eq!(total, 200);
    }
}
