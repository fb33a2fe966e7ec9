//! Link Monitor - tracks when the last channel frame arrived from the receiver
//!
//! Uses monotonic time anchored to the first call, stored in an `AtomicU64`
//! so the decoder thread can update it without locking.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static APP_START: OnceLock<Instant> = OnceLock::new();

fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// Receiver link health monitor
pub struct LinkMonitor {
    last_frame: AtomicU64,
    frames_seen: AtomicU64,
    timeout: Duration,
}

impl LinkMonitor {
    /// Create a monitor that reports the link lost after `timeout` without frames
    ///
    /// ```
    /// # use rover_driver::LinkMonitor;
    /// # use std::time::Duration;
    /// let monitor = LinkMonitor::new(Duration::from_millis(500));
    /// assert!(!monitor.has_received_frame());
    /// ```
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_frame: AtomicU64::new(monotonic_micros()),
            frames_seen: AtomicU64::new(0),
            timeout,
        }
    }

    /// Record that a channel frame was decoded
    pub fn register_frame(&self) {
        self.last_frame.store(monotonic_micros(), Ordering::Relaxed);
        self.frames_seen.fetch_add(1, Ordering::Relaxed);
    }

    /// True if a frame arrived within the timeout window
    pub fn is_alive(&self) -> bool {
        self.time_since_last_frame() < self.timeout
    }

    pub fn has_received_frame(&self) -> bool {
        self.frames_seen.load(Ordering::Relaxed) > 0
    }

    pub fn time_since_last_frame(&self) -> Duration {
        let last_us = self.last_frame.load(Ordering::Relaxed);
        Duration::from_micros(monotonic_micros().saturating_sub(last_us))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
