//! Throughput watchdog for a single body stream
//!
//! Measures the instantaneous rate of every written chunk. When a chunk
//! arrives slower than the configured floor the engine drops the
//! connection and reconnects, resuming where possible.

use std::time::Instant;

/// Guards against stalled-but-alive connections
#[derive(Debug, Clone)]
pub struct ThroughputWatchdog {
    /// Minimum acceptable bytes per second (0 = disabled)
    min_rate: u64,
    /// When the previous chunk was observed
    last_chunk: Instant,
}

impl ThroughputWatchdog {
    /// Start measuring from now
    pub fn new(min_rate: u64) -> Self {
        Self::starting_at(min_rate, Instant::now())
    }

    pub fn starting_at(min_rate: u64, start: Instant) -> Self {
        Self {
            min_rate,
            last_chunk: start,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.min_rate > 0
    }

    /// Record a chunk of `bytes` received now.
    ///
    /// Returns true when the chunk came in below the floor.
    pub fn is_too_slow(&mut self, bytes: usize) -> bool {
        self.observe_at(bytes, Instant::now())
    }

    /// Record a chunk of `bytes` received at `now`
    pub fn observe_at(&mut self, bytes: usize, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_chunk).as_secs_f64();
        self.last_chunk = now;

        if !self.is_enabled() {
            return false;
        }

        chunk_rate(bytes, elapsed) < self.min_rate as f64
    }
}

/// Bytes per second for one chunk; the small epsilon keeps
/// back-to-back chunks from dividing by zero.
pub fn chunk_rate(bytes: usize, elapsed_secs: f64) -> f64 {
    bytes as f64 / (elapsed_secs + 0.0001)
}
