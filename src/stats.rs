//! Per-port buffer statistics collected by the core.

use std::sync::OnceLock;
use std::time::Instant;

/// Direction of the statistics counters on a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatsDir {
    /// Buffers received by the port (accepted sends).
    #[default]
    Rx,
    /// Buffers transmitted by the port (completions).
    Tx,
}

/// Counters for one direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoreStats {
    /// Number of buffers that passed through.
    pub buffer_count: u64,
    /// Time the first buffer was seen, in microseconds. Zero means no
    /// buffer has been seen yet.
    pub first_buffer_time: u64,
    /// Time the most recent buffer was seen, in microseconds.
    pub last_buffer_time: u64,
    /// Largest observed delay between two consecutive buffers, in
    /// microseconds.
    pub max_delay: u64,
}

impl CoreStats {
    /// Record one buffer at time `now` (microseconds).
    pub(crate) fn record(&mut self, now: u64) {
        self.buffer_count += 1;
        if self.first_buffer_time == 0 {
            self.first_buffer_time = now;
            self.last_buffer_time = now;
        } else {
            self.max_delay = self.max_delay.max(now - self.last_buffer_time);
            self.last_buffer_time = now;
        }
    }
}

/// RX and TX counters of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortStats {
    /// Receive side.
    pub rx: CoreStats,
    /// Transmit side.
    pub tx: CoreStats,
}

/// Microseconds on a monotonic clock.
///
/// Starts at 1 so that a zero `first_buffer_time` can mean "unset".
pub(crate) fn monotonic_micros() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64 + 1
}
