//! Queue of buffer headers backing a pool.

use crate::buffer::BufferHeader;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

/// A FIFO queue of buffer headers.
#[derive(Default)]
pub struct Queue {
    inner: Mutex<VecDeque<BufferHeader>>,
    available: Condvar,
}

impl Queue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a buffer header.
    pub fn put(&self, buffer: BufferHeader) {
        self.inner.lock().push_back(buffer);
        self.available.notify_one();
    }

    /// Take the oldest buffer header, without blocking.
    pub fn get(&self) -> Option<BufferHeader> {
        self.inner.lock().pop_front()
    }

    /// Take the oldest buffer header, waiting up to `timeout` for one to
    /// arrive.
    pub fn get_timeout(&self, timeout: Duration) -> Option<BufferHeader> {
        let mut queue = self.inner.lock();
        if let Some(buffer) = queue.pop_front() {
            return Some(buffer);
        }
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if self.available.wait_until(&mut queue, deadline).timed_out() {
                return queue.pop_front();
            }
            if let Some(buffer) = queue.pop_front() {
                return Some(buffer);
            }
        }
    }

    /// Number of queued buffer headers.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
