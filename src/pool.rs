//! Pools of pre-allocated buffer headers.
//!
//! A pool owns a set of buffer headers backed by a queue. Headers drawn
//! from the queue find their way back through [`BufferHeader::release`],
//! at which point an optional release callback gets first refusal on the
//! header. Dropping the pool destroys it; headers still in flight are
//! plainly dropped when they are next released.

use crate::buffer::{BufferHeader, Payload};
use crate::error::Result;
use crate::port::Port;
use crate::queue::Queue;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// Release callback installed on a pool.
///
/// Invoked with the header being released; returns `Some(header)` iff the
/// header should remain in the pool (it is then queued), or `None` when
/// the callback consumed it, typically by resubmitting it to a port.
pub type PoolCallback = Arc<dyn Fn(BufferHeader) -> Option<BufferHeader> + Send + Sync>;

pub(crate) struct PoolInner {
    queue: Queue,
    callback: Mutex<Option<PoolCallback>>,
}

impl PoolInner {
    /// Run a released header through the callback, or queue it.
    pub(crate) fn release(self: &Arc<Self>, buffer: BufferHeader) {
        let callback = self.callback.lock().clone();
        match callback {
            Some(cb) => {
                if let Some(buffer) = cb(buffer) {
                    self.queue.put(buffer);
                }
            }
            None => self.queue.put(buffer),
        }
    }
}

/// A pool of buffer headers.
pub struct Pool {
    inner: Arc<PoolInner>,
    headers: u32,
}

impl Pool {
    /// Create a pool of `headers` buffer headers, each backed by a plain
    /// heap payload of `payload_size` bytes (no payload when 0).
    pub fn new(headers: u32, payload_size: usize) -> Pool {
        let pool = Self::empty_pool(headers);
        for _ in 0..headers {
            let mut buffer = if payload_size == 0 {
                BufferHeader::empty()
            } else {
                BufferHeader::new(Payload::from_vec(vec![0; payload_size]))
            };
            buffer.set_owner(Arc::downgrade(&pool.inner));
            pool.inner.queue.put(buffer);
        }
        pool
    }

    /// Create a pool whose payloads are allocated through `port` (module
    /// allocator when present, heap otherwise). No payload memory is
    /// allocated when `payload_size` is 0.
    pub fn for_port(port: &Port, headers: u32, payload_size: usize) -> Result<Pool> {
        trace!(port = %port.name(), headers, payload_size, "creating port pool");

        let pool = Self::empty_pool(headers);
        for _ in 0..headers {
            let mut buffer = if payload_size == 0 {
                BufferHeader::empty()
            } else {
                BufferHeader::new(port.payload_alloc(payload_size)?)
            };
            buffer.set_owner(Arc::downgrade(&pool.inner));
            pool.inner.queue.put(buffer);
        }
        Ok(pool)
    }

    fn empty_pool(headers: u32) -> Pool {
        Pool {
            inner: Arc::new(PoolInner {
                queue: Queue::new(),
                callback: Mutex::new(None),
            }),
            headers,
        }
    }

    /// The queue holding the pool's available headers.
    pub fn queue(&self) -> &Queue {
        &self.inner.queue
    }

    /// Number of headers the pool was created with.
    pub fn headers(&self) -> u32 {
        self.headers
    }

    /// Install or remove the release callback.
    pub fn callback_set(&self, callback: Option<PoolCallback>) {
        *self.inner.callback.lock() = callback;
    }
}
