//! Shared mock component module for the integration tests.
#![allow(dead_code)]

use mediahub::{
    BufferCallback, BufferHeader, Error, EventBody, FourCc, Port, PortModule, Result, SendError,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Mock port module: holds every accepted buffer until the test completes
/// it, with switchable failure injection.
#[derive(Clone, Default)]
pub struct MockModule {
    inner: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    held: Mutex<VecDeque<BufferHeader>>,
    port: Mutex<Option<Weak<Port>>>,
    accepted: AtomicUsize,
    set_format_calls: AtomicUsize,
    fail_send: AtomicBool,
    fail_enable: AtomicBool,
    fail_disable: AtomicBool,
    fail_set_format: AtomicBool,
    no_drain_on_disable: AtomicBool,
}

impl MockModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep held buffers across a disable instead of returning them, so
    /// tests can exercise the transit drain gate themselves.
    pub fn set_drain_on_disable(&self, drain: bool) {
        self.inner.no_drain_on_disable.store(!drain, Ordering::SeqCst);
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.inner.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_enable(&self, fail: bool) {
        self.inner.fail_enable.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_disable(&self, fail: bool) {
        self.inner.fail_disable.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_set_format(&self, fail: bool) {
        self.inner.fail_set_format.store(fail, Ordering::SeqCst);
    }

    /// Number of buffers currently held by the module.
    pub fn held(&self) -> usize {
        self.inner.held.lock().len()
    }

    /// Number of buffers the module has accepted over its lifetime.
    pub fn accepted(&self) -> usize {
        self.inner.accepted.load(Ordering::SeqCst)
    }

    /// Number of format commits that reached the module.
    pub fn set_format_calls(&self) -> usize {
        self.inner.set_format_calls.load(Ordering::SeqCst)
    }

    /// Event ids of the held buffers, oldest first.
    pub fn held_cmds(&self) -> Vec<Option<FourCc>> {
        self.inner.held.lock().iter().map(|b| b.cmd).collect()
    }

    /// Return the oldest held buffer through the port's completion path.
    pub fn complete_one(&self) -> bool {
        let Some(buffer) = self.inner.held.lock().pop_front() else {
            return false;
        };
        let port = self
            .inner
            .port
            .lock()
            .clone()
            .and_then(|p| p.upgrade())
            .expect("module completed a buffer on a dead port");
        port.buffer_header_callback(buffer);
        true
    }

    /// Return every held buffer through the port's completion path.
    pub fn complete_all(&self) {
        while self.complete_one() {}
    }
}

impl PortModule for MockModule {
    fn enable(&self, port: &Arc<Port>) -> Result<()> {
        if self.inner.fail_enable.load(Ordering::SeqCst) {
            return Err(Error::OutOfResources);
        }
        *self.inner.port.lock() = Some(Arc::downgrade(port));
        Ok(())
    }

    fn disable(&self, port: &Arc<Port>) -> Result<()> {
        if self.inner.fail_disable.load(Ordering::SeqCst) {
            return Err(Error::OutOfResources);
        }
        if !self.inner.no_drain_on_disable.load(Ordering::SeqCst) {
            loop {
                let Some(buffer) = self.inner.held.lock().pop_front() else {
                    break;
                };
                port.buffer_header_callback(buffer);
            }
        }
        Ok(())
    }

    fn send(&self, _port: &Arc<Port>, buffer: BufferHeader) -> std::result::Result<(), SendError> {
        if self.inner.fail_send.load(Ordering::SeqCst) {
            return Err(SendError::new(Error::OutOfResources, buffer));
        }
        self.inner.held.lock().push_back(buffer);
        self.inner.accepted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn flush(&self, port: &Arc<Port>) -> Result<()> {
        loop {
            let Some(buffer) = self.inner.held.lock().pop_front() else {
                break;
            };
            port.buffer_header_callback(buffer);
        }
        Ok(())
    }

    fn set_format(&self, _port: &Arc<Port>) -> Result<()> {
        self.inner.set_format_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_set_format.load(Ordering::SeqCst) {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }
}

/// What a client callback observed.
#[derive(Default)]
pub struct Collector {
    count: AtomicUsize,
    cmds: Mutex<Vec<Option<FourCc>>>,
    errors: Mutex<Vec<Error>>,
}

impl Collector {
    /// Number of buffers delivered to the callback.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Event ids of the delivered buffers, in delivery order.
    pub fn cmds(&self) -> Vec<Option<FourCc>> {
        self.cmds.lock().clone()
    }

    /// Error-event statuses delivered to the callback.
    pub fn errors(&self) -> Vec<Error> {
        self.errors.lock().clone()
    }
}

/// Build a client callback that records deliveries and releases each
/// buffer back to its pool.
pub fn collector() -> (BufferCallback, Arc<Collector>) {
    let state = Arc::new(Collector::default());
    let sink = Arc::clone(&state);
    let callback: BufferCallback = Arc::new(move |_port: &Arc<Port>, buffer: BufferHeader| {
        sink.count.fetch_add(1, Ordering::SeqCst);
        sink.cmds.lock().push(buffer.cmd);
        if let Some(EventBody::Error(status)) = buffer.event_body() {
            sink.errors.lock().push(*status);
        }
        buffer.release();
    });
    (callback, state)
}
