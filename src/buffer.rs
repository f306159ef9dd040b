//! Buffer headers: the descriptors exchanged between ports.
//!
//! A buffer header references a payload, a valid byte range inside it,
//! timestamps, flags and an optional event identifier. Headers move by
//! value: sending one to a port hands it to the component, which gives it
//! back through the port's buffer-header callback. [`BufferHeader::release`]
//! returns a header to the pool it was drawn from.

use crate::component::Component;
use crate::events::EventBody;
use crate::fourcc::FourCc;
use crate::pool::PoolInner;
use crate::port::Port;
use bitflags::bitflags;
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};
use tracing::trace;

/// Value representing an unknown timestamp.
pub const TIME_UNKNOWN: i64 = i64::MIN;

bitflags! {
    /// Flags describing the contents of a buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u32 {
        /// End of stream.
        const EOS = 0x0001;
        /// First byte of a frame.
        const FRAME_START = 0x0002;
        /// Last byte of a frame.
        const FRAME_END = 0x0004;
        /// A complete frame.
        const FRAME = Self::FRAME_START.bits() | Self::FRAME_END.bits();
        /// A keyframe.
        const KEYFRAME = 0x0008;
        /// Discontinuity in the stream.
        const DISCONTINUITY = 0x0010;
        /// Codec configuration data rather than stream payload.
        const CONFIG = 0x0020;
        /// Payload is corrupted or transmission failed.
        const CORRUPTED = 0x0040;
    }
}

/// Payload memory referenced by a buffer header.
///
/// Payloads allocated through a port keep the owning component alive until
/// they are dropped; payloads allocated by a module allocator are returned
/// to it on drop.
pub struct Payload {
    data: Vec<u8>,
    /// Present when a module allocator produced the bytes.
    module_free: Option<Weak<Port>>,
    _keepalive: Option<Arc<Component>>,
}

impl Payload {
    /// Wrap an existing byte vector.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data,
            module_free: None,
            _keepalive: None,
        }
    }

    /// Heap-allocated, zero-filled payload holding the component alive.
    pub(crate) fn heap(size: usize, component: Arc<Component>) -> Self {
        Self {
            data: vec![0; size],
            module_free: None,
            _keepalive: Some(component),
        }
    }

    /// Payload produced by a module allocator.
    pub(crate) fn from_module(data: Vec<u8>, port: Weak<Port>, component: Arc<Component>) -> Self {
        Self {
            data,
            module_free: Some(port),
            _keepalive: Some(component),
        }
    }

    /// Number of bytes in the payload.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Deref for Payload {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for Payload {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for Payload {
    fn drop(&mut self) {
        if let Some(port) = self.module_free.take().and_then(|p| p.upgrade()) {
            port.module_payload_free(mem::take(&mut self.data));
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload").field("len", &self.len()).finish()
    }
}

/// A buffer header.
pub struct BufferHeader {
    /// Event identifier; `None` for data buffers.
    pub cmd: Option<FourCc>,
    /// Number of valid bytes in the payload.
    pub length: usize,
    /// Offset of the first valid byte in the payload.
    pub offset: usize,
    /// Content flags.
    pub flags: BufferFlags,
    /// Presentation timestamp in microseconds, or [`TIME_UNKNOWN`].
    pub pts: i64,
    /// Decode timestamp in microseconds, or [`TIME_UNKNOWN`].
    pub dts: i64,
    data: Option<Payload>,
    event: Option<Box<EventBody>>,
    owner: Option<Weak<PoolInner>>,
}

impl BufferHeader {
    /// Create a buffer header referencing the given payload.
    pub fn new(payload: Payload) -> Self {
        Self {
            cmd: None,
            length: 0,
            offset: 0,
            flags: BufferFlags::empty(),
            pts: TIME_UNKNOWN,
            dts: TIME_UNKNOWN,
            data: Some(payload),
            event: None,
            owner: None,
        }
    }

    /// Create a buffer header with no payload, for pass-through ports.
    pub fn empty() -> Self {
        Self {
            cmd: None,
            length: 0,
            offset: 0,
            flags: BufferFlags::empty(),
            pts: TIME_UNKNOWN,
            dts: TIME_UNKNOWN,
            data: None,
            event: None,
            owner: None,
        }
    }

    /// Create a buffer header owning the given bytes, with `length` set to
    /// the full payload.
    pub fn with_data(data: Vec<u8>) -> Self {
        let mut buffer = Self::new(Payload::from_vec(data));
        buffer.length = buffer.alloc_size();
        buffer
    }

    /// Get the payload bytes, if any.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Get the payload bytes mutably, if any.
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        self.data.as_deref_mut()
    }

    /// Size of the allocated payload, 0 when there is none.
    pub fn alloc_size(&self) -> usize {
        self.data.as_ref().map(Payload::len).unwrap_or(0)
    }

    /// Check whether this header carries an event.
    pub fn is_event(&self) -> bool {
        self.cmd.is_some()
    }

    /// Typed event contents, if any.
    pub fn event_body(&self) -> Option<&EventBody> {
        self.event.as_deref()
    }

    /// Typed event contents mutably, if any.
    pub fn event_body_mut(&mut self) -> Option<&mut EventBody> {
        self.event.as_deref_mut()
    }

    /// Attach typed event contents.
    pub fn set_event(&mut self, body: EventBody) {
        self.event = Some(Box::new(body));
    }

    /// Reset the header for reuse: clears `cmd`, `length`, `offset`,
    /// `flags` and both timestamps. The payload is kept.
    pub fn reset(&mut self) {
        self.cmd = None;
        self.length = 0;
        self.offset = 0;
        self.flags = BufferFlags::empty();
        self.pts = 0;
        self.dts = 0;
        self.event = None;
    }

    /// Return this header to the pool it was drawn from.
    ///
    /// Headers without an owning pool (or whose pool has been destroyed)
    /// are simply dropped.
    pub fn release(self) {
        match self.owner.clone().and_then(|w| w.upgrade()) {
            Some(pool) => pool.release(self),
            None => trace!("releasing unpooled buffer header"),
        }
    }

    pub(crate) fn set_owner(&mut self, owner: Weak<PoolInner>) {
        self.owner = Some(owner);
    }
}

impl fmt::Debug for BufferHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferHeader")
            .field("cmd", &self.cmd)
            .field("alloc_size", &self.alloc_size())
            .field("length", &self.length)
            .field("offset", &self.offset)
            .field("flags", &self.flags)
            .field("pts", &self.pts)
            .field("dts", &self.dts)
            .finish()
    }
}
