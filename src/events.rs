//! Events delivered through buffer headers.
//!
//! An event is a buffer header whose `cmd` carries an event identifier.
//! Event buffers are drawn from the owning component's event pool and
//! delivered through the same callback path as data buffers. Typed event
//! contents travel in the header's event body; the wire representation of
//! payloads is out of scope here, but event buffers still honour the size
//! discipline of the payload they would carry.

use crate::buffer::BufferHeader;
use crate::component::Component;
use crate::error::{Error, Result};
use crate::format::{EsFormat, EsSpecific};
use crate::fourcc::FourCc;
use crate::port::Port;
use std::mem;
use tracing::{error, trace};

/// The format of the stream has changed mid-flight.
pub const FORMAT_CHANGED: FourCc = FourCc::new(*b"EFCH");
/// An asynchronous error was raised by a component.
pub const ERROR: FourCc = FourCc::new(*b"ERRO");
/// End of stream reached.
pub const EOS: FourCc = FourCc::new(*b"EEOS");

/// Typed contents of an event buffer.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum EventBody {
    /// Contents of a [`FORMAT_CHANGED`] event.
    FormatChanged(FormatChangedEvent),
    /// Contents of an [`ERROR`] event.
    Error(Error),
}

/// Contents of a format-changed event.
#[derive(Debug, Clone, Default)]
pub struct FormatChangedEvent {
    /// Minimum number of buffers the port requires after the change.
    pub buffer_num_min: u32,
    /// Minimum size of buffers the port requires after the change.
    pub buffer_size_min: usize,
    /// Number of buffers the port recommends after the change.
    pub buffer_num_recommended: u32,
    /// Size of buffers the port recommends after the change.
    pub buffer_size_recommended: usize,
    /// The new format.
    pub format: EsFormat,
}

impl FormatChangedEvent {
    /// Smallest event-buffer payload that can carry a format-changed
    /// event: the event fields plus a full format descriptor with its
    /// type-specific part.
    pub const ENCODED_SIZE: usize =
        mem::size_of::<Self>() + mem::size_of::<EsFormat>() + mem::size_of::<EsSpecific>();
}

/// Get the format-changed contents of an event buffer, if that is what it
/// carries.
pub fn format_changed_get(buffer: &BufferHeader) -> Option<&FormatChangedEvent> {
    if buffer.cmd != Some(FORMAT_CHANGED) {
        return None;
    }
    match buffer.event_body() {
        Some(EventBody::FormatChanged(event)) => Some(event),
        _ => None,
    }
}

impl Port {
    /// Draw a buffer from the owning component's event pool and stamp it
    /// with `event`.
    ///
    /// For [`FORMAT_CHANGED`] the buffer must be able to hold a full
    /// format-changed payload; it is zeroed, sized accordingly and seeded
    /// with a default event body. Returns [`Error::OutOfSpace`] when the
    /// event pool is exhausted or the buffer is too small.
    pub fn get_event(&self, event: FourCc) -> Result<BufferHeader> {
        let component = self.component().ok_or(Error::InvalidArgument)?;

        let Some(mut buffer) = component.event_pool().queue().get() else {
            error!(port = %self.name(), %event, "no event buffer left");
            return Err(Error::OutOfSpace);
        };

        buffer.cmd = Some(event);
        buffer.length = 0;

        if event == FORMAT_CHANGED {
            let size = FormatChangedEvent::ENCODED_SIZE;
            if buffer.alloc_size() < size {
                error!(
                    port = %self.name(),
                    alloc_size = buffer.alloc_size(),
                    needed = size,
                    "event buffer too small for format-changed payload"
                );
                buffer.release();
                return Err(Error::OutOfSpace);
            }
            if let Some(data) = buffer.data_mut() {
                data[..size].fill(0);
            }
            buffer.length = size;
            buffer.set_event(EventBody::FormatChanged(FormatChangedEvent::default()));
        }

        Ok(buffer)
    }
}

impl Component {
    /// Raise an asynchronous error event on the component's control port.
    ///
    /// The event is delivered through the control port's installed
    /// callback; when none is installed the event is logged as lost and
    /// the buffer released.
    pub fn send_error(&self, status: Error) -> Result<()> {
        trace!(component = self.name(), %status, "sending error event");
        let mut buffer = self.control().get_event(ERROR)?;
        buffer.set_event(EventBody::Error(status));
        self.control().event_send(buffer);
        Ok(())
    }
}
