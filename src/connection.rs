//! Connections between ports.
//!
//! A connection pairs a producer output port with a consumer input port so
//! that the core forwards buffers between them without client involvement.
//! The output's module may manage the connection itself; when it reports
//! `NotImplemented` (the default), the core claims it: forwarding
//! callbacks are installed on both sides and, on enable, a shared pool is
//! allocated and the output primed from it.

use crate::buffer::BufferHeader;
use crate::error::{Error, Result};
use crate::events;
use crate::pool::Pool;
use crate::port::{Capabilities, Port, PortState, PortType, SendError};
use parking_lot::MutexGuard;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace};

impl Port {
    /// Connect this port to `other`.
    ///
    /// Exactly one of the two must be an input and the other an output,
    /// and neither may be connected or enabled. The output side's module
    /// is offered the connection first; if it declines with
    /// `NotImplemented` the core manages it.
    pub fn connect(&self, other: &Arc<Port>) -> Result<()> {
        let this = self.self_arc();
        trace!(port = %this.name(), peer = %other.name(), "connecting ports");

        let (output, input) = match (this.kind(), other.kind()) {
            (PortType::Output, PortType::Input) => (&this, other),
            (PortType::Input, PortType::Output) => (other, &this),
            _ => {
                error!(
                    port = %this.name(),
                    peer = %other.name(),
                    "connection needs exactly one input and one output"
                );
                return Err(Error::InvalidArgument);
            }
        };

        // Always lock the output first, then the input, to avoid deadlock.
        let _output_lock = output.lock.lock();
        let _input_lock = input.lock.lock();

        if this.is_connected() || other.is_connected() {
            error!(port = %this.name(), peer = %other.name(), "a port is already connected");
            return Err(Error::AlreadyConnected);
        }
        if this.is_enabled() || other.is_enabled() {
            error!(port = %this.name(), peer = %other.name(), "neither port may be enabled");
            return Err(Error::InvalidArgument);
        }

        *output.connected.lock() = Some(Arc::downgrade(input));
        *input.connected.lock() = Some(Arc::downgrade(output));
        output.core_owns_connection.store(false, Ordering::SeqCst);
        input.core_owns_connection.store(false, Ordering::SeqCst);
        output.allocate_pool.store(false, Ordering::SeqCst);

        match output.module().connect(output, Some(input)) {
            // The module manages the connection itself.
            Ok(()) => Ok(()),
            Err(Error::NotImplemented) => {
                output.core_owns_connection.store(true, Ordering::SeqCst);
                input.core_owns_connection.store(true, Ordering::SeqCst);
                output.allocate_pool.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                error!(output = %output.name(), status = %e, "module refused the connection");
                *output.connected.lock() = None;
                *input.connected.lock() = None;
                Err(e)
            }
        }
    }

    /// Tear down this port's connection.
    ///
    /// An enabled port is disabled first, which cascades to the peer and
    /// destroys the shared pool. A module-managed connection is torn down
    /// through the module.
    pub fn disconnect(&self) -> Result<()> {
        let this = self.self_arc();
        trace!(port = %this.name(), "disconnecting port");

        let mut pool = None;
        {
            let mut state = this.lock.lock();

            let Some(other) = this.connected_port() else {
                debug!(port = %this.name(), "port is not connected");
                return Err(Error::NotConnected);
            };

            if this.is_enabled() {
                this.disable_locked(&mut state)?;
                pool = state.pool_for_connection.take();
            }

            if !this.core_owns_connection.load(Ordering::SeqCst) {
                if let Err(e) = this.module().connect(&this, None) {
                    error!(port = %this.name(), status = %e, "module disconnection failed");
                    return Err(e);
                }
            }

            *this.connected.lock() = None;
            *other.connected.lock() = None;
            this.core_owns_connection.store(false, Ordering::SeqCst);
            this.allocate_pool.store(false, Ordering::SeqCst);
            other.core_owns_connection.store(false, Ordering::SeqCst);
            other.allocate_pool.store(false, Ordering::SeqCst);
        }
        // Pool teardown happens outside the port lock.
        drop(pool);
        Ok(())
    }
}

/// Continue enabling a connected output: bring the input to the output's
/// buffer configuration, enable it core-owned, and when the core owns the
/// connection allocate the shared pool and prime the output from it.
///
/// Called with the output lock held; any failure disables whatever this
/// function enabled, the output included.
pub(crate) fn enable_connected<'a>(
    output: &'a Arc<Port>,
    input: &Arc<Port>,
    mut output_state: MutexGuard<'a, PortState>,
) -> Result<()> {
    trace!(output = %output.name(), input = %input.name(), "enabling connected ports");

    let mut input_state = input.lock.lock();
    let mut status: Result<()> = Ok(());

    // The input cannot change buffer configuration while enabled.
    if input.is_enabled()
        && (input.buffer_size() != output.buffer_size()
            || input.buffer_num() != output.buffer_num())
    {
        status = input.disable_locked(&mut input_state);
    }

    if status.is_ok() {
        input.set_buffer_size(output.buffer_size());
        input.set_buffer_num(output.buffer_num());

        if !input.is_enabled() {
            status = input.enable_locked(&mut input_state, None).map(|_| ());
        }
    }

    if status.is_ok() && output.allocate_pool.load(Ordering::SeqCst) {
        let pool_port = if output.capabilities().contains(Capabilities::ALLOCATION) {
            output
        } else {
            input
        };
        let pool_on_output = Arc::ptr_eq(pool_port, output);
        let headers = pool_port.buffer_num();
        // Pass-through outputs forward references and need no payload
        // memory behind the headers.
        let payload_size = if output.capabilities().contains(Capabilities::PASSTHROUGH) {
            0
        } else {
            pool_port.buffer_size()
        };

        // Pool creation must not hold any port lock: it may call into a
        // module payload allocator.
        drop(input_state);
        drop(output_state);
        let created = Pool::for_port(pool_port, headers, payload_size);
        output_state = output.lock.lock();
        input_state = input.lock.lock();

        match created {
            Err(e) => status = Err(e),
            Ok(pool) => {
                let recycle_target = Arc::downgrade(output);
                pool.callback_set(Some(Arc::new(move |buffer| {
                    connected_pool_cb(&recycle_target, buffer)
                })));

                let slot = if pool_on_output {
                    &mut *output_state
                } else {
                    &mut *input_state
                };
                slot.pool_for_connection = Some(pool);
                if let Some(pool) = slot.pool_for_connection.as_ref() {
                    status = populate_from_pool(output, pool);
                }
            }
        }
    }

    if let Err(e) = status {
        if input.is_enabled() {
            let _ = input.disable_locked(&mut input_state);
        }
        let input_pool = input_state.pool_for_connection.take();
        drop(input_state);
        let _ = output.disable_locked(&mut output_state);
        let output_pool = output_state.pool_for_connection.take();
        drop(output_state);
        drop(input_pool);
        drop(output_pool);
        return Err(e);
    }
    Ok(())
}

/// Prime an output port with every buffer it asked for from `pool`.
pub(crate) fn populate_from_pool(output: &Arc<Port>, pool: &Pool) -> Result<()> {
    trace!(port = %output.name(), "populating output port from pool");

    for _ in 0..output.buffer_num() {
        let Some(buffer) = pool.queue().get() else {
            error!(port = %output.name(), "too few buffers in the pool");
            return Err(Error::OutOfResources);
        };
        if let Err(e) = output.send_buffer(buffer) {
            error!(port = %output.name(), status = %e.error, "failed to prime output port");
            let SendError { error, buffer } = e;
            buffer.release();
            return Err(error);
        }
    }
    Ok(())
}

/// Buffer callback of a core-owned connected input: the input has consumed
/// the buffer, hand it back to its pool.
pub(crate) fn connected_input_cb(_port: &Arc<Port>, buffer: BufferHeader) {
    trace!("releasing buffer consumed by connected input");
    buffer.release();
}

/// Buffer callback of a core-owned connected output: forward data buffers
/// to the connected input; apply and forward format changes; release
/// everything else.
pub(crate) fn connected_output_cb(port: &Arc<Port>, mut buffer: BufferHeader) {
    let Some(peer) = port.connected_port() else {
        debug!(port = %port.name(), "buffer from output with no live peer");
        buffer.release();
        return;
    };

    if buffer.is_event() {
        let new_format = events::format_changed_get(&buffer).map(|ev| ev.format.clone());
        let Some(new_format) = new_format else {
            // Other event buffers are not forwarded across a connection.
            buffer.release();
            return;
        };

        // Apply the change to this port, then pass the event downstream.
        let status = {
            port.format().lock().full_copy(&new_format);
            port.format_commit()
        };
        let failure = match status {
            Ok(()) => match peer.send_buffer(buffer) {
                Ok(()) => return,
                Err(e) => {
                    buffer = e.buffer;
                    e.error
                }
            },
            Err(e) => e,
        };

        error!(port = %port.name(), status = %failure, "format change propagation failed");
        if let Some(component) = port.component() {
            if component.send_error(failure).is_err() {
                debug!(port = %port.name(), "error event lost");
            }
        }
        buffer.release();
        return;
    }

    if port.is_enabled() {
        if let Err(e) = peer.send_buffer(buffer) {
            error!(
                output = %port.name(),
                input = %peer.name(),
                status = %e.error,
                "could not forward buffer to connected port"
            );
            e.buffer.release();
        }
    } else {
        // The port is disabled, so this is a flush tail; back to the pool
        // rather than downstream.
        buffer.release();
    }
}

/// Release callback of the shared connection pool: a buffer fully consumed
/// downstream comes back here; reset it and resubmit it to the output.
/// Returns `Some(buffer)` (keep in pool) iff the resubmission failed.
pub(crate) fn connected_pool_cb(output: &Weak<Port>, mut buffer: BufferHeader) -> Option<BufferHeader> {
    buffer.reset();

    let Some(port) = output.upgrade() else {
        return Some(buffer);
    };

    trace!(port = %port.name(), "recycling released buffer to output");
    match port.send_buffer(buffer) {
        Ok(()) => None,
        Err(e) => Some(e.buffer),
    }
}
