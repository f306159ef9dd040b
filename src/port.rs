//! Ports: the endpoints through which buffer headers flow.
//!
//! A port sits on every input/output/control endpoint of a component and
//! mediates buffer flow between the client (or a connected peer port) and
//! the component's processing behaviour. The port core keeps the public
//! surface thread safe, accounts for buffers in transit so that disable
//! can block until the component has returned everything it borrowed, and
//! dispatches into the per-port handler table supplied by the component.
//!
//! Locking discipline, in acquisition order: the port lock (output before
//! input for cross-port operations), then the send lock, then the leaf
//! locks (transit, stats, callback, connected peer). The completion path
//! only ever touches leaf locks, so components may return buffers from any
//! worker thread, including while `disable` blocks on the transit gate.

use crate::buffer::{BufferHeader, Payload};
use crate::component::Component;
use crate::connection;
use crate::error::{Error, Result};
use crate::format::FormatRef;
use crate::params::Parameter;
use crate::pool::Pool;
use crate::stats::{PortStats, StatsDir};
use bitflags::bitflags;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace};

/// The direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortType {
    /// Control endpoint, used for component-level events and parameters.
    Control,
    /// Consumes buffers.
    Input,
    /// Produces buffers.
    Output,
}

impl PortType {
    fn name_token(self) -> &'static str {
        match self {
            PortType::Control => "ctr",
            PortType::Input => "in",
            PortType::Output => "out",
        }
    }
}

bitflags! {
    /// Capabilities advertised by a port.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        /// Buffers need no payload memory; references are forwarded.
        const PASSTHROUGH = 0x01;
        /// The port can allocate payload memory itself.
        const ALLOCATION = 0x02;
        /// The port understands mid-stream format-changed events.
        const SUPPORTS_EVENT_FORMAT_CHANGE = 0x04;
    }
}

/// Callback invoked when a port hands a buffer header back.
///
/// May be invoked on any component worker thread.
pub type BufferCallback = Arc<dyn Fn(&Arc<Port>, BufferHeader) + Send + Sync>;

/// Error returned by [`Port::send_buffer`], handing the rejected buffer
/// header back to the caller.
#[derive(Debug)]
pub struct SendError {
    /// Why the send failed.
    pub error: Error,
    /// The buffer header that was not sent.
    pub buffer: BufferHeader,
}

impl SendError {
    /// Pair a status with the buffer it rejects.
    pub fn new(error: Error, buffer: BufferHeader) -> Self {
        Self { error, buffer }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to send buffer header: {}", self.error)
    }
}

impl std::error::Error for SendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<SendError> for Error {
    fn from(e: SendError) -> Self {
        e.error
    }
}

/// Per-port handler table supplied by the owning component.
///
/// Every handler has a default body reporting [`Error::NotImplemented`],
/// which the core surfaces to callers (for `connect` it means "core,
/// please manage the connection"; for `payload_alloc` it means "use the
/// heap"). Handlers run under port locks held by the core and must not
/// call back into port operations; returning buffers through
/// [`Port::buffer_header_callback`] is always safe.
#[allow(unused_variables)]
pub trait PortModule: Send + Sync {
    /// Commit the port's current format.
    fn set_format(&self, port: &Arc<Port>) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Enable processing on the port.
    fn enable(&self, port: &Arc<Port>) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Disable processing on the port. Buffers still held must be
    /// returned through [`Port::buffer_header_callback`] before or while
    /// this runs, or from a worker thread afterwards.
    fn disable(&self, port: &Arc<Port>) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Accept a buffer header for processing. On failure the buffer is
    /// handed back inside the error.
    fn send(&self, port: &Arc<Port>, buffer: BufferHeader) -> std::result::Result<(), SendError> {
        Err(SendError::new(Error::NotImplemented, buffer))
    }

    /// Flush buffers held by the port.
    fn flush(&self, port: &Arc<Port>) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Establish (`peer` is `Some`) or tear down (`peer` is `None`) a
    /// connection managed by the module. The establishment call always
    /// goes to the output side's module, with the output as `port`.
    fn connect(&self, port: &Arc<Port>, peer: Option<&Arc<Port>>) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Set a parameter on the port.
    fn parameter_set(&self, port: &Arc<Port>, param: &Parameter) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Get a parameter from the port.
    fn parameter_get(&self, port: &Arc<Port>, param: &mut Parameter) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Allocate payload memory for the port.
    fn payload_alloc(&self, port: &Arc<Port>, size: usize) -> Result<Vec<u8>> {
        Err(Error::NotImplemented)
    }

    /// Free payload memory previously returned by
    /// [`PortModule::payload_alloc`].
    fn payload_free(&self, port: &Arc<Port>, payload: Vec<u8>) {}
}

/// Transit drain gate: counts buffer headers the component currently
/// borrows and lets `disable` block until every one has come back.
///
/// Waiters block only while the counter is non-zero, the condvar analogue
/// of the one-shot "posted iff drained" semaphore construction.
struct TransitGate {
    count: Mutex<i32>,
    drained: Condvar,
}

impl TransitGate {
    fn new() -> Self {
        Self {
            count: Mutex::new(0),
            drained: Condvar::new(),
        }
    }

    fn increment(&self) {
        *self.count.lock() += 1;
    }

    fn decrement(&self) -> i32 {
        let mut count = self.count.lock();
        *count -= 1;
        if *count <= 0 {
            self.drained.notify_all();
        }
        *count
    }

    fn wait(&self) {
        let mut count = self.count.lock();
        while *count != 0 {
            self.drained.wait(&mut count);
        }
    }

    fn count(&self) -> i32 {
        *self.count.lock()
    }
}

/// State guarded by the port lock.
pub(crate) struct PortState {
    /// Pool allocated for a core-owned connection, held on the pool-port's
    /// side.
    pub(crate) pool_for_connection: Option<Pool>,
}

/// An input, output or control endpoint on a component.
pub struct Port {
    kind: PortType,
    index: u32,
    component: Weak<Component>,
    module: Box<dyn PortModule>,
    self_ref: Weak<Port>,

    capabilities: AtomicU32,
    buffer_num: AtomicU32,
    buffer_num_min: AtomicU32,
    buffer_num_recommended: AtomicU32,
    buffer_size: AtomicUsize,
    buffer_size_min: AtomicUsize,
    buffer_size_recommended: AtomicUsize,

    is_enabled: AtomicBool,
    pub(crate) core_owns_connection: AtomicBool,
    pub(crate) allocate_pool: AtomicBool,

    format: Mutex<FormatRef>,
    format_shadow: FormatRef,
    name: Mutex<String>,

    pub(crate) lock: Mutex<PortState>,
    send_lock: Mutex<()>,
    transit: TransitGate,
    stats: Mutex<PortStats>,
    pub(crate) callback: Mutex<Option<BufferCallback>>,
    pub(crate) connected: Mutex<Option<Weak<Port>>>,
}

impl Port {
    /// Allocate a port. The format descriptor created here is the port's
    /// canonical one for its whole lifetime.
    pub(crate) fn alloc(
        component: Weak<Component>,
        component_name: &str,
        kind: PortType,
        index: u32,
        module: Box<dyn PortModule>,
    ) -> Arc<Port> {
        let format: FormatRef = crate::format::EsFormat::new().into_ref();

        let port = Arc::new_cyclic(|self_ref| Port {
            kind,
            index,
            component,
            module,
            self_ref: self_ref.clone(),
            capabilities: AtomicU32::new(0),
            buffer_num: AtomicU32::new(0),
            buffer_num_min: AtomicU32::new(0),
            buffer_num_recommended: AtomicU32::new(0),
            buffer_size: AtomicUsize::new(0),
            buffer_size_min: AtomicUsize::new(0),
            buffer_size_recommended: AtomicUsize::new(0),
            is_enabled: AtomicBool::new(false),
            core_owns_connection: AtomicBool::new(false),
            allocate_pool: AtomicBool::new(false),
            format: Mutex::new(Arc::clone(&format)),
            format_shadow: format,
            name: Mutex::new(String::new()),
            lock: Mutex::new(PortState {
                pool_for_connection: None,
            }),
            send_lock: Mutex::new(()),
            transit: TransitGate::new(),
            stats: Mutex::new(PortStats::default()),
            callback: Mutex::new(None),
            connected: Mutex::new(None),
        });

        port.compose_name(component_name);
        trace!(port = %port.name(), "created port");
        port
    }

    /// Allocate one port per module, assigning indices in order.
    pub(crate) fn alloc_array(
        component: Weak<Component>,
        component_name: &str,
        kind: PortType,
        modules: Vec<Box<dyn PortModule>>,
    ) -> Vec<Arc<Port>> {
        modules
            .into_iter()
            .enumerate()
            .map(|(i, module)| {
                Port::alloc(component.clone(), component_name, kind, i as u32, module)
            })
            .collect()
    }

    /// The port's direction.
    pub fn kind(&self) -> PortType {
        self.kind
    }

    /// The port's index among its component's ports of the same type.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The port's current name, `"<component>:<ctr|in|out><index>(<4cc>)"`.
    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    /// The owning component, while it is alive.
    pub fn component(&self) -> Option<Arc<Component>> {
        self.component.upgrade()
    }

    /// Capabilities advertised by the port.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::from_bits_truncate(self.capabilities.load(Ordering::SeqCst))
    }

    /// Advertise capabilities on the port. Component side.
    pub fn set_capabilities(&self, capabilities: Capabilities) {
        self.capabilities.store(capabilities.bits(), Ordering::SeqCst);
    }

    /// Number of buffers the client will provide.
    pub fn buffer_num(&self) -> u32 {
        self.buffer_num.load(Ordering::SeqCst)
    }

    /// Set the number of buffers the client will provide.
    pub fn set_buffer_num(&self, num: u32) {
        self.buffer_num.store(num, Ordering::SeqCst);
    }

    /// Minimum number of buffers the port can work with.
    pub fn buffer_num_min(&self) -> u32 {
        self.buffer_num_min.load(Ordering::SeqCst)
    }

    /// Set the minimum number of buffers. Component side.
    pub fn set_buffer_num_min(&self, num: u32) {
        self.buffer_num_min.store(num, Ordering::SeqCst);
    }

    /// Number of buffers the port recommends.
    pub fn buffer_num_recommended(&self) -> u32 {
        self.buffer_num_recommended.load(Ordering::SeqCst)
    }

    /// Set the recommended number of buffers. Component side.
    pub fn set_buffer_num_recommended(&self, num: u32) {
        self.buffer_num_recommended.store(num, Ordering::SeqCst);
    }

    /// Size of the buffers the client will provide.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size.load(Ordering::SeqCst)
    }

    /// Set the size of the buffers the client will provide.
    pub fn set_buffer_size(&self, size: usize) {
        self.buffer_size.store(size, Ordering::SeqCst);
    }

    /// Minimum buffer size the port can work with.
    pub fn buffer_size_min(&self) -> usize {
        self.buffer_size_min.load(Ordering::SeqCst)
    }

    /// Set the minimum buffer size. Component side.
    pub fn set_buffer_size_min(&self, size: usize) {
        self.buffer_size_min.store(size, Ordering::SeqCst);
    }

    /// Buffer size the port recommends.
    pub fn buffer_size_recommended(&self) -> usize {
        self.buffer_size_recommended.load(Ordering::SeqCst)
    }

    /// Set the recommended buffer size. Component side.
    pub fn set_buffer_size_recommended(&self, size: usize) {
        self.buffer_size_recommended.store(size, Ordering::SeqCst);
    }

    /// Check whether the port is enabled.
    pub fn is_enabled(&self) -> bool {
        self.is_enabled.load(Ordering::SeqCst)
    }

    /// Number of buffer headers currently held by the component.
    pub fn buffers_in_transit(&self) -> i32 {
        self.transit.count()
    }

    /// The connected peer port, if any.
    ///
    /// A peer whose component has been destroyed reads as disconnected.
    pub fn connected_port(&self) -> Option<Arc<Port>> {
        let mut connected = self.connected.lock();
        match connected.as_ref().and_then(Weak::upgrade) {
            Some(peer) => Some(peer),
            None => {
                if connected.take().is_some() {
                    debug!(port = %self.name(), "dropping stale link to destroyed peer");
                }
                None
            }
        }
    }

    /// Check whether the port is connected to a live peer.
    pub fn is_connected(&self) -> bool {
        self.connected_port().is_some()
    }

    /// The shared handle to the port's format descriptor.
    pub fn format(&self) -> FormatRef {
        Arc::clone(&*self.format.lock())
    }

    /// Swap the port's format handle.
    ///
    /// The port keeps the handle it was created with as its canonical
    /// descriptor; `format_commit` rejects a swapped handle and restores
    /// the canonical one. Mutate the descriptor through [`Port::format`]
    /// instead.
    pub fn replace_format_handle(&self, handle: FormatRef) {
        *self.format.lock() = handle;
    }

    /// Commit the port's format.
    ///
    /// Dispatches to the module's `set_format`, refreshes the port name
    /// and clamps the buffer requirements to their minima; for an input
    /// port the clamp is repeated on every output of the same component,
    /// since input formats drive output configurations.
    pub fn format_commit(&self) -> Result<()> {
        {
            let mut format = self.format.lock();
            if !Arc::ptr_eq(&*format, &self.format_shadow) {
                error!(
                    port = %self.name(),
                    "format handle has been replaced, restoring the canonical descriptor"
                );
                *format = Arc::clone(&self.format_shadow);
                return Err(Error::FormatOverwritten);
            }
        }

        trace!(port = %self.name(), "committing format");

        let _lock = self.lock.lock();
        let status = self.module.set_format(&self.self_arc());
        self.name_update();

        self.clamp_buffer_requirements();
        if self.kind == PortType::Input {
            if let Some(component) = self.component() {
                for output in component.outputs() {
                    output.clamp_buffer_requirements();
                }
            }
        }

        status
    }

    /// Enable processing on the port.
    ///
    /// A disconnected port must be given a callback through which buffer
    /// headers are returned; a connected port must not, since the core
    /// installs its own forwarding callbacks.
    pub fn enable(&self, callback: Option<BufferCallback>) -> Result<()> {
        trace!(
            port = %self.name(),
            buffer_num = self.buffer_num(),
            buffer_size = self.buffer_size(),
            "enabling port"
        );

        let this = self.self_arc();
        let mut state = self.lock.lock();
        match self.enable_locked(&mut state, callback)? {
            Some(input) => connection::enable_connected(&this, &input, state),
            None => Ok(()),
        }
    }

    /// Enable with the port lock held. Returns the connected input to
    /// continue with when this is a connected output port.
    pub(crate) fn enable_locked(
        &self,
        _state: &mut PortState,
        callback: Option<BufferCallback>,
    ) -> Result<Option<Arc<Port>>> {
        if self.is_enabled() {
            debug!(port = %self.name(), "already enabled");
            return Err(Error::InvalidArgument);
        }

        let connected = self.connected_port();

        // A connected output adopts the larger of the two buffer configs.
        if let Some(peer) = &connected {
            if self.kind == PortType::Output {
                if peer.buffer_num() > self.buffer_num() {
                    self.set_buffer_num(peer.buffer_num());
                }
                if peer.buffer_size() > self.buffer_size() {
                    self.set_buffer_size(peer.buffer_size());
                }
            }
        }

        if self.buffer_num() < self.buffer_num_min() {
            error!(
                port = %self.name(),
                buffer_num = self.buffer_num(),
                min = self.buffer_num_min(),
                "buffer_num too small"
            );
            return Err(Error::InvalidArgument);
        }
        if self.buffer_size() < self.buffer_size_min() {
            error!(
                port = %self.name(),
                buffer_size = self.buffer_size(),
                min = self.buffer_size_min(),
                "buffer_size too small"
            );
            return Err(Error::InvalidArgument);
        }

        if connected.is_some() == callback.is_some() {
            error!(
                port = %self.name(),
                connected = connected.is_some(),
                "a connected port must not be given a client callback, a disconnected one must"
            );
            return Err(Error::InvalidArgument);
        }

        // Install the callback before the enabled flag flips so that no
        // completion can ever reach a client callback on a core-owned
        // side, and none can find the slot empty.
        let installed: BufferCallback = match callback {
            Some(cb) => cb,
            None => match self.kind {
                PortType::Input => Arc::new(connection::connected_input_cb),
                _ => Arc::new(connection::connected_output_cb),
            },
        };
        *self.callback.lock() = Some(installed);

        if let Err(e) = self.module.enable(&self.self_arc()) {
            *self.callback.lock() = None;
            return Err(e);
        }

        {
            let _send = self.send_lock.lock();
            self.is_enabled.store(true, Ordering::SeqCst);
        }

        if self.kind == PortType::Output {
            Ok(connected)
        } else {
            Ok(None)
        }
    }

    /// Disable processing on the port.
    ///
    /// Blocks until the component has returned every buffer header in
    /// transit. An output port cascades the disable to its connected
    /// peer. The pool allocated for a core-owned connection, if held on
    /// this side, is destroyed after the port lock is released.
    pub fn disable(&self) -> Result<()> {
        trace!(port = %self.name(), "disabling port");

        let pool;
        {
            let mut state = self.lock.lock();
            self.disable_locked(&mut state)?;
            pool = state.pool_for_connection.take();
        }
        drop(pool);
        Ok(())
    }

    /// Disable with the port lock held.
    pub(crate) fn disable_locked(&self, state: &mut PortState) -> Result<()> {
        if !self.is_enabled() {
            error!(port = %self.name(), "port is not enabled");
            return Err(Error::InvalidArgument);
        }

        // No new send can proceed from here on.
        {
            let _send = self.send_lock.lock();
            self.is_enabled.store(false, Ordering::SeqCst);
        }

        let component = self.component();
        let action_guard = component.as_ref().map(|c| c.action_lock());

        // Returning buffers must not be re-sent during teardown.
        if let Some(pool) = &state.pool_for_connection {
            pool.callback_set(None);
        }

        let status = self.module.disable(&self.self_arc());
        drop(action_guard);

        if let Err(e) = status {
            error!(port = %self.name(), status = %e, "port could not be disabled");
            let _send = self.send_lock.lock();
            self.is_enabled.store(true, Ordering::SeqCst);
            return Err(e);
        }

        debug!(
            port = %self.name(),
            in_transit = self.transit.count(),
            "waiting for buffers still in transit"
        );
        self.transit.wait();
        debug!(port = %self.name(), "no buffers left in transit");

        *self.callback.lock() = None;

        if self.kind == PortType::Output {
            if let Some(peer) = self.connected_port() {
                if let Err(e) = peer.disable() {
                    error!(peer = %peer.name(), status = %e, "failed to disable connected peer");
                }
            }
        }

        Ok(())
    }

    /// Send a buffer header to the port.
    ///
    /// On failure the header travels back inside the [`SendError`].
    /// Buffers without payload are rejected unless the port is
    /// pass-through; an output buffer arriving with a non-zero length is
    /// emptied, since outputs receive buffers to fill.
    pub fn send_buffer(&self, mut buffer: BufferHeader) -> std::result::Result<(), SendError> {
        if buffer.data().is_none() && !self.capabilities().contains(Capabilities::PASSTHROUGH) {
            error!(port = %self.name(), "buffer header carries no payload");
            return Err(SendError::new(Error::InvalidArgument, buffer));
        }

        let _send = self.send_lock.lock();

        if !self.is_enabled() {
            return Err(SendError::new(Error::InvalidArgument, buffer));
        }

        if self.kind == PortType::Output && buffer.length != 0 {
            debug!(port = %self.name(), "given an output buffer with non-zero length");
            buffer.length = 0;
        }

        self.transit.increment();
        match self.module.send(&self.self_arc(), buffer) {
            Ok(()) => {
                self.update_stats(StatsDir::Rx);
                Ok(())
            }
            Err(e) => {
                self.transit.decrement();
                error!(port = %self.name(), status = %e.error, "send failed");
                Err(e)
            }
        }
    }

    /// Hand a buffer header back from the component.
    ///
    /// Decrements the transit accounting, updates TX statistics and
    /// delegates to the installed callback. Component side; may be called
    /// from any worker thread.
    pub fn buffer_header_callback(&self, buffer: BufferHeader) {
        let remaining = self.transit.decrement();
        if remaining < 0 {
            error!(port = %self.name(), remaining, "buffer headers in transit went negative");
        }

        self.update_stats(StatsDir::Tx);

        let callback = self.callback.lock().clone();
        match callback {
            Some(cb) => cb(&self.self_arc(), buffer),
            None => {
                error!(port = %self.name(), "buffer returned with no callback installed");
                buffer.release();
            }
        }
    }

    /// Deliver an event buffer through the installed callback.
    ///
    /// Unlike [`Port::buffer_header_callback`] this does not touch the
    /// transit accounting: events originate inside the component and were
    /// never in transit. A port without a callback loses the event, which
    /// is logged, and the buffer goes back to its pool.
    pub fn event_send(&self, buffer: BufferHeader) {
        let callback = self.callback.lock().clone();
        match callback {
            Some(cb) => cb(&self.self_arc(), buffer),
            None => {
                error!(port = %self.name(), "event lost, no callback installed");
                buffer.release();
            }
        }
    }

    /// Flush the buffers held by the port, serialised with the send path.
    pub fn flush(&self) -> Result<()> {
        trace!(port = %self.name(), "flushing port");
        let _send = self.send_lock.lock();
        self.module.flush(&self.self_arc())
    }

    /// Set a parameter on the port. The module gets first refusal; the
    /// core interprets no settable parameter.
    pub fn parameter_set(&self, param: &Parameter) -> Result<()> {
        let _lock = self.lock.lock();
        match self.module.parameter_set(&self.self_arc(), param) {
            Err(Error::NotImplemented) => self.core_parameter_set(param),
            other => other,
        }
    }

    /// Get a parameter from the port. The module gets first refusal; the
    /// core answers [`Parameter::CoreStatistics`].
    pub fn parameter_get(&self, param: &mut Parameter) -> Result<()> {
        let _lock = self.lock.lock();
        match self.module.parameter_get(&self.self_arc(), param) {
            Err(Error::NotImplemented) => self.core_parameter_get(param),
            other => other,
        }
    }

    fn core_parameter_set(&self, _param: &Parameter) -> Result<()> {
        // No core parameter is settable.
        Err(Error::NotImplemented)
    }

    fn core_parameter_get(&self, param: &mut Parameter) -> Result<()> {
        match param {
            Parameter::CoreStatistics(p) => {
                let mut stats = self.stats.lock();
                let side = match p.dir {
                    StatsDir::Rx => &mut stats.rx,
                    StatsDir::Tx => &mut stats.tx,
                };
                p.stats = *side;
                if p.reset {
                    *side = Default::default();
                }
                Ok(())
            }
            _ => Err(Error::NotImplemented),
        }
    }

    /// Allocate payload memory through the port.
    ///
    /// Falls back to the heap when the module provides no allocator. The
    /// returned payload holds the owning component alive until dropped.
    pub fn payload_alloc(&self, size: usize) -> Result<Payload> {
        trace!(port = %self.name(), size, "allocating payload");

        if size == 0 {
            return Err(Error::InvalidArgument);
        }
        let component = self.component().ok_or(Error::InvalidArgument)?;

        match self.module.payload_alloc(&self.self_arc(), size) {
            Ok(data) => Ok(Payload::from_module(data, self.self_ref.clone(), component)),
            Err(Error::NotImplemented) => Ok(Payload::heap(size, component)),
            Err(e) => Err(e),
        }
    }

    /// Free a payload previously allocated through the port.
    ///
    /// Dropping the payload has the same effect; this exists for symmetry
    /// with [`Port::payload_alloc`].
    pub fn payload_free(&self, payload: Payload) {
        drop(payload);
    }

    pub(crate) fn module_payload_free(&self, data: Vec<u8>) {
        self.module.payload_free(&self.self_arc(), data);
    }

    pub(crate) fn module(&self) -> &dyn PortModule {
        &*self.module
    }

    pub(crate) fn self_arc(&self) -> Arc<Port> {
        self.self_ref
            .upgrade()
            .expect("a live port always has a strong reference")
    }

    /// Clamp `buffer_num`/`buffer_size` to their minima.
    pub(crate) fn clamp_buffer_requirements(&self) {
        if self.buffer_size() < self.buffer_size_min() {
            self.set_buffer_size(self.buffer_size_min());
        }
        if self.buffer_num() < self.buffer_num_min() {
            self.set_buffer_num(self.buffer_num_min());
        }
    }

    /// Refresh the port name from the component name and current format.
    pub(crate) fn name_update(&self) {
        let component = self.component();
        let component_name = component.as_ref().map(|c| c.name()).unwrap_or("?");
        self.compose_name(component_name);
    }

    fn compose_name(&self, component_name: &str) {
        let encoding = self.format.lock().lock().encoding;
        let mut name = format!(
            "{}:{}{}",
            component_name,
            self.kind.name_token(),
            self.index
        );
        if !encoding.is_none() {
            name.push_str(&format!("({encoding})"));
        }
        *self.name.lock() = name;
    }

    fn update_stats(&self, dir: StatsDir) {
        let now = crate::stats::monotonic_micros();
        let mut stats = self.stats.lock();
        let side = match dir {
            StatsDir::Rx => &mut stats.rx,
            StatsDir::Tx => &mut stats.tx,
        };
        side.record(now);
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        let format = self.format.lock();
        debug_assert!(
            Arc::ptr_eq(&*format, &self.format_shadow),
            "port destroyed with a replaced format handle"
        );
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name())
            .field("kind", &self.kind)
            .field("index", &self.index)
            .field("is_enabled", &self.is_enabled())
            .field("in_transit", &self.buffers_in_transit())
            .finish()
    }
}
