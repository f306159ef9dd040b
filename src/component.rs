//! Media components and their ports.
//!
//! A component owns its ports exclusively; ports point back at the
//! component through a weak reference. The component also carries the
//! action lock used to quiesce its worker while a port is disabled, and
//! the event pool from which event buffers are drawn.

use crate::error::Result;
use crate::events::FormatChangedEvent;
use crate::pool::Pool;
use crate::port::{Port, PortModule, PortType};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::trace;

/// A media-processing component: a bundle of ports around some processing
/// behaviour (decoder, encoder, renderer, camera, ...).
pub struct Component {
    name: String,
    control: Arc<Port>,
    inputs: Vec<Arc<Port>>,
    outputs: Vec<Arc<Port>>,
    action_lock: Mutex<()>,
    event_pool: Pool,
}

impl Component {
    /// Start building a component.
    pub fn builder(name: impl Into<String>) -> ComponentBuilder {
        ComponentBuilder {
            name: name.into(),
            control_module: None,
            input_modules: Vec::new(),
            output_modules: Vec::new(),
            event_headers: 4,
            event_payload_size: FormatChangedEvent::ENCODED_SIZE,
        }
    }

    /// The component's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The control port.
    pub fn control(&self) -> &Arc<Port> {
        &self.control
    }

    /// Input port `index`, if it exists.
    pub fn input(&self, index: usize) -> Option<&Arc<Port>> {
        self.inputs.get(index)
    }

    /// All input ports.
    pub fn inputs(&self) -> &[Arc<Port>] {
        &self.inputs
    }

    /// Output port `index`, if it exists.
    pub fn output(&self, index: usize) -> Option<&Arc<Port>> {
        self.outputs.get(index)
    }

    /// All output ports.
    pub fn outputs(&self) -> &[Arc<Port>] {
        &self.outputs
    }

    /// Acquire the component action lock, quiescing the component's
    /// internal worker for the lifetime of the guard.
    pub fn action_lock(&self) -> MutexGuard<'_, ()> {
        self.action_lock.lock()
    }

    pub(crate) fn event_pool(&self) -> &Pool {
        &self.event_pool
    }
}

/// Builder for [`Component`].
pub struct ComponentBuilder {
    name: String,
    control_module: Option<Box<dyn PortModule>>,
    input_modules: Vec<Box<dyn PortModule>>,
    output_modules: Vec<Box<dyn PortModule>>,
    event_headers: u32,
    event_payload_size: usize,
}

impl ComponentBuilder {
    /// Use `module` as the control-port handler instead of the permissive
    /// default.
    pub fn control(mut self, module: Box<dyn PortModule>) -> Self {
        self.control_module = Some(module);
        self
    }

    /// Add an input port handled by `module`.
    pub fn input(mut self, module: Box<dyn PortModule>) -> Self {
        self.input_modules.push(module);
        self
    }

    /// Add an output port handled by `module`.
    pub fn output(mut self, module: Box<dyn PortModule>) -> Self {
        self.output_modules.push(module);
        self
    }

    /// Size the event pool: `headers` buffers of `payload_size` bytes.
    pub fn event_buffers(mut self, headers: u32, payload_size: usize) -> Self {
        self.event_headers = headers;
        self.event_payload_size = payload_size;
        self
    }

    /// Build the component and all its ports.
    pub fn build(self) -> Arc<Component> {
        let ComponentBuilder {
            name,
            control_module,
            input_modules,
            output_modules,
            event_headers,
            event_payload_size,
        } = self;

        trace!(
            component = %name,
            inputs = input_modules.len(),
            outputs = output_modules.len(),
            "creating component"
        );

        Arc::new_cyclic(|weak| {
            let control = Port::alloc(
                weak.clone(),
                &name,
                PortType::Control,
                0,
                control_module.unwrap_or_else(|| Box::new(DefaultControl)),
            );
            let inputs = Port::alloc_array(weak.clone(), &name, PortType::Input, input_modules);
            let outputs = Port::alloc_array(weak.clone(), &name, PortType::Output, output_modules);

            Component {
                name,
                control,
                inputs,
                outputs,
                action_lock: Mutex::new(()),
                event_pool: Pool::new(event_headers, event_payload_size),
            }
        })
    }
}

/// Control-port handler installed when the builder is given none: accepts
/// enable/disable so clients can always listen for component events.
struct DefaultControl;

impl PortModule for DefaultControl {
    fn enable(&self, _port: &Arc<Port>) -> Result<()> {
        Ok(())
    }

    fn disable(&self, _port: &Arc<Port>) -> Result<()> {
        Ok(())
    }
}
