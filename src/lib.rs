//! # mediahub
//!
//! Port subsystem of a multimedia abstraction layer.
//!
//! Media-processing components (decoders, encoders, renderers, cameras)
//! expose their endpoints as ports. This crate provides the port core:
//!
//! - Thread-safe port lifecycle: format commit, enable/disable, send,
//!   flush, parameters
//! - In-transit accounting so disable can block until the component has
//!   returned every borrowed buffer
//! - Zero-copy tunnelling: two ports from different components connected
//!   so that the core forwards buffers between them, allocates a shared
//!   pool, and propagates mid-stream format changes
//! - Buffer header, queue and pool plumbing, per-port statistics, and
//!   component-level events
//!
//! The processing behaviour behind a port is supplied by its component as
//! a [`PortModule`] handler table.

pub mod buffer;
pub mod component;
mod connection;
pub mod error;
pub mod events;
pub mod format;
pub mod fourcc;
pub mod params;
pub mod pool;
pub mod port;
pub mod queue;
pub mod stats;

pub use buffer::{BufferFlags, BufferHeader, Payload, TIME_UNKNOWN};
pub use component::{Component, ComponentBuilder};
pub use error::{Error, Result};
pub use events::{EventBody, FormatChangedEvent};
pub use format::{EsFormat, EsSpecific, EsType, FormatRef, Rational};
pub use fourcc::FourCc;
pub use params::{CoreStatisticsParam, Parameter};
pub use pool::{Pool, PoolCallback};
pub use port::{BufferCallback, Capabilities, Port, PortModule, PortType, SendError};
pub use queue::Queue;
pub use stats::{CoreStats, PortStats, StatsDir};
