//! Error types for the mediahub library.
//!
//! Every fallible operation in the port core reports one of the status
//! values below; there is no silent recovery. Logging is a side channel
//! and never a control-flow input.

use thiserror::Error;

/// Status values surfaced by port operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Error {
    /// Arguments malformed, wrong state (e.g. already enabled), or wrong
    /// port type combination.
    #[error("invalid argument or state")]
    InvalidArgument,

    /// Operation not implemented by the component module (or by the core,
    /// for a parameter the core does not interpret).
    #[error("operation not implemented")]
    NotImplemented,

    /// The port's format handle has been replaced by the client. The
    /// canonical handle is restored when this is detected.
    #[error("format descriptor handle has been replaced")]
    FormatOverwritten,

    /// The port is already connected to a peer.
    #[error("port is already connected")]
    AlreadyConnected,

    /// The port is not connected to a peer.
    #[error("port is not connected")]
    NotConnected,

    /// A pool was exhausted or an allocation failed.
    #[error("out of resources")]
    OutOfResources,

    /// The event pool is exhausted or an event buffer is too small.
    #[error("out of space")]
    OutOfSpace,
}

impl Error {
    /// Check whether this is the "module did not implement it" status.
    #[must_use]
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Error::NotImplemented)
    }
}

/// Result type alias using our [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
