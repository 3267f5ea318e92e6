//! Error types for device sessions and command execution.
//!
//! [`ConnectError`] is the single taxonomy surfaced to callers of the session
//! manager and the RPC client. [`TransportError`] describes what went wrong on
//! the wire and travels inside it as the source.

use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by caller-supplied decode functions.
pub type DecodeError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the session manager and the RPC client.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// A command was attempted while no transport is attached.
    ///
    /// Fatal to the call, not to the manager: a caller may try again once the
    /// device has been reconnected.
    #[error("not connected")]
    NotConnected,

    /// The NETCONF session could not be opened on top of a live transport.
    #[error("could not open netconf session: {0}")]
    SessionSetupFailed(#[source] TransportError),

    /// The NETCONF session reached end of stream.
    ///
    /// The dead session has already been discarded; the next call opens a new
    /// one.
    #[error("netconf session lost: {0}")]
    SessionLost(#[source] TransportError),

    /// The NETCONF request did not complete within the deadline.
    ///
    /// The session is left intact.
    #[error("netconf request timed out after {0:?}")]
    Timeout(Duration),

    /// Generic execution or transport failure.
    #[error("could not run command: {0}")]
    CommandFailed(#[source] TransportError),

    /// The `rpc-reply` envelope around a shell reply could not be parsed.
    #[error("could not decode reply envelope: {0}")]
    EnvelopeDecodeFailed(#[source] EnvelopeError),

    /// The caller-supplied decode function rejected the payload.
    #[error("could not decode reply: {0}")]
    DecodeFailed(#[source] DecodeError),
}

/// Failures of the underlying transport or NETCONF framing.
#[derive(Error, Debug)]
pub enum TransportError {
    /// An error occurred in the async-ssh2-tokio library.
    #[error("async ssh2 error: {0}")]
    Ssh2Error(#[from] async_ssh2_tokio::Error),

    /// An error occurred in the russh library.
    #[error("russh error: {0}")]
    RusshError(#[from] russh::Error),

    /// Reading or writing the session stream failed.
    #[error("io error: {0}")]
    Io(#[source] std::io::Error),

    /// The remote end closed the stream.
    #[error("end of stream")]
    Eof,

    /// The exec channel closed without reporting an exit status.
    #[error("command did not report an exit status")]
    NoExitStatus,

    /// The remote command exited with a non-zero status.
    #[error("command exited with status {status}: {stderr}")]
    ExitStatus { status: u32, stderr: String },

    /// The device answered an RPC with an `rpc-error`.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The peer sent something that is not valid NETCONF.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Returns true if the error means the remote closed the session.
    pub fn is_eof(&self) -> bool {
        matches!(self, TransportError::Eof)
    }
}

/// Failures while unwrapping an `rpc-reply` envelope.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// The reply is not well-formed XML.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The first element of the reply is not `rpc-reply`.
    #[error("expected element rpc-reply but found {0}")]
    UnexpectedRoot(String),

    /// The reply contains no element at all.
    #[error("reply contains no element")]
    Empty,

    /// The reply ends before `rpc-reply` is closed.
    #[error("reply ends before rpc-reply is closed")]
    Unterminated,
}
