//! Transports the session manager runs commands over.
//!
//! A [`Transport`] is an authenticated connection to one device. It runs shell
//! commands on fresh exec channels and can host any number of NETCONF sessions
//! ([`RpcSession`]). The SSH implementation lives in [`ssh`]; tests plug in
//! in-memory stubs.

use async_trait::async_trait;

use crate::error::TransportError;

pub mod netconf;
pub mod ssh;

mod security;

pub use netconf::NetconfSession;
pub use security::{ConnectionSecurityOptions, SecurityLevel};
pub use ssh::SshTransport;

/// An authenticated connection to one device.
///
/// Dropping a transport must release the underlying connection; the session
/// manager relies on that to force-close a dead device.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Runs `command` on a new channel and returns everything it wrote to
    /// standard output. The channel is closed before returning.
    async fn exec(&self, command: &str) -> Result<Vec<u8>, TransportError>;

    /// Opens a NETCONF session on top of this connection.
    async fn open_rpc_session(&self) -> Result<Box<dyn RpcSession>, TransportError>;

    /// Gracefully shuts the connection down.
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// A NETCONF session.
#[async_trait]
pub trait RpcSession: Send {
    /// Sends one request and returns the inner body of its `rpc-reply`.
    ///
    /// Must return [`TransportError::Eof`] when the peer has closed the
    /// session.
    async fn call(&mut self, request: &RpcRequest) -> Result<Vec<u8>, TransportError>;

    /// Ends the session.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// A single-operation NETCONF request.
///
/// The operation is either a bare verb (`get-alarm-information`), which is sent
/// as an empty element, or ready-made XML (`<get-route-summary-information/>`)
/// which is embedded unchanged. The latter is how operations with arguments
/// are expressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcRequest {
    operation: String,
}

impl RpcRequest {
    pub fn new(command: &str) -> Self {
        let command = command.trim();
        let operation = if command.starts_with('<') {
            command.to_string()
        } else {
            format!("<{command}/>")
        };
        Self { operation }
    }

    /// The operation element as it goes on the wire.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Name of the operation element, e.g. `get-alarm-information`.
    pub fn name(&self) -> &str {
        let rest = self.operation.trim_start_matches('<');
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .unwrap_or(rest.len());
        &rest[..end]
    }

    /// Renders the full `<rpc>` message for the given message id.
    pub fn to_xml(&self, message_id: u64) -> String {
        format!(
            r#"<rpc message-id="{message_id}" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">{}</rpc>"#,
            self.operation
        )
    }
}
