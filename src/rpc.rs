//! Command façade used by collectors.
//!
//! [`RpcClient`] turns "run this command and give me a decoded object" into
//! the right wire form for the manager's mode, strips the reply envelope when
//! there is one and hands the payload to a decoder.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::device::Device;
use crate::error::{ConnectError, DecodeError};
use crate::session::{CommandObserver, LogObserver, Mode, SshConnection};

/// Sends commands to one device and decodes the XML results.
pub struct RpcClient {
    conn: Arc<SshConnection>,
    satellite: bool,
    debug: bool,
    observer: Option<Arc<dyn CommandObserver>>,
}

impl RpcClient {
    /// Creates a client on top of a session manager. NETCONF is enabled iff
    /// the manager runs in NETCONF mode.
    pub fn new(conn: Arc<SshConnection>) -> Self {
        Self {
            conn,
            satellite: false,
            debug: false,
            observer: None,
        }
    }

    /// Logs every command and raw reply at debug level.
    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        if self.observer.is_none() {
            self.observer = Some(Arc::new(LogObserver));
        }
        self
    }

    /// Reports every command and raw reply to `observer` instead of the log.
    ///
    /// Independent of the debug flag.
    pub fn with_observer(mut self, observer: Arc<dyn CommandObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Marks the device as having satellite devices attached.
    pub fn with_satellite(mut self) -> Self {
        self.satellite = true;
        self
    }

    /// Runs a command and deserializes the XML result into `T`.
    ///
    /// In NETCONF mode every line break is removed from the body first.
    pub async fn run_command_and_parse<T>(&self, command: &str) -> Result<T, ConnectError>
    where
        T: DeserializeOwned,
    {
        let strategy = self.conn.strategy();
        self.run_command_and_parse_with_parser(command, |body| {
            let body = strategy.sanitize(body);
            quick_xml::de::from_reader(&body[..])
        })
        .await
    }

    /// Runs a command and hands the reply body to `parser`.
    ///
    /// Shell replies are unwrapped from their `rpc-reply` envelope first; a
    /// broken envelope fails with [`ConnectError::EnvelopeDecodeFailed`]
    /// before `parser` is called. Errors from the session manager are returned
    /// unchanged.
    pub async fn run_command_and_parse_with_parser<F, R, E>(
        &self,
        command: &str,
        parser: F,
    ) -> Result<R, ConnectError>
    where
        F: FnOnce(&[u8]) -> Result<R, E>,
        E: Into<DecodeError>,
    {
        let device = self.conn.device();
        let strategy = self.conn.strategy();
        let observer = self.observer.as_deref();

        if let Some(observer) = observer {
            observer.command_sent(device, command);
        }

        let wire_command = strategy.wire_command(command);
        let raw = match self.conn.run_command(&wire_command).await {
            Ok(raw) => raw,
            Err(err) => {
                if let Some(observer) = observer {
                    observer.command_failed(device, command, &err);
                }
                return Err(err);
            }
        };

        if let Some(observer) = observer {
            observer.response_received(device, command, &raw);
        }

        let body = strategy.unwrap_reply(&raw)?;
        parser(body).map_err(|e| ConnectError::DecodeFailed(e.into()))
    }

    /// The device this client talks to.
    pub fn device(&self) -> &Device {
        self.conn.device()
    }

    /// The session manager underneath.
    pub fn connection(&self) -> &Arc<SshConnection> {
        &self.conn
    }

    /// Returns if satellite features are enabled on the device.
    pub fn is_satellite_enabled(&self) -> bool {
        self.satellite
    }

    /// Returns if commands go over NETCONF.
    pub fn is_netconf_enabled(&self) -> bool {
        self.conn.mode() == Mode::Netconf
    }

    /// Returns if commands and replies are logged.
    pub fn is_debug_enabled(&self) -> bool {
        self.debug
    }
}
