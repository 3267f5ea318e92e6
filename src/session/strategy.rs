use super::*;

/// One way of running a command, chosen once when the manager is built.
///
/// Besides execution a strategy owns the wire shaping that belongs to its
/// protocol, so a NETCONF body can never be pushed through the shell-only
/// envelope unwrap.
#[async_trait]
pub(crate) trait ExecutionStrategy: Send + Sync {
    fn mode(&self) -> Mode;

    /// Runs `command` with the lock already held.
    async fn execute(
        &self,
        state: &mut SessionState,
        device: &Device,
        command: &str,
    ) -> Result<Vec<u8>, ConnectError>;

    /// The command as it is sent to the device.
    fn wire_command<'a>(&self, command: &'a str) -> Cow<'a, str>;

    /// Strips the transport envelope off a raw reply.
    fn unwrap_reply<'a>(&self, raw: &'a [u8]) -> Result<&'a [u8], ConnectError>;

    /// Normalization applied by the default decoder before XML parsing.
    fn sanitize<'a>(&self, body: &'a [u8]) -> Cow<'a, [u8]>;
}

pub(super) fn for_mode(mode: Mode) -> Box<dyn ExecutionStrategy> {
    match mode {
        Mode::Shell => Box::new(ShellStrategy),
        Mode::Netconf => Box::new(NetconfStrategy {
            timeout: RPC_TIMEOUT,
        }),
    }
}

/// Runs each command on a fresh exec channel.
pub(crate) struct ShellStrategy;

#[async_trait]
impl ExecutionStrategy for ShellStrategy {
    fn mode(&self) -> Mode {
        Mode::Shell
    }

    async fn execute(
        &self,
        state: &mut SessionState,
        _device: &Device,
        command: &str,
    ) -> Result<Vec<u8>, ConnectError> {
        let transport = state
            .transport
            .as_deref()
            .ok_or(ConnectError::NotConnected)?;

        transport
            .exec(command)
            .await
            .map_err(ConnectError::CommandFailed)
    }

    fn wire_command<'a>(&self, command: &'a str) -> Cow<'a, str> {
        Cow::Owned(format!("{command}{DISPLAY_XML_SUFFIX}"))
    }

    fn unwrap_reply<'a>(&self, raw: &'a [u8]) -> Result<&'a [u8], ConnectError> {
        unwrap_reply(raw).map_err(ConnectError::EnvelopeDecodeFailed)
    }

    fn sanitize<'a>(&self, body: &'a [u8]) -> Cow<'a, [u8]> {
        Cow::Borrowed(body)
    }
}

/// Runs each command as one RPC on a sticky NETCONF session.
pub(crate) struct NetconfStrategy {
    timeout: Duration,
}

#[async_trait]
impl ExecutionStrategy for NetconfStrategy {
    fn mode(&self) -> Mode {
        Mode::Netconf
    }

    async fn execute(
        &self,
        state: &mut SessionState,
        device: &Device,
        command: &str,
    ) -> Result<Vec<u8>, ConnectError> {
        let SessionState {
            transport,
            rpc_session,
            ..
        } = state;
        let transport = transport.as_deref().ok_or(ConnectError::NotConnected)?;

        let session = match rpc_session.take() {
            Some(session) => session,
            None => {
                let session = transport
                    .open_rpc_session()
                    .await
                    .map_err(ConnectError::SessionSetupFailed)?;
                debug!("{} netconf session opened", device.addr());
                session
            }
        };
        let session = rpc_session.insert(session);

        let request = RpcRequest::new(command);
        let outcome = tokio::time::timeout(self.timeout, session.call(&request)).await;
        match outcome {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(err)) if err.is_eof() => {
                warn!(
                    "{} netconf session lost, closing to force a reopen",
                    device.addr()
                );
                if let Some(mut dead) = rpc_session.take() {
                    match tokio::time::timeout(self.timeout, dead.close()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => debug!("{} closing lost session: {}", device.addr(), e),
                        Err(_) => debug!("{} closing lost session timed out", device.addr()),
                    }
                }
                Err(ConnectError::SessionLost(err))
            }
            Ok(Err(err)) => Err(ConnectError::CommandFailed(err)),
            Err(_) => {
                warn!(
                    "{} netconf request {} timed out after {:?}",
                    device.addr(),
                    request.name(),
                    self.timeout
                );
                Err(ConnectError::Timeout(self.timeout))
            }
        }
    }

    fn wire_command<'a>(&self, command: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(command)
    }

    // NETCONF bodies arrive unwrapped from the session.
    fn unwrap_reply<'a>(&self, raw: &'a [u8]) -> Result<&'a [u8], ConnectError> {
        Ok(raw)
    }

    /// Junos puts raw line breaks inside element values, e.g. interface
    /// descriptions; they are dropped before decoding.
    fn sanitize<'a>(&self, body: &'a [u8]) -> Cow<'a, [u8]> {
        if !body.iter().any(|b| matches!(b, b'\n' | b'\r')) {
            return Cow::Borrowed(body);
        }
        Cow::Owned(
            body.iter()
                .copied()
                .filter(|b| !matches!(b, b'\n' | b'\r'))
                .collect(),
        )
    }
}
