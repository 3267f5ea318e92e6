use super::*;
use crate::transport::{ConnectionSecurityOptions, SshTransport};

impl SshConnection {
    /// Creates a manager around an already connected transport.
    ///
    /// The execution strategy is picked here from `mode` and never changes.
    pub fn new(device: Arc<Device>, transport: Box<dyn Transport>, mode: Mode) -> Self {
        let (close_tx, close_rx) = oneshot::channel();

        Self {
            device,
            strategy: strategy::for_mode(mode),
            state: Mutex::new(SessionState {
                transport: Some(transport),
                rpc_session: None,
                last_used: Instant::now(),
                close_tx: Some(close_tx),
            }),
            close_rx: std::sync::Mutex::new(Some(close_rx)),
        }
    }

    /// Connects to `device` over SSH and wraps the connection.
    pub async fn connect(
        device: Device,
        security_options: &ConnectionSecurityOptions,
        mode: Mode,
    ) -> Result<Self, crate::error::TransportError> {
        let transport = SshTransport::connect(&device, security_options).await?;
        Ok(Self::new(Arc::new(device), Box::new(transport), mode))
    }

    /// Runs a command against the device and returns the raw reply.
    ///
    /// In shell mode this is the command's standard output; in NETCONF mode it
    /// is the body of the `rpc-reply`. Calls are serialized: the lock is held
    /// for the full duration of the command.
    pub async fn run_command(&self, command: &str) -> Result<Vec<u8>, ConnectError> {
        let mut state = self.state.lock().await;
        state.last_used = Instant::now();

        trace!("{} running: {}", self.device.addr(), command);
        self.strategy
            .execute(&mut state, &self.device, command)
            .await
    }

    /// Drops the transport and any NETCONF session without a graceful
    /// shutdown and without sending the close notification.
    ///
    /// Meant for devices that stopped responding.
    pub async fn terminate(&self) {
        let mut state = self.state.lock().await;

        state.rpc_session = None;
        if state.transport.take().is_some() {
            debug!("{} connection terminated", self.device.addr());
        }
    }

    /// Shuts the connection down and notifies the lifecycle owner.
    ///
    /// The NETCONF session is closed first, then the transport; each step
    /// gets the RPC deadline, after which it is abandoned. The close
    /// notification is delivered on the first call only; later calls do
    /// nothing.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;

        if let Some(mut session) = state.rpc_session.take() {
            match tokio::time::timeout(RPC_TIMEOUT, session.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("{} closing netconf session: {}", self.device.addr(), e),
                Err(_) => debug!("{} closing netconf session timed out", self.device.addr()),
            }
        }

        if let Some(transport) = state.transport.take() {
            match tokio::time::timeout(RPC_TIMEOUT, transport.disconnect()).await {
                Ok(Ok(())) => debug!("{} connection closed", self.device.addr()),
                Ok(Err(e)) => debug!("{} error closing connection: {}", self.device.addr(), e),
                Err(_) => debug!("{} closing connection timed out", self.device.addr()),
            }
        }

        if let Some(close_tx) = state.close_tx.take() {
            // Nobody listening is fine.
            let _ = close_tx.send(());
        }
    }

    /// Hands out the close notification receiver. Only the first caller gets
    /// it.
    pub fn close_notifier(&self) -> Option<oneshot::Receiver<()>> {
        self.close_rx.lock().ok()?.take()
    }

    /// Whether a transport is attached.
    ///
    /// Advisory only: the answer may be stale by the time `run_command` takes
    /// the lock. A manager busy running a command reports `true`.
    pub fn is_connected(&self) -> bool {
        self.state
            .try_lock()
            .map(|state| state.transport.is_some())
            .unwrap_or(true)
    }

    /// Whether a NETCONF session is currently open.
    pub async fn has_rpc_session(&self) -> bool {
        self.state.lock().await.rpc_session.is_some()
    }

    /// When the last command was attempted, for idle eviction by the owner.
    pub async fn last_used(&self) -> Instant {
        self.state.lock().await.last_used
    }

    /// The device this manager talks to.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Hostname of the device.
    pub fn host(&self) -> &str {
        &self.device.host
    }

    /// Execution mode picked at construction.
    pub fn mode(&self) -> Mode {
        self.strategy.mode()
    }

    pub(crate) fn strategy(&self) -> &dyn ExecutionStrategy {
        self.strategy.as_ref()
    }
}
