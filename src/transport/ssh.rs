use async_ssh2_tokio::Config;
use async_ssh2_tokio::client::Client;
use async_trait::async_trait;
use log::{debug, trace};
use russh::client::Msg;
use russh::{Channel, ChannelMsg};

use super::{ConnectionSecurityOptions, NetconfSession, RpcSession, Transport};
use crate::config::{INACTIVITY_TIMEOUT, NETCONF_SUBSYSTEM};
use crate::device::Device;
use crate::error::TransportError;

/// SSH connection to one device.
pub struct SshTransport {
    client: Client,
    device_addr: String,
}

impl SshTransport {
    /// Connects and authenticates to `device`.
    pub async fn connect(
        device: &Device,
        security_options: &ConnectionSecurityOptions,
    ) -> Result<Self, TransportError> {
        let device_addr = device.addr();

        let config = Config {
            preferred: security_options.preferred(),
            inactivity_timeout: Some(INACTIVITY_TIMEOUT),
            ..Default::default()
        };

        let client = Client::connect_with_config(
            (device.host.clone(), device.port),
            &device.username,
            device.auth.to_auth_method(),
            security_options.server_check.clone(),
            config,
        )
        .await?;
        debug!("{} SSH connection established", device_addr);

        Ok(Self {
            client,
            device_addr,
        })
    }

    /// Checks if the underlying SSH connection is still open.
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn exec(&self, command: &str) -> Result<Vec<u8>, TransportError> {
        let mut channel = self.client.get_channel().await?;
        let result = exec_on_channel(&mut channel, command).await;
        if let Err(e) = channel.close().await {
            trace!("{} closing exec channel: {:?}", self.device_addr, e);
        }
        result
    }

    async fn open_rpc_session(&self) -> Result<Box<dyn RpcSession>, TransportError> {
        let channel = self.client.get_channel().await?;
        channel.request_subsystem(true, NETCONF_SUBSYSTEM).await?;
        debug!("{} netconf subsystem started", self.device_addr);

        let session = NetconfSession::handshake(channel.into_stream()).await?;
        Ok(Box::new(session))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        debug!("{} disconnecting", self.device_addr);
        self.client.disconnect().await?;
        Ok(())
    }
}

async fn exec_on_channel(
    channel: &mut Channel<Msg>,
    command: &str,
) -> Result<Vec<u8>, TransportError> {
    channel.exec(true, command).await?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_status = None;

    // ExitStatus may precede the last Data message, so drain until the channel ends.
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext } if ext == 1 => {
                stderr.extend_from_slice(data)
            }
            ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
            _ => {}
        }
    }

    match exit_status {
        Some(0) => Ok(stdout),
        Some(status) => Err(TransportError::ExitStatus {
            status,
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        }),
        None => Err(TransportError::NoExitStatus),
    }
}
