//! Per-device session management and command execution.
//!
//! [`SshConnection`] owns the transport to one device and, in NETCONF mode, a
//! lazily opened NETCONF session on top of it. Every command runs under one
//! exclusive lock, so traffic to a device is strictly serialized while
//! different devices proceed in parallel.
//!
//! # Main Components
//!
//! - [`SshConnection`] - Session manager for one device
//! - [`Mode`] - Shell or NETCONF execution, fixed at construction
//! - [`CommandObserver`] - Side channel for outgoing commands and raw replies
//! - [`SessionRecorder`] - In-memory observer with JSONL export

use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use log::{debug, trace, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, oneshot};

use crate::config::{DISPLAY_XML_SUFFIX, RPC_TIMEOUT};
use crate::device::Device;
use crate::envelope::unwrap_reply;
use crate::error::ConnectError;
use crate::transport::{RpcRequest, RpcSession, Transport};

pub use recording::{
    CommandObserver, LogObserver, SessionEvent, SessionRecordEntry, SessionRecordLevel,
    SessionRecorder,
};

/// How commands reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// CLI commands on SSH exec channels, answered as `| display xml`.
    #[default]
    Shell,
    /// RPCs on a NETCONF session.
    Netconf,
}

/// Session manager for one device.
///
/// Share it as `Arc<SshConnection>` between collectors; the manager is the
/// only synchronization point for the transport.
pub struct SshConnection {
    device: Arc<Device>,
    strategy: Box<dyn ExecutionStrategy>,
    state: Mutex<SessionState>,
    close_rx: std::sync::Mutex<Option<oneshot::Receiver<()>>>,
}

/// Everything guarded by the manager's lock.
pub(crate) struct SessionState {
    transport: Option<Box<dyn Transport>>,
    /// Only `Some` while `transport` is.
    rpc_session: Option<Box<dyn RpcSession>>,
    last_used: Instant,
    close_tx: Option<oneshot::Sender<()>>,
}

mod connection;
mod recording;
mod strategy;

pub(crate) use strategy::ExecutionStrategy;
