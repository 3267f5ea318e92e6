#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use junos_session::device::Device;
use junos_session::error::TransportError;
use junos_session::session::{Mode, SshConnection};
use junos_session::transport::{RpcRequest, RpcSession, Transport};

/// What the next NETCONF call answers.
pub enum Outcome {
    Reply(Vec<u8>),
    Eof,
    Fail(String),
    Hang,
}

/// Shared, inspectable state behind a stub transport and its sessions.
#[derive(Default)]
pub struct StubState {
    pub exec_commands: Mutex<Vec<String>>,
    pub exec_replies: Mutex<HashMap<String, Vec<u8>>>,
    pub exec_error: AtomicBool,
    pub exec_delay: Mutex<Option<Duration>>,

    pub sessions_opened: AtomicUsize,
    pub session_closes: AtomicUsize,
    pub hang_session_close: AtomicBool,
    pub fail_session_setup: AtomicBool,
    pub rpc_requests: Mutex<Vec<RpcRequest>>,
    pub rpc_replies: Mutex<HashMap<String, Vec<u8>>>,
    pub rpc_script: Mutex<VecDeque<Outcome>>,

    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,

    pub disconnects: AtomicUsize,
    pub hang_disconnect: AtomicBool,
    pub drops: AtomicUsize,
}

impl StubState {
    pub fn set_exec_reply(&self, command: &str, reply: &str) {
        self.exec_replies
            .lock()
            .unwrap()
            .insert(command.to_string(), reply.as_bytes().to_vec());
    }

    pub fn set_rpc_reply(&self, operation: &str, reply: &str) {
        self.rpc_replies
            .lock()
            .unwrap()
            .insert(operation.to_string(), reply.as_bytes().to_vec());
    }

    pub fn script(&self, outcome: Outcome) {
        self.rpc_script.lock().unwrap().push_back(outcome);
    }

    pub fn exec_commands(&self) -> Vec<String> {
        self.exec_commands.lock().unwrap().clone()
    }

    pub fn rpc_names(&self) -> Vec<String> {
        self.rpc_requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.name().to_string())
            .collect()
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct StubTransport {
    pub state: Arc<StubState>,
}

impl Drop for StubTransport {
    fn drop(&mut self) {
        self.state.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn exec(&self, command: &str) -> Result<Vec<u8>, TransportError> {
        self.state.enter();
        let delay = *self.state.exec_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state
            .exec_commands
            .lock()
            .unwrap()
            .push(command.to_string());
        self.state.leave();

        if self.state.exec_error.load(Ordering::SeqCst) {
            return Err(TransportError::ExitStatus {
                status: 1,
                stderr: "error: syntax error".to_string(),
            });
        }
        let reply = self
            .state
            .exec_replies
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or_else(|| b"<rpc-reply><ok/></rpc-reply>".to_vec());
        Ok(reply)
    }

    async fn open_rpc_session(&self) -> Result<Box<dyn RpcSession>, TransportError> {
        if self.state.fail_session_setup.load(Ordering::SeqCst) {
            return Err(TransportError::Protocol("subsystem request denied".to_string()));
        }
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubSession {
            state: self.state.clone(),
        }))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.state.hang_disconnect.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

pub struct StubSession {
    state: Arc<StubState>,
}

#[async_trait]
impl RpcSession for StubSession {
    async fn call(&mut self, request: &RpcRequest) -> Result<Vec<u8>, TransportError> {
        self.state.rpc_requests.lock().unwrap().push(request.clone());

        let outcome = self.state.rpc_script.lock().unwrap().pop_front();
        match outcome {
            Some(Outcome::Reply(body)) => Ok(body),
            Some(Outcome::Eof) => Err(TransportError::Eof),
            Some(Outcome::Fail(message)) => Err(TransportError::Rpc(message)),
            Some(Outcome::Hang) => std::future::pending().await,
            None => Ok(self
                .state
                .rpc_replies
                .lock()
                .unwrap()
                .get(request.name())
                .cloned()
                .unwrap_or_else(|| b"<ok/>".to_vec())),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.state.session_closes.fetch_add(1, Ordering::SeqCst);
        if self.state.hang_session_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

pub fn device() -> Arc<Device> {
    Arc::new(Device::with_password("router1", "exporter", "secret"))
}

/// A manager over a fresh stub transport, plus the stub's state.
pub fn connection(mode: Mode) -> (Arc<SshConnection>, Arc<StubState>) {
    let state = Arc::new(StubState::default());
    let transport = StubTransport {
        state: state.clone(),
    };
    let conn = SshConnection::new(device(), Box::new(transport), mode);
    (Arc::new(conn), state)
}
