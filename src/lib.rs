//! # junos-session - Device Session Manager for Junos Exporters
//!
//! `junos-session` runs operational queries against a network device over one
//! persistent SSH connection and hands back decoded XML. Two mutually exclusive
//! ways of talking to the device sit behind the same call:
//!
//! - **Shell mode**: every command runs on a fresh SSH exec channel with
//!   `| display xml` appended; the `rpc-reply` envelope is stripped from the
//!   output.
//! - **NETCONF mode**: every command is one RPC on a NETCONF session that is
//!   opened lazily and reopened after the device drops it.
//!
//! ## Features
//!
//! - **Serialized access**: one lock per device, so collectors can share a
//!   connection safely
//! - **Self-healing NETCONF**: a session lost to end-of-stream is discarded and
//!   rebuilt by the next call
//! - **Bounded RPCs**: NETCONF requests time out after 15 seconds
//! - **Pluggable decoding**: decode into any `serde` type, or bring a parser
//! - **Observer hook**: log or record every command and raw reply
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use junos_session::device::Device;
//! use junos_session::features::{Collector, alarm::AlarmCollector};
//! use junos_session::rpc::RpcClient;
//! use junos_session::session::{Mode, SshConnection};
//! use junos_session::transport::ConnectionSecurityOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = Device::with_password("192.168.1.1", "exporter", "password");
//!     let conn = SshConnection::connect(
//!         device,
//!         &ConnectionSecurityOptions::default(),
//!         Mode::Netconf,
//!     )
//!     .await?;
//!
//!     let client = RpcClient::new(Arc::new(conn)).with_debug();
//!     let collector = AlarmCollector::new(None)?;
//!     for metric in collector.collect(&client, "192.168.1.1").await? {
//!         println!("{} {:?} {}", metric.name, metric.labels, metric.value);
//!     }
//!
//!     client.connection().close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`session::SshConnection`] - Session manager for one device
//! - [`rpc::RpcClient`] - Wire shaping, envelope unwrap and decoding
//! - [`transport::Transport`] - Seam between the manager and the network
//! - [`error::ConnectError`] - Error kinds surfaced to callers
//! - [`config`] - Constants and SSH algorithm preferences

pub mod config;
pub mod device;
pub mod envelope;
pub mod error;
pub mod features;
pub mod rpc;
pub mod session;
pub mod transport;
