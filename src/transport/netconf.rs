//! NETCONF 1.0 over an SSH subsystem channel.
//!
//! Only end-of-message framing (`]]>]]>`) is spoken; the client hello
//! advertises base:1.0 alone so the device never switches to chunked framing.

use async_trait::async_trait;
use log::{debug, trace};
use quick_xml::Reader;
use quick_xml::events::Event;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{RpcRequest, RpcSession};
use crate::envelope::{find_rpc_error, unwrap_reply};
use crate::error::TransportError;

/// NETCONF 1.0 message delimiter.
pub const DELIMITER: &[u8] = b"]]>]]>";

const CLIENT_HELLO: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">"#,
    "<capabilities><capability>urn:ietf:params:netconf:base:1.0</capability></capabilities>",
    "</hello>"
);

const READ_CHUNK: usize = 8192;

/// An open NETCONF session on one byte stream, normally the stream of an SSH
/// channel running the `netconf` subsystem.
///
/// Every operation can be cancelled (e.g. by a timeout) without corrupting
/// the framing: unread input stays in `buffer` and an interrupted frame is
/// completed from `outgoing` before the next one is written.
pub struct NetconfSession<S> {
    stream: S,
    buffer: Vec<u8>,
    outgoing: Vec<u8>,
    next_message_id: u64,
    session_id: Option<u64>,
}

impl<S> NetconfSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Exchanges hellos on a stream that already runs the `netconf`
    /// subsystem.
    pub async fn handshake(stream: S) -> Result<Self, TransportError> {
        let mut session = Self {
            stream,
            buffer: Vec::new(),
            outgoing: Vec::new(),
            next_message_id: 1,
            session_id: None,
        };

        session.send(CLIENT_HELLO).await?;
        let hello = session.read_message().await?;
        session.session_id = parse_hello(&hello)?;
        debug!("netconf session {:?} established", session.session_id);

        Ok(session)
    }

    /// Session id the device assigned in its hello.
    pub fn session_id(&self) -> Option<u64> {
        self.session_id
    }

    async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        trace!("netconf send: {message}");
        // Finish a frame left behind by a cancelled call first.
        self.flush_outgoing().await?;
        self.outgoing.extend_from_slice(message.as_bytes());
        self.outgoing.extend_from_slice(DELIMITER);
        self.flush_outgoing().await
    }

    async fn flush_outgoing(&mut self) -> Result<(), TransportError> {
        while !self.outgoing.is_empty() {
            let written = self.stream.write(&self.outgoing).await.map_err(eof_or_io)?;
            if written == 0 {
                return Err(TransportError::Eof);
            }
            self.outgoing.drain(..written);
        }
        self.stream.flush().await.map_err(eof_or_io)?;
        Ok(())
    }

    async fn read_message(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(message) = take_message(&mut self.buffer) {
                return Ok(message);
            }
            let read = self.stream.read(&mut chunk).await.map_err(eof_or_io)?;
            if read == 0 {
                return Err(TransportError::Eof);
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }
}

#[async_trait]
impl<S> RpcSession for NetconfSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn call(&mut self, request: &RpcRequest) -> Result<Vec<u8>, TransportError> {
        let message_id = self.next_message_id;
        self.next_message_id += 1;

        self.send(&request.to_xml(message_id)).await?;

        loop {
            let message = self.read_message().await?;
            trace!("netconf recv: {}", String::from_utf8_lossy(&message));

            // Replies to requests abandoned after a timeout arrive late; skip them.
            if let Some(reply_id) = reply_message_id(&message)
                && reply_id != message_id
            {
                debug!("discarding stale reply {reply_id} while waiting for {message_id}");
                continue;
            }

            let body = unwrap_reply(&message)
                .map_err(|e| TransportError::Protocol(e.to_string()))?;
            if let Some(error) = find_rpc_error(body) {
                return Err(TransportError::Rpc(error));
            }
            return Ok(body.to_vec());
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let message_id = self.next_message_id;
        self.next_message_id += 1;

        let close = RpcRequest::new("close-session").to_xml(message_id);
        if let Err(e) = self.send(&close).await {
            debug!("could not send close-session: {e}");
        }
        self.stream.shutdown().await.map_err(eof_or_io)?;
        Ok(())
    }
}

/// A peer that went away mid-read or mid-write is end of stream.
fn eof_or_io(err: std::io::Error) -> TransportError {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => {
            TransportError::Eof
        }
        _ => TransportError::Io(err),
    }
}

/// Removes the first complete message from `buffer`, without its delimiter.
fn take_message(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = buffer
        .windows(DELIMITER.len())
        .position(|window| window == DELIMITER)?;
    let message = buffer[..end].to_vec();
    buffer.drain(..end + DELIMITER.len());
    Some(message)
}

/// Checks that a message is a `hello` and returns its `session-id`.
fn parse_hello(message: &[u8]) -> Result<Option<u64>, TransportError> {
    let mut reader = Reader::from_reader(message);
    reader.config_mut().trim_text(true);

    let mut seen_root = false;
    let mut in_session_id = false;
    let mut session_id = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if !seen_root {
                    if e.local_name().as_ref() != b"hello" {
                        return Err(TransportError::Protocol(format!(
                            "expected hello but found {}",
                            String::from_utf8_lossy(e.name().as_ref())
                        )));
                    }
                    seen_root = true;
                } else if e.local_name().as_ref() == b"session-id" {
                    in_session_id = true;
                }
            }
            Ok(Event::Empty(e)) if !seen_root => {
                if e.local_name().as_ref() != b"hello" {
                    return Err(TransportError::Protocol(format!(
                        "expected hello but found {}",
                        String::from_utf8_lossy(e.name().as_ref())
                    )));
                }
                seen_root = true;
            }
            Ok(Event::Text(e)) if in_session_id => {
                session_id = String::from_utf8_lossy(&e).trim().parse().ok();
            }
            Ok(Event::End(_)) => in_session_id = false,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(TransportError::Protocol(e.to_string())),
        }
    }

    if !seen_root {
        return Err(TransportError::Protocol("empty hello".to_string()));
    }
    Ok(session_id)
}

/// The `message-id` attribute of a reply's root element, if any.
fn reply_message_id(message: &[u8]) -> Option<u64> {
    let mut reader = Reader::from_reader(message);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let attr = e.try_get_attribute("message-id").ok()??;
                return std::str::from_utf8(&attr.value).ok()?.trim().parse().ok();
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}
