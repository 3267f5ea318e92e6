//! `rpc-reply` envelope handling.
//!
//! Shell replies produced by `| display xml` and NETCONF replies share the same
//! outer element. Only the inner body is handed to decoders; the wrapper is
//! dropped.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::EnvelopeError;

const RPC_REPLY: &[u8] = b"rpc-reply";

/// Returns the bytes between `<rpc-reply ...>` and its closing tag.
///
/// Declarations, comments and whitespace before the envelope are skipped, as
/// is anything after it. A self-closing `<rpc-reply/>` yields an empty body.
pub fn unwrap_reply(raw: &[u8]) -> Result<&[u8], EnvelopeError> {
    let mut reader = Reader::from_reader(raw);
    let mut body_start: Option<usize> = None;
    let mut depth = 0usize;

    loop {
        let event_start = reader.buffer_position() as usize;
        let event = reader.read_event()?;

        match (body_start, event) {
            (None, Event::Start(e)) => {
                if e.local_name().as_ref() != RPC_REPLY {
                    return Err(EnvelopeError::UnexpectedRoot(
                        String::from_utf8_lossy(e.name().as_ref()).to_string(),
                    ));
                }
                body_start = Some(reader.buffer_position() as usize);
            }
            (None, Event::Empty(e)) => {
                if e.local_name().as_ref() != RPC_REPLY {
                    return Err(EnvelopeError::UnexpectedRoot(
                        String::from_utf8_lossy(e.name().as_ref()).to_string(),
                    ));
                }
                return Ok(&raw[..0]);
            }
            (None, Event::Eof) => return Err(EnvelopeError::Empty),
            (None, _) => {}
            (Some(_), Event::Start(_)) => depth += 1,
            (Some(start), Event::End(_)) => {
                if depth == 0 {
                    return Ok(&raw[start..event_start]);
                }
                depth -= 1;
            }
            (Some(_), Event::Eof) => return Err(EnvelopeError::Unterminated),
            (Some(_), _) => {}
        }
    }
}

/// Finds the first `rpc-error` with severity `error` in a reply body.
///
/// Returns its `error-message`, or the `error-tag` when the device sent no
/// message. Warnings are ignored.
pub(crate) fn find_rpc_error(body: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut in_error = false;
    let mut current: Option<Vec<u8>> = None;
    let mut severity = String::new();
    let mut tag = String::new();
    let mut message = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"rpc-error" {
                    in_error = true;
                    severity.clear();
                    tag.clear();
                    message.clear();
                } else if in_error {
                    current = Some(name);
                }
            }
            Ok(Event::Text(e)) if in_error => {
                let text = String::from_utf8_lossy(&e);
                match current.as_deref() {
                    Some(b"error-severity") => severity.push_str(&text),
                    Some(b"error-tag") => tag.push_str(&text),
                    Some(b"error-message") => message.push_str(&text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"rpc-error" {
                    in_error = false;
                    if severity.trim() != "warning" {
                        let text = if message.trim().is_empty() {
                            tag.trim()
                        } else {
                            message.trim()
                        };
                        return Some(text.to_string());
                    }
                }
                current = None;
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_inner_body_verbatim() {
        let raw = b"<rpc-reply><software-information/></rpc-reply>";
        assert_eq!(unwrap_reply(raw).unwrap(), b"<software-information/>");
    }

    #[test]
    fn keeps_whitespace_and_nested_elements() {
        let raw = b"<?xml version=\"1.0\"?>\n<rpc-reply xmlns:junos=\"http://xml.juniper.net/junos/21.4R0/junos\">\n<alarm-information>\n<alarm-summary><no-active-alarms/></alarm-summary>\n</alarm-information>\n<cli><banner></banner></cli>\n</rpc-reply>\n";
        let body = unwrap_reply(raw).unwrap();

        assert_eq!(
            body,
            &b"\n<alarm-information>\n<alarm-summary><no-active-alarms/></alarm-summary>\n</alarm-information>\n<cli><banner></banner></cli>\n"[..]
        );
    }

    #[test]
    fn self_closing_reply_has_empty_body() {
        assert!(unwrap_reply(b"<rpc-reply/>").unwrap().is_empty());
    }

    #[test]
    fn rejects_other_root_element() {
        let err = unwrap_reply(b"<hello><capabilities/></hello>").unwrap_err();
        assert!(matches!(err, EnvelopeError::UnexpectedRoot(name) if name == "hello"));
    }

    #[test]
    fn rejects_plain_text() {
        let err = unwrap_reply(b"error: syntax error, expecting <command>").unwrap_err();
        assert!(!matches!(err, EnvelopeError::Unterminated));
    }

    #[test]
    fn rejects_truncated_reply() {
        assert!(unwrap_reply(b"<rpc-reply><route-information>").is_err());
    }

    #[test]
    fn finds_rpc_error_message() {
        let body = b"<rpc-error><error-type>protocol</error-type><error-tag>operation-failed</error-tag><error-severity>error</error-severity><error-message>syntax error</error-message></rpc-error>";
        assert_eq!(find_rpc_error(body).as_deref(), Some("syntax error"));
    }

    #[test]
    fn ignores_rpc_warnings() {
        let body = b"<rpc-error><error-severity>warning</error-severity><error-message>statement not found</error-message></rpc-error><alarm-information/>";
        assert_eq!(find_rpc_error(body), None);
    }

    #[test]
    fn falls_back_to_error_tag() {
        let body = b"<rpc-error><error-tag>access-denied</error-tag><error-severity>error</error-severity></rpc-error>";
        assert_eq!(find_rpc_error(body).as_deref(), Some("access-denied"));
    }
}
