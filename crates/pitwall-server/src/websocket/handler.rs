//! Inbound message decoding.

use pitwall_core::{Command, ServerEvent};
use pitwall_replay::ReplayError;
use tracing::{debug, warn};

/// Decode a text frame into a [`Command`].
pub fn decode_text(message: &str) -> Result<Command, ReplayError> {
    match Command::parse(message) {
        Ok(command) => {
            debug!(action = command.action(), "command received");
            Ok(command)
        }
        Err(e) => {
            warn!(len = message.len(), "invalid command received");
            Err(e.into())
        }
    }
}

/// Decode a binary frame. Some clients send JSON as binary.
pub fn decode_binary(data: &[u8]) -> Result<Command, ReplayError> {
    match std::str::from_utf8(data) {
        Ok(text) => decode_text(text),
        Err(_) => {
            warn!(len = data.len(), "received non-UTF8 binary frame");
            Err(ReplayError::Protocol("binary frame is not UTF-8".into()))
        }
    }
}

/// `error` event reporting `err` to the viewer that caused it.
pub fn error_event(err: &ReplayError) -> ServerEvent {
    ServerEvent::error(err.to_string(), err.kind())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_seek() {
        let cmd = decode_text(r#"{"action":"seek","time_ms":1500}"#).unwrap();
        assert_eq!(cmd, Command::Seek { time_ms: 1500.0 });
    }

    #[test]
    fn malformed_json_is_protocol_error() {
        let err = decode_text("{not json").unwrap_err();
        assert_eq!(err.kind(), "protocol");
        assert!(!err.is_fatal());
    }

    #[test]
    fn unknown_action_is_protocol_error() {
        let err = decode_text(r#"{"action":"rewind"}"#).unwrap_err();
        assert_eq!(err.kind(), "protocol");
    }

    #[test]
    fn seek_without_target_is_protocol_error() {
        let err = decode_text(r#"{"action":"seek"}"#).unwrap_err();
        assert_eq!(err.kind(), "protocol");
    }

    #[test]
    fn binary_utf8_is_decoded() {
        let cmd = decode_binary(br#"{"action":"play"}"#).unwrap();
        assert_eq!(cmd, Command::Play);
    }

    #[test]
    fn binary_non_utf8_is_rejected() {
        let err = decode_binary(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert_eq!(err.kind(), "protocol");
    }

    #[test]
    fn error_event_carries_kind() {
        let err = ReplayError::InvalidSpeed {
            requested: 50.0,
            min: 0.1,
            max: 20.0,
        };
        let json = serde_json::to_value(error_event(&err)).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["data"]["kind"], "invalid_speed");
        assert!(json["data"]["reason"].as_str().unwrap().contains("50"));
    }
}
