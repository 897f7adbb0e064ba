//! Wire framing for booking IPC.
//!
//! A frame is a 4-byte big-endian length followed by the JSON-encoded
//! envelope. The length covers the payload only, never the prefix, and is
//! capped at [`MAX_MESSAGE_SIZE`] on both ends: a booking round trip is a
//! handful of kilobytes even with an invite attached, so anything near the
//! cap is a broken or hostile peer.
//!
//! The async server reads the prefix and payload itself (timeouts live
//! there) and hands the payload bytes to [`decode_payload`];
//! [`encode_message`] and [`decode_message`] operate on whole frames and
//! serve the write path and in-process clients.

use serde::{Serialize, de::DeserializeOwned};

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Encodes an envelope into a complete frame.
///
/// # Errors
///
/// Fails when the JSON form exceeds [`MAX_MESSAGE_SIZE`] or cannot be
/// serialized.
pub fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    let len = json.len() as u32;

    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut frame = Vec::with_capacity(4 + json.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&json);
    Ok(frame)
}

/// Decodes a complete frame (length prefix included).
///
/// # Errors
///
/// Fails when the buffer is shorter than its prefix claims, the claimed
/// length exceeds the cap, or the payload is not valid JSON for `T`.
pub fn decode_message<T: DeserializeOwned>(frame: &[u8]) -> ProtocolResult<T> {
    if frame.len() < 4 {
        return Err(ProtocolError::IncompleteMessage {
            expected: 4,
            received: frame.len(),
        });
    }

    let len_bytes: [u8; 4] = frame[0..4].try_into().expect("sliced to four bytes");
    let len = u32::from_be_bytes(len_bytes) as usize;

    if len > MAX_MESSAGE_SIZE as usize {
        return Err(ProtocolError::MessageTooLarge {
            size: len as u32,
            max: MAX_MESSAGE_SIZE,
        });
    }
    if frame.len() < 4 + len {
        return Err(ProtocolError::IncompleteMessage {
            expected: 4 + len,
            received: frame.len(),
        });
    }

    decode_payload(&frame[4..4 + len])
}

/// Decodes a payload whose length prefix has already been consumed.
///
/// This is the server-side entry point: the connection reads the prefix
/// under its own timeout, sizes the buffer, and parses here.
///
/// # Errors
///
/// Fails on an empty payload, a payload over the cap, or invalid JSON.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> ProtocolResult<T> {
    if payload.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if payload.len() > MAX_MESSAGE_SIZE as usize {
        return Err(ProtocolError::MessageTooLarge {
            size: payload.len() as u32,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Envelope, Request, Response};
    use chrono::NaiveDate;

    fn availability_envelope() -> Envelope<Request> {
        Envelope::request(
            "web-42",
            Request::availability(NaiveDate::from_ymd_opt(2025, 2, 4).unwrap()),
        )
    }

    #[test]
    fn frame_roundtrip() {
        let envelope = availability_envelope();
        let frame = encode_message(&envelope).unwrap();

        let len = u32::from_be_bytes(frame[0..4].try_into().unwrap());
        assert_eq!(len as usize, frame.len() - 4);

        let decoded: Envelope<Request> = decode_message(&frame).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn length_counts_octets_not_chars() {
        // Customer names are UTF-8; the prefix must count bytes.
        let envelope = Envelope::request(
            "web-43",
            Request::Book {
                customer_name: "Jörg Müller-Lüdenscheidt".to_string(),
                customer_email: "joerg@example.at".to_string(),
                start: chrono::Utc::now(),
                location: None,
                notes: Some("Rückfrage zur Terminänderung".to_string()),
            },
        );
        let frame = encode_message(&envelope).unwrap();
        let len = u32::from_be_bytes(frame[0..4].try_into().unwrap());
        assert_eq!(len as usize, frame.len() - 4);

        let decoded: Envelope<Request> = decode_message(&frame).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn payload_decode_matches_frame_decode() {
        let envelope = availability_envelope();
        let frame = encode_message(&envelope).unwrap();

        let from_payload: Envelope<Request> = decode_payload(&frame[4..]).unwrap();
        assert_eq!(from_payload, envelope);
    }

    #[test]
    fn truncated_prefix_rejected() {
        let result: ProtocolResult<Envelope<Request>> = decode_message(&[0, 0]);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { expected: 4, .. })
        ));
    }

    #[test]
    fn truncated_payload_rejected() {
        let mut frame = encode_message(&availability_envelope()).unwrap();
        frame.truncate(frame.len() - 1);

        let result: ProtocolResult<Envelope<Request>> = decode_message(&frame);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { .. })
        ));
    }

    #[test]
    fn oversized_claim_rejected_before_parsing() {
        let frame = (MAX_MESSAGE_SIZE + 1).to_be_bytes();
        let result: ProtocolResult<Envelope<Request>> = decode_message(&frame);
        assert!(matches!(result, Err(ProtocolError::MessageTooLarge { .. })));
    }

    #[test]
    fn empty_payload_rejected() {
        let result: ProtocolResult<Envelope<Request>> = decode_payload(&[]);
        assert!(matches!(result, Err(ProtocolError::EmptyMessage)));
    }

    #[test]
    fn garbage_payload_is_a_serialization_error() {
        let result: ProtocolResult<Envelope<Response>> = decode_payload(b"not json");
        assert!(matches!(result, Err(ProtocolError::Serialization(_))));
    }
}
