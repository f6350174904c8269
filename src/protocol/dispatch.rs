//! Type dispatch: payload bytes to typed messages.
//!
//! Given a frame's data-type marker and payload, reconstructs the
//! [`Message`] it carries. Every error here is local to one frame: the
//! decoder already consumed the payload's byte range, so a malformed inner
//! payload never desynchronizes the stream.

use bytes::Bytes;

use super::message::Message;
use super::wire_format::{TypeMarker, LENGTH_PREFIX_SIZE};
use crate::error::{FramewireError, Result};

/// Parse a payload according to its marker.
///
/// # Errors
///
/// [`FramewireError::ProtocolViolation`] for an unknown marker, a negative
/// inner length, or an inner length exceeding the remaining payload;
/// [`FramewireError::ProtocolIncomplete`] when the payload is shorter than
/// the type requires.
pub fn dispatch(marker: u8, payload: &[u8]) -> Result<Message> {
    let Some(marker) = TypeMarker::from_u8(marker) else {
        return Err(FramewireError::ProtocolViolation(format!(
            "unknown marker received: 0x{:02X} ({} payload bytes)",
            marker,
            payload.len()
        )));
    };

    match marker {
        TypeMarker::Heartbeat => Ok(Message::Heartbeat),
        TypeMarker::Text => {
            let bytes = read_length_prefixed(payload, "string")?;
            Ok(Message::Text(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        }
        TypeMarker::Int32 => {
            let raw = read_exact::<4>(payload, marker)?;
            Ok(Message::Int32(i32::from_be_bytes(raw)))
        }
        TypeMarker::Float32 => {
            let raw = read_exact::<4>(payload, marker)?;
            Ok(Message::Float32(f32::from_be_bytes(raw)))
        }
        TypeMarker::Float64 => {
            let raw = read_exact::<8>(payload, marker)?;
            Ok(Message::Float64(f64::from_be_bytes(raw)))
        }
        TypeMarker::Char => {
            let raw = read_exact::<2>(payload, marker)?;
            Ok(Message::Char(u16::from_be_bytes(raw)))
        }
        TypeMarker::ByteArray => {
            let bytes = read_length_prefixed(payload, "byte array")?;
            Ok(Message::Bytes(bytes))
        }
    }
}

/// Read a fixed-size value occupying the whole payload.
fn read_exact<const N: usize>(payload: &[u8], marker: TypeMarker) -> Result<[u8; N]> {
    if payload.len() < N {
        return Err(FramewireError::ProtocolIncomplete(format!(
            "marker 0x{:02X} requires {} bytes, got {}",
            marker.as_u8(),
            N,
            payload.len()
        )));
    }
    if payload.len() > N {
        return Err(FramewireError::ProtocolViolation(format!(
            "marker 0x{:02X} requires exactly {} bytes, got {}",
            marker.as_u8(),
            N,
            payload.len()
        )));
    }
    Ok(payload[..N].try_into().expect("length checked"))
}

/// Read the redundant inner length prefix, then that many bytes.
fn read_length_prefixed(payload: &[u8], kind: &str) -> Result<Bytes> {
    if payload.len() < LENGTH_PREFIX_SIZE {
        return Err(FramewireError::ProtocolIncomplete(format!(
            "{} payload too short for its length prefix: {} bytes",
            kind,
            payload.len()
        )));
    }
    let length = i32::from_be_bytes(
        payload[..LENGTH_PREFIX_SIZE]
            .try_into()
            .expect("slice is four bytes"),
    );
    if length < 0 {
        return Err(FramewireError::ProtocolViolation(format!(
            "invalid negative {} length received: {}",
            kind, length
        )));
    }
    let length = length as usize;
    let rest = &payload[LENGTH_PREFIX_SIZE..];
    if length > rest.len() {
        return Err(FramewireError::ProtocolViolation(format!(
            "stated {} length {} is greater than remaining payload size {}",
            kind,
            length,
            rest.len()
        )));
    }
    Ok(Bytes::copy_from_slice(&rest[..length]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_payload(s: &str) -> Vec<u8> {
        let mut payload = (s.len() as u32).to_be_bytes().to_vec();
        payload.extend_from_slice(s.as_bytes());
        payload
    }

    #[test]
    fn test_heartbeat_ignores_payload() {
        assert_eq!(dispatch(0x00, &[]).unwrap(), Message::Heartbeat);
        assert_eq!(dispatch(0x00, &[1, 2, 3]).unwrap(), Message::Heartbeat);
    }

    #[test]
    fn test_string() {
        let msg = dispatch(0x01, &text_payload("hello")).unwrap();
        assert_eq!(msg, Message::Text("hello".to_string()));
    }

    #[test]
    fn test_empty_string() {
        let msg = dispatch(0x01, &text_payload("")).unwrap();
        assert_eq!(msg, Message::Text(String::new()));
    }

    #[test]
    fn test_string_with_embedded_nul() {
        let msg = dispatch(0x01, &text_payload("a\0b")).unwrap();
        assert_eq!(msg.as_text(), Some("a\0b"));
    }

    #[test]
    fn test_invalid_utf8_decodes_lossily() {
        let mut payload = 2u32.to_be_bytes().to_vec();
        payload.extend_from_slice(&[0xC3, 0x28]); // malformed sequence
        let msg = dispatch(0x01, &payload).unwrap();
        assert!(msg.as_text().unwrap().contains('\u{FFFD}'));
    }

    #[test]
    fn test_string_negative_length() {
        let payload = (-1i32).to_be_bytes().to_vec();
        let result = dispatch(0x01, &payload);
        assert!(matches!(result, Err(FramewireError::ProtocolViolation(_))));
    }

    #[test]
    fn test_string_length_exceeds_remaining() {
        let mut payload = 10u32.to_be_bytes().to_vec();
        payload.extend_from_slice(b"abc");
        let result = dispatch(0x01, &payload);
        assert!(matches!(result, Err(FramewireError::ProtocolViolation(_))));
    }

    #[test]
    fn test_string_too_short_for_prefix() {
        let result = dispatch(0x01, &[0, 0]);
        assert!(matches!(result, Err(FramewireError::ProtocolIncomplete(_))));
    }

    #[test]
    fn test_int32() {
        let msg = dispatch(0x02, &0x7FFF_FFFFi32.to_be_bytes()).unwrap();
        assert_eq!(msg, Message::Int32(2147483647));

        let msg = dispatch(0x02, &i32::MIN.to_be_bytes()).unwrap();
        assert_eq!(msg, Message::Int32(i32::MIN));
    }

    #[test]
    fn test_float32() {
        let msg = dispatch(0x03, &1.5f32.to_be_bytes()).unwrap();
        assert_eq!(msg, Message::Float32(1.5));
    }

    #[test]
    fn test_float64() {
        let msg = dispatch(0x04, &std::f64::consts::PI.to_be_bytes()).unwrap();
        match msg {
            Message::Float64(v) => {
                assert_eq!(v.to_bits(), std::f64::consts::PI.to_bits());
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_nan_survives() {
        let msg = dispatch(0x04, &f64::NAN.to_be_bytes()).unwrap();
        match msg {
            Message::Float64(v) => assert!(v.is_nan()),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_char() {
        let msg = dispatch(0x05, &0x263Au16.to_be_bytes()).unwrap();
        assert_eq!(msg, Message::Char(0x263A));
    }

    #[test]
    fn test_byte_array() {
        let mut payload = 3u32.to_be_bytes().to_vec();
        payload.extend_from_slice(&[9, 8, 7]);
        let msg = dispatch(0x06, &payload).unwrap();
        assert_eq!(msg.as_bytes(), Some(&[9u8, 8, 7][..]));
    }

    #[test]
    fn test_empty_byte_array() {
        let payload = 0u32.to_be_bytes().to_vec();
        let msg = dispatch(0x06, &payload).unwrap();
        assert_eq!(msg.as_bytes(), Some(&[][..]));
    }

    #[test]
    fn test_fixed_size_short_payload() {
        let result = dispatch(0x02, &[0, 0, 1]);
        assert!(matches!(result, Err(FramewireError::ProtocolIncomplete(_))));

        let result = dispatch(0x04, &[0; 7]);
        assert!(matches!(result, Err(FramewireError::ProtocolIncomplete(_))));
    }

    #[test]
    fn test_fixed_size_trailing_bytes_rejected() {
        let result = dispatch(0x02, &[0; 5]);
        assert!(matches!(result, Err(FramewireError::ProtocolViolation(_))));
    }

    #[test]
    fn test_unknown_marker_includes_value() {
        let result = dispatch(0x42, &[]);
        match result {
            Err(FramewireError::ProtocolViolation(msg)) => assert!(msg.contains("0x42")),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
