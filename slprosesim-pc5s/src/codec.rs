//! PC5 signalling message encoding/decoding
//!
//! This module provides functions to encode and decode PC5 signalling
//! messages for transmission over the sidelink signalling radio bearer.
//! The message type occupies the first byte, followed by the 16-bit
//! sequence number and the message-specific fields.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::protocol::{
    DirectLinkEstablishmentAccept, DirectLinkEstablishmentReject, DirectLinkEstablishmentRequest,
    DirectLinkReleaseAccept, DirectLinkReleaseRequest, Pc5MessageType, Pc5SignallingCause,
    Pc5SignallingMessage,
};

/// Relay service codes are serialized in a 24-bit field
const MAX_RELAY_SERVICE_CODE: u32 = 0x00FF_FFFF;

/// Errors that can occur during PC5 signalling message encoding/decoding
#[derive(Debug, Error)]
pub enum Pc5sCodecError {
    /// Unknown message type
    #[error("unknown PC5 signalling message type: {0}")]
    UnknownMessageType(u8),

    /// Unknown PC5 signalling cause value
    #[error("unknown PC5 signalling cause value: {0}")]
    UnknownCause(u8),

    /// Invalid optional-field presence flag
    #[error("invalid optional-field presence flag: {0}")]
    InvalidPresenceFlag(u8),

    /// Buffer too short
    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort {
        /// Number of bytes needed
        needed: usize,
        /// Number of bytes available
        available: usize,
    },
}

/// Result type for PC5 signalling codec operations
pub type Result<T> = std::result::Result<T, Pc5sCodecError>;

/// Encodes a PC5 signalling message into a byte buffer
pub fn encode(msg: &Pc5SignallingMessage) -> Bytes {
    let mut buf = BytesMut::with_capacity(64);
    encode_into(msg, &mut buf);
    buf.freeze()
}

/// Encodes a PC5 signalling message into an existing buffer
///
/// Panics if a variable-length field exceeds its one-byte length prefix or
/// a relay service code exceeds its 24-bit field; both indicate a scenario
/// configuration bug, not a runtime condition.
pub fn encode_into(msg: &Pc5SignallingMessage, buf: &mut BytesMut) {
    // Message type
    buf.put_u8(msg.message_type() as u8);

    // Sequence number
    buf.put_u16(msg.sequence_number());

    // Message-specific encoding
    match msg {
        Pc5SignallingMessage::EstablishmentRequest(m) => {
            buf.put_u32(m.source_user_info);

            assert!(m.prose_application_ids.len() <= u8::MAX as usize);
            buf.put_u8(m.prose_application_ids.len() as u8);
            for app_id in &m.prose_application_ids {
                buf.put_u32(*app_id);
            }

            assert!(m.ue_security_capabilities.len() <= u8::MAX as usize);
            buf.put_u8(m.ue_security_capabilities.len() as u8);
            buf.extend_from_slice(&m.ue_security_capabilities);

            buf.put_u8(m.ue_signalling_security_policy);

            match m.target_user_info {
                Some(target) => {
                    buf.put_u8(1);
                    buf.put_u32(target);
                }
                None => buf.put_u8(0),
            }

            match m.relay_service_code {
                Some(code) => {
                    assert!(code <= MAX_RELAY_SERVICE_CODE);
                    buf.put_u8(1);
                    put_u24(buf, code);
                }
                None => buf.put_u8(0),
            }
        }
        Pc5SignallingMessage::EstablishmentAccept(m) => {
            buf.put_u32(m.source_user_info);

            assert!(m.pc5_qos_flow_descriptions.len() <= u8::MAX as usize);
            buf.put_u8(m.pc5_qos_flow_descriptions.len() as u8);
            buf.extend_from_slice(&m.pc5_qos_flow_descriptions);

            buf.put_u8(m.user_plane_security_config);
        }
        Pc5SignallingMessage::EstablishmentReject(m) => {
            buf.put_u8(m.cause as u8);
        }
        Pc5SignallingMessage::ReleaseRequest(m) => {
            buf.put_u8(m.cause as u8);
            buf.put_u16(m.msb_knrp_id);
            buf.put_u8(m.backoff);
        }
        Pc5SignallingMessage::ReleaseAccept(_) => {}
    }
}

/// Decodes a PC5 signalling message from a byte buffer
pub fn decode(data: &[u8]) -> Result<Pc5SignallingMessage> {
    let mut buf = data;

    // Minimum length: type(1) + sequence number(2)
    check_len(buf, 3)?;

    let msg_type_byte = buf.get_u8();
    let msg_type = Pc5MessageType::from_u8(msg_type_byte)
        .ok_or(Pc5sCodecError::UnknownMessageType(msg_type_byte))?;

    let sequence_number = buf.get_u16();

    match msg_type {
        Pc5MessageType::EstablishmentRequest => decode_establishment_request(sequence_number, buf),
        Pc5MessageType::EstablishmentAccept => decode_establishment_accept(sequence_number, buf),
        Pc5MessageType::EstablishmentReject => decode_establishment_reject(sequence_number, buf),
        Pc5MessageType::ReleaseRequest => decode_release_request(sequence_number, buf),
        Pc5MessageType::ReleaseAccept => Ok(Pc5SignallingMessage::ReleaseAccept(
            DirectLinkReleaseAccept::new(sequence_number),
        )),
    }
}

fn decode_establishment_request(
    sequence_number: u16,
    mut buf: &[u8],
) -> Result<Pc5SignallingMessage> {
    // source_user_info(4) + app id count(1)
    check_len(buf, 5)?;
    let source_user_info = buf.get_u32();

    let app_id_count = buf.get_u8() as usize;
    check_len(buf, app_id_count * 4)?;
    let mut prose_application_ids = Vec::with_capacity(app_id_count);
    for _ in 0..app_id_count {
        prose_application_ids.push(buf.get_u32());
    }

    check_len(buf, 1)?;
    let cap_len = buf.get_u8() as usize;
    check_len(buf, cap_len)?;
    let ue_security_capabilities = buf[..cap_len].to_vec();
    buf.advance(cap_len);

    // security policy(1) + target presence flag(1)
    check_len(buf, 2)?;
    let ue_signalling_security_policy = buf.get_u8();

    let target_user_info = match buf.get_u8() {
        0 => None,
        1 => {
            check_len(buf, 4)?;
            Some(buf.get_u32())
        }
        flag => return Err(Pc5sCodecError::InvalidPresenceFlag(flag)),
    };

    check_len(buf, 1)?;
    let relay_service_code = match buf.get_u8() {
        0 => None,
        1 => {
            check_len(buf, 3)?;
            Some(get_u24(&mut buf))
        }
        flag => return Err(Pc5sCodecError::InvalidPresenceFlag(flag)),
    };

    Ok(Pc5SignallingMessage::EstablishmentRequest(
        DirectLinkEstablishmentRequest {
            sequence_number,
            source_user_info,
            prose_application_ids,
            ue_security_capabilities,
            ue_signalling_security_policy,
            target_user_info,
            relay_service_code,
        },
    ))
}

fn decode_establishment_accept(
    sequence_number: u16,
    mut buf: &[u8],
) -> Result<Pc5SignallingMessage> {
    // source_user_info(4) + qos flow length(1)
    check_len(buf, 5)?;
    let source_user_info = buf.get_u32();

    let qos_len = buf.get_u8() as usize;
    check_len(buf, qos_len)?;
    let pc5_qos_flow_descriptions = buf[..qos_len].to_vec();
    buf.advance(qos_len);

    check_len(buf, 1)?;
    let user_plane_security_config = buf.get_u8();

    Ok(Pc5SignallingMessage::EstablishmentAccept(
        DirectLinkEstablishmentAccept {
            sequence_number,
            source_user_info,
            pc5_qos_flow_descriptions,
            user_plane_security_config,
        },
    ))
}

fn decode_establishment_reject(
    sequence_number: u16,
    mut buf: &[u8],
) -> Result<Pc5SignallingMessage> {
    check_len(buf, 1)?;
    let cause = decode_cause(buf.get_u8())?;

    Ok(Pc5SignallingMessage::EstablishmentReject(
        DirectLinkEstablishmentReject::new(sequence_number, cause),
    ))
}

fn decode_release_request(sequence_number: u16, mut buf: &[u8]) -> Result<Pc5SignallingMessage> {
    // cause(1) + msb_knrp_id(2) + backoff(1)
    check_len(buf, 4)?;
    let cause = decode_cause(buf.get_u8())?;
    let msb_knrp_id = buf.get_u16();
    let backoff = buf.get_u8();

    Ok(Pc5SignallingMessage::ReleaseRequest(
        DirectLinkReleaseRequest {
            sequence_number,
            cause,
            msb_knrp_id,
            backoff,
        },
    ))
}

fn decode_cause(value: u8) -> Result<Pc5SignallingCause> {
    Pc5SignallingCause::from_u8(value).ok_or(Pc5sCodecError::UnknownCause(value))
}

fn check_len(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(Pc5sCodecError::BufferTooShort {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

fn put_u24(buf: &mut BytesMut, value: u32) {
    buf.put_u8((value >> 16) as u8);
    buf.put_u8((value >> 8) as u8);
    buf.put_u8(value as u8);
}

fn get_u24(buf: &mut &[u8]) -> u32 {
    let hi = buf.get_u8() as u32;
    let mid = buf.get_u8() as u32;
    let lo = buf.get_u8() as u32;
    (hi << 16) | (mid << 8) | lo
}
