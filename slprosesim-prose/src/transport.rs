//! PC5 signalling transport interface
//!
//! The ProSe layer hands encoded PC5 signalling messages to the sidelink
//! stack below it through this narrow interface; the radio, RLC and PDCP
//! layers stay external collaborators.

use bytes::Bytes;
use std::net::Ipv4Addr;

/// Logical channel carrying the unprotected Direct Link Establishment
/// Request (no security context exists yet)
pub const LC_ID_PC5S_UNPROTECTED: u8 = 0;

/// Logical channel carrying all protected PC5 signalling messages
pub const LC_ID_PC5S_PROTECTED: u8 = 2;

/// An encoded PC5 signalling message together with its out-of-band
/// attributes.
///
/// The sender's link-local IPv4 address travels alongside the payload
/// rather than inside it; the receiving peer learns the address of its
/// counterpart from the packet, not from the message fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pc5sPacket {
    /// Encoded PC5 signalling message
    pub payload: Bytes,
    /// Link-local IPv4 address of the sending UE
    pub sender_addr: Ipv4Addr,
}

impl Pc5sPacket {
    /// Creates a packet from an encoded message and the sender address
    pub fn new(payload: Bytes, sender_addr: Ipv4Addr) -> Self {
        Self {
            payload,
            sender_addr,
        }
    }
}

/// Interface to the sidelink stack for sending PC5 signalling messages.
pub trait Pc5SignallingTransport {
    /// Sends a PC5 signalling packet to the peer identified by the
    /// destination layer-2 ID, on the given logical channel.
    fn send_pc5s_message(&mut self, packet: Pc5sPacket, dst_l2_id: u32, lc_id: u8);
}
