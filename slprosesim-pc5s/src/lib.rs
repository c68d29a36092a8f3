//! PC5 signalling protocol for sidelink unicast links
//!
//! This crate defines the ProSe direct link signalling messages exchanged
//! over the PC5 interface (TS 24.554), a byte codec for them, the PC5
//! signalling cause registry and the per-UE sequence number generator.

pub mod codec;
pub mod protocol;

pub use codec::{decode, encode, encode_into, Pc5sCodecError};
pub use protocol::{
    DirectLinkEstablishmentAccept, DirectLinkEstablishmentReject, DirectLinkEstablishmentRequest,
    DirectLinkReleaseAccept, DirectLinkReleaseRequest, Pc5MessageType, Pc5SignallingCause,
    Pc5SignallingMessage, SequenceNumberGenerator,
};
