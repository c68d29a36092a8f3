//! PC5 signalling message types
//!
//! This module defines the ProSe direct link signalling messages used to
//! establish and release PC5 unicast links between UEs (TS 24.554 clause 8),
//! including the unicast link profile for UE-to-network relay operation.

use std::fmt;

/// PC5 signalling message type identifier (first byte on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Pc5MessageType {
    /// Direct link establishment request
    EstablishmentRequest = 1,
    /// Direct link establishment accept
    EstablishmentAccept = 2,
    /// Direct link establishment reject
    EstablishmentReject = 3,
    /// Direct link release request
    ReleaseRequest = 4,
    /// Direct link release accept
    ReleaseAccept = 5,
}

impl Pc5MessageType {
    /// Creates a Pc5MessageType from a u8 value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::EstablishmentRequest),
            2 => Some(Self::EstablishmentAccept),
            3 => Some(Self::EstablishmentReject),
            4 => Some(Self::ReleaseRequest),
            5 => Some(Self::ReleaseAccept),
            _ => None,
        }
    }
}

impl fmt::Display for Pc5MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EstablishmentRequest => "PROSE DIRECT LINK ESTABLISHMENT REQUEST",
            Self::EstablishmentAccept => "PROSE DIRECT LINK ESTABLISHMENT ACCEPT",
            Self::EstablishmentReject => "PROSE DIRECT LINK ESTABLISHMENT REJECT",
            Self::ReleaseRequest => "PROSE DIRECT LINK RELEASE REQUEST",
            Self::ReleaseAccept => "PROSE DIRECT LINK RELEASE ACCEPT",
        };
        write!(f, "{name}")
    }
}

/// PC5 signalling protocol cause value (TS 24.554 Table 11.3.8.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Pc5SignallingCause {
    /// Direct communication to the target UE not allowed
    CommunicationNotAllowed = 1,
    /// Direct communication to the target UE no longer needed
    NoLongerNeeded = 2,
    /// Conflict of layer-2 ID for unicast communication detected
    L2IdConflict = 3,
    /// Direct connection is not available anymore
    ConnectionNotAvailable = 4,
    /// Lack of resources for PC5 unicast link
    LackOfResources = 5,
    /// Authentication failure
    AuthenticationFailure = 6,
    /// Integrity failure
    IntegrityFailure = 7,
    /// UE security capabilities mismatch
    SecurityCapabilityMismatch = 8,
    /// LSB of KNRP-sync-ID mismatch
    LsbKnrpSyncIdMismatch = 9,
    /// UP security activation mismatch
    UpSecurityActivationMismatch = 10,
    /// Congestion situation
    Congestion = 11,
    /// UE does not provide the indicated relay service
    RelayServiceNotProvided = 12,
    /// Protocol error, unspecified
    ProtocolError = 111,
}

impl Pc5SignallingCause {
    /// Creates a Pc5SignallingCause from a u8 value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::CommunicationNotAllowed),
            2 => Some(Self::NoLongerNeeded),
            3 => Some(Self::L2IdConflict),
            4 => Some(Self::ConnectionNotAvailable),
            5 => Some(Self::LackOfResources),
            6 => Some(Self::AuthenticationFailure),
            7 => Some(Self::IntegrityFailure),
            8 => Some(Self::SecurityCapabilityMismatch),
            9 => Some(Self::LsbKnrpSyncIdMismatch),
            10 => Some(Self::UpSecurityActivationMismatch),
            11 => Some(Self::Congestion),
            12 => Some(Self::RelayServiceNotProvided),
            111 => Some(Self::ProtocolError),
            _ => None,
        }
    }
}

impl fmt::Display for Pc5SignallingCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CommunicationNotAllowed => "communication not allowed",
            Self::NoLongerNeeded => "communication no longer needed",
            Self::L2IdConflict => "layer-2 ID conflict",
            Self::ConnectionNotAvailable => "direct connection not available anymore",
            Self::LackOfResources => "lack of resources for PC5 unicast link",
            Self::AuthenticationFailure => "authentication failure",
            Self::IntegrityFailure => "integrity failure",
            Self::SecurityCapabilityMismatch => "UE security capabilities mismatch",
            Self::LsbKnrpSyncIdMismatch => "LSB of KNRP-sync-ID mismatch",
            Self::UpSecurityActivationMismatch => "UP security activation mismatch",
            Self::Congestion => "congestion situation",
            Self::RelayServiceNotProvided => "relay service not provided",
            Self::ProtocolError => "protocol error, unspecified",
        };
        write!(f, "{name}")
    }
}

/// Generator for PC5 signalling message sequence numbers.
///
/// One generator per UE, shared across all of that UE's PC5 signalling
/// messages. Sequence numbers are serialized in 16 bits and wrap at that
/// width. Resettable so that tests and repeated scenario runs start from a
/// known value.
#[derive(Debug, Clone, Default)]
pub struct SequenceNumberGenerator {
    current: u16,
}

impl SequenceNumberGenerator {
    /// Creates a generator whose first issued sequence number is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the next sequence number, wrapping at the 16-bit field width.
    pub fn next_seq_num(&mut self) -> u16 {
        self.current = self.current.wrapping_add(1);
        self.current
    }

    /// Returns the most recently issued sequence number.
    pub fn current(&self) -> u16 {
        self.current
    }

    /// Resets the generator to its initial value.
    pub fn reset(&mut self) {
        self.current = 0;
    }
}

/// PC5 signalling message enum containing all message variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pc5SignallingMessage {
    /// Direct link establishment request
    EstablishmentRequest(DirectLinkEstablishmentRequest),
    /// Direct link establishment accept
    EstablishmentAccept(DirectLinkEstablishmentAccept),
    /// Direct link establishment reject
    EstablishmentReject(DirectLinkEstablishmentReject),
    /// Direct link release request
    ReleaseRequest(DirectLinkReleaseRequest),
    /// Direct link release accept
    ReleaseAccept(DirectLinkReleaseAccept),
}

impl Pc5SignallingMessage {
    /// Returns the message type
    pub fn message_type(&self) -> Pc5MessageType {
        match self {
            Self::EstablishmentRequest(_) => Pc5MessageType::EstablishmentRequest,
            Self::EstablishmentAccept(_) => Pc5MessageType::EstablishmentAccept,
            Self::EstablishmentReject(_) => Pc5MessageType::EstablishmentReject,
            Self::ReleaseRequest(_) => Pc5MessageType::ReleaseRequest,
            Self::ReleaseAccept(_) => Pc5MessageType::ReleaseAccept,
        }
    }

    /// Returns the message sequence number
    pub fn sequence_number(&self) -> u16 {
        match self {
            Self::EstablishmentRequest(m) => m.sequence_number,
            Self::EstablishmentAccept(m) => m.sequence_number,
            Self::EstablishmentReject(m) => m.sequence_number,
            Self::ReleaseRequest(m) => m.sequence_number,
            Self::ReleaseAccept(m) => m.sequence_number,
        }
    }
}

impl fmt::Display for Pc5SignallingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message_type())
    }
}

/// PROSE DIRECT LINK ESTABLISHMENT REQUEST
///
/// Sent by the initiating UE to establish a PC5 unicast link. For
/// UE-to-network relay links the relay service code identifies the
/// connectivity service requested from the target relay UE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectLinkEstablishmentRequest {
    /// Message sequence number
    pub sequence_number: u16,
    /// Application-layer identifier of the initiating UE
    pub source_user_info: u32,
    /// ProSe identifiers of the applications requesting the link
    pub prose_application_ids: Vec<u32>,
    /// UE PC5 security capabilities
    pub ue_security_capabilities: Vec<u8>,
    /// UE PC5 signalling security policy
    pub ue_signalling_security_policy: u8,
    /// Application-layer identifier of the target UE (unicast links)
    pub target_user_info: Option<u32>,
    /// Relay service code (UE-to-network relay links, 24-bit field)
    pub relay_service_code: Option<u32>,
}

impl DirectLinkEstablishmentRequest {
    /// Creates a unicast (non-relay) establishment request.
    pub fn unicast(sequence_number: u16, source_user_info: u32, target_user_info: u32) -> Self {
        Self {
            sequence_number,
            source_user_info,
            prose_application_ids: Vec::new(),
            ue_security_capabilities: Vec::new(),
            ue_signalling_security_policy: 0,
            target_user_info: Some(target_user_info),
            relay_service_code: None,
        }
    }

    /// Creates a UE-to-network relay establishment request.
    pub fn relay(sequence_number: u16, source_user_info: u32, relay_service_code: u32) -> Self {
        Self {
            sequence_number,
            source_user_info,
            prose_application_ids: Vec::new(),
            ue_security_capabilities: Vec::new(),
            ue_signalling_security_policy: 0,
            target_user_info: None,
            relay_service_code: Some(relay_service_code),
        }
    }
}

/// PROSE DIRECT LINK ESTABLISHMENT ACCEPT
///
/// Sent by the target UE when it accepts the link establishment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectLinkEstablishmentAccept {
    /// Message sequence number
    pub sequence_number: u16,
    /// Application-layer identifier of the accepting UE
    pub source_user_info: u32,
    /// PC5 QoS flow descriptions accepted for the link
    pub pc5_qos_flow_descriptions: Vec<u8>,
    /// Configuration of UE PC5 user plane security protection
    pub user_plane_security_config: u8,
}

impl DirectLinkEstablishmentAccept {
    /// Creates an establishment accept message
    pub fn new(sequence_number: u16, source_user_info: u32) -> Self {
        Self {
            sequence_number,
            source_user_info,
            pc5_qos_flow_descriptions: Vec::new(),
            user_plane_security_config: 0,
        }
    }
}

/// PROSE DIRECT LINK ESTABLISHMENT REJECT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectLinkEstablishmentReject {
    /// Message sequence number
    pub sequence_number: u16,
    /// PC5 signalling cause for the rejection
    pub cause: Pc5SignallingCause,
}

impl DirectLinkEstablishmentReject {
    /// Creates an establishment reject message
    pub fn new(sequence_number: u16, cause: Pc5SignallingCause) -> Self {
        Self {
            sequence_number,
            cause,
        }
    }
}

/// PROSE DIRECT LINK RELEASE REQUEST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectLinkReleaseRequest {
    /// Message sequence number
    pub sequence_number: u16,
    /// PC5 signalling cause for the release
    pub cause: Pc5SignallingCause,
    /// 16 most significant bits of the KNRP ID
    pub msb_knrp_id: u16,
    /// Backoff timer value (0 if absent)
    pub backoff: u8,
}

impl DirectLinkReleaseRequest {
    /// Creates a release request message
    pub fn new(sequence_number: u16, cause: Pc5SignallingCause) -> Self {
        Self {
            sequence_number,
            cause,
            msb_knrp_id: 0,
            backoff: 0,
        }
    }
}

/// PROSE DIRECT LINK RELEASE ACCEPT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectLinkReleaseAccept {
    /// Message sequence number
    pub sequence_number: u16,
}

impl DirectLinkReleaseAccept {
    /// Creates a release accept message
    pub fn new(sequence_number: u16) -> Self {
        Self { sequence_number }
    }
}
