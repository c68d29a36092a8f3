//! ProSe layer for sidelink unicast links
//!
//! This crate implements the UE ProSe layer for 5G sidelink: the per-peer
//! PC5 unicast link state machine with bounded retransmission, the service
//! orchestrator owning all link contexts and bearer bookkeeping, and the
//! relay-selection strategies for UE-to-network relay operation.

pub mod bearers;
pub mod direct_link;
pub mod relay_selection;
pub mod service;
pub mod timer;
pub mod transport;

pub use bearers::{BearerConfigurator, RelayServiceConfig, U2nRelayRole};
pub use direct_link::{DirectLink, DirectLinkState, LinkEvent, RelayLinkInfo, StateChangeInfo};
pub use relay_selection::{
    build_algorithm, FirstAvailableRelaySelection, MaxRsrpRelaySelection, RandomRelaySelection,
    RelayInfo, RelaySelectionAlgorithm,
};
pub use service::{DirectLinkContext, ProseService};
pub use timer::RetransmissionTimer;
pub use transport::{Pc5SignallingTransport, Pc5sPacket, LC_ID_PC5S_PROTECTED, LC_ID_PC5S_UNPROTECTED};
