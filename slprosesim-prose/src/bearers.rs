//! Bearer configuration interface for the ProSe layer
//!
//! Establishing or releasing a PC5 unicast link has side effects on the
//! data plane: sidelink data radio bearers toward the peer, the relay data
//! path on a UE-to-network relay, and the core-network route for a remote
//! UE reached through a relay. The ProSe service drives those effects
//! through this interface; the actual bearer machinery stays external.

use std::fmt;
use std::net::Ipv4Addr;

/// Role of a UE on a UE-to-network relay link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum U2nRelayRole {
    /// The UE reaching the network through a relay
    RemoteUe,
    /// The UE relaying traffic toward the network
    RelayUe,
}

impl fmt::Display for U2nRelayRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            U2nRelayRole::RemoteUe => write!(f, "REMOTE UE"),
            U2nRelayRole::RelayUe => write!(f, "RELAY UE"),
        }
    }
}

/// A connectivity service provided by a UE acting as UE-to-network relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayServiceConfig {
    /// Relay service code advertised for this service (24-bit field)
    pub relay_service_code: u32,
    /// Data radio bearer carrying relayed traffic toward the network
    pub relay_drb_id: u8,
}

/// Interface to the data-plane machinery affected by link state changes.
pub trait BearerConfigurator {
    /// Activates a transmit sidelink data radio bearer toward the peer.
    /// Completion is reported back through
    /// `ProseService::notify_data_radio_bearer_activated`.
    fn activate_transmit_bearer(&mut self, peer_ip: Ipv4Addr);

    /// Deletes the transmit sidelink data radio bearer toward the peer.
    fn delete_transmit_bearer(&mut self, peer_ip: Ipv4Addr);

    /// Configures the relay data path for an established relay link.
    /// `relay_drb_id` is present on the relay side only.
    fn configure_relay_data_path(
        &mut self,
        peer_ip: Ipv4Addr,
        role: U2nRelayRole,
        relay_drb_id: Option<u8>,
    );

    /// Removes the relay data path for a released relay link.
    fn remove_relay_data_path(&mut self, peer_ip: Ipv4Addr, role: U2nRelayRole);

    /// Notifies that the receive bearer from the peer may be released.
    fn notify_receive_bearer_release(&mut self, peer_ip: Ipv4Addr);

    /// Registers the core-network route toward a remote UE served by this
    /// relay, identified by the relay's IMSI.
    fn register_remote_ue_route(&mut self, remote_ip: Ipv4Addr, relay_imsi: u64);

    /// Removes the core-network route toward a remote UE.
    fn remove_remote_ue_route(&mut self, remote_ip: Ipv4Addr);
}
