//! ProSe service orchestrator
//!
//! One `ProseService` per UE owns every PC5 unicast link context of that
//! UE, routes inbound signalling to the right link, executes the events the
//! links produce (message transmission, bearer reconfiguration) and runs
//! the relay discovery bookkeeping and relay selection of a remote UE.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use tracing::{debug, warn};

use slprosesim_common::logging::{log_pc5s_message, Direction};
use slprosesim_common::ProseConfig;
use slprosesim_pc5s::codec::{self, Pc5sCodecError};
use slprosesim_pc5s::protocol::{
    Pc5SignallingCause, Pc5SignallingMessage, SequenceNumberGenerator,
};

use crate::bearers::{BearerConfigurator, RelayServiceConfig, U2nRelayRole};
use crate::direct_link::{DirectLink, DirectLinkState, LinkEvent, StateChangeInfo};
use crate::relay_selection::{build_algorithm, RelayInfo, RelaySelectionAlgorithm};
use crate::transport::{Pc5SignallingTransport, Pc5sPacket};

/// A direct link together with its bearer bookkeeping.
#[derive(Debug)]
pub struct DirectLinkContext {
    /// The link state machine
    pub link: DirectLink,
    /// A transmit sidelink data radio bearer toward the peer is active
    pub has_active_sl_drb: bool,
    /// A transmit bearer activation toward the peer is in flight
    pub has_pending_sl_drb: bool,
    /// Relay service code of the link (0 for plain unicast)
    pub relay_service_code: u32,
}

/// The UE ProSe layer.
pub struct ProseService {
    l2_id: u32,
    self_ip: Ipv4Addr,
    imsi: u64,
    config: ProseConfig,
    links: HashMap<u32, DirectLinkContext>,
    seq_gen: SequenceNumberGenerator,
    transport: Box<dyn Pc5SignallingTransport>,
    bearers: Box<dyn BearerConfigurator>,
    relay_selection: Box<dyn RelaySelectionAlgorithm>,
    /// Connectivity services this UE provides as UE-to-network relay
    provided_services: Vec<RelayServiceConfig>,
    /// Relays discovered by this UE, in discovery order, latest entry wins
    /// per layer-2 ID
    discovered_relays: Vec<RelayInfo>,
    /// Latest RSRP measurement and eligibility per relay layer-2 ID
    rsrp_measurements: HashMap<u32, (f64, bool)>,
    /// Relay toward which a link establishment is currently in progress
    connecting_relay: Option<RelayInfo>,
    /// Relay with an established link serving this remote UE
    selected_relay: Option<RelayInfo>,
}

impl ProseService {
    /// Creates the ProSe layer for one UE.
    pub fn new(
        config: ProseConfig,
        self_ip: Ipv4Addr,
        transport: Box<dyn Pc5SignallingTransport>,
        bearers: Box<dyn BearerConfigurator>,
    ) -> Self {
        let relay_selection = build_algorithm(config.relay_selection);
        Self {
            l2_id: config.l2_id,
            self_ip,
            imsi: config.imsi,
            config,
            links: HashMap::new(),
            seq_gen: SequenceNumberGenerator::new(),
            transport,
            bearers,
            relay_selection,
            provided_services: Vec::new(),
            discovered_relays: Vec::new(),
            rsrp_measurements: HashMap::new(),
            connecting_relay: None,
            selected_relay: None,
        }
    }

    /// Layer-2 ID of this UE
    pub fn l2_id(&self) -> u32 {
        self.l2_id
    }

    /// Number of link contexts currently held
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// State of the link toward the given peer, if a context exists
    pub fn link_state(&self, peer_l2_id: u32) -> Option<DirectLinkState> {
        self.links.get(&peer_l2_id).map(|ctx| ctx.link.state())
    }

    /// Link context toward the given peer, if one exists
    pub fn link_context(&self, peer_l2_id: u32) -> Option<&DirectLinkContext> {
        self.links.get(&peer_l2_id)
    }

    /// Relay this remote UE is currently connecting to, if any
    pub fn connecting_relay(&self) -> Option<RelayInfo> {
        self.connecting_relay
    }

    /// Relay currently serving this remote UE, if any
    pub fn selected_relay(&self) -> Option<RelayInfo> {
        self.selected_relay
    }

    /// Starts providing a UE-to-network relay connectivity service.
    ///
    /// A UE must provide the service named by a relay service code before
    /// it can accept relay links requesting that code.
    pub fn start_relay_service(&mut self, service: RelayServiceConfig) {
        if let Some(existing) = self
            .provided_services
            .iter_mut()
            .find(|s| s.relay_service_code == service.relay_service_code)
        {
            *existing = service;
        } else {
            self.provided_services.push(service);
        }
    }

    fn provided_service(&self, relay_service_code: u32) -> Option<RelayServiceConfig> {
        self.provided_services
            .iter()
            .find(|s| s.relay_service_code == relay_service_code)
            .copied()
    }

    /// Adds (or resets) the direct link connection toward a peer.
    ///
    /// A context toward the same peer is reused: its parameters are
    /// overwritten and the link is reset, so there is never more than one
    /// link per peer. A relay UE asked to accept a relay link for a
    /// service it does not provide is a scenario configuration bug and
    /// panics.
    pub fn add_direct_link_connection(
        &mut self,
        now: Duration,
        peer_l2_id: u32,
        is_initiating: bool,
        is_relay_conn: bool,
        relay_service_code: Option<u32>,
    ) {
        let code = relay_service_code.unwrap_or(0);
        let provides_service = self.provided_service(code).is_some();
        if is_relay_conn && !is_initiating && !provides_service {
            panic!(
                "UE {}: relay link for service code {code} requested but the service is not provided",
                self.l2_id
            );
        }

        if let Some(ctx) = self.links.get_mut(&peer_l2_id) {
            debug!(
                "UE {}: reusing existing link context toward {peer_l2_id}",
                self.l2_id
            );
            ctx.link
                .reconfigure(is_initiating, is_relay_conn, code, provides_service);
            ctx.relay_service_code = code;
            ctx.has_active_sl_drb = false;
            ctx.has_pending_sl_drb = false;
            let events = ctx.link.reset_current_link(now, &mut self.seq_gen);
            self.process_link_events(peer_l2_id, events);
            return;
        }

        let mut link = DirectLink::new(
            self.l2_id,
            self.self_ip,
            peer_l2_id,
            is_initiating,
            is_relay_conn,
            code,
            provides_service,
            &self.config.direct_link,
        );
        let events = if is_initiating {
            link.start_connection_establishment(now, &mut self.seq_gen)
        } else {
            Vec::new()
        };
        self.links.insert(
            peer_l2_id,
            DirectLinkContext {
                link,
                has_active_sl_drb: false,
                has_pending_sl_drb: false,
                relay_service_code: code,
            },
        );
        self.process_link_events(peer_l2_id, events);
    }

    /// Handles an inbound PC5 signalling packet from the sidelink stack.
    ///
    /// The packet is decoded once here at the boundary. A packet from an
    /// unknown peer creates a link context only when it carries an
    /// establishment request (first contact); any other message from an
    /// unknown peer is a protocol anomaly and is dropped.
    pub fn receive_pc5s_message(&mut self, src_l2_id: u32, packet: &Pc5sPacket) {
        let msg = match codec::decode(&packet.payload) {
            Ok(msg) => msg,
            Err(Pc5sCodecError::UnknownCause(value)) => {
                panic!(
                    "UE {}: unknown PC5 signalling cause value {value} from {src_l2_id}",
                    self.l2_id
                );
            }
            Err(e) => {
                warn!(
                    "UE {}: undecodable PC5 signalling packet from {src_l2_id}: {e}",
                    self.l2_id
                );
                return;
            }
        };

        log_pc5s_message(Direction::Rx, self.l2_id, src_l2_id, &msg.to_string());

        if !self.links.contains_key(&src_l2_id) {
            match &msg {
                Pc5SignallingMessage::EstablishmentRequest(req) => {
                    // First contact: the target side learns of the link from
                    // the request itself. An unprovided relay service code is
                    // answered with a reject by the link, not treated as a
                    // configuration bug.
                    let code = req.relay_service_code.unwrap_or(0);
                    let link = DirectLink::new(
                        self.l2_id,
                        self.self_ip,
                        src_l2_id,
                        false,
                        req.relay_service_code.is_some(),
                        code,
                        self.provided_service(code).is_some(),
                        &self.config.direct_link,
                    );
                    self.links.insert(
                        src_l2_id,
                        DirectLinkContext {
                            link,
                            has_active_sl_drb: false,
                            has_pending_sl_drb: false,
                            relay_service_code: code,
                        },
                    );
                }
                _ => {
                    warn!(
                        "UE {}: {} from {src_l2_id} without a link context, dropped",
                        self.l2_id, msg
                    );
                    return;
                }
            }
        }

        let ctx = match self.links.get_mut(&src_l2_id) {
            Some(ctx) => ctx,
            None => return,
        };
        let events = ctx
            .link
            .process_message(&msg, packet.sender_addr, &mut self.seq_gen);
        self.process_link_events(src_l2_id, events);
    }

    /// Releases the link toward a peer with the given cause. A no-op when
    /// no context exists or a release is already in progress.
    pub fn release_direct_link_connection(
        &mut self,
        now: Duration,
        peer_l2_id: u32,
        cause: Pc5SignallingCause,
    ) {
        if let Some(ctx) = self.links.get_mut(&peer_l2_id) {
            let events = ctx
                .link
                .start_connection_release(cause, now, &mut self.seq_gen);
            self.process_link_events(peer_l2_id, events);
        } else {
            debug!(
                "UE {}: release requested toward {peer_l2_id} without a link context",
                self.l2_id
            );
        }
    }

    /// Reports completion of a transmit bearer activation requested on link
    /// establishment.
    pub fn notify_data_radio_bearer_activated(&mut self, peer_l2_id: u32) {
        match self.links.get_mut(&peer_l2_id) {
            Some(ctx) if ctx.has_pending_sl_drb => {
                ctx.has_pending_sl_drb = false;
                ctx.has_active_sl_drb = true;
            }
            Some(_) => {
                warn!(
                    "UE {}: bearer activation toward {peer_l2_id} reported without a pending one",
                    self.l2_id
                );
            }
            None => {
                warn!(
                    "UE {}: bearer activation toward {peer_l2_id} reported without a link context",
                    self.l2_id
                );
            }
        }
    }

    /// Records a discovered relay and re-evaluates relay selection.
    /// Rediscovering a known relay replaces its entry in place.
    pub fn add_discovered_relay(&mut self, now: Duration, relay: RelayInfo) {
        if let Some(existing) = self
            .discovered_relays
            .iter_mut()
            .find(|r| r.l2_id == relay.l2_id)
        {
            *existing = relay;
        } else {
            self.discovered_relays.push(relay);
        }
        self.select_relay(now);
    }

    /// Records an RSRP measurement toward a relay and re-evaluates relay
    /// selection.
    pub fn update_rsrp_measurement(&mut self, now: Duration, l2_id: u32, rsrp: f64, eligible: bool) {
        self.rsrp_measurements.insert(l2_id, (rsrp, eligible));
        self.select_relay(now);
    }

    /// Runs relay selection over the discovered relays.
    ///
    /// Re-entrant-safe: while a connection toward a relay is in progress no
    /// new selection is made. Choosing a different relay than the current
    /// one releases the old link before connecting to the new relay.
    pub fn select_relay(&mut self, now: Duration) {
        if self.connecting_relay.is_some() {
            debug!(
                "UE {}: relay connection in progress, skipping selection",
                self.l2_id
            );
            return;
        }

        let candidates: Vec<RelayInfo> = self
            .discovered_relays
            .iter()
            .map(|r| match self.rsrp_measurements.get(&r.l2_id) {
                Some(&(rsrp, eligible)) => RelayInfo {
                    rsrp,
                    eligible,
                    ..*r
                },
                None => *r,
            })
            .collect();

        let choice = self.relay_selection.select_relay(&candidates);

        if choice.is_none() {
            if let Some(current) = self.selected_relay.take() {
                warn!(
                    "UE {}: no suitable relay anymore, releasing link to {}",
                    self.l2_id, current.l2_id
                );
                self.release_direct_link_connection(
                    now,
                    current.l2_id,
                    Pc5SignallingCause::ConnectionNotAvailable,
                );
            }
            return;
        }

        if self.selected_relay.map(|r| r.l2_id) == Some(choice.l2_id) {
            return;
        }

        if let Some(current) = self.selected_relay.take() {
            self.release_direct_link_connection(
                now,
                current.l2_id,
                Pc5SignallingCause::NoLongerNeeded,
            );
        }

        self.connecting_relay = Some(choice);
        self.add_direct_link_connection(
            now,
            choice.l2_id,
            true,
            true,
            Some(choice.relay_service_code),
        );
    }

    /// Polls the retransmission timers of every link against the current
    /// simulated time and executes whatever the links produce.
    pub fn poll_timers(&mut self, now: Duration) {
        let mut pending: Vec<(u32, Vec<LinkEvent>)> = Vec::new();
        for (peer_l2_id, ctx) in self.links.iter_mut() {
            let events = ctx.link.poll_timers(now, &mut self.seq_gen);
            if !events.is_empty() {
                pending.push((*peer_l2_id, events));
            }
        }
        for (peer_l2_id, events) in pending {
            self.process_link_events(peer_l2_id, events);
        }
    }

    fn process_link_events(&mut self, peer_l2_id: u32, events: Vec<LinkEvent>) {
        for event in events {
            match event {
                LinkEvent::SendMessage { message, lc_id } => {
                    log_pc5s_message(Direction::Tx, self.l2_id, peer_l2_id, &message.to_string());
                    let payload = codec::encode(&message);
                    self.transport.send_pc5s_message(
                        Pc5sPacket::new(payload, self.self_ip),
                        peer_l2_id,
                        lc_id,
                    );
                }
                LinkEvent::StateChanged(info) => {
                    self.handle_state_change(peer_l2_id, info);
                }
            }
        }
    }

    fn handle_state_change(&mut self, peer_l2_id: u32, info: StateChangeInfo) {
        match info.new_state {
            DirectLinkState::Established => self.handle_link_established(peer_l2_id, info),
            DirectLinkState::Releasing => {
                if let Some(relay) = info.relay {
                    if relay.role == U2nRelayRole::RemoteUe {
                        // Tear down our transmit bearer toward the relay
                        // without waiting for the handshake to finish.
                        self.bearers.delete_transmit_bearer(info.peer_ip);
                    }
                }
            }
            DirectLinkState::Released => self.handle_link_released(peer_l2_id, info),
            DirectLinkState::Init | DirectLinkState::Establishing => {}
        }
    }

    fn handle_link_established(&mut self, peer_l2_id: u32, info: StateChangeInfo) {
        let ctx = match self.links.get_mut(&peer_l2_id) {
            Some(ctx) => ctx,
            None => return,
        };
        if ctx.has_active_sl_drb || ctx.has_pending_sl_drb {
            return;
        }

        match info.relay {
            None => {
                self.bearers.activate_transmit_bearer(info.peer_ip);
                ctx.has_pending_sl_drb = true;
            }
            Some(relay) => match relay.role {
                U2nRelayRole::RemoteUe => {
                    if self.connecting_relay.map(|r| r.l2_id) == Some(peer_l2_id) {
                        self.selected_relay = self.connecting_relay.take();
                    }
                    self.bearers
                        .configure_relay_data_path(info.peer_ip, U2nRelayRole::RemoteUe, None);
                }
                U2nRelayRole::RelayUe => {
                    self.bearers
                        .register_remote_ue_route(info.peer_ip, self.imsi);
                    let relay_drb_id = self
                        .provided_service(relay.relay_service_code)
                        .map(|s| s.relay_drb_id);
                    self.bearers.configure_relay_data_path(
                        info.peer_ip,
                        U2nRelayRole::RelayUe,
                        relay_drb_id,
                    );
                }
            },
        }
    }

    fn handle_link_released(&mut self, peer_l2_id: u32, info: StateChangeInfo) {
        match info.relay {
            Some(relay) => match relay.role {
                U2nRelayRole::RemoteUe => {
                    if self.connecting_relay.map(|r| r.l2_id) == Some(peer_l2_id) {
                        self.connecting_relay = None;
                    }
                    if self.selected_relay.map(|r| r.l2_id) == Some(peer_l2_id) {
                        self.selected_relay = None;
                    }
                    self.links.remove(&peer_l2_id);
                }
                U2nRelayRole::RelayUe => {
                    // The context is retained so that a retransmitted release
                    // request from the remote UE is still answered.
                    self.bearers
                        .remove_relay_data_path(info.peer_ip, U2nRelayRole::RelayUe);
                    self.bearers.remove_remote_ue_route(info.peer_ip);
                }
            },
            None => {
                self.bearers.notify_receive_bearer_release(info.peer_ip);
                self.links.remove(&peer_l2_id);
            }
        }
    }
}
