//! PC5 unicast direct link state machine
//!
//! This module implements the per-peer ProSe direct link: the five-state
//! lifecycle of a PC5 unicast link (TS 24.554 clause 7), the establishment
//! and release handshakes with bounded retransmission under timers T5080
//! and T5087, and the escalation paths when a handshake cannot complete.
//!
//! The state machine has no side effects of its own: every operation
//! returns the list of [`LinkEvent`]s it produced (messages to send, state
//! changes to act on) and the owning service executes them. Misuse that
//! indicates a scenario bug (starting establishment outside INIT, an
//! establishment collision) panics and aborts the run.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use tracing::{debug, info, warn};

use slprosesim_common::DirectLinkConfig;
use slprosesim_pc5s::protocol::{
    DirectLinkEstablishmentAccept, DirectLinkEstablishmentReject, DirectLinkEstablishmentRequest,
    DirectLinkReleaseAccept, DirectLinkReleaseRequest, Pc5SignallingCause, Pc5SignallingMessage,
    SequenceNumberGenerator,
};

use crate::bearers::U2nRelayRole;
use crate::timer::RetransmissionTimer;
use crate::transport::{LC_ID_PC5S_PROTECTED, LC_ID_PC5S_UNPROTECTED};

/// State of a PC5 unicast direct link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectLinkState {
    /// Link context exists, no procedure started
    Init,
    /// Establishment procedure in progress
    Establishing,
    /// Link established, data transfer possible
    Established,
    /// Release procedure in progress
    Releasing,
    /// Link released
    Released,
}

impl fmt::Display for DirectLinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectLinkState::Init => "INIT",
            DirectLinkState::Establishing => "ESTABLISHING",
            DirectLinkState::Established => "ESTABLISHED",
            DirectLinkState::Releasing => "RELEASING",
            DirectLinkState::Released => "RELEASED",
        };
        write!(f, "{name}")
    }
}

/// Relay attributes of a link state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayLinkInfo {
    /// Role of this UE on the relay link
    pub role: U2nRelayRole,
    /// Relay service code of the link
    pub relay_service_code: u32,
}

/// Notification of a direct link state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChangeInfo {
    /// State before the transition
    pub old_state: DirectLinkState,
    /// State after the transition
    pub new_state: DirectLinkState,
    /// Layer-2 ID of the peer
    pub peer_l2_id: u32,
    /// Link-local IPv4 address of this UE
    pub self_ip: Ipv4Addr,
    /// Link-local IPv4 address of the peer (unspecified until learned)
    pub peer_ip: Ipv4Addr,
    /// Relay attributes, present on UE-to-network relay links
    pub relay: Option<RelayLinkInfo>,
}

/// Action produced by a direct link operation, executed by the owning
/// service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Send a PC5 signalling message to the peer
    SendMessage {
        /// The message to send
        message: Pc5SignallingMessage,
        /// Logical channel to send it on
        lc_id: u8,
    },
    /// The link changed state
    StateChanged(StateChangeInfo),
}

/// Retransmission bookkeeping for one handshake of the link.
///
/// Holds the timer, the zero-based retransmission counter against its
/// configured maximum, and a copy of the last request for exact
/// retransmission.
#[derive(Debug, Clone)]
struct RetransmissionParams {
    timer: RetransmissionTimer,
    delay: Duration,
    rtx_counter: u32,
    rtx_max: u32,
    stored_message: Option<Pc5SignallingMessage>,
}

impl RetransmissionParams {
    fn new(delay: Duration, rtx_max: u32) -> Self {
        Self {
            timer: RetransmissionTimer::new(),
            delay,
            rtx_counter: 0,
            rtx_max,
            stored_message: None,
        }
    }

    /// Arms the timer for a fresh request, resetting the counter.
    fn arm(&mut self, now: Duration, message: Pc5SignallingMessage) {
        self.rtx_counter = 0;
        self.stored_message = Some(message);
        self.timer.start(now, self.delay);
    }

    /// Rearms the timer for a retransmission of the stored request.
    fn rearm(&mut self, now: Duration) {
        self.timer.start(now, self.delay);
    }

    fn cancel(&mut self) {
        self.timer.stop();
        self.stored_message = None;
    }

    fn exhausted(&self) -> bool {
        self.rtx_counter >= self.rtx_max
    }
}

/// A PC5 unicast direct link toward one peer UE.
#[derive(Debug, Clone)]
pub struct DirectLink {
    self_l2_id: u32,
    peer_l2_id: u32,
    is_initiating: bool,
    is_relay_conn: bool,
    /// Relay service code; meaningful only when `is_relay_conn`
    relay_service_code: u32,
    /// Whether this UE provides the service named by the relay service
    /// code (acceptance precondition on the relay side)
    provides_service: bool,
    state: DirectLinkState,
    self_ip: Ipv4Addr,
    peer_ip: Ipv4Addr,
    /// Establishment handshake, timer T5080
    establishment: RetransmissionParams,
    /// Release handshake, timer T5087
    release: RetransmissionParams,
}

impl DirectLink {
    /// Creates a link context in the INIT state.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        self_l2_id: u32,
        self_ip: Ipv4Addr,
        peer_l2_id: u32,
        is_initiating: bool,
        is_relay_conn: bool,
        relay_service_code: u32,
        provides_service: bool,
        config: &DirectLinkConfig,
    ) -> Self {
        Self {
            self_l2_id,
            peer_l2_id,
            is_initiating,
            is_relay_conn,
            relay_service_code,
            provides_service,
            state: DirectLinkState::Init,
            self_ip,
            peer_ip: Ipv4Addr::UNSPECIFIED,
            establishment: RetransmissionParams::new(config.t5080(), config.establishment_rtx_max),
            release: RetransmissionParams::new(config.t5087(), config.release_rtx_max),
        }
    }

    /// Current link state
    pub fn state(&self) -> DirectLinkState {
        self.state
    }

    /// Layer-2 ID of the peer
    pub fn peer_l2_id(&self) -> u32 {
        self.peer_l2_id
    }

    /// Link-local IPv4 address of the peer (unspecified until learned)
    pub fn peer_ip(&self) -> Ipv4Addr {
        self.peer_ip
    }

    /// Whether this UE initiated the link
    pub fn is_initiating(&self) -> bool {
        self.is_initiating
    }

    /// Whether this is a UE-to-network relay link
    pub fn is_relay_conn(&self) -> bool {
        self.is_relay_conn
    }

    /// Relay service code of the link (meaningful only for relay links)
    pub fn relay_service_code(&self) -> u32 {
        self.relay_service_code
    }

    /// Overwrites the link parameters when an existing context is reused
    /// for a new connection toward the same peer.
    pub fn reconfigure(
        &mut self,
        is_initiating: bool,
        is_relay_conn: bool,
        relay_service_code: u32,
        provides_service: bool,
    ) {
        self.is_initiating = is_initiating;
        self.is_relay_conn = is_relay_conn;
        self.relay_service_code = relay_service_code;
        self.provides_service = provides_service;
    }

    /// Starts the link establishment procedure.
    ///
    /// Valid only in the INIT state; anything else is a scenario bug and
    /// panics. Sends the Direct Link Establishment Request on the
    /// unprotected signalling channel and arms T5080.
    pub fn start_connection_establishment(
        &mut self,
        now: Duration,
        seq: &mut SequenceNumberGenerator,
    ) -> Vec<LinkEvent> {
        if self.state != DirectLinkState::Init {
            panic!(
                "direct link {} -> {}: establishment started in state {}",
                self.self_l2_id, self.peer_l2_id, self.state
            );
        }

        let request = if self.is_relay_conn {
            DirectLinkEstablishmentRequest::relay(
                seq.next_seq_num(),
                self.self_l2_id,
                self.relay_service_code,
            )
        } else {
            DirectLinkEstablishmentRequest::unicast(
                seq.next_seq_num(),
                self.self_l2_id,
                self.peer_l2_id,
            )
        };
        let message = Pc5SignallingMessage::EstablishmentRequest(request);

        let mut events = Vec::new();
        self.change_state(DirectLinkState::Establishing, &mut events);
        events.push(LinkEvent::SendMessage {
            message: message.clone(),
            lc_id: LC_ID_PC5S_UNPROTECTED,
        });
        self.establishment.arm(now, message);
        events
    }

    /// Starts the link release procedure with the given cause.
    ///
    /// Valid in ESTABLISHING and ESTABLISHED; a no-op when a release is
    /// already in progress or done.
    pub fn start_connection_release(
        &mut self,
        cause: Pc5SignallingCause,
        now: Duration,
        seq: &mut SequenceNumberGenerator,
    ) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        match self.state {
            DirectLinkState::Establishing | DirectLinkState::Established => {
                self.establishment.cancel();
                let message = Pc5SignallingMessage::ReleaseRequest(DirectLinkReleaseRequest::new(
                    seq.next_seq_num(),
                    cause,
                ));
                self.change_state(DirectLinkState::Releasing, &mut events);
                events.push(LinkEvent::SendMessage {
                    message: message.clone(),
                    lc_id: LC_ID_PC5S_PROTECTED,
                });
                self.release.arm(now, message);
            }
            DirectLinkState::Releasing | DirectLinkState::Released => {
                debug!(
                    "direct link {} -> {}: release requested in state {}, nothing to do",
                    self.self_l2_id, self.peer_l2_id, self.state
                );
            }
            DirectLinkState::Init => {
                warn!(
                    "direct link {} -> {}: release requested before establishment, ignored",
                    self.self_l2_id, self.peer_l2_id
                );
            }
        }
        events
    }

    /// Processes an inbound PC5 signalling message for this link.
    pub fn process_message(
        &mut self,
        msg: &Pc5SignallingMessage,
        sender_addr: Ipv4Addr,
        seq: &mut SequenceNumberGenerator,
    ) -> Vec<LinkEvent> {
        match msg {
            Pc5SignallingMessage::EstablishmentRequest(req) => {
                self.process_establishment_request(req, sender_addr, seq)
            }
            Pc5SignallingMessage::EstablishmentAccept(acc) => {
                self.process_establishment_accept(acc, sender_addr)
            }
            Pc5SignallingMessage::EstablishmentReject(rej) => {
                self.process_establishment_reject(rej)
            }
            Pc5SignallingMessage::ReleaseRequest(rel) => self.process_release_request(rel, seq),
            Pc5SignallingMessage::ReleaseAccept(_) => self.process_release_accept(),
        }
    }

    fn process_establishment_request(
        &mut self,
        req: &DirectLinkEstablishmentRequest,
        sender_addr: Ipv4Addr,
        seq: &mut SequenceNumberGenerator,
    ) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        match self.state {
            // RELEASED is stable but reusable: a retained context accepts a
            // fresh establishment under the same policy as INIT.
            DirectLinkState::Init | DirectLinkState::Released => {
                self.peer_ip = sender_addr;
                self.change_state(DirectLinkState::Establishing, &mut events);

                let accept = if self.is_relay_conn {
                    !self.is_initiating
                        && self.provides_service
                        && req.relay_service_code == Some(self.relay_service_code)
                } else {
                    true
                };

                if accept {
                    self.send_establishment_accept(seq, &mut events);
                    self.change_state(DirectLinkState::Established, &mut events);
                } else {
                    info!(
                        "direct link {} -> {}: rejecting establishment, relay service {:?} not provided",
                        self.self_l2_id, self.peer_l2_id, req.relay_service_code
                    );
                    events.push(LinkEvent::SendMessage {
                        message: Pc5SignallingMessage::EstablishmentReject(
                            DirectLinkEstablishmentReject::new(
                                seq.next_seq_num(),
                                Pc5SignallingCause::RelayServiceNotProvided,
                            ),
                        ),
                        lc_id: LC_ID_PC5S_PROTECTED,
                    });
                    self.change_state(DirectLinkState::Released, &mut events);
                }
            }
            DirectLinkState::Establishing => {
                // An establishment collision between two initiating peers is
                // outside the modeled scenarios.
                panic!(
                    "direct link {} -> {}: establishment request received while ESTABLISHING",
                    self.self_l2_id, self.peer_l2_id
                );
            }
            DirectLinkState::Established => {
                // The peer missed our accept; answer it again.
                debug!(
                    "direct link {} -> {}: duplicate establishment request, resending accept",
                    self.self_l2_id, self.peer_l2_id
                );
                self.send_establishment_accept(seq, &mut events);
            }
            DirectLinkState::Releasing => {
                debug!(
                    "direct link {} -> {}: establishment request while releasing, ignored",
                    self.self_l2_id, self.peer_l2_id
                );
            }
        }
        events
    }

    fn process_establishment_accept(
        &mut self,
        _acc: &DirectLinkEstablishmentAccept,
        sender_addr: Ipv4Addr,
    ) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        if self.state == DirectLinkState::Establishing && self.is_initiating {
            self.establishment.cancel();
            self.peer_ip = sender_addr;
            self.change_state(DirectLinkState::Established, &mut events);
        } else {
            warn!(
                "direct link {} -> {}: unexpected establishment accept in state {}, ignored",
                self.self_l2_id, self.peer_l2_id, self.state
            );
        }
        events
    }

    fn process_establishment_reject(
        &mut self,
        rej: &DirectLinkEstablishmentReject,
    ) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        match self.state {
            DirectLinkState::Establishing if self.is_initiating => {
                self.establishment.cancel();
                info!(
                    "direct link {} -> {}: establishment rejected by peer, cause: {}",
                    self.self_l2_id, self.peer_l2_id, rej.cause
                );
                self.change_state(DirectLinkState::Released, &mut events);
            }
            DirectLinkState::Established => {
                // The peer accepted and then rejected the same link.
                panic!(
                    "direct link {} -> {}: establishment reject received while ESTABLISHED",
                    self.self_l2_id, self.peer_l2_id
                );
            }
            _ => {
                warn!(
                    "direct link {} -> {}: unexpected establishment reject in state {}, ignored",
                    self.self_l2_id, self.peer_l2_id, self.state
                );
            }
        }
        events
    }

    fn process_release_request(
        &mut self,
        rel: &DirectLinkReleaseRequest,
        seq: &mut SequenceNumberGenerator,
    ) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        match self.state {
            DirectLinkState::Establishing | DirectLinkState::Established => {
                info!(
                    "direct link {} -> {}: peer requested release, cause: {}",
                    self.self_l2_id, self.peer_l2_id, rel.cause
                );
                self.establishment.cancel();
                self.change_state(DirectLinkState::Releasing, &mut events);
                self.send_release_accept(seq, &mut events);
                self.change_state(DirectLinkState::Released, &mut events);
            }
            DirectLinkState::Releasing => {
                info!(
                    "direct link {} -> {}: release request crossed with own release in progress",
                    self.self_l2_id, self.peer_l2_id
                );
            }
            DirectLinkState::Released => {
                // The peer missed our accept; answer it again.
                debug!(
                    "direct link {} -> {}: duplicate release request, resending accept",
                    self.self_l2_id, self.peer_l2_id
                );
                self.send_release_accept(seq, &mut events);
            }
            DirectLinkState::Init => {
                warn!(
                    "direct link {} -> {}: release request before establishment, ignored",
                    self.self_l2_id, self.peer_l2_id
                );
            }
        }
        events
    }

    fn process_release_accept(&mut self) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        if self.state == DirectLinkState::Releasing {
            self.release.cancel();
            self.change_state(DirectLinkState::Released, &mut events);
        } else {
            debug!(
                "direct link {} -> {}: release accept in state {}, ignored",
                self.self_l2_id, self.peer_l2_id, self.state
            );
        }
        events
    }

    /// Polls the retransmission timers against the current simulated time.
    ///
    /// An expired establishment timer retransmits the stored request while
    /// retries remain, then escalates to a release with cause "lack of
    /// resources". An expired release timer retransmits while retries
    /// remain, then unilaterally forces the link to RELEASED.
    pub fn poll_timers(
        &mut self,
        now: Duration,
        seq: &mut SequenceNumberGenerator,
    ) -> Vec<LinkEvent> {
        let mut events = Vec::new();

        if self.establishment.timer.poll(now) {
            if self.establishment.exhausted() {
                warn!(
                    "direct link {} -> {}: establishment retries exhausted, releasing",
                    self.self_l2_id, self.peer_l2_id
                );
                events.extend(self.start_connection_release(
                    Pc5SignallingCause::LackOfResources,
                    now,
                    seq,
                ));
            } else {
                self.establishment.rtx_counter += 1;
                debug!(
                    "direct link {} -> {}: T5080 expired, retransmission {}/{}",
                    self.self_l2_id,
                    self.peer_l2_id,
                    self.establishment.rtx_counter,
                    self.establishment.rtx_max
                );
                if let Some(message) = self.establishment.stored_message.clone() {
                    events.push(LinkEvent::SendMessage {
                        message,
                        lc_id: LC_ID_PC5S_UNPROTECTED,
                    });
                }
                self.establishment.rearm(now);
            }
        }

        if self.release.timer.poll(now) {
            if self.release.exhausted() {
                warn!(
                    "direct link {} -> {}: release retries exhausted, forcing RELEASED",
                    self.self_l2_id, self.peer_l2_id
                );
                self.release.cancel();
                self.change_state(DirectLinkState::Released, &mut events);
            } else {
                self.release.rtx_counter += 1;
                debug!(
                    "direct link {} -> {}: T5087 expired, retransmission {}/{}",
                    self.self_l2_id, self.peer_l2_id, self.release.rtx_counter, self.release.rtx_max
                );
                if let Some(message) = self.release.stored_message.clone() {
                    events.push(LinkEvent::SendMessage {
                        message,
                        lc_id: LC_ID_PC5S_PROTECTED,
                    });
                }
                self.release.rearm(now);
            }
        }

        events
    }

    /// Resets the link for reuse: cancels both timers, zeroes both retry
    /// counters and returns to INIT. The initiating side immediately
    /// restarts establishment.
    pub fn reset_current_link(
        &mut self,
        now: Duration,
        seq: &mut SequenceNumberGenerator,
    ) -> Vec<LinkEvent> {
        self.establishment.cancel();
        self.establishment.rtx_counter = 0;
        self.release.cancel();
        self.release.rtx_counter = 0;

        let mut events = Vec::new();
        self.change_state(DirectLinkState::Init, &mut events);
        if self.is_initiating {
            events.extend(self.start_connection_establishment(now, seq));
        }
        events
    }

    fn send_establishment_accept(
        &self,
        seq: &mut SequenceNumberGenerator,
        events: &mut Vec<LinkEvent>,
    ) {
        events.push(LinkEvent::SendMessage {
            message: Pc5SignallingMessage::EstablishmentAccept(DirectLinkEstablishmentAccept::new(
                seq.next_seq_num(),
                self.self_l2_id,
            )),
            lc_id: LC_ID_PC5S_PROTECTED,
        });
    }

    fn send_release_accept(&self, seq: &mut SequenceNumberGenerator, events: &mut Vec<LinkEvent>) {
        events.push(LinkEvent::SendMessage {
            message: Pc5SignallingMessage::ReleaseAccept(DirectLinkReleaseAccept::new(
                seq.next_seq_num(),
            )),
            lc_id: LC_ID_PC5S_PROTECTED,
        });
    }

    fn change_state(&mut self, new_state: DirectLinkState, events: &mut Vec<LinkEvent>) {
        if self.state == new_state {
            return;
        }
        let old_state = self.state;
        self.state = new_state;
        info!(
            "direct link {} -> {}: {} => {}",
            self.self_l2_id, self.peer_l2_id, old_state, new_state
        );
        events.push(LinkEvent::StateChanged(StateChangeInfo {
            old_state,
            new_state,
            peer_l2_id: self.peer_l2_id,
            self_ip: self.self_ip,
            peer_ip: self.peer_ip,
            relay: self.is_relay_conn.then_some(RelayLinkInfo {
                role: if self.is_initiating {
                    U2nRelayRole::RemoteUe
                } else {
                    U2nRelayRole::RelayUe
                },
                relay_service_code: self.relay_service_code,
            }),
        }));
    }
}
