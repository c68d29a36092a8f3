//! Multi-UE scenario harness
//!
//! Provides an in-memory sidelink network connecting several
//! `ProseService` instances, recording mocks for the bearer machinery,
//! and a transmission log for asserting on the signalling exchange.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use slprosesim_common::{ProseConfig, SimClock};
use slprosesim_pc5s::codec;
use slprosesim_pc5s::protocol::Pc5SignallingMessage;
use slprosesim_prose::{
    BearerConfigurator, Pc5SignallingTransport, Pc5sPacket, ProseService, U2nRelayRole,
};

/// Initialize logging for tests
///
/// Uses the RUST_LOG environment variable if set, otherwise defaults to
/// "info".
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// One PC5 signalling transmission observed on the in-memory network
#[derive(Debug, Clone)]
pub struct SentRecord {
    /// Layer-2 ID of the sender
    pub src: u32,
    /// Layer-2 ID of the destination
    pub dst: u32,
    /// Logical channel the message was sent on
    pub lc_id: u8,
    /// The decoded message
    pub message: Pc5SignallingMessage,
}

struct Delivery {
    src: u32,
    dst: u32,
    packet: Pc5sPacket,
}

#[derive(Default)]
struct NetworkState {
    queue: VecDeque<Delivery>,
    /// Destinations currently losing all inbound traffic
    blackholes: HashSet<u32>,
    log: Vec<SentRecord>,
}

/// Per-UE transport handing packets to the shared in-memory network
struct UeTransport {
    src_l2_id: u32,
    network: Rc<RefCell<NetworkState>>,
}

impl Pc5SignallingTransport for UeTransport {
    fn send_pc5s_message(&mut self, packet: Pc5sPacket, dst_l2_id: u32, lc_id: u8) {
        let mut net = self.network.borrow_mut();
        if let Ok(message) = codec::decode(&packet.payload) {
            net.log.push(SentRecord {
                src: self.src_l2_id,
                dst: dst_l2_id,
                lc_id,
                message,
            });
        }
        net.queue.push_back(Delivery {
            src: self.src_l2_id,
            dst: dst_l2_id,
            packet,
        });
    }
}

/// A call recorded by the bearer configurator mock
#[derive(Debug, Clone, PartialEq)]
pub enum BearerCall {
    ActivateTx(Ipv4Addr),
    DeleteTx(Ipv4Addr),
    ConfigurePath(Ipv4Addr, U2nRelayRole, Option<u8>),
    RemovePath(Ipv4Addr, U2nRelayRole),
    NotifyRxRelease(Ipv4Addr),
    RegisterRoute(Ipv4Addr, u64),
    RemoveRoute(Ipv4Addr),
}

#[derive(Default)]
struct RecordingBearers {
    calls: Rc<RefCell<Vec<BearerCall>>>,
}

impl BearerConfigurator for RecordingBearers {
    fn activate_transmit_bearer(&mut self, peer_ip: Ipv4Addr) {
        self.calls.borrow_mut().push(BearerCall::ActivateTx(peer_ip));
    }

    fn delete_transmit_bearer(&mut self, peer_ip: Ipv4Addr) {
        self.calls.borrow_mut().push(BearerCall::DeleteTx(peer_ip));
    }

    fn configure_relay_data_path(
        &mut self,
        peer_ip: Ipv4Addr,
        role: U2nRelayRole,
        relay_drb_id: Option<u8>,
    ) {
        self.calls
            .borrow_mut()
            .push(BearerCall::ConfigurePath(peer_ip, role, relay_drb_id));
    }

    fn remove_relay_data_path(&mut self, peer_ip: Ipv4Addr, role: U2nRelayRole) {
        self.calls
            .borrow_mut()
            .push(BearerCall::RemovePath(peer_ip, role));
    }

    fn notify_receive_bearer_release(&mut self, peer_ip: Ipv4Addr) {
        self.calls
            .borrow_mut()
            .push(BearerCall::NotifyRxRelease(peer_ip));
    }

    fn register_remote_ue_route(&mut self, remote_ip: Ipv4Addr, relay_imsi: u64) {
        self.calls
            .borrow_mut()
            .push(BearerCall::RegisterRoute(remote_ip, relay_imsi));
    }

    fn remove_remote_ue_route(&mut self, remote_ip: Ipv4Addr) {
        self.calls.borrow_mut().push(BearerCall::RemoveRoute(remote_ip));
    }
}

/// One UE under test: its ProSe service plus the recorded bearer calls
pub struct TestUe {
    pub service: ProseService,
    pub bearer_calls: Rc<RefCell<Vec<BearerCall>>>,
}

impl TestUe {
    /// Bearer calls recorded so far
    pub fn bearer_calls(&self) -> Vec<BearerCall> {
        self.bearer_calls.borrow().clone()
    }
}

/// A set of UEs connected by an in-memory sidelink network.
///
/// Time is simulated: the harness owns a [`SimClock`] and the tests move
/// it forward with [`ScenarioNet::advance`].
#[derive(Default)]
pub struct ScenarioNet {
    network: Rc<RefCell<NetworkState>>,
    ues: HashMap<u32, TestUe>,
    clock: SimClock,
}

impl ScenarioNet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a UE with default protocol parameters
    pub fn add_ue(&mut self, l2_id: u32, ip: Ipv4Addr) {
        let mut config = ProseConfig::new(l2_id);
        config.imsi = u64::from(l2_id);
        self.add_ue_with_config(config, ip);
    }

    /// Adds a UE with an explicit configuration
    pub fn add_ue_with_config(&mut self, config: ProseConfig, ip: Ipv4Addr) {
        let l2_id = config.l2_id;
        let transport = UeTransport {
            src_l2_id: l2_id,
            network: self.network.clone(),
        };
        let bearers = RecordingBearers::default();
        let bearer_calls = bearers.calls.clone();
        let service = ProseService::new(config, ip, Box::new(transport), Box::new(bearers));
        self.ues.insert(
            l2_id,
            TestUe {
                service,
                bearer_calls,
            },
        );
    }

    pub fn ue(&self, l2_id: u32) -> &TestUe {
        &self.ues[&l2_id]
    }

    pub fn ue_mut(&mut self, l2_id: u32) -> &mut TestUe {
        self.ues.get_mut(&l2_id).expect("unknown UE")
    }

    /// Starts losing all traffic toward the given UE
    pub fn block_traffic_to(&mut self, l2_id: u32) {
        self.network.borrow_mut().blackholes.insert(l2_id);
    }

    /// Stops losing traffic toward the given UE
    pub fn unblock_traffic_to(&mut self, l2_id: u32) {
        self.network.borrow_mut().blackholes.remove(&l2_id);
    }

    /// Delivers queued packets until the network is idle.
    ///
    /// Deliveries can trigger new transmissions; those are delivered too.
    pub fn deliver_all(&mut self) {
        loop {
            let delivery = self.network.borrow_mut().queue.pop_front();
            let Some(delivery) = delivery else { break };
            let dropped = self.network.borrow().blackholes.contains(&delivery.dst);
            if dropped {
                continue;
            }
            if let Some(ue) = self.ues.get_mut(&delivery.dst) {
                ue.service
                    .receive_pc5s_message(delivery.src, &delivery.packet);
            }
        }
    }

    /// The current simulated time
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Advances the simulated clock, polls every UE's timers at the new
    /// time and delivers whatever they transmitted.
    pub fn advance(&mut self, by: Duration) {
        self.clock.advance(by);
        let now = self.clock.now();
        for ue in self.ues.values_mut() {
            ue.service.poll_timers(now);
        }
        self.deliver_all();
    }

    /// The transmission log so far
    pub fn sent_log(&self) -> Vec<SentRecord> {
        self.network.borrow().log.clone()
    }
}
