//! Link release scenarios
//!
//! Covers bounded retransmission with escalation when the peer never
//! answers, the release handshake on plain unicast links, and the
//! asymmetric context lifetime on relay links (the relay side retains the
//! released context to absorb retransmitted release requests).

use std::net::Ipv4Addr;
use std::time::Duration;

use slprosesim_pc5s::protocol::{Pc5SignallingCause, Pc5SignallingMessage};
use slprosesim_prose::{DirectLinkState, RelayInfo, RelayServiceConfig, U2nRelayRole};

use crate::test_utils::{init_test_logging, BearerCall, ScenarioNet};

const UE_A: u32 = 100;
const UE_B: u32 = 200;
const RELAY: u32 = 300;
const SERVICE_CODE: u32 = 0x55AA;

fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(7, 0, 0, last)
}

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[test]
fn test_unanswered_establishment_escalates_and_releases_autonomously() {
    init_test_logging();
    let mut net = ScenarioNet::new();
    net.add_ue(UE_A, ip(1));
    net.add_ue(UE_B, ip(2));

    // B never hears anything: every message toward it is lost
    net.block_traffic_to(UE_B);
    let now = net.now();
    net.ue_mut(UE_A)
        .service
        .add_direct_link_connection(now, UE_B, true, false, None);
    net.deliver_all();

    // Establishment: 3 retransmissions at the 8 s T5080 default, then
    // escalation to an autonomous release
    for _ in 0..4 {
        net.advance(secs(8));
    }
    assert_eq!(
        net.ue(UE_A).service.link_state(UE_B),
        Some(DirectLinkState::Releasing)
    );

    // Release: 3 retransmissions at the 5 s T5087 default, then the link is
    // forced to RELEASED without a peer response
    for _ in 0..4 {
        net.advance(secs(5));
    }
    assert_eq!(net.ue(UE_A).service.link_count(), 0);

    let log = net.sent_log();
    let requests = log
        .iter()
        .filter(|r| matches!(r.message, Pc5SignallingMessage::EstablishmentRequest(_)))
        .count();
    let releases: Vec<_> = log
        .iter()
        .filter_map(|r| match &r.message {
            Pc5SignallingMessage::ReleaseRequest(rel) => Some(rel.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(requests, 4);
    assert_eq!(releases.len(), 4);
    for rel in &releases {
        assert_eq!(rel.cause, Pc5SignallingCause::LackOfResources);
    }
    // The retransmissions repeat the stored request verbatim
    assert!(releases
        .iter()
        .all(|rel| rel.sequence_number == releases[0].sequence_number));

    // B never created a context
    assert_eq!(net.ue(UE_B).service.link_count(), 0);
}

#[test]
fn test_unicast_release_handshake_erases_both_contexts() {
    init_test_logging();
    let mut net = ScenarioNet::new();
    net.add_ue(UE_A, ip(1));
    net.add_ue(UE_B, ip(2));

    let now = net.now();
    net.ue_mut(UE_A)
        .service
        .add_direct_link_connection(now, UE_B, true, false, None);
    net.deliver_all();

    net.advance(secs(1));
    let now = net.now();
    net.ue_mut(UE_A).service.release_direct_link_connection(
        now,
        UE_B,
        Pc5SignallingCause::NoLongerNeeded,
    );
    net.deliver_all();

    assert_eq!(net.ue(UE_A).service.link_count(), 0);
    assert_eq!(net.ue(UE_B).service.link_count(), 0);
    assert!(net
        .ue(UE_A)
        .bearer_calls()
        .contains(&BearerCall::NotifyRxRelease(ip(2))));
    assert!(net
        .ue(UE_B)
        .bearer_calls()
        .contains(&BearerCall::NotifyRxRelease(ip(1))));
}

fn established_relay_link() -> ScenarioNet {
    let mut net = ScenarioNet::new();
    net.add_ue(UE_A, ip(1));
    net.add_ue(RELAY, ip(31));
    net.ue_mut(RELAY).service.start_relay_service(RelayServiceConfig {
        relay_service_code: SERVICE_CODE,
        relay_drb_id: 5,
    });
    let now = net.now();
    net.ue_mut(UE_A)
        .service
        .add_discovered_relay(now, RelayInfo::new(RELAY, SERVICE_CODE, -80.0, true));
    net.deliver_all();
    assert_eq!(
        net.ue(UE_A).service.selected_relay().unwrap().l2_id,
        RELAY
    );
    net
}

#[test]
fn test_relay_release_removes_data_path_but_retains_context() {
    init_test_logging();
    let mut net = established_relay_link();

    net.advance(secs(1));
    let now = net.now();
    net.ue_mut(UE_A).service.release_direct_link_connection(
        now,
        RELAY,
        Pc5SignallingCause::NoLongerNeeded,
    );
    net.deliver_all();

    // The remote side erases its context and forgets the relay
    assert_eq!(net.ue(UE_A).service.link_count(), 0);
    assert!(net.ue(UE_A).service.selected_relay().is_none());
    assert!(net
        .ue(UE_A)
        .bearer_calls()
        .contains(&BearerCall::DeleteTx(ip(31))));

    // The relay side keeps the released context but tears down the data
    // path and the core-network route
    assert_eq!(
        net.ue(RELAY).service.link_state(UE_A),
        Some(DirectLinkState::Released)
    );
    let relay_calls = net.ue(RELAY).bearer_calls();
    assert!(relay_calls.contains(&BearerCall::RemovePath(ip(1), U2nRelayRole::RelayUe)));
    assert!(relay_calls.contains(&BearerCall::RemoveRoute(ip(1))));
}

#[test]
fn test_relay_accepts_reestablishment_after_release() {
    init_test_logging();
    let mut net = established_relay_link();

    net.advance(secs(1));
    let now = net.now();
    net.ue_mut(UE_A).service.release_direct_link_connection(
        now,
        RELAY,
        Pc5SignallingCause::NoLongerNeeded,
    );
    net.deliver_all();
    assert_eq!(
        net.ue(RELAY).service.link_state(UE_A),
        Some(DirectLinkState::Released)
    );

    // A fresh measurement makes the remote select the same relay again; the
    // relay's retained RELEASED context accepts the new establishment
    net.advance(secs(1));
    let now = net.now();
    net.ue_mut(UE_A)
        .service
        .update_rsrp_measurement(now, RELAY, -80.0, true);
    net.deliver_all();

    assert_eq!(
        net.ue(UE_A).service.link_state(RELAY),
        Some(DirectLinkState::Established)
    );
    assert_eq!(
        net.ue(RELAY).service.link_state(UE_A),
        Some(DirectLinkState::Established)
    );
    assert_eq!(net.ue(UE_A).service.selected_relay().unwrap().l2_id, RELAY);

    // The relay configured its side of the data path for both lifetimes
    let configures = net
        .ue(RELAY)
        .bearer_calls()
        .iter()
        .filter(|c| matches!(c, BearerCall::ConfigurePath(_, U2nRelayRole::RelayUe, _)))
        .count();
    assert_eq!(configures, 2);
}

#[test]
fn test_relay_absorbs_retransmitted_release_requests() {
    init_test_logging();
    let mut net = established_relay_link();

    // Every release accept toward the remote is lost at first, so the
    // remote keeps retransmitting under T5087 and the relay, already in
    // RELEASED, answers every time
    net.block_traffic_to(UE_A);
    let now = net.now();
    net.ue_mut(UE_A).service.release_direct_link_connection(
        now,
        RELAY,
        Pc5SignallingCause::NoLongerNeeded,
    );
    net.deliver_all();
    net.advance(secs(5));
    assert_eq!(
        net.ue(UE_A).service.link_state(RELAY),
        Some(DirectLinkState::Releasing)
    );
    assert_eq!(
        net.ue(RELAY).service.link_state(UE_A),
        Some(DirectLinkState::Released)
    );

    net.unblock_traffic_to(UE_A);
    net.advance(secs(5));

    assert_eq!(net.ue(UE_A).service.link_count(), 0);
    let accepts = net
        .sent_log()
        .iter()
        .filter(|r| {
            r.src == RELAY && matches!(r.message, Pc5SignallingMessage::ReleaseAccept(_))
        })
        .count();
    assert_eq!(accepts, 3);
}
