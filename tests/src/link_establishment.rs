//! Two-UE link establishment scenarios
//!
//! Covers the full establishment handshake over the in-memory network,
//! bearer activation on both endpoints, context uniqueness per peer and
//! idempotent handling of duplicate establishment requests.

use std::net::Ipv4Addr;
use std::time::Duration;

use slprosesim_pc5s::protocol::Pc5SignallingMessage;
use slprosesim_prose::DirectLinkState;

use crate::test_utils::{init_test_logging, BearerCall, ScenarioNet};

const UE_A: u32 = 100;
const UE_B: u32 = 200;

fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(7, 0, 0, last)
}

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn two_ue_net() -> ScenarioNet {
    let mut net = ScenarioNet::new();
    net.add_ue(UE_A, ip(1));
    net.add_ue(UE_B, ip(2));
    net
}

#[test]
fn test_two_ue_establishment_with_bearer_activation() {
    init_test_logging();
    let mut net = two_ue_net();

    let now = net.now();
    net.ue_mut(UE_A)
        .service
        .add_direct_link_connection(now, UE_B, true, false, None);
    net.deliver_all();

    assert_eq!(
        net.ue(UE_A).service.link_state(UE_B),
        Some(DirectLinkState::Established)
    );
    assert_eq!(
        net.ue(UE_B).service.link_state(UE_A),
        Some(DirectLinkState::Established)
    );

    // Each side requested a transmit bearer toward the other
    assert_eq!(
        net.ue(UE_A).bearer_calls(),
        vec![BearerCall::ActivateTx(ip(2))]
    );
    assert_eq!(
        net.ue(UE_B).bearer_calls(),
        vec![BearerCall::ActivateTx(ip(1))]
    );

    // Activation completion flips the bookkeeping from pending to active
    net.ue_mut(UE_A)
        .service
        .notify_data_radio_bearer_activated(UE_B);
    let ctx = net.ue(UE_A).service.link_context(UE_B).unwrap();
    assert!(ctx.has_active_sl_drb);
    assert!(!ctx.has_pending_sl_drb);
}

#[test]
fn test_single_link_context_per_peer() {
    init_test_logging();
    let mut net = two_ue_net();

    let now = net.now();
    net.ue_mut(UE_A)
        .service
        .add_direct_link_connection(now, UE_B, true, false, None);
    net.deliver_all();

    // A second add toward the same peer resets the existing context instead
    // of creating a second one
    net.advance(secs(1));
    let now = net.now();
    net.ue_mut(UE_A)
        .service
        .add_direct_link_connection(now, UE_B, true, false, None);
    net.deliver_all();

    assert_eq!(net.ue(UE_A).service.link_count(), 1);
    assert_eq!(net.ue(UE_B).service.link_count(), 1);
    assert_eq!(
        net.ue(UE_A).service.link_state(UE_B),
        Some(DirectLinkState::Established)
    );
}

#[test]
fn test_lost_accept_is_recovered_by_retransmission() {
    init_test_logging();
    let mut net = two_ue_net();

    // The accept toward A is lost; A's T5080 retransmission makes B answer
    // again
    net.block_traffic_to(UE_A);
    let now = net.now();
    net.ue_mut(UE_A)
        .service
        .add_direct_link_connection(now, UE_B, true, false, None);
    net.deliver_all();

    assert_eq!(
        net.ue(UE_A).service.link_state(UE_B),
        Some(DirectLinkState::Establishing)
    );
    assert_eq!(
        net.ue(UE_B).service.link_state(UE_A),
        Some(DirectLinkState::Established)
    );

    net.unblock_traffic_to(UE_A);
    net.advance(secs(8));

    assert_eq!(
        net.ue(UE_A).service.link_state(UE_B),
        Some(DirectLinkState::Established)
    );

    // B answered the duplicate request with a second accept, but activated
    // its transmit bearer only once
    let accepts = net
        .sent_log()
        .iter()
        .filter(|r| {
            r.src == UE_B && matches!(r.message, Pc5SignallingMessage::EstablishmentAccept(_))
        })
        .count();
    assert_eq!(accepts, 2);
    assert_eq!(
        net.ue(UE_B).bearer_calls(),
        vec![BearerCall::ActivateTx(ip(1))]
    );
}

#[test]
fn test_establishment_request_uses_unprotected_channel() {
    init_test_logging();
    let mut net = two_ue_net();

    let now = net.now();
    net.ue_mut(UE_A)
        .service
        .add_direct_link_connection(now, UE_B, true, false, None);
    net.deliver_all();

    for record in net.sent_log() {
        match record.message {
            Pc5SignallingMessage::EstablishmentRequest(_) => assert_eq!(record.lc_id, 0),
            _ => assert_eq!(record.lc_id, 2),
        }
    }
}
