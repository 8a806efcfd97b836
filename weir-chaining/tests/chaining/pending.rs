//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use const_addrs::net4;
use ipnetwork::IpNetwork;
use weir_chaining::af::ScFamily;
use weir_chaining::manager::PendingReason;
use weir_chaining::show::{ChainState, show_service_chains, to_json};

use super::{
    add_connected, add_instance, add_more_specific, base_cfg, chain_cfg,
    server, setup,
};

#[test]
fn test_dest_instance_missing() {
    let mut server = server();
    add_instance(&mut server, "blue-i1", 1);
    let up = server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    assert!(!up);

    let src = server.instances.id_by_name("blue-i1").unwrap();
    let info = server.mgr(ScFamily::Inet).find_pending(src).unwrap();
    assert_eq!(info.reason, PendingReason::DestInstanceNotFound);
    assert_eq!(
        info.reason.to_string(),
        "Destination routing instance does not exist"
    );
    assert!(
        server
            .find_service_chain(ScFamily::Inet, "blue-i1")
            .is_none()
    );
}

#[test]
fn test_resolves_when_dest_appears() {
    let mut server = server();
    add_instance(&mut server, "blue-i1", 1);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();

    add_instance(&mut server, "blue", 10);
    server.process_queues();

    assert!(
        server
            .find_service_chain(ScFamily::Inet, "blue-i1")
            .is_some()
    );
    let src = server.instances.id_by_name("blue-i1").unwrap();
    assert!(server.mgr(ScFamily::Inet).find_pending(src).is_none());
}

#[test]
fn test_vn_index_unavailable() {
    let mut server = server();
    add_instance(&mut server, "blue-i1", 1);
    add_instance(&mut server, "blue", 0);
    let up = server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    assert!(!up);

    let src = server.instances.id_by_name("blue-i1").unwrap();
    let info = server.mgr(ScFamily::Inet).find_pending(src).unwrap();
    assert_eq!(info.reason, PendingReason::VnIndexUnavailable);
}

#[test]
fn test_address_parse_error() {
    let mut server = server();
    setup(&mut server);
    let up = server
        .locate_service_chain(
            ScFamily::Inet,
            "blue-i1",
            chain_cfg("bogus", &["192.168.1.0/24"], "blue"),
        )
        .unwrap();
    assert!(!up);

    let src = server.instances.id_by_name("blue-i1").unwrap();
    let info = server.mgr(ScFamily::Inet).find_pending(src).unwrap();
    assert_eq!(info.reason, PendingReason::AddressParseError);
}

#[test]
fn test_stop_removes_pending() {
    let mut server = server();
    add_instance(&mut server, "blue-i1", 1);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    let src = server.instances.id_by_name("blue-i1").unwrap();
    assert!(server.mgr(ScFamily::Inet).has_chain(src));

    server.stop_service_chain(ScFamily::Inet, "blue-i1").unwrap();

    assert!(!server.mgr(ScFamily::Inet).has_chain(src));
}

#[test]
fn test_reconfiguration_replaces_chain() {
    let mut server = server();
    setup(&mut server);
    let up = server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    assert!(up);

    // The new config waits until the old incarnation drains.
    let up = server
        .locate_service_chain(
            ScFamily::Inet,
            "blue-i1",
            chain_cfg("1.1.2.3", &["192.168.2.0/24"], "blue"),
        )
        .unwrap();
    assert!(!up);
    let src = server.instances.id_by_name("blue-i1").unwrap();
    let info = server.mgr(ScFamily::Inet).find_pending(src).unwrap();
    assert_eq!(info.reason, PendingReason::PrevIncarnationPendingDelete);

    server.process_queues();

    let chain =
        server.find_service_chain(ScFamily::Inet, "blue-i1").unwrap();
    let prefix: IpNetwork = net4!("192.168.2.0/24").into();
    assert_eq!(chain.cfg.prefixes, vec![prefix]);
    assert!(server.mgr(ScFamily::Inet).find_pending(src).is_none());
}

#[test]
fn test_down_chain_count() {
    let mut server = server();
    setup(&mut server);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    // No connected route yet.
    assert_eq!(server.get_down_service_chain_count(ScFamily::Inet), 1);

    add_connected(&mut server);
    server.process_queues();
    assert_eq!(server.get_down_service_chain_count(ScFamily::Inet), 0);

    add_instance(&mut server, "red-i1", 2);
    server
        .locate_service_chain(
            ScFamily::Inet,
            "red-i1",
            chain_cfg("1.1.2.4", &["192.168.1.0/24"], "red"),
        )
        .unwrap();
    assert_eq!(server.get_down_service_chain_count(ScFamily::Inet), 1);
}

#[test]
fn test_show_snapshot() {
    let mut server = server();
    setup(&mut server);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    add_more_specific(&mut server);
    add_connected(&mut server);
    server.process_queues();

    add_instance(&mut server, "red-i1", 2);
    server
        .locate_service_chain(
            ScFamily::Inet,
            "red-i1",
            chain_cfg("1.1.2.4", &["192.168.1.0/24"], "red"),
        )
        .unwrap();

    let chains = show_service_chains(&server, ScFamily::Inet);
    assert_eq!(chains.len(), 2);

    assert_eq!(chains[0].src_instance, "blue-i1");
    assert_eq!(chains[0].state, ChainState::Active);
    let connected = chains[0].connected.as_ref().unwrap();
    assert!(connected.valid);
    assert_eq!(chains[0].aggregates.len(), 1);
    assert_eq!(chains[0].aggregates[0].prefix, "192.168.1.0/24");

    assert_eq!(chains[1].src_instance, "red-i1");
    assert_eq!(chains[1].state, ChainState::Pending);
    assert_eq!(
        chains[1].pending_reason.as_deref(),
        Some("Destination routing instance does not exist")
    );

    let json = to_json(&chains).unwrap();
    assert!(json.contains("\"src_instance\": \"blue-i1\""));
}
