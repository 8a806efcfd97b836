//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use const_addrs::{ip, ip4, net4};
use ipnetwork::IpNetwork;
use weir_chaining::af::{ScFamily, TableFamily};
use weir_chaining::table::PathSource;

use super::{
    add_connected, add_more_specific, agg_key, base_cfg, conn_key, get_route,
    server, setup, spec_key,
};

#[test]
fn test_install() {
    let mut server = server();
    setup(&mut server);
    let up = server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    assert!(up);
    add_more_specific(&mut server);
    add_connected(&mut server);
    server.process_queues();

    let route =
        get_route(&server, "blue-i1", TableFamily::Inet, &agg_key()).unwrap();
    assert_eq!(route.paths().len(), 1);
    let path = route.best_path().unwrap();
    assert_eq!(path.source, PathSource::ServiceChain);
    assert_eq!(path.peer, Some(ip!("1.1.2.3")));
    assert_eq!(path.path_id, u32::from(ip4!("2.3.4.5")));
    assert_eq!(path.attrs.base.value.nexthop, ip!("2.3.4.5"));

    let chain =
        server.find_service_chain(ScFamily::Inet, "blue-i1").unwrap();
    let prefix: IpNetwork = net4!("192.168.1.0/24").into();
    assert!(chain.prefix_to_routes[&prefix].contains(&spec_key()));
    assert_eq!(chain.connected_route, Some(conn_key()));
}

#[test]
fn test_no_aggregate_without_more_specific() {
    let mut server = server();
    setup(&mut server);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    add_connected(&mut server);
    server.process_queues();

    assert!(
        get_route(&server, "blue-i1", TableFamily::Inet, &agg_key())
            .is_none()
    );
}

#[test]
fn test_no_aggregate_without_connected() {
    let mut server = server();
    setup(&mut server);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    add_more_specific(&mut server);
    server.process_queues();

    assert!(
        get_route(&server, "blue-i1", TableFamily::Inet, &agg_key())
            .is_none()
    );
}

#[test]
fn test_more_specific_delete_withdraws() {
    let mut server = server();
    setup(&mut server);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    add_more_specific(&mut server);
    add_connected(&mut server);
    server.process_queues();
    assert!(
        get_route(&server, "blue-i1", TableFamily::Inet, &agg_key())
            .is_some()
    );

    server
        .delete_path(
            "blue",
            TableFamily::Inet,
            &spec_key(),
            PathSource::Bgp,
            Some(ip!("10.0.0.1")),
            1,
        )
        .unwrap();
    server.process_queues();

    assert!(
        get_route(&server, "blue-i1", TableFamily::Inet, &agg_key())
            .is_none()
    );
    // The emptied more-specific entry is swept once the chain lets go.
    assert!(
        get_route(&server, "blue", TableFamily::Inet, &spec_key()).is_none()
    );
}

#[test]
fn test_connected_delete_withdraws() {
    let mut server = server();
    setup(&mut server);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    add_more_specific(&mut server);
    add_connected(&mut server);
    server.process_queues();

    server
        .delete_path(
            "blue-i1",
            TableFamily::Inet,
            &conn_key(),
            PathSource::Bgp,
            Some(ip!("10.0.0.1")),
            1,
        )
        .unwrap();
    server.process_queues();

    assert!(
        get_route(&server, "blue-i1", TableFamily::Inet, &agg_key())
            .is_none()
    );
    let chain =
        server.find_service_chain(ScFamily::Inet, "blue-i1").unwrap();
    assert_eq!(chain.connected_route, None);
}

#[test]
fn test_seed_existing_routes() {
    let mut server = server();
    setup(&mut server);
    // Routes first, chain second.
    add_more_specific(&mut server);
    add_connected(&mut server);
    let up = server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    assert!(up);
    server.process_queues();

    let route =
        get_route(&server, "blue-i1", TableFamily::Inet, &agg_key()).unwrap();
    assert_eq!(route.paths().len(), 1);
}

#[test]
fn test_reinstall_is_idempotent() {
    let mut server = server();
    setup(&mut server);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    add_more_specific(&mut server);
    add_connected(&mut server);
    server.process_queues();

    add_more_specific(&mut server);
    server.process_queues();

    let route =
        get_route(&server, "blue-i1", TableFamily::Inet, &agg_key()).unwrap();
    assert_eq!(route.paths().len(), 1);
}

#[test]
fn test_host_route_aggregation_disabled() {
    let mut server = server();
    setup(&mut server);
    server.set_aggregate_host_route(ScFamily::Inet, false);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    add_more_specific(&mut server);
    add_connected(&mut server);
    server.process_queues();

    let chain =
        server.find_service_chain(ScFamily::Inet, "blue-i1").unwrap();
    assert!(!chain.aggregate_enable);
    assert!(
        get_route(&server, "blue-i1", TableFamily::Inet, &agg_key())
            .is_none()
    );
}
