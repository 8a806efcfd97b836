//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::VecDeque;

use const_addrs::{ip, ip4, net4};
use weir_chaining::BgpServer;
use weir_chaining::af::{EvpnPrefix, ScFamily, TableFamily};
use weir_chaining::attr::{
    AsPath, AsPathSegment, AsPathSegmentType, Attrs, ExtComms,
};
use weir_chaining::comm::{
    ExtCommKind, LoadBalance, LoadBalanceFields, OriginVn, RouteTarget,
    SecurityGroup, SiteOfOrigin, Tag, TunnelEncap, TunnelEncapType,
};
use weir_chaining::config::InstanceCfg;
use weir_chaining::table::{BgpPath, PathSource, RouteKey};
use weir_utils::bgp::{ExtComm, RouteDistinguisher, WellKnownCommunities};

use super::{
    add_connected, add_instance, add_more_specific, agg_key, base_cfg,
    conn_key, ext_key, get_route, path_with, server, setup,
};

fn add_ext_route(server: &mut BgpServer, attrs: &Attrs) {
    let path = path_with(server, PathSource::Bgp, ip!("10.0.0.1"), 1, attrs);
    server
        .add_path("blue", TableFamily::Inet, ext_key(), path)
        .unwrap();
}

fn synthesized<'a>(
    server: &'a BgpServer,
    key: &RouteKey,
) -> &'a BgpPath {
    get_route(server, "blue-i1", TableFamily::Inet, key)
        .unwrap()
        .best_path()
        .unwrap()
}

fn ext_comms(path: &BgpPath) -> &ExtComms {
    &path.attrs.ext_comm.as_ref().unwrap().value
}

#[test]
fn test_accept_own_nexthop_added() {
    let mut server = server();
    setup(&mut server);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    add_more_specific(&mut server);
    add_connected(&mut server);
    server.process_queues();

    let path = synthesized(&server, &agg_key());
    assert!(
        path.attrs
            .comm
            .as_ref()
            .unwrap()
            .value
            .contains(WellKnownCommunities::AcceptOwnNexthop)
    );
}

#[test]
fn test_policy_communities_mirrored() {
    let mut server = server();
    setup(&mut server);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    let mut conn_ext = ExtComms::default();
    conn_ext.append(SiteOfOrigin::from_as2(64512, 8).as_extcomm());
    conn_ext.append(RouteTarget::from_as2(64512, 100).as_extcomm());
    let mut attrs = Attrs::new(ip!("2.3.4.5"));
    attrs.ext_comm = Some(conn_ext);
    let path =
        path_with(&mut server, PathSource::Bgp, ip!("10.0.0.1"), 1, &attrs);
    server
        .add_path("blue-i1", TableFamily::Inet, conn_key(), path)
        .unwrap();

    let mut orig_ext = ExtComms::default();
    orig_ext.append(SiteOfOrigin::from_as2(64512, 7).as_extcomm());
    orig_ext.append(SecurityGroup::new(64512, 5).as_extcomm());
    orig_ext.append(Tag::new(64512, 9).as_extcomm());
    orig_ext.append(RouteTarget::from_as2(64512, 99).as_extcomm());
    let mut attrs = Attrs::new(ip!("10.0.0.9"));
    attrs.ext_comm = Some(orig_ext);
    add_ext_route(&mut server, &attrs);
    server.process_queues();

    let ext = ext_comms(synthesized(&server, &ext_key()));
    // Route targets from both sides are stripped; the remaining policy
    // values come from the original route, not the connected one.
    assert_eq!(ext.route_targets().count(), 0);
    assert_eq!(ext.site_of_origin(), Some(SiteOfOrigin::from_as2(64512, 7)));
    assert_eq!(
        ext.iter_kind(ExtCommKind::SecurityGroup)
            .copied()
            .collect::<Vec<_>>(),
        vec![SecurityGroup::new(64512, 5).as_extcomm()]
    );
    assert_eq!(
        ext.iter_kind(ExtCommKind::Tag).copied().collect::<Vec<_>>(),
        vec![Tag::new(64512, 9).as_extcomm()]
    );
}

#[test]
fn test_load_balance_inherited() {
    let mut server = server();
    setup(&mut server);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    add_connected(&mut server);
    let lb = LoadBalance::from_fields(LoadBalanceFields::SOURCE_BIAS);
    let mut orig_ext = ExtComms::default();
    orig_ext.append(lb.as_extcomm());
    let mut attrs = Attrs::new(ip!("10.0.0.9"));
    attrs.ext_comm = Some(orig_ext);
    add_ext_route(&mut server, &attrs);
    server.process_queues();

    let ext = ext_comms(synthesized(&server, &ext_key()));
    assert_eq!(ext.load_balance(), Some(lb));
}

#[test]
fn test_origin_vn_stamped() {
    let mut server = server();
    setup(&mut server);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    add_more_specific(&mut server);
    add_connected(&mut server);
    server.process_queues();

    let path = synthesized(&server, &agg_key());
    let ovn = OriginVn::new(64512, 10);
    assert_eq!(ext_comms(path).origin_vn(), Some(ovn));
    assert_eq!(
        path.attrs.ovn_path.as_ref().unwrap().value.0,
        vec![ovn.as_extcomm()]
    );
}

#[test]
fn test_origin_vn_dual_encoding() {
    // 4-byte AS combined with a VN index beyond the 2-byte range.
    let mut server = BgpServer::new(70000);
    add_instance(&mut server, "blue", 70000);
    add_instance(&mut server, "blue-i1", 1);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    add_more_specific(&mut server);
    add_connected(&mut server);
    server.process_queues();

    let path = synthesized(&server, &agg_key());
    let ovns: Vec<ExtComm> = ext_comms(path)
        .iter_kind(ExtCommKind::OriginVn)
        .copied()
        .collect();
    // AS_TRANS carries the VN index, the 4-byte AS gets the marker.
    assert_eq!(
        ovns,
        vec![
            OriginVn::from_as2(23456, 70000).as_extcomm(),
            OriginVn::from_as4(70000, 0xFFFF).as_extcomm(),
        ]
    );
    assert_eq!(
        path.attrs.ovn_path.as_ref().unwrap().value.0,
        vec![OriginVn::from_as2(23456, 70000).as_extcomm()]
    );
}

fn sample_as_path() -> AsPath {
    AsPath {
        segments: VecDeque::from([AsPathSegment {
            seg_type: AsPathSegmentType::Sequence,
            members: vec![64000, 64001],
        }]),
    }
}

#[test]
fn test_as_path_dropped() {
    let mut server = server();
    setup(&mut server);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    add_connected(&mut server);
    let mut attrs = Attrs::new(ip!("10.0.0.9"));
    attrs.base.as_path = sample_as_path();
    add_ext_route(&mut server, &attrs);
    server.process_queues();

    let path = synthesized(&server, &ext_key());
    assert!(path.attrs.base.value.as_path.is_empty());
}

#[test]
fn test_as_path_retained() {
    let mut server = server();
    setup(&mut server);
    let mut cfg = base_cfg();
    cfg.retain_as_path = true;
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", cfg)
        .unwrap();
    add_connected(&mut server);
    let mut attrs = Attrs::new(ip!("10.0.0.9"));
    attrs.base.as_path = sample_as_path();
    add_ext_route(&mut server, &attrs);
    server.process_queues();

    let path = synthesized(&server, &ext_key());
    assert_eq!(path.attrs.base.value.as_path, sample_as_path());
}

#[test]
fn test_xmpp_nexthop_source_rd() {
    let mut server = server();
    setup(&mut server);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    add_more_specific(&mut server);
    let path = path_with(
        &mut server,
        PathSource::Xmpp,
        ip!("10.0.0.1"),
        1,
        &Attrs::new(ip!("2.3.4.5")),
    );
    server
        .add_path("blue-i1", TableFamily::Inet, conn_key(), path)
        .unwrap();
    server.process_queues();

    let path = synthesized(&server, &agg_key());
    assert_eq!(
        path.attrs.base.value.source_rd,
        RouteDistinguisher::from_ip(ip4!("2.3.4.5"), 0)
    );
}

#[test]
fn test_self_originated_skipped() {
    let mut server = server();
    setup(&mut server);
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", base_cfg())
        .unwrap();
    let path = path_with(
        &mut server,
        PathSource::Xmpp,
        ip!("10.0.0.1"),
        1,
        &Attrs::new(ip!("2.3.4.5")),
    );
    server
        .add_path("blue-i1", TableFamily::Inet, conn_key(), path)
        .unwrap();
    // Original carrying the same source RD the rewrite would produce.
    let mut attrs = Attrs::new(ip!("10.0.0.9"));
    attrs.base.source_rd = RouteDistinguisher::from_ip(ip4!("2.3.4.5"), 0);
    add_ext_route(&mut server, &attrs);
    server.process_queues();

    assert!(
        get_route(&server, "blue-i1", TableFamily::Inet, &ext_key())
            .is_none()
    );
}

#[test]
fn test_evpn_replication_at_chain_head() {
    let mut server = server();
    add_instance(&mut server, "blue", 10);
    server
        .create_instance(
            "blue-i1",
            InstanceCfg {
                vn_index: 1,
                virtual_network: "blue-i1".to_owned(),
                export_targets: vec!["target:64512:8000001".to_owned()],
                ..Default::default()
            },
        )
        .unwrap();
    let mut cfg = base_cfg();
    cfg.sc_head = true;
    server
        .locate_service_chain(ScFamily::Inet, "blue-i1", cfg)
        .unwrap();
    add_more_specific(&mut server);
    add_connected(&mut server);
    server.process_queues();

    let evpn_key =
        RouteKey::Evpn(EvpnPrefix::ip_prefix(net4!("192.168.1.0/24").into()));
    let route =
        get_route(&server, "blue-i1", TableFamily::Evpn, &evpn_key).unwrap();
    let ext = ext_comms(route.best_path().unwrap());
    assert_eq!(
        ext.route_targets().copied().collect::<Vec<_>>(),
        vec![RouteTarget::from_as2(64512, 8000001).as_extcomm()]
    );
    assert_eq!(
        ext.iter_kind(ExtCommKind::TunnelEncap)
            .copied()
            .collect::<Vec<_>>(),
        vec![TunnelEncap::new(TunnelEncapType::Vxlan).as_extcomm()]
    );
    // The IPv4 copy keeps route targets stripped.
    let ext = ext_comms(synthesized(&server, &agg_key()));
    assert_eq!(ext.route_targets().count(), 0);
}
