//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod aggregate;
mod pending;
mod rewrite;

use std::net::IpAddr;

use const_addrs::{ip, net4};
use weir_chaining::BgpServer;
use weir_chaining::af::TableFamily;
use weir_chaining::attr::Attrs;
use weir_chaining::config::{InstanceCfg, ServiceChainCfg};
use weir_chaining::table::{BgpPath, BgpRoute, PathSource, RouteKey};

fn server() -> BgpServer {
    BgpServer::new(64512)
}

fn add_instance(server: &mut BgpServer, name: &str, vn_index: u32) {
    server
        .create_instance(
            name,
            InstanceCfg {
                vn_index,
                virtual_network: name.to_owned(),
                ..Default::default()
            },
        )
        .unwrap();
}

// Standard topology: instance "blue-i1" sources a chain through service
// address 1.1.2.3 towards destination instance "blue".
fn setup(server: &mut BgpServer) {
    add_instance(server, "blue", 10);
    add_instance(server, "blue-i1", 1);
}

fn chain_cfg(
    chain_address: &str,
    prefixes: &[&str],
    dest: &str,
) -> ServiceChainCfg {
    ServiceChainCfg {
        chain_address: chain_address.to_owned(),
        prefixes: prefixes.iter().map(|p| p.parse().unwrap()).collect(),
        dest_instance: dest.to_owned(),
        connected_instance: None,
        service_chain_id: None,
        sc_head: false,
        retain_as_path: false,
    }
}

fn base_cfg() -> ServiceChainCfg {
    chain_cfg("1.1.2.3", &["192.168.1.0/24"], "blue")
}

fn agg_key() -> RouteKey {
    RouteKey::Ip(net4!("192.168.1.0/24").into())
}

fn spec_key() -> RouteKey {
    RouteKey::Ip(net4!("192.168.1.1/32").into())
}

fn conn_key() -> RouteKey {
    RouteKey::Ip(net4!("1.1.2.3/32").into())
}

fn ext_key() -> RouteKey {
    RouteKey::Ip(net4!("10.1.1.0/24").into())
}

fn bgp_path(
    server: &mut BgpServer,
    nexthop: IpAddr,
    peer: IpAddr,
    path_id: u32,
) -> BgpPath {
    path_with(server, PathSource::Bgp, peer, path_id, &Attrs::new(nexthop))
}

fn path_with(
    server: &mut BgpServer,
    source: PathSource,
    peer: IpAddr,
    path_id: u32,
    attrs: &Attrs,
) -> BgpPath {
    let attrs = server.attr_sets.get_route_attr_sets(attrs);
    BgpPath::new(source, Some(peer), path_id, attrs, 0)
}

fn add_more_specific(server: &mut BgpServer) {
    let path = bgp_path(server, ip!("10.0.0.9"), ip!("10.0.0.1"), 1);
    server
        .add_path("blue", TableFamily::Inet, spec_key(), path)
        .unwrap();
}

fn add_connected(server: &mut BgpServer) {
    let path = bgp_path(server, ip!("2.3.4.5"), ip!("10.0.0.1"), 1);
    server
        .add_path("blue-i1", TableFamily::Inet, conn_key(), path)
        .unwrap();
}

fn get_route<'a>(
    server: &'a BgpServer,
    instance: &str,
    family: TableFamily,
    key: &RouteKey,
) -> Option<&'a BgpRoute> {
    server
        .instances
        .get_by_name(instance)
        .map(|instance| instance.table(family))
        .and_then(|table| table.get(key))
}
