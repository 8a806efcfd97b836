//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Per-instance service chain state machine.
//!
//! A chain watches two tables: the destination instance's table for
//! more-specific and external-connecting routes, and the connected
//! instance's table for the chain-address route that supplies next hops.
//! Matching runs synchronously on table notifications and only
//! classifies; all state mutation happens in request processing, one
//! request at a time.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use weir_utils::bgp::{
    AS2_MAX, AS_TRANS, Comm, ExtComm, RouteDistinguisher,
    WellKnownCommunities,
};

use crate::af::{EvpnPrefix, ScFamily, TableFamily};
use crate::attr::{AsPath, Attrs};
use crate::comm::{ExtCommKind, OriginVn, TunnelEncap, TunnelEncapType};
use crate::config::ServiceChainCfg;
use crate::debug::Debug;
use crate::instance::{InstanceId, Instances};
use crate::manager::{RequestKind, ServiceChainRequest};
use crate::server::ServerView;
use crate::table::{
    BgpPath, BgpRoute, PathSource, PrimaryPathInfo, RouteEvent, RouteKey,
    TableRef,
};

// VN-index marker used by the transitional dual origin-VN encoding.
const VN_INDEX_4B_MARKER: u32 = 0xFFFF;

/// Chain teardown progress.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeleteState {
    Active,
    Stopping,
    Draining,
}

/// Service chain for one source routing instance and family.
#[derive(Debug)]
pub struct ServiceChain {
    pub family: ScFamily,
    pub src: InstanceId,
    pub dest: InstanceId,
    pub connected: InstanceId,
    pub cfg: ServiceChainCfg,
    pub chain_addr: IpAddr,
    pub group: Option<String>,
    pub prefix_to_routes: BTreeMap<IpNetwork, BTreeSet<RouteKey>>,
    pub ext_connecting_routes: BTreeSet<RouteKey>,
    pub connected_route: Option<RouteKey>,
    pub connected_path_ids: BTreeSet<u32>,
    pub aggregate_enable: bool,
    pub delete_state: DeleteState,
    pub dest_stop_done: bool,
    pub connected_stop_done: bool,
}

/// One accepted next hop of the connected route, with everything the
/// rewrite needs from it.
#[derive(Clone, Debug)]
pub(crate) struct ConnectedPathInfo {
    pub path_id: u32,
    pub nexthop: IpAddr,
    pub label: u32,
    pub source: PathSource,
    pub primary: Option<PrimaryPathInfo>,
    pub attrs: Attrs,
}

/// What request processing tells the manager.
#[derive(Debug, Default)]
pub(crate) struct RequestOutcome {
    pub connected_state_changed: bool,
}

// ===== impl ServiceChain =====

impl ServiceChain {
    pub(crate) fn new(
        family: ScFamily,
        src: InstanceId,
        dest: InstanceId,
        connected: InstanceId,
        chain_addr: IpAddr,
        cfg: ServiceChainCfg,
        aggregate_enable: bool,
    ) -> ServiceChain {
        let prefixes = cfg
            .prefixes
            .iter()
            .filter(|prefix| prefix.is_ipv6() == family.is_ipv6())
            .map(|prefix| (*prefix, BTreeSet::new()))
            .collect();
        ServiceChain {
            family,
            src,
            dest,
            connected,
            group: cfg.service_chain_id.clone(),
            cfg,
            chain_addr,
            prefix_to_routes: prefixes,
            ext_connecting_routes: Default::default(),
            connected_route: None,
            connected_path_ids: Default::default(),
            aggregate_enable,
            delete_state: DeleteState::Active,
            dest_stop_done: false,
            connected_stop_done: false,
        }
    }

    pub(crate) fn dest_table(&self) -> TableRef {
        TableRef {
            instance: self.dest,
            family: self.family.table_family(),
        }
    }

    pub(crate) fn connected_table(&self) -> TableRef {
        TableRef {
            instance: self.connected,
            family: self.family.connected_family(),
        }
    }

    pub(crate) fn is_connected_route_valid(
        &self,
        instances: &Instances,
    ) -> bool {
        self.connected_route.as_ref().is_some_and(|key| {
            instances
                .table(self.connected_table())
                .and_then(|table| table.get(key))
                .is_some_and(|route| route.is_valid())
        })
    }

    /// Whether the chain still tracks the route in any capacity. Match
    /// state is reclaimed once this turns false.
    pub(crate) fn tracks(&self, key: &RouteKey) -> bool {
        self.connected_route.as_ref() == Some(key)
            || self.ext_connecting_routes.contains(key)
            || self
                .prefix_to_routes
                .values()
                .any(|routes| routes.contains(key))
    }

    pub(crate) fn deletion_complete(
        &self,
        view: &ServerView<'_>,
    ) -> bool {
        self.delete_state == DeleteState::Draining
            && !view.listener.has_match_states(self.dest_table(), self.src)
            && !view
                .listener
                .has_match_states(self.connected_table(), self.src)
    }

    /// Classifies a table notification. Returns the request to enqueue,
    /// if any, together with the covering aggregate prefix for
    /// more-specific routes.
    pub(crate) fn match_(
        &self,
        instances: &Instances,
        local_as: u32,
        table: TableRef,
        key: &RouteKey,
        route: Option<&BgpRoute>,
        deleted: bool,
    ) -> Option<(RequestKind, Option<IpNetwork>)> {
        if self.delete_state != DeleteState::Active {
            return None;
        }
        if table == self.dest_table() {
            self.match_dest(instances, local_as, key, route, deleted)
        } else if table == self.connected_table() {
            self.match_connected(key, route, deleted)
        } else {
            None
        }
    }

    fn match_dest(
        &self,
        instances: &Instances,
        local_as: u32,
        key: &RouteKey,
        route: Option<&BgpRoute>,
        deleted: bool,
    ) -> Option<(RequestKind, Option<IpNetwork>)> {
        let prefix = match key {
            RouteKey::Ip(prefix) => *prefix,
            RouteKey::Evpn(EvpnPrefix::IpPrefix { prefix, .. }) => *prefix,
            RouteKey::Evpn(EvpnPrefix::MacAdvertisement { .. }) => {
                return None;
            }
        };
        if prefix.is_ipv6() != self.family.is_ipv6() {
            return None;
        }
        // The connected route can leak into the destination table.
        if prefix == IpNetwork::from(self.chain_addr) {
            return None;
        }

        // Aggregation coverage comes first: a route inside or equal to
        // a configured subnet is never external-connecting.
        if let Some(aggregate) = self
            .prefix_to_routes
            .keys()
            .find(|subnet| {
                subnet.contains(prefix.ip())
                    && prefix.prefix() >= subnet.prefix()
            })
            .copied()
        {
            if prefix == aggregate || !self.aggregate_enable {
                return None;
            }
            let kind = if deleted || !route.is_some_and(|r| r.is_valid()) {
                RequestKind::MoreSpecificDelete
            } else {
                RequestKind::MoreSpecificAddChg
            };
            return Some((kind, Some(aggregate)));
        }

        let dest = instances.get(self.dest)?;
        let best = route
            .filter(|_| !deleted)
            .and_then(|route| route.best_path())
            .filter(|path| path.is_feasible());
        let forced_delete = match best {
            None => true,
            Some(best) => {
                let no_reorig = best.attrs.comm.as_ref().is_some_and(|c| {
                    c.value.contains(WellKnownCommunities::NoAdvertise)
                        || c.value
                            .contains(WellKnownCommunities::NoReOriginate)
                });
                let vn_ok = match best
                    .attrs
                    .ext_comm
                    .as_ref()
                    .and_then(|e| e.value.origin_vn())
                {
                    Some(ovn) => {
                        ovn.vn_index() == dest.vn_index || dest.allow_transit
                    }
                    None => true,
                };
                let looped = best.attrs.ovn_path.as_ref().is_some_and(|p| {
                    origin_vn_values(local_as, dest.vn_index)
                        .iter()
                        .any(|ovn| p.value.contains(ovn))
                });
                no_reorig || !vn_ok || looped
            }
        };
        let kind = if forced_delete {
            RequestKind::ExtConnectRouteDelete
        } else {
            RequestKind::ExtConnectRouteAddChg
        };
        Some((kind, None))
    }

    fn match_connected(
        &self,
        key: &RouteKey,
        route: Option<&BgpRoute>,
        deleted: bool,
    ) -> Option<(RequestKind, Option<IpNetwork>)> {
        if key.ip_prefix() != Some(IpNetwork::from(self.chain_addr)) {
            return None;
        }
        let usable = !deleted
            && route.is_some_and(|route| {
                route.is_valid()
                    && route.best_path().is_some_and(|best| {
                        matches!(
                            best.source,
                            PathSource::Bgp | PathSource::Xmpp
                        )
                    })
            });
        let kind = if usable {
            RequestKind::ConnectedRouteAddChg
        } else {
            RequestKind::ConnectedRouteDelete
        };
        Some((kind, None))
    }

    /// Accepted ECMP next hops of the connected route: a prefix scan of
    /// its path list that stops at the first infeasible or non-equal
    /// path, with duplicate forwarding information suppressed.
    pub(crate) fn compute_connected_paths(
        &self,
        instances: &Instances,
    ) -> Vec<ConnectedPathInfo> {
        let Some(key) = &self.connected_route else {
            return Vec::new();
        };
        let Some(route) = instances
            .table(self.connected_table())
            .and_then(|table| table.get(key))
        else {
            return Vec::new();
        };
        let Some(best) = route.best_path().filter(|best| best.is_feasible())
        else {
            return Vec::new();
        };

        let mut seen = BTreeSet::new();
        let mut paths = Vec::new();
        for path in route.paths() {
            if !path.is_feasible() || !best.is_ecmp_equal(path) {
                break;
            }
            let nexthop = path.attrs.base.value.nexthop;
            let path_id = nexthop_path_id(&nexthop);
            if !seen.insert((path_id, path.label)) {
                continue;
            }
            paths.push(ConnectedPathInfo {
                path_id,
                nexthop,
                label: path.label,
                source: path.source,
                primary: path.primary,
                attrs: path.attrs.get(),
            });
        }
        paths
    }

    /// Tables and keys a synthesized route for the prefix lands in: the
    /// chain's native table plus its replication targets.
    fn synth_targets(&self, prefix: IpNetwork) -> Vec<(TableRef, RouteKey)> {
        std::iter::once(self.family.table_family())
            .chain(
                self.family
                    .replication_families(self.cfg.sc_head)
                    .iter()
                    .copied(),
            )
            .map(|family| {
                let key = match family {
                    TableFamily::Evpn => {
                        RouteKey::Evpn(EvpnPrefix::ip_prefix(prefix))
                    }
                    TableFamily::Inet | TableFamily::Inet6 => {
                        RouteKey::Ip(prefix)
                    }
                };
                (TableRef { instance: self.src, family }, key)
            })
            .collect()
    }

    /// Reapplies the aggregate existence law to one configured prefix.
    fn sync_prefix(
        &self,
        view: &mut ServerView<'_>,
        group_up: bool,
        prefix: IpNetwork,
    ) {
        let cpaths = self.compute_connected_paths(view.instances);
        let populated = self
            .prefix_to_routes
            .get(&prefix)
            .is_some_and(|routes| !routes.is_empty());
        if populated && group_up && !cpaths.is_empty() {
            self.install_route(view, prefix, None, &cpaths);
        } else {
            self.withdraw_route(view, prefix);
        }
    }

    /// Reapplies the pass-through law to one external-connecting route.
    fn sync_ext_connect(
        &self,
        view: &mut ServerView<'_>,
        group_up: bool,
        key: &RouteKey,
    ) {
        let Some(prefix) = key.ip_prefix() else {
            return;
        };
        let cpaths = self.compute_connected_paths(view.instances);
        let original = view
            .instances
            .table(self.dest_table())
            .and_then(|table| table.get(key))
            .filter(|route| route.is_valid())
            .and_then(|route| route.best_path())
            .map(|best| best.attrs.get());
        let tracked = self.ext_connecting_routes.contains(key);
        match original {
            Some(original) if tracked && group_up && !cpaths.is_empty() => {
                self.install_route(view, prefix, Some(&original), &cpaths);
            }
            _ => self.withdraw_route(view, prefix),
        }
    }

    pub(crate) fn resync_all(
        &self,
        view: &mut ServerView<'_>,
        group_up: bool,
    ) {
        let prefixes: Vec<_> =
            self.prefix_to_routes.keys().copied().collect();
        for prefix in prefixes {
            self.sync_prefix(view, group_up, prefix);
        }
        let ext: Vec<_> = self.ext_connecting_routes.iter().cloned().collect();
        for key in &ext {
            self.sync_ext_connect(view, group_up, key);
        }
    }

    pub(crate) fn delete_all(&self, view: &mut ServerView<'_>) {
        let prefixes: Vec<_> =
            self.prefix_to_routes.keys().copied().collect();
        for prefix in prefixes {
            self.withdraw_route(view, prefix);
        }
        let ext: Vec<_> = self.ext_connecting_routes.iter().cloned().collect();
        for key in ext {
            if let Some(prefix) = key.ip_prefix() {
                self.withdraw_route(view, prefix);
            }
        }
    }

    /// Installs or refreshes the synthesized route for the prefix, one
    /// path per accepted connected next hop, in every target table.
    fn install_route(
        &self,
        view: &mut ServerView<'_>,
        prefix: IpNetwork,
        original: Option<&Attrs>,
        cpaths: &[ConnectedPathInfo],
    ) {
        let Some(dest) = view.instances.get(self.dest) else {
            return;
        };
        let dest_vn_index = dest.vn_index;
        let export_targets: Vec<ExtComm> = view
            .instances
            .get(self.src)
            .map(|src| {
                src.export_targets
                    .iter()
                    .filter(|rt| rt.is_auto_assigned())
                    .map(|rt| rt.as_extcomm())
                    .collect()
            })
            .unwrap_or_default();

        for (table_ref, key) in self.synth_targets(prefix) {
            let evpn_target = table_ref.family == TableFamily::Evpn;
            let mut desired = Vec::new();
            for cpath in cpaths {
                if let Some(attrs) = self.rebuild_attrs(
                    view.local_as,
                    dest_vn_index,
                    &export_targets,
                    cpath,
                    original,
                    evpn_target,
                ) {
                    let attrs = view.attr_sets.get_route_attr_sets(&attrs);
                    desired.push(BgpPath::new(
                        PathSource::ServiceChain,
                        Some(self.chain_addr),
                        cpath.path_id,
                        attrs,
                        cpath.label,
                    ));
                }
            }

            let path_ids: BTreeSet<u32> =
                desired.iter().map(|path| path.path_id).collect();
            let Some(table) = view.instances.table_mut(table_ref) else {
                continue;
            };
            let route = table.get_or_insert(key.clone());
            let mut changed = false;
            for path in desired {
                if route
                    .find_path(
                        PathSource::ServiceChain,
                        Some(self.chain_addr),
                        path.path_id,
                    )
                    .is_some_and(|existing| {
                        existing.attrs == path.attrs
                            && existing.label == path.label
                            && existing.flags == path.flags
                    })
                {
                    continue;
                }
                route.insert_path(path);
                changed = true;
            }
            // Purge paths whose next hop fell out of the accepted set.
            let before = route.paths().len();
            let chain_addr = self.chain_addr;
            route.retain_paths(|path| {
                path.source != PathSource::ServiceChain
                    || path.peer != Some(chain_addr)
                    || path_ids.contains(&path.path_id)
            });
            changed |= route.paths().len() != before;

            if route.is_empty() {
                if !view.listener.route_in_use(table_ref, &key) {
                    if let Some(table) = view.instances.table_mut(table_ref)
                    {
                        table.remove(&key);
                    }
                }
                Debug::AggregateWithdraw(self.family, &key).log();
                view.events.push(RouteEvent::new(table_ref, key, true));
            } else if changed {
                Debug::AggregateInstall(self.family, &key).log();
                view.events.push(RouteEvent::new(table_ref, key, false));
            }
        }
    }

    fn withdraw_route(&self, view: &mut ServerView<'_>, prefix: IpNetwork) {
        for (table_ref, key) in self.synth_targets(prefix) {
            let Some(table) = view.instances.table_mut(table_ref) else {
                continue;
            };
            let Some(route) = table.get_mut(&key) else {
                continue;
            };
            let before = route.paths().len();
            let chain_addr = self.chain_addr;
            route.retain_paths(|path| {
                path.source != PathSource::ServiceChain
                    || path.peer != Some(chain_addr)
            });
            if route.paths().len() == before {
                continue;
            }
            if route.is_empty()
                && !view.listener.route_in_use(table_ref, &key)
            {
                table.remove(&key);
            }
            Debug::AggregateWithdraw(self.family, &key).log();
            view.events.push(RouteEvent::new(table_ref, key, true));
        }
    }

    /// Builds the synthesized route's attributes from one connected
    /// path and, for pass-through routes, the original route. Returns
    /// None when the path must be skipped because the rebuilt source RD
    /// would point the route back at its own origin.
    fn rebuild_attrs(
        &self,
        local_as: u32,
        dest_vn_index: u32,
        export_targets: &[ExtComm],
        cpath: &ConnectedPathInfo,
        original: Option<&Attrs>,
        evpn_target: bool,
    ) -> Option<Attrs> {
        let mut attrs = cpath.attrs.clone();
        let mut ext_comm = attrs.ext_comm.take().unwrap_or_default();
        let orig_ext = original.and_then(|orig| orig.ext_comm.as_ref());

        ext_comm.remove_kind(ExtCommKind::RouteTarget);
        if evpn_target && self.cfg.sc_head {
            for target in export_targets {
                ext_comm.append(*target);
            }
            ext_comm.replace_kind(
                ExtCommKind::TunnelEncap,
                [TunnelEncap::new(TunnelEncapType::Vxlan).as_extcomm()],
            );
        }

        for kind in [
            ExtCommKind::SecurityGroup,
            ExtCommKind::Tag,
            ExtCommKind::SiteOfOrigin,
        ] {
            let values: Vec<ExtComm> = orig_ext
                .map(|orig| orig.iter_kind(kind).copied().collect())
                .unwrap_or_default();
            if values.is_empty() {
                ext_comm.remove_kind(kind);
            } else {
                ext_comm.replace_kind(kind, values);
            }
        }

        if ext_comm.load_balance().is_none()
            && let Some(lb) = orig_ext.and_then(|orig| orig.load_balance())
        {
            ext_comm.append(lb.as_extcomm());
        }

        let ovn_values = origin_vn_values(local_as, dest_vn_index);
        ext_comm
            .replace_kind(ExtCommKind::OriginVn, ovn_values.iter().copied());

        let mut comm = original
            .and_then(|orig| orig.comm.clone())
            .unwrap_or_default();
        comm.append(Comm::from(WellKnownCommunities::AcceptOwnNexthop));

        let mut ovn_path = original
            .and_then(|orig| orig.ovn_path.clone())
            .unwrap_or_default();
        ovn_path.append(ovn_values[0]);

        attrs.base.as_path = match original {
            Some(orig)
                if self.cfg.retain_as_path
                    && !orig.base.as_path.is_empty() =>
            {
                orig.base.as_path.clone()
            }
            _ => AsPath::default(),
        };

        let source_rd = match (cpath.source, cpath.nexthop, cpath.primary) {
            (PathSource::Xmpp, IpAddr::V4(addr), _) => {
                RouteDistinguisher::from_ip(addr, 0)
            }
            (_, _, Some(primary)) if primary.in_master_vpn => primary.rd,
            _ => attrs.base.source_rd,
        };
        if let Some(orig) = original
            && !orig.base.source_rd.is_zero()
            && orig.base.source_rd == source_rd
        {
            return None;
        }

        attrs.base.nexthop = cpath.nexthop;
        attrs.base.source_rd = source_rd;
        attrs.comm = Some(comm);
        attrs.ext_comm = Some(ext_comm);
        attrs.ovn_path = Some(ovn_path);
        Some(attrs)
    }
}

// ===== global functions =====

/// Origin-VN value(s) stamped on synthesized routes. A 4-byte local AS
/// combined with a VN index above the 2-byte range needs the
/// transitional dual encoding.
fn origin_vn_values(local_as: u32, vn_index: u32) -> Vec<ExtComm> {
    if local_as > AS2_MAX && vn_index > VN_INDEX_4B_MARKER {
        vec![
            OriginVn::from_as2(AS_TRANS as u16, vn_index).as_extcomm(),
            OriginVn::from_as4(local_as, VN_INDEX_4B_MARKER as u16)
                .as_extcomm(),
        ]
    } else {
        vec![OriginVn::new(local_as, vn_index).as_extcomm()]
    }
}

fn nexthop_path_id(nexthop: &IpAddr) -> u32 {
    match nexthop {
        IpAddr::V4(addr) => u32::from(*addr),
        IpAddr::V6(addr) => {
            let octets = addr.octets();
            u32::from_be_bytes([
                octets[12], octets[13], octets[14], octets[15],
            ])
        }
    }
}

/// Applies one queued request to the chain. Runs on the single queue
/// consumer, never concurrently with itself.
pub(crate) fn process_request(
    chain: &mut ServiceChain,
    view: &mut ServerView<'_>,
    group_up: bool,
    req: &ServiceChainRequest,
) -> RequestOutcome {
    let mut outcome = RequestOutcome::default();

    match req.kind {
        RequestKind::MoreSpecificAddChg => {
            if let (Some(aggregate), Some(key)) = (req.aggregate, &req.key) {
                if let Some(routes) =
                    chain.prefix_to_routes.get_mut(&aggregate)
                {
                    routes.insert(key.clone());
                }
                chain.sync_prefix(view, group_up, aggregate);
            }
        }
        RequestKind::MoreSpecificDelete => {
            if let (Some(aggregate), Some(key)) = (req.aggregate, &req.key) {
                if let Some(routes) =
                    chain.prefix_to_routes.get_mut(&aggregate)
                {
                    routes.remove(key);
                }
                chain.sync_prefix(view, group_up, aggregate);
            }
        }
        RequestKind::ConnectedRouteAddChg => {
            if let Some(key) = &req.key {
                chain.connected_route = Some(key.clone());
                chain.connected_path_ids = chain
                    .compute_connected_paths(view.instances)
                    .iter()
                    .map(|cpath| cpath.path_id)
                    .collect();
                if let Some(instance) = view.instances.get(chain.src) {
                    Debug::ConnectedUp(chain.family, &instance.name).log();
                }
                chain.resync_all(view, group_up);
                outcome.connected_state_changed = true;
            }
        }
        RequestKind::ConnectedRouteDelete => {
            chain.connected_route = None;
            chain.connected_path_ids.clear();
            if let Some(instance) = view.instances.get(chain.src) {
                Debug::ConnectedDown(chain.family, &instance.name).log();
            }
            chain.resync_all(view, group_up);
            outcome.connected_state_changed = true;
        }
        RequestKind::ExtConnectRouteAddChg => {
            if let Some(key) = &req.key {
                chain.ext_connecting_routes.insert(key.clone());
                chain.sync_ext_connect(view, group_up, key);
            }
        }
        RequestKind::ExtConnectRouteDelete => {
            if let Some(key) = &req.key {
                chain.ext_connecting_routes.remove(key);
                if let Some(prefix) = key.ip_prefix() {
                    chain.withdraw_route(view, prefix);
                }
            }
        }
        RequestKind::UpdateAllRoutes => {
            chain.resync_all(view, group_up);
        }
        RequestKind::DeleteAllRoutes => {
            chain.delete_all(view);
        }
        RequestKind::StopChainDone => {
            if let Some(table) = req.table {
                if table == chain.dest_table() {
                    chain.dest_stop_done = true;
                } else if table == chain.connected_table() {
                    chain.connected_stop_done = true;
                }
                if chain.dest_stop_done && chain.connected_stop_done {
                    chain.delete_state = DeleteState::Draining;
                }
            }
        }
    }

    // Every route-carrying request holds one match-state reference,
    // released here. The state itself goes away once the chain no
    // longer tracks the route.
    if let (Some(table), Some(key)) = (req.table, &req.key) {
        view.listener.unref_match_state(table, chain.src, key);
        if !chain.tracks(key) {
            view.listener.remove_match_state(table, chain.src, key);
        }
    }

    outcome
}
