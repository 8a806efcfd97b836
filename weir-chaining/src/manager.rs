//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Service chain lifecycle management.
//!
//! One manager per family owns the chain map, the pending list, the
//! fate-sharing groups and the single-consumer request queue. All chain
//! state mutation funnels through [`ServiceChainMgr::process_queue`],
//! which the owner drives from one context at a time.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use derive_new::new;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use weir_utils::task::{TaskTrigger, WorkQueue};

use crate::af::ScFamily;
use crate::chain::{self, DeleteState, ServiceChain};
use crate::config::ServiceChainCfg;
use crate::debug::Debug;
use crate::error::Error;
use crate::group::ServiceChainGroup;
use crate::instance::{InstanceId, Instances};
use crate::server::ServerView;
use crate::table::{RouteEvent, RouteKey, TableRef};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RequestKind {
    MoreSpecificAddChg,
    MoreSpecificDelete,
    ConnectedRouteAddChg,
    ConnectedRouteDelete,
    ExtConnectRouteAddChg,
    ExtConnectRouteDelete,
    UpdateAllRoutes,
    DeleteAllRoutes,
    StopChainDone,
}

/// Work queue entry: one classified table event or lifecycle step for
/// one chain.
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct ServiceChainRequest {
    pub kind: RequestKind,
    pub chain: InstanceId,
    pub table: Option<TableRef>,
    pub key: Option<RouteKey>,
    pub aggregate: Option<IpNetwork>,
}

/// Why a configured chain could not be brought up yet.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PendingReason {
    PrevIncarnationPendingDelete,
    DestInstanceNotFound,
    DestInstanceDeleted,
    VnIndexUnavailable,
    ConnInstanceNotFound,
    ConnInstanceDeleted,
    AddressParseError,
}

#[derive(Debug)]
pub struct PendingChainInfo {
    pub cfg: ServiceChainCfg,
    pub group: Option<String>,
    pub reason: PendingReason,
}

/// Per-family service chain manager.
#[derive(Debug)]
pub struct ServiceChainMgr {
    pub family: ScFamily,
    chain_set: BTreeMap<InstanceId, ServiceChain>,
    pending_chains: BTreeMap<InstanceId, PendingChainInfo>,
    groups: BTreeMap<String, ServiceChainGroup>,
    group_pending: BTreeSet<String>,
    pub group_trigger: TaskTrigger,
    pub resolve_trigger: TaskTrigger,
    queue: WorkQueue<ServiceChainRequest>,
    aggregate_host_route: bool,
}

// ===== impl RequestKind =====

impl RequestKind {
    fn is_add(&self) -> bool {
        matches!(
            self,
            RequestKind::MoreSpecificAddChg
                | RequestKind::ConnectedRouteAddChg
                | RequestKind::ExtConnectRouteAddChg
        )
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::MoreSpecificAddChg => {
                write!(f, "more-specific add/change")
            }
            RequestKind::MoreSpecificDelete => {
                write!(f, "more-specific delete")
            }
            RequestKind::ConnectedRouteAddChg => {
                write!(f, "connected route add/change")
            }
            RequestKind::ConnectedRouteDelete => {
                write!(f, "connected route delete")
            }
            RequestKind::ExtConnectRouteAddChg => {
                write!(f, "ext-connect route add/change")
            }
            RequestKind::ExtConnectRouteDelete => {
                write!(f, "ext-connect route delete")
            }
            RequestKind::UpdateAllRoutes => write!(f, "update all routes"),
            RequestKind::DeleteAllRoutes => write!(f, "delete all routes"),
            RequestKind::StopChainDone => write!(f, "stop chain done"),
        }
    }
}

// ===== impl PendingReason =====

impl std::fmt::Display for PendingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingReason::PrevIncarnationPendingDelete => {
                write!(f, "Waiting for deletion of previous incarnation")
            }
            PendingReason::DestInstanceNotFound => {
                write!(f, "Destination routing instance does not exist")
            }
            PendingReason::DestInstanceDeleted => {
                write!(f, "Destination routing instance deleted")
            }
            PendingReason::VnIndexUnavailable => {
                write!(f, "Virtual network index not available")
            }
            PendingReason::ConnInstanceNotFound => {
                write!(f, "Connected routing instance does not exist")
            }
            PendingReason::ConnInstanceDeleted => {
                write!(f, "Connected routing instance deleted")
            }
            PendingReason::AddressParseError => {
                write!(f, "Service chain address parse error")
            }
        }
    }
}

// ===== impl ServiceChainMgr =====

impl ServiceChainMgr {
    pub fn new(family: ScFamily) -> ServiceChainMgr {
        ServiceChainMgr {
            family,
            chain_set: Default::default(),
            pending_chains: Default::default(),
            groups: Default::default(),
            group_pending: Default::default(),
            group_trigger: Default::default(),
            resolve_trigger: Default::default(),
            queue: WorkQueue::new(),
            aggregate_host_route: true,
        }
    }

    /// Idempotent chain upsert for one source instance. `Ok(true)` when
    /// the chain is up, `Ok(false)` when it was queued as pending.
    pub(crate) fn locate_service_chain(
        &mut self,
        view: &mut ServerView<'_>,
        src: InstanceId,
        cfg: ServiceChainCfg,
    ) -> Result<bool, Error> {
        let src_name = view
            .instances
            .get(src)
            .map(|instance| instance.name.clone())
            .ok_or(Error::InstanceIdNotFound)?;

        // A retried pending chain re-adds itself below on failure.
        if let Some(info) = self.pending_chains.remove(&src)
            && let Some(group) = info.group
        {
            self.detach_group(&group, src);
        }

        if let Some(existing) = self.chain_set.get(&src) {
            if existing.cfg == cfg
                && existing.delete_state == DeleteState::Active
            {
                return Ok(true);
            }
            // Reconfiguration replaces the previous incarnation; the
            // new chain waits until the old one has drained.
            if existing.delete_state == DeleteState::Active {
                self.initiate_stop(view, src);
            }
            self.add_pending(
                view,
                src,
                cfg,
                PendingReason::PrevIncarnationPendingDelete,
            );
            return Ok(false);
        }

        // Prerequisites, checked in order.
        let dest_id = match view.instances.get_by_name(&cfg.dest_instance) {
            None => {
                self.add_pending(
                    view,
                    src,
                    cfg,
                    PendingReason::DestInstanceNotFound,
                );
                return Ok(false);
            }
            Some(dest) if dest.deleted => {
                self.add_pending(
                    view,
                    src,
                    cfg,
                    PendingReason::DestInstanceDeleted,
                );
                return Ok(false);
            }
            Some(dest) if dest.vn_index == 0 => {
                self.add_pending(
                    view,
                    src,
                    cfg,
                    PendingReason::VnIndexUnavailable,
                );
                return Ok(false);
            }
            Some(_) => view.instances.id_by_name(&cfg.dest_instance)?,
        };

        let conn_name = cfg
            .connected_instance
            .clone()
            .unwrap_or_else(|| src_name.clone());
        let conn_id = match view.instances.get_by_name(&conn_name) {
            None => {
                self.add_pending(
                    view,
                    src,
                    cfg,
                    PendingReason::ConnInstanceNotFound,
                );
                return Ok(false);
            }
            Some(conn) if conn.deleted => {
                self.add_pending(
                    view,
                    src,
                    cfg,
                    PendingReason::ConnInstanceDeleted,
                );
                return Ok(false);
            }
            Some(_) => view.instances.id_by_name(&conn_name)?,
        };

        let Ok(chain_addr) = cfg.chain_address.parse::<IpAddr>() else {
            self.add_pending(view, src, cfg, PendingReason::AddressParseError);
            return Ok(false);
        };

        let chain = ServiceChain::new(
            self.family,
            src,
            dest_id,
            conn_id,
            chain_addr,
            cfg,
            self.aggregate_host_route,
        );
        if let Some(group) = chain.group.clone() {
            self.attach_group(&group, src);
        }
        view.listener.add_match_condition(chain.dest_table(), src);
        view.listener.add_match_condition(chain.connected_table(), src);
        Debug::ChainCreated(self.family, &src_name).log();
        self.chain_set.insert(src, chain);
        self.seed_chain_tables(view, src);
        Ok(true)
    }

    /// Evaluates routes already present in the chain's tables when the
    /// chain is created, as if each had just been notified.
    fn seed_chain_tables(
        &mut self,
        view: &mut ServerView<'_>,
        src: InstanceId,
    ) {
        let Some(chain) = self.chain_set.get(&src) else {
            return;
        };
        for table in [chain.dest_table(), chain.connected_table()] {
            let keys: Vec<RouteKey> = view
                .instances
                .table(table)
                .map(|table| table.routes.keys().cloned().collect())
                .unwrap_or_default();
            for key in keys {
                let route = view
                    .instances
                    .table(table)
                    .and_then(|table| table.get(&key));
                let Some((kind, aggregate)) = chain.match_(
                    view.instances,
                    view.local_as,
                    table,
                    &key,
                    route,
                    false,
                ) else {
                    continue;
                };
                // A new chain has no match state, so deletes are no-ops.
                if !kind.is_add() {
                    continue;
                }
                view.listener.ref_match_state(table, src, &key);
                self.enqueue(ServiceChainRequest::new(
                    kind,
                    src,
                    Some(table),
                    Some(key),
                    aggregate,
                ));
            }
        }
    }

    /// Tears down the chain for the instance: a pending entry goes away
    /// immediately, an active chain drains through the queue.
    pub(crate) fn stop_service_chain(
        &mut self,
        view: &mut ServerView<'_>,
        src: InstanceId,
    ) {
        if let Some(info) = self.pending_chains.remove(&src) {
            if let Some(group) = info.group {
                self.detach_group(&group, src);
            }
            return;
        }
        self.initiate_stop(view, src);
    }

    fn initiate_stop(&mut self, view: &mut ServerView<'_>, src: InstanceId) {
        let (dest_table, conn_table, group) = {
            let Some(chain) = self.chain_set.get_mut(&src) else {
                return;
            };
            if chain.delete_state != DeleteState::Active {
                return;
            }
            chain.delete_state = DeleteState::Stopping;
            (chain.dest_table(), chain.connected_table(), chain.group.clone())
        };
        if let Some(instance) = view.instances.get(src) {
            Debug::ChainStop(self.family, &instance.name).log();
        }
        if let Some(group) = group {
            self.detach_group(&group, src);
        }
        for table in [dest_table, conn_table] {
            let keys = view.listener.remove_match_condition(table, src);
            for key in keys {
                let (kind, aggregate) =
                    self.classify_stop_delete(src, table, dest_table, &key);
                view.listener.ref_match_state(table, src, &key);
                self.enqueue(ServiceChainRequest::new(
                    kind,
                    src,
                    Some(table),
                    Some(key),
                    aggregate,
                ));
            }
            // Queued after the per-route deletes, so by the time it is
            // processed every route the condition ever matched has been
            // handled.
            self.enqueue(ServiceChainRequest::new(
                RequestKind::StopChainDone,
                src,
                Some(table),
                None,
                None,
            ));
        }
    }

    fn classify_stop_delete(
        &self,
        src: InstanceId,
        table: TableRef,
        dest_table: TableRef,
        key: &RouteKey,
    ) -> (RequestKind, Option<IpNetwork>) {
        if table != dest_table {
            return (RequestKind::ConnectedRouteDelete, None);
        }
        let aggregate = self.chain_set.get(&src).and_then(|chain| {
            chain
                .prefix_to_routes
                .iter()
                .find(|(_, routes)| routes.contains(key))
                .map(|(prefix, _)| *prefix)
        });
        match aggregate {
            Some(aggregate) => {
                (RequestKind::MoreSpecificDelete, Some(aggregate))
            }
            None => (RequestKind::ExtConnectRouteDelete, None),
        }
    }

    /// Runs `Match` for every chain registered on the changed table and
    /// enqueues the classified requests. Never blocks.
    pub(crate) fn route_notify(
        &mut self,
        view: &mut ServerView<'_>,
        event: &RouteEvent,
    ) {
        let chains: Vec<InstanceId> =
            view.listener.registered_chains(event.table).collect();
        for src in chains {
            let Some(chain) = self.chain_set.get(&src) else {
                continue;
            };
            let route = view
                .instances
                .table(event.table)
                .and_then(|table| table.get(&event.key));
            let Some((kind, aggregate)) = chain.match_(
                view.instances,
                view.local_as,
                event.table,
                &event.key,
                route,
                event.deleted,
            ) else {
                continue;
            };
            // Deletes for routes that never matched carry no state to
            // clean up and are dropped here.
            if !kind.is_add()
                && view
                    .listener
                    .get_match_state(event.table, src, &event.key)
                    .is_none()
            {
                continue;
            }
            view.listener.ref_match_state(event.table, src, &event.key);
            self.enqueue(ServiceChainRequest::new(
                kind,
                src,
                Some(event.table),
                Some(event.key.clone()),
                aggregate,
            ));
        }
    }

    /// Drains the request queue. Returns how many requests were
    /// processed.
    pub(crate) fn process_queue(
        &mut self,
        view: &mut ServerView<'_>,
    ) -> usize {
        let mut processed = 0;
        while let Some(req) = self.queue.dequeue() {
            Debug::RequestRx(self.family, &req.kind.to_string()).log();
            processed += 1;

            let group_name = self
                .chain_set
                .get(&req.chain)
                .and_then(|chain| chain.group.clone());
            let group_up = match &group_name {
                Some(name) => self
                    .groups
                    .get(name)
                    .is_some_and(|group| group.oper_state_up),
                None => true,
            };
            let Some(chain) = self.chain_set.get_mut(&req.chain) else {
                continue;
            };
            let outcome = chain::process_request(chain, view, group_up, &req);

            if outcome.connected_state_changed
                && let Some(group) = group_name
            {
                self.group_pending.insert(group);
                self.group_trigger.activate();
            }
            if self
                .chain_set
                .get(&req.chain)
                .is_some_and(|chain| chain.delete_state != DeleteState::Active)
            {
                self.maybe_destroy_chain(view, req.chain);
            }
        }
        processed
    }

    fn maybe_destroy_chain(
        &mut self,
        view: &mut ServerView<'_>,
        src: InstanceId,
    ) {
        let Some(chain) = self.chain_set.get(&src) else {
            return;
        };
        if !chain.deletion_complete(view) {
            return;
        }
        view.listener.unregister(chain.dest_table(), src);
        view.listener.unregister(chain.connected_table(), src);
        if let Some(instance) = view.instances.get(src) {
            Debug::ChainDestroyed(self.family, &instance.name).log();
        }
        self.chain_set.remove(&src);
        // A pending replacement may be waiting on this deletion.
        self.resolve_trigger.activate();
    }

    /// Retries every pending chain. Entries that still fail re-add
    /// themselves with a fresh reason.
    pub(crate) fn resolve_pending_service_chains(
        &mut self,
        view: &mut ServerView<'_>,
    ) {
        if self.pending_chains.is_empty() {
            return;
        }
        Debug::ResolveRetry(self.family).log();
        let pending = std::mem::take(&mut self.pending_chains);
        for (src, info) in pending {
            if let Some(group) = info.group {
                self.detach_group(&group, src);
            }
            if let Err(error) = self.locate_service_chain(view, src, info.cfg)
            {
                error.log();
            }
        }
    }

    /// Fires the coalesced triggers: pending-chain resolution and group
    /// state reevaluation.
    pub(crate) fn process_triggers(&mut self, view: &mut ServerView<'_>) {
        if self.resolve_trigger.take() {
            self.resolve_pending_service_chains(view);
        }
        if self.group_trigger.take() {
            self.process_service_chain_groups(view);
        }
    }

    /// Recomputes the operational state of every flagged group and, on
    /// transition, enqueues an update or delete of all member routes.
    fn process_service_chain_groups(&mut self, view: &mut ServerView<'_>) {
        for name in std::mem::take(&mut self.group_pending) {
            let Some(group) = self.groups.get(&name) else {
                continue;
            };
            if group.is_empty() {
                self.groups.remove(&name);
                continue;
            }
            // Pending members count as down.
            let up = group.members.iter().all(|member| {
                self.chain_set.get(member).is_some_and(|chain| {
                    chain.is_connected_route_valid(view.instances)
                })
            });
            let Some(group) = self.groups.get_mut(&name) else {
                continue;
            };
            if group.oper_state_up == up {
                continue;
            }
            group.oper_state_up = up;
            Debug::GroupOperState(&name, up).log();
            let kind = if up {
                RequestKind::UpdateAllRoutes
            } else {
                RequestKind::DeleteAllRoutes
            };
            let members: Vec<InstanceId> =
                group.members.iter().copied().collect();
            for member in members {
                self.enqueue(ServiceChainRequest::new(
                    kind, member, None, None, None,
                ));
            }
        }
    }

    fn attach_group(&mut self, name: &str, member: InstanceId) {
        let group = self
            .groups
            .entry(name.to_owned())
            .or_insert_with(|| ServiceChainGroup::new(name));
        group.add_member(member);
        self.group_pending.insert(name.to_owned());
        self.group_trigger.activate();
    }

    fn detach_group(&mut self, name: &str, member: InstanceId) {
        if let Some(group) = self.groups.get_mut(name) {
            group.remove_member(member);
            self.group_pending.insert(name.to_owned());
            self.group_trigger.activate();
        }
    }

    fn enqueue(&self, req: ServiceChainRequest) {
        self.queue.enqueue(req);
    }

    fn add_pending(
        &mut self,
        view: &ServerView<'_>,
        src: InstanceId,
        cfg: ServiceChainCfg,
        reason: PendingReason,
    ) {
        let group = cfg.service_chain_id.clone();
        if let Some(group) = &group {
            self.attach_group(group, src);
        }
        if let Some(instance) = view.instances.get(src) {
            Debug::ChainPending(self.family, &instance.name, &reason).log();
        }
        self.pending_chains
            .insert(src, PendingChainInfo { cfg, group, reason });
    }

    /// Chains that are configured but not forwarding: pending entries
    /// plus chains whose connected route or group is down. Computed on
    /// demand, never cached.
    pub fn get_down_service_chain_count(
        &self,
        instances: &Instances,
    ) -> usize {
        let down_chains = self
            .chain_set
            .values()
            .filter(|chain| {
                let group_up = match &chain.group {
                    Some(name) => self
                        .groups
                        .get(name)
                        .is_some_and(|group| group.oper_state_up),
                    None => true,
                };
                !group_up || !chain.is_connected_route_valid(instances)
            })
            .count();
        self.pending_chains.len() + down_chains
    }

    pub fn find_chain(&self, src: InstanceId) -> Option<&ServiceChain> {
        self.chain_set.get(&src)
    }

    pub fn find_pending(
        &self,
        src: InstanceId,
    ) -> Option<&PendingChainInfo> {
        self.pending_chains.get(&src)
    }

    pub fn chains(
        &self,
    ) -> impl Iterator<Item = (InstanceId, &ServiceChain)> + '_ {
        self.chain_set.iter().map(|(id, chain)| (*id, chain))
    }

    pub fn pending(
        &self,
    ) -> impl Iterator<Item = (InstanceId, &PendingChainInfo)> + '_ {
        self.pending_chains.iter().map(|(id, info)| (*id, info))
    }

    pub fn group(&self, name: &str) -> Option<&ServiceChainGroup> {
        self.groups.get(name)
    }

    pub fn has_chain(&self, src: InstanceId) -> bool {
        self.chain_set.contains_key(&src)
            || self.pending_chains.contains_key(&src)
    }

    /// Pauses or resumes queue draining without dropping entries.
    pub fn set_queue_disabled(&mut self, disabled: bool) {
        if disabled {
            self.queue.disable();
        } else {
            self.queue.enable();
        }
    }

    /// Enables or disables host-route aggregation for chains created
    /// from now on.
    pub fn set_aggregate_host_route(&mut self, enable: bool) {
        self.aggregate_host_route = enable;
    }
}
