//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Per-instance routing tables.
//!
//! Each table keeps routes in a sorted map, and each route keeps its
//! paths sorted by preference so the best path is always the first
//! element. A route entry with no remaining paths stays in the table
//! while match state still references it and is swept afterwards.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::net::IpAddr;

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use derive_new::new;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use weir_utils::bgp::RouteDistinguisher;

use crate::af::{EvpnPrefix, TableFamily};
use crate::attr::RouteAttrs;
use crate::instance::InstanceId;

/// Route key within a table.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum RouteKey {
    Ip(IpNetwork),
    Evpn(EvpnPrefix),
}

/// Table identity: owning instance plus address family.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TableRef {
    pub instance: InstanceId,
    pub family: TableFamily,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    pub struct PathFlags: u8 {
        const INFEASIBLE = 0x01;
        const STALE = 0x02;
    }
}

/// Protocol that installed a path.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum PathSource {
    Bgp,
    Xmpp,
    ServiceChain,
    StaticRoute,
    Aggregate,
}

/// Source information of the primary path a secondary was replicated
/// from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PrimaryPathInfo {
    pub rd: RouteDistinguisher,
    pub in_master_vpn: bool,
}

/// A single path of a route.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BgpPath {
    pub source: PathSource,
    pub peer: Option<IpAddr>,
    pub path_id: u32,
    pub attrs: RouteAttrs,
    pub label: u32,
    pub flags: PathFlags,
    pub primary: Option<PrimaryPathInfo>,
}

/// A route and its preference-ordered paths.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BgpRoute {
    paths: Vec<BgpPath>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Routing table for one address family of one instance.
#[derive(Debug)]
pub struct BgpTable {
    pub family: TableFamily,
    pub routes: BTreeMap<RouteKey, BgpRoute>,
}

/// Table change pending delivery to registered listeners.
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct RouteEvent {
    pub table: TableRef,
    pub key: RouteKey,
    pub deleted: bool,
}

// ===== impl RouteKey =====

impl RouteKey {
    /// IP prefix of the route, for IP routes and EVPN type-5 routes.
    pub fn ip_prefix(&self) -> Option<IpNetwork> {
        match self {
            RouteKey::Ip(prefix) => Some(*prefix),
            RouteKey::Evpn(evpn) => evpn.ip(),
        }
    }
}

impl std::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteKey::Ip(prefix) => write!(f, "{}", prefix),
            RouteKey::Evpn(evpn) => write!(f, "{}", evpn),
        }
    }
}

// ===== impl BgpPath =====

impl BgpPath {
    pub fn new(
        source: PathSource,
        peer: Option<IpAddr>,
        path_id: u32,
        attrs: RouteAttrs,
        label: u32,
    ) -> BgpPath {
        BgpPath {
            source,
            peer,
            path_id,
            attrs,
            label,
            flags: PathFlags::empty(),
            primary: None,
        }
    }

    pub fn is_feasible(&self) -> bool {
        !self.flags.contains(PathFlags::INFEASIBLE)
    }

    /// Path preference order: feasible before infeasible, then higher
    /// local-pref, then shorter AS path, then lower MED.
    pub fn compare(&self, other: &BgpPath) -> Ordering {
        let a = &self.attrs.base.value;
        let b = &other.attrs.base.value;
        other
            .is_feasible()
            .cmp(&self.is_feasible())
            .then(b.local_pref.cmp(&a.local_pref))
            .then(a.as_path.path_length().cmp(&b.as_path.path_length()))
            .then(a.med.cmp(&b.med))
    }

    /// Whether two paths are close enough in preference to share
    /// forwarding. Local-pref and MED must match exactly.
    pub fn is_ecmp_equal(&self, other: &BgpPath) -> bool {
        let a = &self.attrs.base.value;
        let b = &other.attrs.base.value;
        a.local_pref == b.local_pref && a.med == b.med
    }
}

// ===== impl BgpRoute =====

impl BgpRoute {
    pub fn best_path(&self) -> Option<&BgpPath> {
        self.paths.first()
    }

    pub fn paths(&self) -> &[BgpPath] {
        &self.paths
    }

    /// A route is usable when its best path is feasible.
    pub fn is_valid(&self) -> bool {
        self.best_path().is_some_and(|path| path.is_feasible())
    }

    pub fn find_path(
        &self,
        source: PathSource,
        peer: Option<IpAddr>,
        path_id: u32,
    ) -> Option<&BgpPath> {
        self.paths.iter().find(|path| {
            path.source == source
                && path.peer == peer
                && path.path_id == path_id
        })
    }

    /// Inserts or replaces a path, keeping the list sorted by
    /// preference.
    pub fn insert_path(&mut self, path: BgpPath) {
        self.paths.retain(|p| {
            !(p.source == path.source
                && p.peer == path.peer
                && p.path_id == path.path_id)
        });
        let pos = self
            .paths
            .partition_point(|p| p.compare(&path) != Ordering::Greater);
        self.paths.insert(pos, path);
        self.last_modified = Some(Utc::now());
    }

    /// Removes a path. Returns whether something was removed.
    pub fn remove_path(
        &mut self,
        source: PathSource,
        peer: Option<IpAddr>,
        path_id: u32,
    ) -> bool {
        let before = self.paths.len();
        self.paths.retain(|p| {
            !(p.source == source && p.peer == peer && p.path_id == path_id)
        });
        let removed = self.paths.len() != before;
        if removed {
            self.last_modified = Some(Utc::now());
        }
        removed
    }

    pub fn retain_paths(&mut self, f: impl FnMut(&BgpPath) -> bool) {
        self.paths.retain(f);
        self.last_modified = Some(Utc::now());
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

// ===== impl BgpTable =====

impl BgpTable {
    pub fn new(family: TableFamily) -> BgpTable {
        BgpTable {
            family,
            routes: Default::default(),
        }
    }

    pub fn get(&self, key: &RouteKey) -> Option<&BgpRoute> {
        self.routes.get(key)
    }

    pub fn get_or_insert(&mut self, key: RouteKey) -> &mut BgpRoute {
        self.routes.entry(key).or_default()
    }

    pub fn get_mut(&mut self, key: &RouteKey) -> Option<&mut BgpRoute> {
        self.routes.get_mut(key)
    }

    pub fn remove(&mut self, key: &RouteKey) {
        self.routes.remove(key);
    }

    /// Routes whose IP prefix is covered by the given subnet,
    /// including the subnet itself.
    pub fn routes_within(
        &self,
        subnet: IpNetwork,
    ) -> impl Iterator<Item = (&RouteKey, &BgpRoute)> + '_ {
        self.routes.iter().filter(move |(key, _)| {
            key.ip_prefix().is_some_and(|prefix| {
                subnet.contains(prefix.ip())
                    && prefix.prefix() >= subnet.prefix()
            })
        })
    }

    /// Drops route entries that have no paths left.
    pub fn sweep(&mut self, mut in_use: impl FnMut(&RouteKey) -> bool) {
        self.routes
            .retain(|key, route| !route.is_empty() || in_use(key));
    }
}
