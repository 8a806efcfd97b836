//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Path attributes and their interning context.
//!
//! Attribute fragments are canonical, immutable and shared: mutation always
//! operates on a detached clone which is then re-interned through
//! [`AttrSetsCxt`], so structurally equal attribute sets collapse to the
//! same shared allocation.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use weir_utils::bgp::{
    Comm, ExtComm, RouteDistinguisher, WellKnownCommunities,
};

use crate::comm::{ExtCommKind, LoadBalance, OriginVn, SiteOfOrigin};

pub const DFLT_LOCAL_PREF: u32 = 100;

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum AsPathSegmentType {
    Set,
    Sequence,
}

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct AsPathSegment {
    pub seg_type: AsPathSegmentType,
    pub members: Vec<u32>,
}

#[derive(Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct AsPath {
    pub segments: VecDeque<AsPathSegment>,
}

// Standard communities attribute.
#[derive(Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct Comms(pub BTreeSet<Comm>);

// Extended communities attribute.
#[derive(Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct ExtComms(pub BTreeSet<ExtComm>);

// Origin-VN path attribute: ordered trail of origin-VN values accumulated
// as a route is re-originated across virtual networks.
#[derive(Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct OriginVnPath(pub Vec<ExtComm>);

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct BaseAttrs {
    pub nexthop: IpAddr,
    pub local_pref: u32,
    pub med: u32,
    pub as_path: AsPath,
    pub source_rd: RouteDistinguisher,
}

// Complete (non-interned) attribute bundle.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct Attrs {
    pub base: BaseAttrs,
    pub comm: Option<Comms>,
    pub ext_comm: Option<ExtComms>,
    pub ovn_path: Option<OriginVnPath>,
}

// Interned attribute bundle carried by routes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RouteAttrs {
    pub base: Arc<AttrSet<BaseAttrs>>,
    pub comm: Option<Arc<AttrSet<Comms>>>,
    pub ext_comm: Option<Arc<AttrSet<ExtComms>>>,
    pub ovn_path: Option<Arc<AttrSet<OriginVnPath>>>,
}

#[derive(Debug, Default)]
pub struct AttrSetsCxt {
    pub base: AttrSets<BaseAttrs>,
    pub comm: AttrSets<Comms>,
    pub ext_comm: AttrSets<ExtComms>,
    pub ovn_path: AttrSets<OriginVnPath>,
}

#[derive(Debug, Eq, PartialEq)]
pub struct AttrSets<T> {
    pub tree: BTreeMap<T, Arc<AttrSet<T>>>,
    next_index: u64,
}

#[derive(Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AttrSet<T> {
    pub index: u64,
    pub value: T,
}

// ===== impl AsPath =====

impl AsPath {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn path_length(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| match segment.seg_type {
                AsPathSegmentType::Set => 1,
                AsPathSegmentType::Sequence => segment.members.len(),
            })
            .sum()
    }
}

// ===== impl Comms =====

impl Comms {
    pub fn append(&mut self, comm: Comm) {
        self.0.insert(comm);
    }

    pub fn set(&mut self, comms: impl IntoIterator<Item = Comm>) {
        self.0 = comms.into_iter().collect();
    }

    pub fn remove(&mut self, comms: &[Comm]) {
        for comm in comms {
            self.0.remove(comm);
        }
    }

    pub fn contains(&self, comm: WellKnownCommunities) -> bool {
        self.0.contains(&Comm::from(comm))
    }
}

// ===== impl ExtComms =====

impl ExtComms {
    pub fn append(&mut self, comm: ExtComm) {
        self.0.insert(comm);
    }

    pub fn remove(&mut self, comm: &ExtComm) {
        self.0.remove(comm);
    }

    /// Removes every value whose type/subtype tag matches the given
    /// category, leaving other values untouched.
    pub fn remove_kind(&mut self, kind: ExtCommKind) {
        self.0.retain(|comm| ExtCommKind::of(comm) != Some(kind));
    }

    /// Replace semantics for one category: remove all existing values of
    /// that category, then append the provided ones.
    pub fn replace_kind(
        &mut self,
        kind: ExtCommKind,
        comms: impl IntoIterator<Item = ExtComm>,
    ) {
        self.remove_kind(kind);
        self.0.extend(comms);
    }

    pub fn iter_kind(
        &self,
        kind: ExtCommKind,
    ) -> impl Iterator<Item = &ExtComm> + '_ {
        self.0
            .iter()
            .filter(move |comm| ExtCommKind::of(comm) == Some(kind))
    }

    pub fn route_targets(&self) -> impl Iterator<Item = &ExtComm> + '_ {
        self.iter_kind(ExtCommKind::RouteTarget)
    }

    pub fn site_of_origin(&self) -> Option<SiteOfOrigin> {
        self.iter_kind(ExtCommKind::SiteOfOrigin)
            .next()
            .and_then(SiteOfOrigin::get)
    }

    pub fn origin_vn(&self) -> Option<OriginVn> {
        self.iter_kind(ExtCommKind::OriginVn)
            .next()
            .and_then(OriginVn::get)
    }

    pub fn load_balance(&self) -> Option<LoadBalance> {
        self.iter_kind(ExtCommKind::LoadBalance)
            .next()
            .and_then(LoadBalance::get)
    }
}

// ===== impl OriginVnPath =====

impl OriginVnPath {
    pub fn contains(&self, comm: &ExtComm) -> bool {
        self.0.contains(comm)
    }

    pub fn append(&mut self, comm: ExtComm) {
        self.0.push(comm);
    }
}

// ===== impl Attrs =====

impl Attrs {
    pub fn new(nexthop: IpAddr) -> Attrs {
        Attrs {
            base: BaseAttrs {
                nexthop,
                local_pref: DFLT_LOCAL_PREF,
                med: 0,
                as_path: AsPath::default(),
                source_rd: RouteDistinguisher::default(),
            },
            comm: None,
            ext_comm: None,
            ovn_path: None,
        }
    }
}

// ===== impl RouteAttrs =====

impl RouteAttrs {
    // Reconstructs the plain attribute bundle, e.g. as the starting point
    // of a clone-mutate-reintern cycle.
    pub(crate) fn get(&self) -> Attrs {
        Attrs {
            base: self.base.value.clone(),
            comm: self.comm.as_ref().map(|comm| comm.value.clone()),
            ext_comm: self
                .ext_comm
                .as_ref()
                .map(|ext_comm| ext_comm.value.clone()),
            ovn_path: self
                .ovn_path
                .as_ref()
                .map(|ovn_path| ovn_path.value.clone()),
        }
    }
}

// ===== impl AttrSetsCxt =====

impl AttrSetsCxt {
    /// Interns every fragment of the bundle, returning the shared form
    /// carried by routes.
    pub fn get_route_attr_sets(&mut self, attrs: &Attrs) -> RouteAttrs {
        RouteAttrs {
            base: self.base.get(&attrs.base),
            comm: attrs.comm.as_ref().map(|comm| self.comm.get(comm)),
            ext_comm: attrs
                .ext_comm
                .as_ref()
                .map(|ext_comm| self.ext_comm.get(ext_comm)),
            ovn_path: attrs
                .ovn_path
                .as_ref()
                .map(|ovn_path| self.ovn_path.get(ovn_path)),
        }
    }
}

// ===== impl AttrSets =====

impl<T> AttrSets<T>
where
    T: Clone + Eq + Ord,
{
    fn get(&mut self, attr: &T) -> Arc<AttrSet<T>> {
        match self.tree.entry(attr.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                self.next_index += 1;
                let attr_set = Arc::new(AttrSet {
                    index: self.next_index,
                    value: attr.clone(),
                });
                entry.insert(attr_set.clone());
                attr_set
            }
        }
    }
}

impl<T> Default for AttrSets<T> {
    fn default() -> AttrSets<T> {
        AttrSets {
            tree: Default::default(),
            next_index: 0,
        }
    }
}
