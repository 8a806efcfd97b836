//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Routing instances and their tables.

use std::collections::BTreeMap;

use generational_arena::{Arena, Index};

use crate::af::TableFamily;
use crate::comm::RouteTarget;
use crate::config::InstanceCfg;
use crate::error::Error;
use crate::table::{BgpTable, TableRef};

pub type InstanceId = Index;

/// A routing instance: one virtual network's set of tables plus the
/// parameters chaining needs from it.
#[derive(Debug)]
pub struct RoutingInstance {
    pub name: String,
    pub vn_index: u32,
    pub virtual_network: String,
    pub allow_transit: bool,
    pub vxlan_id: Option<u32>,
    pub export_targets: Vec<RouteTarget>,
    pub deleted: bool,
    pub tables: InstanceTables,
}

#[derive(Debug)]
pub struct InstanceTables {
    pub inet: BgpTable,
    pub inet6: BgpTable,
    pub evpn: BgpTable,
}

/// All routing instances, addressable by id or name.
#[derive(Debug, Default)]
pub struct Instances {
    arena: Arena<RoutingInstance>,
    by_name: BTreeMap<String, InstanceId>,
}

// ===== impl RoutingInstance =====

impl RoutingInstance {
    pub fn table(&self, family: TableFamily) -> &BgpTable {
        match family {
            TableFamily::Inet => &self.tables.inet,
            TableFamily::Inet6 => &self.tables.inet6,
            TableFamily::Evpn => &self.tables.evpn,
        }
    }

    pub fn table_mut(&mut self, family: TableFamily) -> &mut BgpTable {
        match family {
            TableFamily::Inet => &mut self.tables.inet,
            TableFamily::Inet6 => &mut self.tables.inet6,
            TableFamily::Evpn => &mut self.tables.evpn,
        }
    }
}

// ===== impl InstanceTables =====

impl Default for InstanceTables {
    fn default() -> InstanceTables {
        InstanceTables {
            inet: BgpTable::new(TableFamily::Inet),
            inet6: BgpTable::new(TableFamily::Inet6),
            evpn: BgpTable::new(TableFamily::Evpn),
        }
    }
}

// ===== impl Instances =====

impl Instances {
    /// Creates an instance or reconfigures an existing one, clearing a
    /// pending deletion mark.
    pub fn create(
        &mut self,
        name: &str,
        cfg: InstanceCfg,
    ) -> Result<InstanceId, Error> {
        let export_targets = cfg
            .export_targets
            .iter()
            .map(|rt| {
                rt.parse::<RouteTarget>().map_err(|error| {
                    Error::InvalidRouteTarget(rt.clone(), error)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(id) = self.by_name.get(name).copied() {
            let instance = &mut self.arena[id];
            instance.vn_index = cfg.vn_index;
            instance.virtual_network = cfg.virtual_network;
            instance.allow_transit = cfg.allow_transit;
            instance.vxlan_id = cfg.vxlan_id;
            instance.export_targets = export_targets;
            instance.deleted = false;
            return Ok(id);
        }

        let instance = RoutingInstance {
            name: name.to_owned(),
            vn_index: cfg.vn_index,
            virtual_network: cfg.virtual_network,
            allow_transit: cfg.allow_transit,
            vxlan_id: cfg.vxlan_id,
            export_targets,
            deleted: false,
            tables: Default::default(),
        };
        let id = self.arena.insert(instance);
        self.by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Marks an instance deleted. The entry stays resolvable until all
    /// chains referencing it are gone.
    pub fn mark_deleted(&mut self, name: &str) -> Result<InstanceId, Error> {
        let id = self.id_by_name(name)?;
        self.arena[id].deleted = true;
        Ok(id)
    }

    /// Removes a deleted instance outright once nothing references it.
    pub fn purge(&mut self, id: InstanceId) {
        if let Some(instance) = self.arena.remove(id) {
            self.by_name.remove(&instance.name);
        }
    }

    pub fn get(&self, id: InstanceId) -> Option<&RoutingInstance> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut RoutingInstance> {
        self.arena.get_mut(id)
    }

    pub fn id_by_name(&self, name: &str) -> Result<InstanceId, Error> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::InstanceNotFound(name.to_owned()))
    }

    pub fn get_by_name(&self, name: &str) -> Option<&RoutingInstance> {
        self.by_name.get(name).and_then(|id| self.arena.get(*id))
    }

    pub fn table(&self, table: TableRef) -> Option<&BgpTable> {
        self.get(table.instance)
            .map(|instance| instance.table(table.family))
    }

    pub fn table_mut(&mut self, table: TableRef) -> Option<&mut BgpTable> {
        self.get_mut(table.instance)
            .map(|instance| instance.table_mut(table.family))
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (InstanceId, &RoutingInstance)> + '_ {
        self.arena.iter()
    }
}
