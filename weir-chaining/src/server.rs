//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Top-level server state tying instances, tables, the attribute
//! context and the per-family chain managers together.

use crate::af::{ScFamilies, ScFamily, TableFamily};
use crate::attr::AttrSetsCxt;
use crate::chain::ServiceChain;
use crate::config::{InstanceCfg, ServiceChainCfg};
use crate::error::Error;
use crate::instance::{InstanceId, Instances};
use crate::listener::ConditionListener;
use crate::manager::ServiceChainMgr;
use crate::table::{
    BgpPath, PathSource, RouteEvent, RouteKey, TableRef,
};

#[derive(Debug)]
pub struct BgpServer {
    pub local_as: u32,
    pub instances: Instances,
    pub attr_sets: AttrSetsCxt,
    pub listener: ConditionListener,
    mgrs: ScFamilies<ServiceChainMgr>,
    events: Vec<RouteEvent>,
}

/// Split borrow of everything below the managers, so a manager can
/// mutate server state while it is itself mutably borrowed.
#[derive(Debug)]
pub(crate) struct ServerView<'a> {
    pub local_as: u32,
    pub instances: &'a mut Instances,
    pub attr_sets: &'a mut AttrSetsCxt,
    pub listener: &'a mut ConditionListener,
    pub events: &'a mut Vec<RouteEvent>,
}

// ===== impl BgpServer =====

impl BgpServer {
    pub fn new(local_as: u32) -> BgpServer {
        BgpServer {
            local_as,
            instances: Default::default(),
            attr_sets: Default::default(),
            listener: Default::default(),
            mgrs: ScFamilies {
                inet: ServiceChainMgr::new(ScFamily::Inet),
                inet6: ServiceChainMgr::new(ScFamily::Inet6),
                evpn: ServiceChainMgr::new(ScFamily::Evpn),
                evpn6: ServiceChainMgr::new(ScFamily::Evpn6),
            },
            events: Vec::new(),
        }
    }

    fn split(
        &mut self,
    ) -> (ServerView<'_>, &mut ScFamilies<ServiceChainMgr>) {
        (
            ServerView {
                local_as: self.local_as,
                instances: &mut self.instances,
                attr_sets: &mut self.attr_sets,
                listener: &mut self.listener,
                events: &mut self.events,
            },
            &mut self.mgrs,
        )
    }

    // ===== routing instances =====

    pub fn create_instance(
        &mut self,
        name: &str,
        cfg: InstanceCfg,
    ) -> Result<InstanceId, Error> {
        let id = self.instances.create(name, cfg).inspect_err(Error::log)?;
        // A new instance may satisfy pending chain prerequisites.
        for (_, mgr) in self.mgrs.iter_mut() {
            mgr.resolve_trigger.activate();
        }
        Ok(id)
    }

    pub fn delete_instance(&mut self, name: &str) -> Result<(), Error> {
        self.instances.mark_deleted(name).inspect_err(Error::log)?;
        for (_, mgr) in self.mgrs.iter_mut() {
            mgr.resolve_trigger.activate();
        }
        Ok(())
    }

    // ===== table updates =====

    /// Adds or replaces a path and notifies every chain registered on
    /// the table. Matching runs synchronously; the resulting requests
    /// drain on the next `process_queues` call.
    pub fn add_path(
        &mut self,
        instance: &str,
        family: TableFamily,
        key: RouteKey,
        path: BgpPath,
    ) -> Result<(), Error> {
        let id = self.instances.id_by_name(instance).inspect_err(Error::log)?;
        let table_ref = TableRef { instance: id, family };
        let Some(table) = self.instances.table_mut(table_ref) else {
            return Err(Error::InstanceIdNotFound);
        };
        table.get_or_insert(key.clone()).insert_path(path);
        self.notify(RouteEvent::new(table_ref, key, false));
        Ok(())
    }

    pub fn delete_path(
        &mut self,
        instance: &str,
        family: TableFamily,
        key: &RouteKey,
        source: PathSource,
        peer: Option<std::net::IpAddr>,
        path_id: u32,
    ) -> Result<(), Error> {
        let id = self.instances.id_by_name(instance).inspect_err(Error::log)?;
        let table_ref = TableRef { instance: id, family };
        let listener = &self.listener;
        let Some(table) = self.instances.table_mut(table_ref) else {
            return Err(Error::InstanceIdNotFound);
        };
        let Some(route) = table.get_mut(key) else {
            return Ok(());
        };
        if !route.remove_path(source, peer, path_id) {
            return Ok(());
        }
        let deleted = route.is_empty();
        if deleted && !listener.route_in_use(table_ref, key) {
            table.remove(key);
        }
        self.notify(RouteEvent::new(table_ref, key.clone(), deleted));
        Ok(())
    }

    fn notify(&mut self, event: RouteEvent) {
        let (mut view, mgrs) = self.split();
        for (_, mgr) in mgrs.iter_mut() {
            mgr.route_notify(&mut view, &event);
        }
    }

    // ===== service chain configuration =====

    pub fn locate_service_chain(
        &mut self,
        family: ScFamily,
        instance: &str,
        cfg: ServiceChainCfg,
    ) -> Result<bool, Error> {
        let id = self.instances.id_by_name(instance).inspect_err(Error::log)?;
        let (mut view, mgrs) = self.split();
        mgrs.get_mut(family)
            .locate_service_chain(&mut view, id, cfg)
            .inspect_err(Error::log)
    }

    pub fn stop_service_chain(
        &mut self,
        family: ScFamily,
        instance: &str,
    ) -> Result<(), Error> {
        let id = self.instances.id_by_name(instance).inspect_err(Error::log)?;
        let (mut view, mgrs) = self.split();
        mgrs.get_mut(family).stop_service_chain(&mut view, id);
        Ok(())
    }

    pub fn set_aggregate_host_route(
        &mut self,
        family: ScFamily,
        enable: bool,
    ) {
        self.mgrs.get_mut(family).set_aggregate_host_route(enable);
    }

    // ===== request processing =====

    /// Drains every manager's queue and triggers, redelivering table
    /// changes produced along the way, until the system is quiescent.
    pub fn process_queues(&mut self) {
        loop {
            let mut work = 0;
            {
                let (mut view, mgrs) = self.split();
                for (_, mgr) in mgrs.iter_mut() {
                    work += mgr.process_queue(&mut view);
                    mgr.process_triggers(&mut view);
                    work += mgr.process_queue(&mut view);
                }
            }
            let events = std::mem::take(&mut self.events);
            work += events.len();
            for event in events {
                self.notify(event);
            }
            if work == 0 {
                break;
            }
        }
        self.sweep_tables();
    }

    /// Reclaims route entries that have no paths and no match state
    /// referencing them.
    fn sweep_tables(&mut self) {
        let ids: Vec<InstanceId> =
            self.instances.iter().map(|(id, _)| id).collect();
        let listener = &self.listener;
        for id in ids {
            for family in
                [TableFamily::Inet, TableFamily::Inet6, TableFamily::Evpn]
            {
                let table_ref = TableRef { instance: id, family };
                if let Some(table) = self.instances.table_mut(table_ref) {
                    table.sweep(|key| listener.route_in_use(table_ref, key));
                }
            }
        }
    }

    // ===== introspection =====

    pub fn mgr(&self, family: ScFamily) -> &ServiceChainMgr {
        self.mgrs.get(family)
    }

    pub fn mgr_mut(&mut self, family: ScFamily) -> &mut ServiceChainMgr {
        self.mgrs.get_mut(family)
    }

    pub fn find_service_chain(
        &self,
        family: ScFamily,
        instance: &str,
    ) -> Option<&ServiceChain> {
        let id = self.instances.id_by_name(instance).ok()?;
        self.mgrs.get(family).find_chain(id)
    }

    pub fn get_down_service_chain_count(&self, family: ScFamily) -> usize {
        self.mgrs
            .get(family)
            .get_down_service_chain_count(&self.instances)
    }
}
