//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Operator-facing snapshots of service chain state, assembled on
//! demand from the live structures.

use itertools::Itertools;
use serde::Serialize;

use crate::af::ScFamily;
use crate::chain::{DeleteState, ServiceChain};
use crate::instance::InstanceId;
use crate::manager::{PendingChainInfo, ServiceChainMgr};
use crate::server::BgpServer;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum ChainState {
    Active,
    Down,
    GroupDown,
    Deleted,
    Pending,
}

/// Connected route as the chain currently sees it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ConnectedInfo {
    pub route: String,
    pub valid: bool,
    pub path_ids: Vec<u32>,
}

/// One configured subnet and the more-specific routes folded into it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AggregateInfo {
    pub prefix: String,
    pub more_specific: Vec<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ServiceChainInfo {
    pub src_instance: String,
    pub dest_instance: String,
    pub connected_instance: String,
    pub family: String,
    pub state: ChainState,
    pub pending_reason: Option<String>,
    pub chain_address: String,
    pub group: Option<String>,
    pub aggregate_enable: bool,
    pub connected: Option<ConnectedInfo>,
    pub aggregates: Vec<AggregateInfo>,
    pub ext_connecting: Vec<String>,
}

// ===== global functions =====

/// Snapshots every chain of the family, instantiated and pending alike,
/// ordered by source instance name.
pub fn show_service_chains(
    server: &BgpServer,
    family: ScFamily,
) -> Vec<ServiceChainInfo> {
    let mgr = server.mgr(family);
    mgr.chains()
        .map(|(_, chain)| chain_info(server, mgr, chain))
        .chain(mgr.pending().map(|(src, info)| {
            pending_info(server, family, src, info)
        }))
        .sorted_by(|a, b| a.src_instance.cmp(&b.src_instance))
        .collect()
}

pub fn to_json(
    chains: &[ServiceChainInfo],
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(chains)
}

fn chain_info(
    server: &BgpServer,
    mgr: &ServiceChainMgr,
    chain: &ServiceChain,
) -> ServiceChainInfo {
    let group_up = match &chain.group {
        Some(name) => {
            mgr.group(name).is_some_and(|group| group.oper_state_up)
        }
        None => true,
    };
    let connected_valid = chain.is_connected_route_valid(&server.instances);
    let state = if chain.delete_state != DeleteState::Active {
        ChainState::Deleted
    } else if !group_up {
        ChainState::GroupDown
    } else if !connected_valid {
        ChainState::Down
    } else {
        ChainState::Active
    };
    let connected =
        chain.connected_route.as_ref().map(|key| ConnectedInfo {
            route: key.to_string(),
            valid: connected_valid,
            path_ids: chain.connected_path_ids.iter().copied().collect(),
        });
    let aggregates = chain
        .prefix_to_routes
        .iter()
        .map(|(prefix, routes)| AggregateInfo {
            prefix: prefix.to_string(),
            more_specific: routes.iter().map(|key| key.to_string()).collect(),
        })
        .collect();
    let ext_connecting = chain
        .ext_connecting_routes
        .iter()
        .map(|key| key.to_string())
        .collect();
    ServiceChainInfo {
        src_instance: instance_name(server, chain.src),
        dest_instance: instance_name(server, chain.dest),
        connected_instance: instance_name(server, chain.connected),
        family: chain.family.to_string(),
        state,
        pending_reason: None,
        chain_address: chain.chain_addr.to_string(),
        group: chain.group.clone(),
        aggregate_enable: chain.aggregate_enable,
        connected,
        aggregates,
        ext_connecting,
    }
}

fn pending_info(
    server: &BgpServer,
    family: ScFamily,
    src: InstanceId,
    info: &PendingChainInfo,
) -> ServiceChainInfo {
    let src_name = instance_name(server, src);
    let connected_instance = info
        .cfg
        .connected_instance
        .clone()
        .unwrap_or_else(|| src_name.clone());
    ServiceChainInfo {
        src_instance: src_name,
        dest_instance: info.cfg.dest_instance.clone(),
        connected_instance,
        family: family.to_string(),
        state: ChainState::Pending,
        pending_reason: Some(info.reason.to_string()),
        chain_address: info.cfg.chain_address.clone(),
        group: info.group.clone(),
        aggregate_enable: false,
        connected: None,
        aggregates: info
            .cfg
            .prefixes
            .iter()
            .map(|prefix| AggregateInfo {
                prefix: prefix.to_string(),
                more_specific: Vec::new(),
            })
            .collect(),
        ext_connecting: Vec::new(),
    }
}

fn instance_name(server: &BgpServer, id: InstanceId) -> String {
    server
        .instances
        .get(id)
        .map(|instance| instance.name.clone())
        .unwrap_or_default()
}
