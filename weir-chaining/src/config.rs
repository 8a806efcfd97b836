//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Configuration structures.

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

/// Service chain configuration for one destination instance.
///
/// The chain address is kept as received. It is parsed when the chain
/// is located, and a parse failure leaves the chain pending rather
/// than rejecting the configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ServiceChainCfg {
    pub chain_address: String,
    pub prefixes: Vec<IpNetwork>,
    pub dest_instance: String,
    pub connected_instance: Option<String>,
    pub service_chain_id: Option<String>,
    pub sc_head: bool,
    pub retain_as_path: bool,
}

/// Routing instance configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct InstanceCfg {
    pub vn_index: u32,
    pub virtual_network: String,
    pub allow_transit: bool,
    pub vxlan_id: Option<u32>,
    pub export_targets: Vec<String>,
}
