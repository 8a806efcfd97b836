//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use weir_utils::bgp::ExtComm;

use crate::comm::{CommParseError, SUBTYPE_LOAD_BALANCE, TYPE_EXPERIMENTAL};

bitflags! {
    // ECMP hash-field selectors plus the source-bias flag, packed into the
    // first payload byte.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    pub struct LoadBalanceFields: u8 {
        const L3_SOURCE_ADDRESS = 0x80;
        const L3_DESTINATION_ADDRESS = 0x40;
        const L4_PROTOCOL = 0x20;
        const L4_SOURCE_PORT = 0x10;
        const L4_DESTINATION_PORT = 0x08;
        const SOURCE_BIAS = 0x02;
    }
}

/// Load Balance extended community.
///
/// Carries the set of packet fields feeding the ECMP hash for routes
/// pointing at multiple next hops, plus a source-bias flag that disables
/// field hashing in favor of source-anchored stickiness.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct LoadBalance(ExtComm);

// ===== impl LoadBalanceFields =====

impl LoadBalanceFields {
    /// Canonical default: all five hash fields set, source bias clear.
    pub fn standard() -> LoadBalanceFields {
        LoadBalanceFields::L3_SOURCE_ADDRESS
            | LoadBalanceFields::L3_DESTINATION_ADDRESS
            | LoadBalanceFields::L4_PROTOCOL
            | LoadBalanceFields::L4_SOURCE_PORT
            | LoadBalanceFields::L4_DESTINATION_PORT
    }

    fn as_str_list(&self) -> Vec<&'static str> {
        let mut names = vec![];
        if self.contains(LoadBalanceFields::L3_SOURCE_ADDRESS) {
            names.push("l3-source-address");
        }
        if self.contains(LoadBalanceFields::L3_DESTINATION_ADDRESS) {
            names.push("l3-destination-address");
        }
        if self.contains(LoadBalanceFields::L4_PROTOCOL) {
            names.push("l4-protocol");
        }
        if self.contains(LoadBalanceFields::L4_SOURCE_PORT) {
            names.push("l4-source-port");
        }
        if self.contains(LoadBalanceFields::L4_DESTINATION_PORT) {
            names.push("l4-destination-port");
        }
        if self.contains(LoadBalanceFields::SOURCE_BIAS) {
            names.push("source-bias");
        }
        names
    }
}

// ===== impl LoadBalance =====

impl LoadBalance {
    /// Canonical default value.
    pub fn new() -> LoadBalance {
        LoadBalance::encode(LoadBalanceFields::standard())
    }

    /// Builds a value from an explicit field set. An empty set encodes the
    /// canonical default, not an all-clear value.
    pub fn from_fields(fields: LoadBalanceFields) -> LoadBalance {
        if fields.is_empty() {
            LoadBalance::new()
        } else {
            LoadBalance::encode(fields)
        }
    }

    fn encode(fields: LoadBalanceFields) -> LoadBalance {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_EXPERIMENTAL;
        bytes[1] = SUBTYPE_LOAD_BALANCE;
        bytes[2] = fields.bits();
        LoadBalance(ExtComm(bytes))
    }

    pub fn get(comm: &ExtComm) -> Option<LoadBalance> {
        match (comm.typ(), comm.subtype()) {
            (TYPE_EXPERIMENTAL, SUBTYPE_LOAD_BALANCE) => {
                Some(LoadBalance(*comm))
            }
            _ => None,
        }
    }

    pub fn as_extcomm(&self) -> ExtComm {
        self.0
    }

    /// Decodes the field set as carried. An all-zero payload decodes as
    /// "all fields clear", which is distinct from the default.
    pub fn fields(&self) -> LoadBalanceFields {
        LoadBalanceFields::from_bits_truncate(self.0.0[2])
    }

    pub fn is_default(&self) -> bool {
        self.fields() == LoadBalanceFields::standard()
    }

    pub fn set_field(&mut self, field: LoadBalanceFields, on: bool) {
        let mut fields = self.fields();
        fields.set(field, on);
        self.0.0[2] = fields.bits();
    }
}

impl Default for LoadBalance {
    fn default() -> LoadBalance {
        LoadBalance::new()
    }
}

impl std::fmt::Display for LoadBalance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.fields().as_str_list();
        if names.is_empty() {
            write!(f, "loadbalance:none")
        } else {
            write!(f, "loadbalance:{}", names.join(","))
        }
    }
}

impl FromStr for LoadBalance {
    type Err = CommParseError;

    fn from_str(s: &str) -> Result<LoadBalance, CommParseError> {
        let rem = s
            .strip_prefix("loadbalance:")
            .ok_or(CommParseError::InvalidKeyword)?;
        if rem == "none" {
            return Ok(LoadBalance::encode(LoadBalanceFields::empty()));
        }
        let mut fields = LoadBalanceFields::empty();
        for name in rem.split(',') {
            let field = match name {
                "l3-source-address" => LoadBalanceFields::L3_SOURCE_ADDRESS,
                "l3-destination-address" => {
                    LoadBalanceFields::L3_DESTINATION_ADDRESS
                }
                "l4-protocol" => LoadBalanceFields::L4_PROTOCOL,
                "l4-source-port" => LoadBalanceFields::L4_SOURCE_PORT,
                "l4-destination-port" => {
                    LoadBalanceFields::L4_DESTINATION_PORT
                }
                "source-bias" => LoadBalanceFields::SOURCE_BIAS,
                _ => return Err(CommParseError::InvalidKeyword),
            };
            fields |= field;
        }
        Ok(LoadBalance::encode(fields))
    }
}
