//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use weir_utils::bgp::ExtComm;

use crate::comm::{CommParseError, SUBTYPE_MAC_MOBILITY, TYPE_EVPN};

// Flags byte, bit 0: static (sticky) MAC.
const FLAG_STICKY: u8 = 0x01;

/// MAC Mobility extended community (RFC 7432).
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct MacMobility(ExtComm);

// ===== impl MacMobility =====

impl MacMobility {
    pub fn new(sticky: bool, sequence_number: u32) -> MacMobility {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_EVPN;
        bytes[1] = SUBTYPE_MAC_MOBILITY;
        if sticky {
            bytes[2] = FLAG_STICKY;
        }
        bytes[4..8].copy_from_slice(&sequence_number.to_be_bytes());
        MacMobility(ExtComm(bytes))
    }

    pub fn get(comm: &ExtComm) -> Option<MacMobility> {
        match (comm.typ(), comm.subtype()) {
            (TYPE_EVPN, SUBTYPE_MAC_MOBILITY) => Some(MacMobility(*comm)),
            _ => None,
        }
    }

    pub fn as_extcomm(&self) -> ExtComm {
        self.0
    }

    pub fn sticky(&self) -> bool {
        self.0.0[2] & FLAG_STICKY != 0
    }

    pub fn sequence_number(&self) -> u32 {
        let bytes = &self.0.0;
        u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]])
    }
}

impl std::fmt::Display for MacMobility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sticky = if self.sticky() { "sticky" } else { "non-sticky" };
        write!(f, "mobility:{}:{}", sticky, self.sequence_number())
    }
}

impl FromStr for MacMobility {
    type Err = CommParseError;

    fn from_str(s: &str) -> Result<MacMobility, CommParseError> {
        let rem = s
            .strip_prefix("mobility:")
            .ok_or(CommParseError::InvalidKeyword)?;
        let (sticky, seq) =
            rem.split_once(':').ok_or(CommParseError::MissingSeparator)?;
        let sticky = match sticky {
            "sticky" => true,
            "non-sticky" => false,
            _ => return Err(CommParseError::InvalidKeyword),
        };
        let seq = seq
            .parse::<u32>()
            .map_err(|_| CommParseError::InvalidNumber)?;
        Ok(MacMobility::new(sticky, seq))
    }
}
