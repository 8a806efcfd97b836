//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use weir_utils::bgp::{AS2_MAX, ExtComm};

use crate::comm::{
    CommParseError, SUBTYPE_ORIGIN_VN, TYPE_EXPERIMENTAL,
    TYPE_EXPERIMENTAL_AS4,
};

/// Origin Virtual Network extended community.
///
/// Records the virtual network a route was originated from, for policy
/// scoping and loop prevention. Two encodings share the subtype: the
/// 2-octet-AS form carries a 4-octet VN index, the 4-octet-AS form a
/// 2-octet VN index.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct OriginVn(ExtComm);

// ===== impl OriginVn =====

impl OriginVn {
    pub fn from_as2(asn: u16, vn_index: u32) -> OriginVn {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_EXPERIMENTAL;
        bytes[1] = SUBTYPE_ORIGIN_VN;
        bytes[2..4].copy_from_slice(&asn.to_be_bytes());
        bytes[4..8].copy_from_slice(&vn_index.to_be_bytes());
        OriginVn(ExtComm(bytes))
    }

    pub fn from_as4(asn: u32, vn_index: u16) -> OriginVn {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_EXPERIMENTAL_AS4;
        bytes[1] = SUBTYPE_ORIGIN_VN;
        bytes[2..6].copy_from_slice(&asn.to_be_bytes());
        bytes[6..8].copy_from_slice(&vn_index.to_be_bytes());
        OriginVn(ExtComm(bytes))
    }

    /// Builds the encoding appropriate for the given AS number.
    pub fn new(asn: u32, vn_index: u32) -> OriginVn {
        if asn > AS2_MAX {
            OriginVn::from_as4(asn, vn_index as u16)
        } else {
            OriginVn::from_as2(asn as u16, vn_index)
        }
    }

    pub fn get(comm: &ExtComm) -> Option<OriginVn> {
        match (comm.typ(), comm.subtype()) {
            (
                TYPE_EXPERIMENTAL | TYPE_EXPERIMENTAL_AS4,
                SUBTYPE_ORIGIN_VN,
            ) => Some(OriginVn(*comm)),
            _ => None,
        }
    }

    pub fn as_extcomm(&self) -> ExtComm {
        self.0
    }

    pub fn as_number(&self) -> u32 {
        let bytes = &self.0.0;
        match bytes[0] {
            TYPE_EXPERIMENTAL_AS4 => u32::from_be_bytes([
                bytes[2], bytes[3], bytes[4], bytes[5],
            ]),
            _ => u16::from_be_bytes([bytes[2], bytes[3]]) as u32,
        }
    }

    pub fn vn_index(&self) -> u32 {
        let bytes = &self.0.0;
        match bytes[0] {
            TYPE_EXPERIMENTAL_AS4 => {
                u16::from_be_bytes([bytes[6], bytes[7]]) as u32
            }
            _ => u32::from_be_bytes([
                bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
        }
    }
}

impl std::fmt::Display for OriginVn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "originvn:{}:{}", self.as_number(), self.vn_index())
    }
}

impl FromStr for OriginVn {
    type Err = CommParseError;

    fn from_str(s: &str) -> Result<OriginVn, CommParseError> {
        let rem = s
            .strip_prefix("originvn:")
            .ok_or(CommParseError::InvalidKeyword)?;
        let (asn, vn_index) =
            rem.split_once(':').ok_or(CommParseError::MissingSeparator)?;
        if asn.is_empty() || vn_index.is_empty() {
            return Err(CommParseError::MissingSeparator);
        }
        let asn = asn
            .parse::<u32>()
            .map_err(|_| CommParseError::InvalidAdministrator)?;
        let vn_index = vn_index
            .parse::<u32>()
            .map_err(|_| CommParseError::InvalidNumber)?;
        if asn > AS2_MAX && vn_index > 0xFFFF {
            return Err(CommParseError::ValueOutOfRange);
        }
        Ok(OriginVn::new(asn, vn_index))
    }
}
