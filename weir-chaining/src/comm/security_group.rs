//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use weir_utils::bgp::{AS2_MAX, ExtComm};

use crate::comm::{
    CommParseError, SUBTYPE_SECURITY_GROUP, TYPE_EXPERIMENTAL,
    TYPE_EXPERIMENTAL_AS4,
};

/// Security Group extended community.
///
/// Tags a route with the security group of its originator so that policy
/// can be enforced at the consuming end.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct SecurityGroup(ExtComm);

// ===== impl SecurityGroup =====

impl SecurityGroup {
    pub fn from_as2(asn: u16, sgid: u32) -> SecurityGroup {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_EXPERIMENTAL;
        bytes[1] = SUBTYPE_SECURITY_GROUP;
        bytes[2..4].copy_from_slice(&asn.to_be_bytes());
        bytes[4..8].copy_from_slice(&sgid.to_be_bytes());
        SecurityGroup(ExtComm(bytes))
    }

    pub fn from_as4(asn: u32, sgid: u16) -> SecurityGroup {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_EXPERIMENTAL_AS4;
        bytes[1] = SUBTYPE_SECURITY_GROUP;
        bytes[2..6].copy_from_slice(&asn.to_be_bytes());
        bytes[6..8].copy_from_slice(&sgid.to_be_bytes());
        SecurityGroup(ExtComm(bytes))
    }

    pub fn new(asn: u32, sgid: u32) -> SecurityGroup {
        if asn > AS2_MAX {
            SecurityGroup::from_as4(asn, sgid as u16)
        } else {
            SecurityGroup::from_as2(asn as u16, sgid)
        }
    }

    pub fn get(comm: &ExtComm) -> Option<SecurityGroup> {
        match (comm.typ(), comm.subtype()) {
            (
                TYPE_EXPERIMENTAL | TYPE_EXPERIMENTAL_AS4,
                SUBTYPE_SECURITY_GROUP,
            ) => Some(SecurityGroup(*comm)),
            _ => None,
        }
    }

    pub fn as_extcomm(&self) -> ExtComm {
        self.0
    }

    pub fn security_group_id(&self) -> u32 {
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

    fn as_number(&self) -> u32 {
        let bytes = &self.0.0;
        match bytes[0] {
            TYPE_EXPERIMENTAL_AS4 => u32::from_be_bytes([
                bytes[2], bytes[3], bytes[4], bytes[5],
            ]),
            _ => u16::from_be_bytes([bytes[2], bytes[3]]) as u32,
        }
    }
}

impl std::fmt::Display for SecurityGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "secgroup:{}:{}",
            self.as_number(),
            self.security_group_id()
        )
    }
}

impl FromStr for SecurityGroup {
    type Err = CommParseError;

    fn from_str(s: &str) -> Result<SecurityGroup, CommParseError> {
        let rem = s
            .strip_prefix("secgroup:")
            .ok_or(CommParseError::InvalidKeyword)?;
        let (asn, sgid) =
            rem.split_once(':').ok_or(CommParseError::MissingSeparator)?;
        if asn.is_empty() || sgid.is_empty() {
            return Err(CommParseError::MissingSeparator);
        }
        let asn = asn
            .parse::<u32>()
            .map_err(|_| CommParseError::InvalidAdministrator)?;
        let sgid = sgid
            .parse::<u32>()
            .map_err(|_| CommParseError::InvalidNumber)?;
        if asn > AS2_MAX && sgid > 0xFFFF {
            return Err(CommParseError::ValueOutOfRange);
        }
        Ok(SecurityGroup::new(asn, sgid))
    }
}
