//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use weir_utils::bgp::ExtComm;

use crate::comm::{
    AdminValue, CommParseError, SUBTYPE_ROUTE_TARGET, TYPE_AS2, TYPE_AS4,
    TYPE_IPV4, parse_admin_value,
};

// Route-target assigned numbers at or above this value are reserved for
// automatically generated targets.
pub const AUTO_ASSIGNED_MIN: u32 = 8_000_000;

/// Route Target extended community (RFC 4360).
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct RouteTarget(ExtComm);

// ===== impl RouteTarget =====

impl RouteTarget {
    pub fn from_as2(asn: u16, number: u32) -> RouteTarget {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_AS2;
        bytes[1] = SUBTYPE_ROUTE_TARGET;
        bytes[2..4].copy_from_slice(&asn.to_be_bytes());
        bytes[4..8].copy_from_slice(&number.to_be_bytes());
        RouteTarget(ExtComm(bytes))
    }

    pub fn from_as4(asn: u32, number: u16) -> RouteTarget {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_AS4;
        bytes[1] = SUBTYPE_ROUTE_TARGET;
        bytes[2..6].copy_from_slice(&asn.to_be_bytes());
        bytes[6..8].copy_from_slice(&number.to_be_bytes());
        RouteTarget(ExtComm(bytes))
    }

    pub fn from_ip(addr: Ipv4Addr, number: u16) -> RouteTarget {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_IPV4;
        bytes[1] = SUBTYPE_ROUTE_TARGET;
        bytes[2..6].copy_from_slice(&addr.octets());
        bytes[6..8].copy_from_slice(&number.to_be_bytes());
        RouteTarget(ExtComm(bytes))
    }

    pub fn get(comm: &ExtComm) -> Option<RouteTarget> {
        match (comm.typ(), comm.subtype()) {
            (TYPE_AS2 | TYPE_IPV4 | TYPE_AS4, SUBTYPE_ROUTE_TARGET) => {
                Some(RouteTarget(*comm))
            }
            _ => None,
        }
    }

    pub fn as_extcomm(&self) -> ExtComm {
        self.0
    }

    /// Assigned number carried in the value field.
    pub fn number(&self) -> u32 {
        let bytes = &self.0.0;
        match bytes[0] {
            TYPE_AS2 => u32::from_be_bytes([
                bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
            _ => u16::from_be_bytes([bytes[6], bytes[7]]) as u32,
        }
    }

    /// Whether the assigned number falls in the automatically generated
    /// range.
    pub fn is_auto_assigned(&self) -> bool {
        self.number() >= AUTO_ASSIGNED_MIN
    }
}

impl std::fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = &self.0.0;
        match bytes[0] {
            TYPE_IPV4 => {
                let addr =
                    Ipv4Addr::new(bytes[2], bytes[3], bytes[4], bytes[5]);
                let number = u16::from_be_bytes([bytes[6], bytes[7]]);
                write!(f, "target:{}:{}", addr, number)
            }
            TYPE_AS4 => {
                let asn = u32::from_be_bytes([
                    bytes[2], bytes[3], bytes[4], bytes[5],
                ]);
                let number = u16::from_be_bytes([bytes[6], bytes[7]]);
                write!(f, "target:{}:{}", asn, number)
            }
            _ => {
                let asn = u16::from_be_bytes([bytes[2], bytes[3]]);
                let number = u32::from_be_bytes([
                    bytes[4], bytes[5], bytes[6], bytes[7],
                ]);
                write!(f, "target:{}:{}", asn, number)
            }
        }
    }
}

impl FromStr for RouteTarget {
    type Err = CommParseError;

    fn from_str(s: &str) -> Result<RouteTarget, CommParseError> {
        let rem = s
            .strip_prefix("target:")
            .ok_or(CommParseError::InvalidKeyword)?;
        let (admin, value) =
            rem.split_once(':').ok_or(CommParseError::MissingSeparator)?;
        match parse_admin_value(admin, value)? {
            AdminValue::As2(asn, number) => {
                Ok(RouteTarget::from_as2(asn, number))
            }
            AdminValue::As4(asn, number) => {
                Ok(RouteTarget::from_as4(asn, number))
            }
            AdminValue::Ip(addr, number) => {
                Ok(RouteTarget::from_ip(addr, number))
            }
        }
    }
}
