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
    AdminValue, CommParseError, SUBTYPE_SITE_OF_ORIGIN, TYPE_AS2, TYPE_AS4,
    TYPE_IPV4, parse_admin_value,
};

/// Site of Origin extended community (RFC 4360).
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct SiteOfOrigin(ExtComm);

// ===== impl SiteOfOrigin =====

impl SiteOfOrigin {
    pub fn from_as2(asn: u16, number: u32) -> SiteOfOrigin {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_AS2;
        bytes[1] = SUBTYPE_SITE_OF_ORIGIN;
        bytes[2..4].copy_from_slice(&asn.to_be_bytes());
        bytes[4..8].copy_from_slice(&number.to_be_bytes());
        SiteOfOrigin(ExtComm(bytes))
    }

    pub fn from_as4(asn: u32, number: u16) -> SiteOfOrigin {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_AS4;
        bytes[1] = SUBTYPE_SITE_OF_ORIGIN;
        bytes[2..6].copy_from_slice(&asn.to_be_bytes());
        bytes[6..8].copy_from_slice(&number.to_be_bytes());
        SiteOfOrigin(ExtComm(bytes))
    }

    pub fn from_ip(addr: Ipv4Addr, number: u16) -> SiteOfOrigin {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_IPV4;
        bytes[1] = SUBTYPE_SITE_OF_ORIGIN;
        bytes[2..6].copy_from_slice(&addr.octets());
        bytes[6..8].copy_from_slice(&number.to_be_bytes());
        SiteOfOrigin(ExtComm(bytes))
    }

    pub fn get(comm: &ExtComm) -> Option<SiteOfOrigin> {
        match (comm.typ(), comm.subtype()) {
            (TYPE_AS2 | TYPE_IPV4 | TYPE_AS4, SUBTYPE_SITE_OF_ORIGIN) => {
                Some(SiteOfOrigin(*comm))
            }
            _ => None,
        }
    }

    pub fn as_extcomm(&self) -> ExtComm {
        self.0
    }
}

impl std::fmt::Display for SiteOfOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = &self.0.0;
        match bytes[0] {
            TYPE_IPV4 => {
                let addr =
                    Ipv4Addr::new(bytes[2], bytes[3], bytes[4], bytes[5]);
                let number = u16::from_be_bytes([bytes[6], bytes[7]]);
                write!(f, "soo:{}:{}", addr, number)
            }
            TYPE_AS4 => {
                let asn = u32::from_be_bytes([
                    bytes[2], bytes[3], bytes[4], bytes[5],
                ]);
                let number = u16::from_be_bytes([bytes[6], bytes[7]]);
                write!(f, "soo:{}:{}", asn, number)
            }
            _ => {
                let asn = u16::from_be_bytes([bytes[2], bytes[3]]);
                let number = u32::from_be_bytes([
                    bytes[4], bytes[5], bytes[6], bytes[7],
                ]);
                write!(f, "soo:{}:{}", asn, number)
            }
        }
    }
}

impl FromStr for SiteOfOrigin {
    type Err = CommParseError;

    fn from_str(s: &str) -> Result<SiteOfOrigin, CommParseError> {
        let rem = s
            .strip_prefix("soo:")
            .ok_or(CommParseError::InvalidKeyword)?;
        let (admin, value) =
            rem.split_once(':').ok_or(CommParseError::MissingSeparator)?;
        match parse_admin_value(admin, value)? {
            AdminValue::As2(asn, number) => {
                Ok(SiteOfOrigin::from_as2(asn, number))
            }
            AdminValue::As4(asn, number) => {
                Ok(SiteOfOrigin::from_as4(asn, number))
            }
            AdminValue::Ip(addr, number) => {
                Ok(SiteOfOrigin::from_ip(addr, number))
            }
        }
    }
}
