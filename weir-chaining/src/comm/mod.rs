//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Typed views over 8-byte BGP extended-community values.
//!
//! Every view wraps the same raw [`ExtComm`] shape and is distinguished by
//! the leading type/subtype byte pair. Ordering is byte-lexicographic over
//! the raw value, shared by all views.

use serde::{Deserialize, Serialize};
use weir_utils::bgp::ExtComm;

pub mod load_balance;
pub mod mac_mobility;
pub mod origin_vn;
pub mod route_target;
pub mod security_group;
pub mod site_of_origin;
pub mod tag;
pub mod tunnel_encap;

pub use load_balance::{LoadBalance, LoadBalanceFields};
pub use mac_mobility::MacMobility;
pub use origin_vn::OriginVn;
pub use route_target::RouteTarget;
pub use security_group::SecurityGroup;
pub use site_of_origin::SiteOfOrigin;
pub use tag::Tag;
pub use tunnel_encap::{TunnelEncap, TunnelEncapType};

// Extended-community type bytes.
pub const TYPE_AS2: u8 = 0x00;
pub const TYPE_IPV4: u8 = 0x01;
pub const TYPE_AS4: u8 = 0x02;
pub const TYPE_OPAQUE: u8 = 0x03;
pub const TYPE_EVPN: u8 = 0x06;
pub const TYPE_EXPERIMENTAL: u8 = 0x80;
pub const TYPE_EXPERIMENTAL_AS4: u8 = 0x82;

// Extended-community subtype bytes.
pub const SUBTYPE_ROUTE_TARGET: u8 = 0x02;
pub const SUBTYPE_SITE_OF_ORIGIN: u8 = 0x03;
pub const SUBTYPE_SECURITY_GROUP: u8 = 0x04;
pub const SUBTYPE_TUNNEL_ENCAP: u8 = 0x0C;
pub const SUBTYPE_ORIGIN_VN: u8 = 0x71;
pub const SUBTYPE_TAG: u8 = 0x84;
pub const SUBTYPE_MAC_MOBILITY: u8 = 0x00;
pub const SUBTYPE_LOAD_BALANCE: u8 = 0xAA;

/// Recognized extended-community categories, keyed by type/subtype tag.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ExtCommKind {
    RouteTarget,
    SiteOfOrigin,
    OriginVn,
    TunnelEncap,
    SecurityGroup,
    MacMobility,
    LoadBalance,
    Tag,
}

/// Errors raised while parsing the canonical string form of an
/// extended-community value.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum CommParseError {
    MissingSeparator,
    InvalidKeyword,
    InvalidAdministrator,
    InvalidNumber,
    ValueOutOfRange,
}

// ===== impl ExtCommKind =====

impl ExtCommKind {
    /// Classifies a raw extended community by its type/subtype tag.
    pub fn of(comm: &ExtComm) -> Option<ExtCommKind> {
        match (comm.typ(), comm.subtype()) {
            (TYPE_AS2 | TYPE_IPV4 | TYPE_AS4, SUBTYPE_ROUTE_TARGET) => {
                Some(ExtCommKind::RouteTarget)
            }
            (TYPE_AS2 | TYPE_IPV4 | TYPE_AS4, SUBTYPE_SITE_OF_ORIGIN) => {
                Some(ExtCommKind::SiteOfOrigin)
            }
            (
                TYPE_EXPERIMENTAL | TYPE_EXPERIMENTAL_AS4,
                SUBTYPE_ORIGIN_VN,
            ) => Some(ExtCommKind::OriginVn),
            (TYPE_OPAQUE, SUBTYPE_TUNNEL_ENCAP) => {
                Some(ExtCommKind::TunnelEncap)
            }
            (
                TYPE_EXPERIMENTAL | TYPE_EXPERIMENTAL_AS4,
                SUBTYPE_SECURITY_GROUP,
            ) => Some(ExtCommKind::SecurityGroup),
            (TYPE_EVPN, SUBTYPE_MAC_MOBILITY) => {
                Some(ExtCommKind::MacMobility)
            }
            (TYPE_EXPERIMENTAL, SUBTYPE_LOAD_BALANCE) => {
                Some(ExtCommKind::LoadBalance)
            }
            (TYPE_EXPERIMENTAL | TYPE_EXPERIMENTAL_AS4, SUBTYPE_TAG) => {
                Some(ExtCommKind::Tag)
            }
            _ => None,
        }
    }
}

// ===== impl CommParseError =====

impl std::fmt::Display for CommParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommParseError::MissingSeparator => {
                write!(f, "missing ':' separator")
            }
            CommParseError::InvalidKeyword => {
                write!(f, "unrecognized keyword prefix")
            }
            CommParseError::InvalidAdministrator => {
                write!(f, "invalid administrator field")
            }
            CommParseError::InvalidNumber => {
                write!(f, "invalid numeric field")
            }
            CommParseError::ValueOutOfRange => {
                write!(f, "numeric field out of range")
            }
        }
    }
}

impl std::error::Error for CommParseError {}

// ===== helper functions =====

// Parses the "<as|ip>:<number>" administrator pair shared by several
// canonical string forms. IPv4 parse is attempted first, then integer AS.
pub(crate) fn parse_admin_value(
    admin: &str,
    value: &str,
) -> Result<AdminValue, CommParseError> {
    if admin.is_empty() || value.is_empty() {
        return Err(CommParseError::MissingSeparator);
    }
    if let Ok(addr) = admin.parse::<std::net::Ipv4Addr>() {
        let number = value
            .parse::<u16>()
            .map_err(|_| CommParseError::InvalidNumber)?;
        return Ok(AdminValue::Ip(addr, number));
    }
    let asn = admin
        .parse::<u32>()
        .map_err(|_| CommParseError::InvalidAdministrator)?;
    if asn > weir_utils::bgp::AS2_MAX {
        let number = value
            .parse::<u16>()
            .map_err(|_| CommParseError::InvalidNumber)?;
        Ok(AdminValue::As4(asn, number))
    } else {
        let number = value
            .parse::<u32>()
            .map_err(|_| CommParseError::InvalidNumber)?;
        Ok(AdminValue::As2(asn as u16, number))
    }
}

pub(crate) enum AdminValue {
    As2(u16, u32),
    As4(u32, u16),
    Ip(std::net::Ipv4Addr, u16),
}
