//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use weir_utils::bgp::ExtComm;

use crate::comm::{CommParseError, SUBTYPE_TUNNEL_ENCAP, TYPE_OPAQUE};

// Tunnel types from the IANA "BGP Tunnel Encapsulation Attribute Tunnel
// Types" registry.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
#[repr(u16)]
pub enum TunnelEncapType {
    Unspecified = 0,
    Gre = 2,
    Vxlan = 8,
    Nvgre = 9,
    Mpls = 10,
    MplsOverGre = 11,
    VxlanGpe = 12,
    MplsOverUdp = 13,
}

/// Tunnel Encapsulation extended community (RFC 9012).
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct TunnelEncap(ExtComm);

// ===== impl TunnelEncapType =====

impl TunnelEncapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelEncapType::Unspecified => "unspecified",
            TunnelEncapType::Gre => "gre",
            TunnelEncapType::Vxlan => "vxlan",
            TunnelEncapType::Nvgre => "nvgre",
            TunnelEncapType::Mpls => "mpls",
            TunnelEncapType::MplsOverGre => "mpls-o-gre",
            TunnelEncapType::VxlanGpe => "vxlan-gpe",
            TunnelEncapType::MplsOverUdp => "mpls-o-udp",
        }
    }
}

// ===== impl TunnelEncap =====

impl TunnelEncap {
    pub fn new(encap: TunnelEncapType) -> TunnelEncap {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_OPAQUE;
        bytes[1] = SUBTYPE_TUNNEL_ENCAP;
        bytes[6..8].copy_from_slice(&(encap as u16).to_be_bytes());
        TunnelEncap(ExtComm(bytes))
    }

    pub fn get(comm: &ExtComm) -> Option<TunnelEncap> {
        match (comm.typ(), comm.subtype()) {
            (TYPE_OPAQUE, SUBTYPE_TUNNEL_ENCAP) => Some(TunnelEncap(*comm)),
            _ => None,
        }
    }

    pub fn as_extcomm(&self) -> ExtComm {
        self.0
    }

    pub fn tunnel_type(&self) -> TunnelEncapType {
        let raw = u16::from_be_bytes([self.0.0[6], self.0.0[7]]);
        TunnelEncapType::from_u16(raw)
            .unwrap_or(TunnelEncapType::Unspecified)
    }
}

impl std::fmt::Display for TunnelEncap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "encapsulation:{}", self.tunnel_type().as_str())
    }
}

impl FromStr for TunnelEncap {
    type Err = CommParseError;

    fn from_str(s: &str) -> Result<TunnelEncap, CommParseError> {
        let rem = s
            .strip_prefix("encapsulation:")
            .ok_or(CommParseError::InvalidKeyword)?;
        let encap = match rem {
            "unspecified" => TunnelEncapType::Unspecified,
            "gre" => TunnelEncapType::Gre,
            "vxlan" => TunnelEncapType::Vxlan,
            "nvgre" => TunnelEncapType::Nvgre,
            "mpls" => TunnelEncapType::Mpls,
            "mpls-o-gre" => TunnelEncapType::MplsOverGre,
            "vxlan-gpe" => TunnelEncapType::VxlanGpe,
            "mpls-o-udp" => TunnelEncapType::MplsOverUdp,
            _ => return Err(CommParseError::InvalidKeyword),
        };
        Ok(TunnelEncap::new(encap))
    }
}
