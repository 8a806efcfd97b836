//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! BGP definitions shared by the route-processing crates.

use std::net::Ipv4Addr;

use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

// Largest AS number representable in the 2-octet encoding.
pub const AS2_MAX: u32 = 0xFFFF;

// Reserved AS number used when a 4-octet AS must be carried in a 2-octet
// field (RFC 6793).
pub const AS_TRANS: u32 = 23456;

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct Comm(pub u32);

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct ExtComm(pub [u8; 8]);

// BGP Well-known Communities.
//
// IANA registry:
// https://www.iana.org/assignments/bgp-well-known-communities/bgp-well-known-communities.xhtml
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
#[repr(u32)]
pub enum WellKnownCommunities {
    AcceptOwn = 0xFFFF0001,
    LlgrStale = 0xFFFF0006,
    NoLlgr = 0xFFFF0007,
    AcceptOwnNexthop = 0xFFFF0008,
    NoReOriginate = 0xFFFFF004,
    NoExport = 0xFFFFFF01,
    NoAdvertise = 0xFFFFFF02,
    NoExportSubconfed = 0xFFFFFF03,
}

// Route Distinguisher (RFC 4364).
//
// Two-byte type field followed by a six-byte value whose layout depends on
// the type.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct RouteDistinguisher(pub [u8; 8]);

// ===== impl Comm =====

impl Comm {
    pub fn well_known(&self) -> Option<WellKnownCommunities> {
        num_traits::FromPrimitive::from_u32(self.0)
    }
}

impl From<WellKnownCommunities> for Comm {
    fn from(comm: WellKnownCommunities) -> Comm {
        Comm(comm as u32)
    }
}

// ===== impl ExtComm =====

impl ExtComm {
    pub fn typ(&self) -> u8 {
        self.0[0]
    }

    pub fn subtype(&self) -> u8 {
        self.0[1]
    }
}

// ===== impl RouteDistinguisher =====

impl RouteDistinguisher {
    pub const TYPE_AS2: u16 = 0;
    pub const TYPE_IPV4: u16 = 1;
    pub const TYPE_AS4: u16 = 2;

    pub fn from_as2(asn: u16, number: u32) -> RouteDistinguisher {
        let mut bytes = [0; 8];
        bytes[0..2].copy_from_slice(&Self::TYPE_AS2.to_be_bytes());
        bytes[2..4].copy_from_slice(&asn.to_be_bytes());
        bytes[4..8].copy_from_slice(&number.to_be_bytes());
        RouteDistinguisher(bytes)
    }

    pub fn from_ip(addr: Ipv4Addr, number: u16) -> RouteDistinguisher {
        let mut bytes = [0; 8];
        bytes[0..2].copy_from_slice(&Self::TYPE_IPV4.to_be_bytes());
        bytes[2..6].copy_from_slice(&addr.octets());
        bytes[6..8].copy_from_slice(&number.to_be_bytes());
        RouteDistinguisher(bytes)
    }

    pub fn from_as4(asn: u32, number: u16) -> RouteDistinguisher {
        let mut bytes = [0; 8];
        bytes[0..2].copy_from_slice(&Self::TYPE_AS4.to_be_bytes());
        bytes[2..6].copy_from_slice(&asn.to_be_bytes());
        bytes[6..8].copy_from_slice(&number.to_be_bytes());
        RouteDistinguisher(bytes)
    }

    pub fn typ(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 8]
    }
}

impl std::fmt::Display for RouteDistinguisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.typ() {
            Self::TYPE_IPV4 => {
                let addr = Ipv4Addr::new(
                    self.0[2], self.0[3], self.0[4], self.0[5],
                );
                let number = u16::from_be_bytes([self.0[6], self.0[7]]);
                write!(f, "{}:{}", addr, number)
            }
            Self::TYPE_AS4 => {
                let asn = u32::from_be_bytes([
                    self.0[2], self.0[3], self.0[4], self.0[5],
                ]);
                let number = u16::from_be_bytes([self.0[6], self.0[7]]);
                write!(f, "{}:{}", asn, number)
            }
            _ => {
                let asn = u16::from_be_bytes([self.0[2], self.0[3]]);
                let number = u32::from_be_bytes([
                    self.0[4], self.0[5], self.0[6], self.0[7],
                ]);
                write!(f, "{}:{}", asn, number)
            }
        }
    }
}
