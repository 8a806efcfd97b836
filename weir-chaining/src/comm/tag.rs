//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use weir_utils::bgp::{AS2_MAX, ExtComm};

use crate::comm::{
    CommParseError, SUBTYPE_TAG, TYPE_EXPERIMENTAL, TYPE_EXPERIMENTAL_AS4,
};

/// Tag extended community.
///
/// Carries an opaque numeric tag applied by the originator, mirrored onto
/// routes derived from it.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct Tag(ExtComm);

// ===== impl Tag =====

impl Tag {
    pub fn from_as2(asn: u16, tag: u32) -> Tag {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_EXPERIMENTAL;
        bytes[1] = SUBTYPE_TAG;
        bytes[2..4].copy_from_slice(&asn.to_be_bytes());
        bytes[4..8].copy_from_slice(&tag.to_be_bytes());
        Tag(ExtComm(bytes))
    }

    pub fn from_as4(asn: u32, tag: u16) -> Tag {
        let mut bytes = [0; 8];
        bytes[0] = TYPE_EXPERIMENTAL_AS4;
        bytes[1] = SUBTYPE_TAG;
        bytes[2..6].copy_from_slice(&asn.to_be_bytes());
        bytes[6..8].copy_from_slice(&tag.to_be_bytes());
        Tag(ExtComm(bytes))
    }

    pub fn new(asn: u32, tag: u32) -> Tag {
        if asn > AS2_MAX {
            Tag::from_as4(asn, tag as u16)
        } else {
            Tag::from_as2(asn as u16, tag)
        }
    }

    pub fn get(comm: &ExtComm) -> Option<Tag> {
        match (comm.typ(), comm.subtype()) {
            (TYPE_EXPERIMENTAL | TYPE_EXPERIMENTAL_AS4, SUBTYPE_TAG) => {
                Some(Tag(*comm))
            }
            _ => None,
        }
    }

    pub fn as_extcomm(&self) -> ExtComm {
        self.0
    }

    pub fn tag(&self) -> u32 {
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

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tag:{}:{}", self.as_number(), self.tag())
    }
}

impl FromStr for Tag {
    type Err = CommParseError;

    fn from_str(s: &str) -> Result<Tag, CommParseError> {
        let rem = s
            .strip_prefix("tag:")
            .ok_or(CommParseError::InvalidKeyword)?;
        let (asn, tag) =
            rem.split_once(':').ok_or(CommParseError::MissingSeparator)?;
        if asn.is_empty() || tag.is_empty() {
            return Err(CommParseError::MissingSeparator);
        }
        let asn = asn
            .parse::<u32>()
            .map_err(|_| CommParseError::InvalidAdministrator)?;
        let tag = tag
            .parse::<u32>()
            .map_err(|_| CommParseError::InvalidNumber)?;
        if asn > AS2_MAX && tag > 0xFFFF {
            return Err(CommParseError::ValueOutOfRange);
        }
        Ok(Tag::new(asn, tag))
    }
}
