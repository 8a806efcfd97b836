//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Service-chain address families and family-indexed containers.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use weir_utils::bgp::RouteDistinguisher;

/// Address family of a service chain.
///
/// Each family binds together the table the chain listens on, the table
/// its connected routes live in, and the extra tables synthesized routes
/// are replicated into.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum ScFamily {
    Inet,
    Inet6,
    Evpn,
    Evpn6,
}

/// Address family of a routing table.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum TableFamily {
    Inet,
    Inet6,
    Evpn,
}

/// Container indexed by service-chain family.
#[derive(Debug, Default)]
pub struct ScFamilies<T> {
    pub inet: T,
    pub inet6: T,
    pub evpn: T,
    pub evpn6: T,
}

/// EVPN route key.
///
/// Only the route types relevant to chaining are modeled: MAC
/// advertisements (type 2) and IP prefix routes (type 5).
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum EvpnPrefix {
    MacAdvertisement {
        rd: RouteDistinguisher,
        tag: u32,
        mac: [u8; 6],
    },
    IpPrefix {
        rd: RouteDistinguisher,
        tag: u32,
        prefix: IpNetwork,
    },
}

// ===== impl ScFamily =====

impl ScFamily {
    /// Table the chain's match conditions are registered against.
    pub fn table_family(&self) -> TableFamily {
        match self {
            ScFamily::Inet => TableFamily::Inet,
            ScFamily::Inet6 => TableFamily::Inet6,
            ScFamily::Evpn | ScFamily::Evpn6 => TableFamily::Evpn,
        }
    }

    /// Table the connected route is resolved from. EVPN chains anchor
    /// their connected route in the corresponding IP table.
    pub fn connected_family(&self) -> TableFamily {
        match self {
            ScFamily::Inet | ScFamily::Evpn => TableFamily::Inet,
            ScFamily::Inet6 | ScFamily::Evpn6 => TableFamily::Inet6,
        }
    }

    /// Extra tables synthesized routes are replicated into, beyond the
    /// chain's own table.
    pub fn replication_families(&self, sc_head: bool) -> &'static [TableFamily] {
        match self {
            ScFamily::Inet if sc_head => &[TableFamily::Evpn],
            ScFamily::Inet6 if sc_head => &[TableFamily::Evpn],
            ScFamily::Inet | ScFamily::Inet6 => &[],
            ScFamily::Evpn => &[TableFamily::Inet],
            ScFamily::Evpn6 => &[TableFamily::Inet6],
        }
    }

    /// IP version carried by this family.
    pub fn is_ipv6(&self) -> bool {
        matches!(self, ScFamily::Inet6 | ScFamily::Evpn6)
    }

    pub const ALL: [ScFamily; 4] =
        [ScFamily::Inet, ScFamily::Inet6, ScFamily::Evpn, ScFamily::Evpn6];
}

impl std::fmt::Display for ScFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScFamily::Inet => write!(f, "inet"),
            ScFamily::Inet6 => write!(f, "inet6"),
            ScFamily::Evpn => write!(f, "evpn"),
            ScFamily::Evpn6 => write!(f, "evpn6"),
        }
    }
}

// ===== impl TableFamily =====

impl std::fmt::Display for TableFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableFamily::Inet => write!(f, "inet"),
            TableFamily::Inet6 => write!(f, "inet6"),
            TableFamily::Evpn => write!(f, "evpn"),
        }
    }
}

// ===== impl ScFamilies =====

impl<T> ScFamilies<T> {
    pub fn get(&self, family: ScFamily) -> &T {
        match family {
            ScFamily::Inet => &self.inet,
            ScFamily::Inet6 => &self.inet6,
            ScFamily::Evpn => &self.evpn,
            ScFamily::Evpn6 => &self.evpn6,
        }
    }

    pub fn get_mut(&mut self, family: ScFamily) -> &mut T {
        match family {
            ScFamily::Inet => &mut self.inet,
            ScFamily::Inet6 => &mut self.inet6,
            ScFamily::Evpn => &mut self.evpn,
            ScFamily::Evpn6 => &mut self.evpn6,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScFamily, &T)> + '_ {
        ScFamily::ALL.into_iter().map(move |af| (af, self.get(af)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ScFamily, &mut T)> + '_ {
        let ScFamilies { inet, inet6, evpn, evpn6 } = self;
        [
            (ScFamily::Inet, inet),
            (ScFamily::Inet6, inet6),
            (ScFamily::Evpn, evpn),
            (ScFamily::Evpn6, evpn6),
        ]
        .into_iter()
    }
}

// ===== impl EvpnPrefix =====

impl EvpnPrefix {
    /// Builds the type-5 key used when an IP route is replicated into
    /// the EVPN table.
    pub fn ip_prefix(prefix: IpNetwork) -> EvpnPrefix {
        EvpnPrefix::IpPrefix {
            rd: RouteDistinguisher::default(),
            tag: 0,
            prefix,
        }
    }

    pub fn route_type(&self) -> u8 {
        match self {
            EvpnPrefix::MacAdvertisement { .. } => 2,
            EvpnPrefix::IpPrefix { .. } => 5,
        }
    }

    /// IP prefix carried by a type-5 route.
    pub fn ip(&self) -> Option<IpNetwork> {
        match self {
            EvpnPrefix::IpPrefix { prefix, .. } => Some(*prefix),
            EvpnPrefix::MacAdvertisement { .. } => None,
        }
    }

    /// Address of a type-5 route, when present.
    pub fn address(&self) -> Option<IpAddr> {
        self.ip().map(|prefix| prefix.ip())
    }
}

impl std::fmt::Display for EvpnPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvpnPrefix::MacAdvertisement { rd, tag, mac } => {
                write!(
                    f,
                    "2-{}-{}-{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
                    rd, tag, mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
                )
            }
            EvpnPrefix::IpPrefix { rd, tag, prefix } => {
                write!(f, "5-{}-{}-{}", rd, tag, prefix)
            }
        }
    }
}
