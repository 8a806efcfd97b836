//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use weir_chaining::comm::{CommParseError, TunnelEncap, TunnelEncapType};
use weir_utils::bgp::ExtComm;

#[test]
fn test_round_trip() {
    for (s, encap) in [
        ("encapsulation:gre", TunnelEncapType::Gre),
        ("encapsulation:vxlan", TunnelEncapType::Vxlan),
        ("encapsulation:mpls-o-udp", TunnelEncapType::MplsOverUdp),
    ] {
        let te = s.parse::<TunnelEncap>().unwrap();
        assert_eq!(te, TunnelEncap::new(encap));
        assert_eq!(te.tunnel_type(), encap);
        assert_eq!(te.to_string(), s);
    }
}

#[test]
fn test_parse_errors() {
    assert_eq!(
        "encap:vxlan".parse::<TunnelEncap>(),
        Err(CommParseError::InvalidKeyword)
    );
    assert_eq!(
        "encapsulation:bogus".parse::<TunnelEncap>(),
        Err(CommParseError::InvalidKeyword)
    );
}

#[test]
fn test_unknown_tunnel_type() {
    // Opaque/tunnel-encap value with an unregistered tunnel type.
    let comm = ExtComm([0x03, 0x0C, 0, 0, 0, 0, 0, 99]);
    let te = TunnelEncap::get(&comm).unwrap();
    assert_eq!(te.tunnel_type(), TunnelEncapType::Unspecified);
    assert_eq!(te.to_string(), "encapsulation:unspecified");
}
