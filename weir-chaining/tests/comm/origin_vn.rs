//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use weir_chaining::comm::{CommParseError, OriginVn};

#[test]
fn test_as2_encoding() {
    // A 2-octet AS leaves the full 4-octet VN index available.
    let ovn = OriginVn::new(64512, 8_000_000);
    assert_eq!(ovn, OriginVn::from_as2(64512, 8_000_000));
    assert_eq!(ovn.as_number(), 64512);
    assert_eq!(ovn.vn_index(), 8_000_000);
    assert_eq!(ovn.to_string(), "originvn:64512:8000000");
}

#[test]
fn test_as4_encoding() {
    let ovn = OriginVn::new(70000, 10);
    assert_eq!(ovn, OriginVn::from_as4(70000, 10));
    assert_eq!(ovn.as_number(), 70000);
    assert_eq!(ovn.vn_index(), 10);
    assert_eq!(ovn.to_string(), "originvn:70000:10");
}

#[test]
fn test_parse_round_trip() {
    for s in ["originvn:64512:5", "originvn:70000:9"] {
        let ovn = s.parse::<OriginVn>().unwrap();
        assert_eq!(ovn.to_string(), s);
    }
}

#[test]
fn test_parse_errors() {
    assert_eq!(
        "vn:100:1".parse::<OriginVn>(),
        Err(CommParseError::InvalidKeyword)
    );
    assert_eq!(
        "originvn:100".parse::<OriginVn>(),
        Err(CommParseError::MissingSeparator)
    );
    assert_eq!(
        "originvn::1".parse::<OriginVn>(),
        Err(CommParseError::MissingSeparator)
    );
    assert_eq!(
        "originvn:foo:1".parse::<OriginVn>(),
        Err(CommParseError::InvalidAdministrator)
    );
    assert_eq!(
        "originvn:100:foo".parse::<OriginVn>(),
        Err(CommParseError::InvalidNumber)
    );
    // 4-octet AS numbers leave only 16 bits for the VN index.
    assert_eq!(
        "originvn:70000:70000".parse::<OriginVn>(),
        Err(CommParseError::ValueOutOfRange)
    );
}
