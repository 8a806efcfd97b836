//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use weir_chaining::comm::{CommParseError, SecurityGroup, Tag};

#[test]
fn test_round_trip() {
    let sg = "secgroup:64512:10".parse::<SecurityGroup>().unwrap();
    assert_eq!(sg, SecurityGroup::new(64512, 10));
    assert_eq!(sg.security_group_id(), 10);
    assert_eq!(sg.to_string(), "secgroup:64512:10");

    let sg = "secgroup:70000:8".parse::<SecurityGroup>().unwrap();
    assert_eq!(sg, SecurityGroup::from_as4(70000, 8));
    assert_eq!(sg.security_group_id(), 8);
    assert_eq!(sg.to_string(), "secgroup:70000:8");
}

#[test]
fn test_parse_errors() {
    assert_eq!(
        "sg:100:1".parse::<SecurityGroup>(),
        Err(CommParseError::InvalidKeyword)
    );
    assert_eq!(
        "secgroup:100".parse::<SecurityGroup>(),
        Err(CommParseError::MissingSeparator)
    );
    assert_eq!(
        "secgroup:foo:1".parse::<SecurityGroup>(),
        Err(CommParseError::InvalidAdministrator)
    );
    assert_eq!(
        "secgroup:100:foo".parse::<SecurityGroup>(),
        Err(CommParseError::InvalidNumber)
    );
    assert_eq!(
        "secgroup:70000:70000".parse::<SecurityGroup>(),
        Err(CommParseError::ValueOutOfRange)
    );
}

#[test]
fn test_kind_mismatch() {
    // Tags share the experimental type byte with a different subtype.
    let sg = SecurityGroup::new(64512, 10);
    assert_eq!(Tag::get(&sg.as_extcomm()), None);
    assert_eq!(SecurityGroup::get(&sg.as_extcomm()), Some(sg));
}
