//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use weir_chaining::comm::{
    CommParseError, LoadBalance, LoadBalanceFields,
};

#[test]
fn test_default() {
    let lb = LoadBalance::new();
    assert!(lb.is_default());
    assert_eq!(lb.fields(), LoadBalanceFields::standard());
    assert_eq!(
        lb.to_string(),
        "loadbalance:l3-source-address,l3-destination-address,\
         l4-protocol,l4-source-port,l4-destination-port"
    );
}

#[test]
fn test_from_fields_empty_is_default() {
    // An empty field set requests the canonical default.
    assert_eq!(LoadBalance::from_fields(LoadBalanceFields::empty()), LoadBalance::new());
}

#[test]
fn test_parse_none() {
    // "none" encodes an explicit all-clear value, not the default.
    let lb = "loadbalance:none".parse::<LoadBalance>().unwrap();
    assert!(lb.fields().is_empty());
    assert!(!lb.is_default());
    assert_eq!(lb.to_string(), "loadbalance:none");
}

#[test]
fn test_parse_field_list() {
    let lb = "loadbalance:l3-source-address,l4-protocol"
        .parse::<LoadBalance>()
        .unwrap();
    assert_eq!(
        lb.fields(),
        LoadBalanceFields::L3_SOURCE_ADDRESS
            | LoadBalanceFields::L4_PROTOCOL
    );
    assert_eq!(lb.to_string(), "loadbalance:l3-source-address,l4-protocol");
}

#[test]
fn test_display_canonical_order() {
    // Output order is canonical regardless of input order.
    let lb = "loadbalance:l4-protocol,l3-source-address"
        .parse::<LoadBalance>()
        .unwrap();
    assert_eq!(lb.to_string(), "loadbalance:l3-source-address,l4-protocol");
}

#[test]
fn test_source_bias() {
    let lb = "loadbalance:source-bias".parse::<LoadBalance>().unwrap();
    assert_eq!(lb.fields(), LoadBalanceFields::SOURCE_BIAS);
    assert_eq!(lb.to_string(), "loadbalance:source-bias");
}

#[test]
fn test_set_field() {
    let mut lb = LoadBalance::new();
    lb.set_field(LoadBalanceFields::L4_SOURCE_PORT, false);
    lb.set_field(LoadBalanceFields::SOURCE_BIAS, true);
    assert!(!lb.is_default());
    assert_eq!(
        lb.fields(),
        LoadBalanceFields::L3_SOURCE_ADDRESS
            | LoadBalanceFields::L3_DESTINATION_ADDRESS
            | LoadBalanceFields::L4_PROTOCOL
            | LoadBalanceFields::L4_DESTINATION_PORT
            | LoadBalanceFields::SOURCE_BIAS
    );
}

#[test]
fn test_parse_errors() {
    assert_eq!(
        "lb:none".parse::<LoadBalance>(),
        Err(CommParseError::InvalidKeyword)
    );
    assert_eq!(
        "loadbalance:bogus".parse::<LoadBalance>(),
        Err(CommParseError::InvalidKeyword)
    );
}
