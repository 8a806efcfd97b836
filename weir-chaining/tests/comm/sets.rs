//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;

use const_addrs::ip;
use weir_chaining::attr::{AttrSetsCxt, Attrs, Comms, ExtComms};
use weir_chaining::comm::{ExtCommKind, RouteTarget, SiteOfOrigin, Tag};
use weir_utils::bgp::{Comm, WellKnownCommunities};

#[test]
fn test_append_is_canonical() {
    let rt1 = RouteTarget::from_as2(64512, 1).as_extcomm();
    let rt2 = RouteTarget::from_as2(64512, 2).as_extcomm();
    let mut ext = ExtComms::default();
    ext.append(rt2);
    ext.append(rt1);
    ext.append(rt1);

    assert_eq!(
        ext.0.iter().copied().collect::<Vec<_>>(),
        vec![rt1, rt2]
    );
}

#[test]
fn test_remove_kind_scoped() {
    let mut ext = ExtComms::default();
    ext.append(RouteTarget::from_as2(64512, 1).as_extcomm());
    ext.append(RouteTarget::from_as4(70000, 2).as_extcomm());
    ext.append(SiteOfOrigin::from_as2(64512, 7).as_extcomm());
    ext.append(Tag::new(64512, 9).as_extcomm());

    ext.remove_kind(ExtCommKind::RouteTarget);

    assert_eq!(ext.route_targets().count(), 0);
    assert_eq!(ext.site_of_origin(), Some(SiteOfOrigin::from_as2(64512, 7)));
    assert_eq!(ext.iter_kind(ExtCommKind::Tag).count(), 1);
}

#[test]
fn test_replace_kind() {
    let mut ext = ExtComms::default();
    ext.append(Tag::new(64512, 1).as_extcomm());
    ext.append(Tag::new(64512, 2).as_extcomm());
    ext.append(SiteOfOrigin::from_as2(64512, 7).as_extcomm());

    ext.replace_kind(ExtCommKind::Tag, [Tag::new(64512, 3).as_extcomm()]);

    assert_eq!(
        ext.iter_kind(ExtCommKind::Tag).copied().collect::<Vec<_>>(),
        vec![Tag::new(64512, 3).as_extcomm()]
    );
    assert_eq!(ext.site_of_origin(), Some(SiteOfOrigin::from_as2(64512, 7)));
}

#[test]
fn test_comms_well_known() {
    let mut comms = Comms::default();
    comms.append(Comm::from(WellKnownCommunities::AcceptOwnNexthop));

    assert!(comms.contains(WellKnownCommunities::AcceptOwnNexthop));
    assert!(!comms.contains(WellKnownCommunities::NoReOriginate));
}

#[test]
fn test_interning_reuses_sets() {
    let mut cxt = AttrSetsCxt::default();
    let attrs = Attrs::new(ip!("10.0.0.9"));
    let first = cxt.get_route_attr_sets(&attrs);
    let second = cxt.get_route_attr_sets(&attrs);
    assert!(Arc::ptr_eq(&first.base, &second.base));
    assert_eq!(first.base.index, second.base.index);

    let other = cxt.get_route_attr_sets(&Attrs::new(ip!("10.0.0.10")));
    assert_ne!(first.base.index, other.base.index);
}
