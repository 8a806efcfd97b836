//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Fate-sharing groups.
//!
//! Chains configured with the same chain id share fate: the group is
//! operationally up only while every member's connected route is
//! valid, and synthesized routes of all members follow that state
//! together.

use std::collections::BTreeSet;

use crate::instance::InstanceId;

#[derive(Debug)]
pub struct ServiceChainGroup {
    pub name: String,
    pub members: BTreeSet<InstanceId>,
    pub oper_state_up: bool,
}

// ===== impl ServiceChainGroup =====

impl ServiceChainGroup {
    pub(crate) fn new(name: &str) -> ServiceChainGroup {
        ServiceChainGroup {
            name: name.to_owned(),
            members: Default::default(),
            oper_state_up: false,
        }
    }

    pub(crate) fn add_member(&mut self, id: InstanceId) {
        self.members.insert(id);
    }

    pub(crate) fn remove_member(&mut self, id: InstanceId) {
        self.members.remove(&id);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
