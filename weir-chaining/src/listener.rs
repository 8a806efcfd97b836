//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Table listener registrations and per-route match state.
//!
//! A chain registers a match condition against a table. Every route the
//! condition ever matched carries a match-state entry whose refcount
//! counts the requests in flight for that route. The route entry itself
//! must not be reclaimed while an entry exists.

use std::collections::BTreeMap;

use crate::instance::InstanceId;
use crate::table::{RouteKey, TableRef};

/// Match state attached to one route on behalf of one chain.
#[derive(Debug, Default)]
pub struct MatchState {
    pub refcount: u32,
    pub deleted: bool,
}

/// One chain's registration against one table.
#[derive(Debug, Default)]
pub struct ConditionEntry {
    pub deleted: bool,
    pub match_states: BTreeMap<RouteKey, MatchState>,
}

/// All match-condition registrations, keyed by table and owning chain.
#[derive(Debug, Default)]
pub struct ConditionListener {
    entries: BTreeMap<(TableRef, InstanceId), ConditionEntry>,
}

// ===== impl ConditionListener =====

impl ConditionListener {
    pub fn add_match_condition(&mut self, table: TableRef, chain: InstanceId) {
        self.entries.entry((table, chain)).or_default();
    }

    /// Starts tearing down a registration. Returns the routes that
    /// still hold match state so the caller can issue delete requests
    /// for each of them before the final done notification.
    pub fn remove_match_condition(
        &mut self,
        table: TableRef,
        chain: InstanceId,
    ) -> Vec<RouteKey> {
        match self.entries.get_mut(&(table, chain)) {
            Some(entry) => {
                entry.deleted = true;
                entry.match_states.keys().cloned().collect()
            }
            None => Vec::new(),
        }
    }

    pub fn get_match_state(
        &self,
        table: TableRef,
        chain: InstanceId,
        key: &RouteKey,
    ) -> Option<&MatchState> {
        self.entries
            .get(&(table, chain))
            .and_then(|entry| entry.match_states.get(key))
    }

    /// Creates the match state if missing and takes a reference for a
    /// request about to be enqueued.
    pub fn ref_match_state(
        &mut self,
        table: TableRef,
        chain: InstanceId,
        key: &RouteKey,
    ) {
        if let Some(entry) = self.entries.get_mut(&(table, chain)) {
            let state = entry.match_states.entry(key.clone()).or_default();
            state.refcount += 1;
        }
    }

    /// Releases one reference. The state itself stays in place until
    /// explicitly removed by request processing.
    pub fn unref_match_state(
        &mut self,
        table: TableRef,
        chain: InstanceId,
        key: &RouteKey,
    ) {
        if let Some(entry) = self.entries.get_mut(&(table, chain))
            && let Some(state) = entry.match_states.get_mut(key)
        {
            state.refcount = state.refcount.saturating_sub(1);
        }
    }

    /// Drops the match state once the chain no longer tracks the route
    /// and no request references it.
    pub fn remove_match_state(
        &mut self,
        table: TableRef,
        chain: InstanceId,
        key: &RouteKey,
    ) {
        if let Some(entry) = self.entries.get_mut(&(table, chain))
            && let Some(state) = entry.match_states.get(key)
            && state.refcount == 0
        {
            entry.match_states.remove(key);
        }
    }

    pub fn has_match_states(
        &self,
        table: TableRef,
        chain: InstanceId,
    ) -> bool {
        self.entries
            .get(&(table, chain))
            .is_some_and(|entry| !entry.match_states.is_empty())
    }

    /// Whether any registration, from any chain, still holds match
    /// state for the route.
    pub fn route_in_use(&self, table: TableRef, key: &RouteKey) -> bool {
        self.entries.iter().any(|((tref, _), entry)| {
            *tref == table && entry.match_states.contains_key(key)
        })
    }

    /// Chains registered on a table, tear-downs included.
    pub fn registered_chains(
        &self,
        table: TableRef,
    ) -> impl Iterator<Item = InstanceId> + '_ {
        self.entries
            .keys()
            .filter(move |(tref, _)| *tref == table)
            .map(|(_, chain)| *chain)
    }

    /// Final removal of a registration. The entry must be marked
    /// deleted and hold no remaining match state.
    pub fn unregister(&mut self, table: TableRef, chain: InstanceId) {
        if let Some(entry) = self.entries.get(&(table, chain))
            && entry.deleted
            && entry.match_states.is_empty()
        {
            self.entries.remove(&(table, chain));
        }
    }
}
