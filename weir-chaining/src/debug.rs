//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::debug;

use crate::af::ScFamily;
use crate::manager::PendingReason;
use crate::table::RouteKey;

// Service chaining debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    ChainCreated(ScFamily, &'a str),
    ChainPending(ScFamily, &'a str, &'a PendingReason),
    ChainStop(ScFamily, &'a str),
    ChainDestroyed(ScFamily, &'a str),
    RequestRx(ScFamily, &'a str),
    AggregateInstall(ScFamily, &'a RouteKey),
    AggregateWithdraw(ScFamily, &'a RouteKey),
    ConnectedUp(ScFamily, &'a str),
    ConnectedDown(ScFamily, &'a str),
    GroupOperState(&'a str, bool),
    ResolveRetry(ScFamily),
}

// ===== impl Debug =====

impl Debug<'_> {
    pub(crate) fn log(&self) {
        match self {
            Debug::ChainCreated(family, name) => {
                debug!(%family, %name, "{}", self);
            }
            Debug::ChainPending(family, name, reason) => {
                debug!(%family, %name, %reason, "{}", self);
            }
            Debug::ChainStop(family, name)
            | Debug::ChainDestroyed(family, name) => {
                debug!(%family, %name, "{}", self);
            }
            Debug::RequestRx(family, kind) => {
                debug!(%family, %kind, "{}", self);
            }
            Debug::AggregateInstall(family, key)
            | Debug::AggregateWithdraw(family, key) => {
                debug!(%family, %key, "{}", self);
            }
            Debug::ConnectedUp(family, name)
            | Debug::ConnectedDown(family, name) => {
                debug!(%family, %name, "{}", self);
            }
            Debug::GroupOperState(name, up) => {
                debug!(%name, %up, "{}", self);
            }
            Debug::ResolveRetry(family) => {
                debug!(%family, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::ChainCreated(..) => {
                write!(f, "service chain created")
            }
            Debug::ChainPending(..) => {
                write!(f, "service chain pending")
            }
            Debug::ChainStop(..) => {
                write!(f, "service chain stop requested")
            }
            Debug::ChainDestroyed(..) => {
                write!(f, "service chain destroyed")
            }
            Debug::RequestRx(..) => {
                write!(f, "request received")
            }
            Debug::AggregateInstall(..) => {
                write!(f, "aggregate route installed")
            }
            Debug::AggregateWithdraw(..) => {
                write!(f, "aggregate route withdrawn")
            }
            Debug::ConnectedUp(..) => {
                write!(f, "connected route up")
            }
            Debug::ConnectedDown(..) => {
                write!(f, "connected route down")
            }
            Debug::GroupOperState(..) => {
                write!(f, "group operational state changed")
            }
            Debug::ResolveRetry(..) => {
                write!(f, "retrying pending service chains")
            }
        }
    }
}
