//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{error, warn};

use crate::comm::CommParseError;

// Service chaining errors.
#[derive(Debug)]
pub enum Error {
    InstanceNotFound(String),
    InstanceIdNotFound,
    ChainNotFound(String),
    InvalidRouteTarget(String, CommParseError),
    RequestQueueClosed,
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::InstanceNotFound(name) => {
                warn!(%name, "{}", self);
            }
            Error::InstanceIdNotFound => {
                warn!("{}", self);
            }
            Error::ChainNotFound(name) => {
                warn!(%name, "{}", self);
            }
            Error::InvalidRouteTarget(value, error) => {
                warn!(%value, %error, "{}", self);
            }
            Error::RequestQueueClosed => {
                error!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InstanceNotFound(..) => {
                write!(f, "routing instance not found")
            }
            Error::InstanceIdNotFound => {
                write!(f, "routing instance no longer exists")
            }
            Error::ChainNotFound(..) => {
                write!(f, "service chain not found")
            }
            Error::InvalidRouteTarget(..) => {
                write!(f, "invalid route target")
            }
            Error::RequestQueueClosed => {
                write!(f, "request queue closed")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidRouteTarget(_, error) => Some(error),
            _ => None,
        }
    }
}
