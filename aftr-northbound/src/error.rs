//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use aftr_bindingtable::packing::PackError;
use aftr_bindingtable::text::ParseError;
use aftr_bindingtable::{PortSet, SoftwireKey, TableError};
use aftr_yang::path::PathError;
use tracing::warn;

// Northbound errors.
//
// All of these abort the requested mutation before any action is emitted;
// partial plans are never returned. Lossy composition is not an error (see
// `ietf::ComposedConfig`).
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    MalformedPath(PathError),
    MalformedText(ParseError),
    UnsupportedPath(String),
    UnrecognizedLeaf(String, String),
    InstanceMismatch(String, String),
    DuplicateKey(SoftwireKey),
    MissingPortSet(SoftwireKey),
    InvalidRange(PortSet),
    InvalidValue(String),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::MalformedPath(error) => {
                warn!(%error, "{}", self);
            }
            Error::MalformedText(error) => {
                warn!(%error, "{}", self);
            }
            Error::UnsupportedPath(path) => {
                warn!(%path, "{}", self);
            }
            Error::UnrecognizedLeaf(parent, leaf) => {
                warn!(%parent, %leaf, "{}", self);
            }
            Error::InstanceMismatch(requested, active) => {
                warn!(%requested, %active, "{}", self);
            }
            Error::DuplicateKey((ipv4, psid)) => {
                warn!(%ipv4, %psid, "{}", self);
            }
            Error::MissingPortSet((ipv4, psid)) => {
                warn!(%ipv4, %psid, "{}", self);
            }
            Error::InvalidRange(port_set) => {
                warn!(
                    psid_length = %port_set.psid_length,
                    shift = %port_set.shift,
                    "{}", self
                );
            }
            Error::InvalidValue(value) => {
                warn!(%value, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MalformedPath(..) => write!(f, "malformed path"),
            Error::MalformedText(..) => {
                write!(f, "malformed softwire text block")
            }
            Error::UnsupportedPath(..) => write!(f, "unsupported path"),
            Error::UnrecognizedLeaf(..) => {
                write!(f, "unrecognized configuration leaf")
            }
            Error::InstanceMismatch(..) => {
                write!(f, "path addresses another instance")
            }
            Error::DuplicateKey(..) => {
                write!(f, "softwire key already present")
            }
            Error::MissingPortSet(..) => {
                write!(f, "softwire has no port-set parameters")
            }
            Error::InvalidRange(..) => {
                write!(f, "PSID parameters exceed the 16-bit port space")
            }
            Error::InvalidValue(..) => write!(f, "invalid leaf value"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MalformedPath(error) => Some(error),
            Error::MalformedText(error) => Some(error),
            _ => None,
        }
    }
}

impl From<PathError> for Error {
    fn from(error: PathError) -> Error {
        Error::MalformedPath(error)
    }
}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Error {
        Error::MalformedText(error)
    }
}

impl From<TableError> for Error {
    fn from(error: TableError) -> Error {
        match error {
            TableError::DuplicateKey(key) => Error::DuplicateKey(key),
            TableError::InvalidRange(port_set) => {
                Error::InvalidRange(port_set)
            }
        }
    }
}

impl From<PackError> for Error {
    fn from(error: PackError) -> Error {
        match error {
            PackError::MissingPortSet(key) => Error::MissingPortSet(key),
        }
    }
}
