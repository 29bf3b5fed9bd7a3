//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod path;

use serde::{Deserialize, Serialize};

/// Schema dialects understood by the control plane.
///
/// The native dialect is the vendor schema consumed by the forwarding engine
/// and the generic configuration machinery. The IETF dialect is the
/// standards-based external view offered to management clients; it describes
/// overlapping but non-isomorphic information and is translated to and from
/// the native dialect by the northbound layer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Dialect {
    Native,
    IetfSoftwireBr,
}

// ===== impl Dialect =====

impl Dialect {
    pub fn module_name(&self) -> &'static str {
        match self {
            Dialect::Native => "aftr-softwire",
            Dialect::IetfSoftwireBr => "ietf-softwire-br",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.module_name())
    }
}
