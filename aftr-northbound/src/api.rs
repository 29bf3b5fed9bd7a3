//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;

use aftr_bindingtable::Softwire;
use aftr_yang::Dialect;
use bytes::Bytes;
use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use crate::configuration::SoftwireConfig;
use crate::error::Error;
use crate::ietf::{
    BindingEntryPatch, ComposedConfig, IetfBindingEntry, IetfState,
};
use crate::state::SoftwireState;

// Type aliases.
pub type Responder<T> = tokio::sync::oneshot::Sender<T>;

/// An ordered action plan.
///
/// Ordering is significant: every data-mutating action precedes `Commit`,
/// and `Commit` is always last and always present when any mutating action
/// exists.
pub type ActionPlan = Vec<Action>;

/// One step of an action plan dispatched to the forwarding engine.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(EnumAsInner)]
pub enum Action {
    // Make all preceding actions of the plan take effect.
    Commit,
    // Dispatch a binary record to a method of a named forwarding app.
    CallAppMethodWithBlob {
        target: String,
        method: String,
        blob: Bytes,
    },
    // Apply a native-dialect text mutation through the generic
    // configuration mechanism.
    Set {
        dialect: Dialect,
        path: String,
        value: Option<String>,
    },
    Add {
        dialect: Dialect,
        path: String,
        value: String,
    },
    Remove {
        dialect: Dialect,
        path: String,
    },
}

// Mutation verbs accepted by the control plane.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Verb {
    Set,
    Add,
    Remove,
}

/// A mutation payload, already deserialized by the schema-grammar layer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MutateValue {
    None,
    Scalar(String),
    NativeSoftwires(Vec<Softwire>),
    IetfEntries(Vec<IetfBindingEntry>),
    IetfEntryPatch(BindingEntryPatch),
}

// Client -> Manager requests.
pub mod client {
    use super::*;

    #[derive(Debug)]
    pub enum Request {
        // Request to get the running configuration in some dialect.
        GetConfig(GetConfigRequest),
        // Request to get aggregated state data in some dialect.
        GetState(GetStateRequest),
        // Request to change the running configuration.
        Mutate(MutateRequest),
    }

    #[derive(Debug)]
    pub struct GetConfigRequest {
        pub dialect: Dialect,
        pub responder: Option<Responder<GetConfigResponse>>,
    }

    #[derive(Debug)]
    pub enum GetConfigResponse {
        Native(SoftwireConfig),
        Ietf(Arc<ComposedConfig>),
    }

    #[derive(Debug)]
    pub struct GetStateRequest {
        pub dialect: Dialect,
        pub responder: Option<Responder<GetStateResponse>>,
    }

    #[derive(Debug)]
    pub enum GetStateResponse {
        Native(SoftwireState),
        Ietf(IetfState),
    }

    #[derive(Debug)]
    pub struct MutateRequest {
        pub dialect: Dialect,
        pub verb: Verb,
        pub path: String,
        pub value: MutateValue,
        pub responder: Option<Responder<Result<MutateResponse, Error>>>,
    }

    #[derive(Debug, Eq, PartialEq)]
    pub struct MutateResponse {
        // Whether the mutation was hot-patched into the live forwarding
        // table or took the full-restart path.
        pub hot_patched: bool,
    }
}
