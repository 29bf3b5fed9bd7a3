//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use aftr_bindingtable::Softwire;
use aftr_yang::path::DataPath;
use bytes::BytesMut;

use crate::api::{Action, ActionPlan, Verb};
use crate::configuration::{
    SoftwireConfig, paths, softwire_key_from_query,
};
use crate::error::Error;

// Forwarding-engine dispatch identifiers.
pub const LWAFTR_APP: &str = "lwaftr";
pub const METHOD_ADD_SOFTWIRE: &str = "add_softwire_entry";
pub const METHOD_REMOVE_SOFTWIRE: &str = "remove_softwire_entry";

/// The argument of a native mutation, already deserialized.
#[derive(Clone, Debug)]
pub enum MutationArg<'a> {
    None,
    Scalar(&'a str),
    Softwires(&'a [Softwire]),
}

// ===== global functions =====

/// Restart decision for one native mutation.
///
/// Only an `add` of binding-table entries can force a restart: the
/// forwarding engine's PSID-map lookup structure is structural, so a
/// brand-new managed IPv4 address cannot be patched in incrementally.
/// Everything the planner special-cases otherwise is restart-free.
pub fn requires_restart(
    old: &SoftwireConfig,
    verb: Verb,
    path: &DataPath,
    arg: &MutationArg<'_>,
) -> bool {
    if verb == Verb::Add
        && path.matches(&paths::SOFTWIRE_PATTERN)
        && let MutationArg::Softwires(softwires) = arg
    {
        return softwires
            .iter()
            .any(|softwire| !old.binding_table.is_managed_ipv4(softwire.ipv4));
    }
    false
}

/// Computes the hot-patch action plan for one native mutation.
///
/// Returns `Ok(None)` when the mutation requires a restart or is not one
/// of the binding-table fast paths; the caller then falls back to full
/// reconfiguration through the generic mechanism.
pub fn plan(
    old: &SoftwireConfig,
    _new: &SoftwireConfig,
    verb: Verb,
    path: &DataPath,
    arg: &MutationArg<'_>,
) -> Result<Option<ActionPlan>, Error> {
    if requires_restart(old, verb, path, arg) {
        return Ok(None);
    }

    match verb {
        Verb::Add if path.matches(&paths::SOFTWIRE_PATTERN) => {
            let MutationArg::Softwires(softwires) = arg else {
                return Err(Error::InvalidValue(
                    "binding-table add takes softwire entries".to_owned(),
                ));
            };

            let mut actions = Vec::with_capacity(softwires.len() + 1);
            for softwire in *softwires {
                let packed = softwire.pack()?;
                actions.push(invoke(
                    METHOD_ADD_SOFTWIRE,
                    packed.softwire.encode(),
                ));
            }
            if !actions.is_empty() {
                actions.push(Action::Commit);
            }
            Ok(Some(actions))
        }
        Verb::Remove
            if path.matches(&paths::SOFTWIRE_PATTERN)
                && path.has_query(2, None) =>
        {
            let key = softwire_key_from_query(path, 2)?;
            let softwire = old
                .binding_table
                .get(&key)
                .ok_or_else(|| Error::UnsupportedPath(path.to_string()))?;

            Ok(Some(vec![
                invoke(
                    METHOD_REMOVE_SOFTWIRE,
                    softwire.key_record().encode(),
                ),
                Action::Commit,
            ]))
        }
        // Renaming the instance never touches the data plane.
        Verb::Set if path.matches(&paths::NAME_PATTERN) => {
            Ok(Some(vec![]))
        }
        _ => Ok(None),
    }
}

// ===== helper functions =====

fn invoke(method: &str, blob: BytesMut) -> Action {
    Action::CallAppMethodWithBlob {
        target: LWAFTR_APP.to_owned(),
        method: method.to_owned(),
        blob: blob.freeze(),
    }
}
