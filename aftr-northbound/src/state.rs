//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use derive_new::new;
use serde::{Deserialize, Serialize};

// Rendering of the counter-discontinuity timestamp in state trees.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Counter storage of the forwarding engine, keyed by worker process id.
pub trait CounterStore {
    fn counters_for_pid(&self, worker_id: u32) -> BTreeMap<String, u64>;
}

/// The native state sub-tree of one forwarding worker.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct InstanceState {
    pub worker_id: u32,
    pub counters: BTreeMap<String, u64>,
}

/// The unified native state tree: counters summed across workers plus the
/// per-instance sub-trees keyed by worker identity.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct SoftwireState {
    pub discontinuity_time: String,
    pub counters: BTreeMap<String, u64>,
    pub instances: BTreeMap<u32, InstanceState>,
}

/// Shapes raw per-worker counters into native state sub-trees.
#[derive(Debug, new)]
pub struct StateReader<'a, S: CounterStore> {
    store: &'a S,
}

// ===== impl StateReader =====

impl<S> StateReader<'_, S>
where
    S: CounterStore,
{
    pub fn read(&self, worker_id: u32) -> InstanceState {
        InstanceState {
            worker_id,
            counters: self.store.counters_for_pid(worker_id),
        }
    }
}

// ===== global functions =====

/// Merges per-worker state trees into one unified tree.
///
/// Counters sum across instances into a running total seeded empty.
/// Per-instance sub-trees are inserted keyed by worker identity; a later
/// entry with the same identity overwrites rather than merges. The result
/// is stamped with the discontinuity time, before which counters are not
/// comparable to counters after it.
pub fn merge(
    discontinuity_time: DateTime<Utc>,
    instances: impl IntoIterator<Item = InstanceState>,
) -> SoftwireState {
    let mut counters: BTreeMap<String, u64> = BTreeMap::new();
    let mut merged = BTreeMap::new();
    for instance in instances {
        for (name, value) in &instance.counters {
            *counters.entry(name.clone()).or_default() += value;
        }
        merged.insert(instance.worker_id, instance);
    }

    SoftwireState {
        discontinuity_time: discontinuity_time
            .format(DATE_TIME_FORMAT)
            .to_string(),
        counters,
        instances: merged,
    }
}
