//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use aftr_northbound::state::{
    self, CounterStore, InstanceState, StateReader,
};
use chrono::{TimeZone, Utc};
use maplit::btreemap;

struct TestStore(BTreeMap<u32, BTreeMap<String, u64>>);

impl CounterStore for TestStore {
    fn counters_for_pid(&self, worker_id: u32) -> BTreeMap<String, u64> {
        self.0.get(&worker_id).cloned().unwrap_or_default()
    }
}

#[test]
fn test_read_instance_state() {
    let store = TestStore(btreemap! {
        7 => btreemap! {
            "in-ipv4-packets".to_owned() => 10,
            "out-ipv6-packets".to_owned() => 3,
        },
    });
    let reader = StateReader::new(&store);

    let instance = reader.read(7);
    assert_eq!(instance.worker_id, 7);
    assert_eq!(instance.counters["in-ipv4-packets"], 10);

    // A worker with no published counters reads as empty, not as an error.
    assert!(reader.read(8).counters.is_empty());
}

#[test]
fn test_merge_sums_counters() {
    let discontinuity = Utc.with_ymd_and_hms(2025, 10, 3, 8, 30, 0).unwrap();
    let state = state::merge(
        discontinuity,
        [
            InstanceState {
                worker_id: 1,
                counters: btreemap! {
                    "in-ipv4-packets".to_owned() => 10,
                    "out-ipv6-packets".to_owned() => 1,
                },
            },
            InstanceState {
                worker_id: 2,
                counters: btreemap! {
                    "in-ipv4-packets".to_owned() => 5,
                    "drop-all-ipv4-iface-packets".to_owned() => 2,
                },
            },
        ],
    );

    assert_eq!(state.discontinuity_time, "2025-10-03T08:30:00Z");
    assert_eq!(state.counters["in-ipv4-packets"], 15);
    assert_eq!(state.counters["out-ipv6-packets"], 1);
    assert_eq!(state.counters["drop-all-ipv4-iface-packets"], 2);

    // Per-instance sub-trees are keyed by worker identity, not merged.
    assert_eq!(state.instances.len(), 2);
    assert_eq!(state.instances[&1].counters["in-ipv4-packets"], 10);
    assert_eq!(state.instances[&2].counters["in-ipv4-packets"], 5);
}

#[test]
fn test_merge_same_identity_overwrites() {
    let discontinuity = Utc.with_ymd_and_hms(2025, 10, 3, 8, 30, 0).unwrap();
    let state = state::merge(
        discontinuity,
        [
            InstanceState {
                worker_id: 1,
                counters: btreemap! { "in-ipv4-packets".to_owned() => 10 },
            },
            InstanceState {
                worker_id: 1,
                counters: btreemap! { "in-ipv4-packets".to_owned() => 12 },
            },
        ],
    );

    // The later tree replaces the earlier one wholesale.
    assert_eq!(state.instances.len(), 1);
    assert_eq!(state.instances[&1].counters["in-ipv4-packets"], 12);
}

#[test]
fn test_merge_empty() {
    let discontinuity = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let state = state::merge(discontinuity, []);
    assert_eq!(state.discontinuity_time, "2025-01-01T00:00:00Z");
    assert!(state.counters.is_empty());
    assert!(state.instances.is_empty());
}
