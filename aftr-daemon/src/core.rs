//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use aftr_bindingtable::text::parse_softwires;
use aftr_northbound::api::client::{
    GetConfigResponse, GetStateResponse, MutateResponse, Request,
};
use aftr_northbound::api::{Action, MutateValue, Verb};
use aftr_northbound::configuration::SoftwireConfig;
use aftr_northbound::error::Error;
use aftr_northbound::ietf::{IetfTranslator, SetValue};
use aftr_northbound::planner::{self, MutationArg};
use aftr_northbound::state::{self, SoftwireState, StateReader};
use aftr_yang::Dialect;
use aftr_yang::path::DataPath;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{Receiver, Sender, channel};
use tracing::{debug, instrument, trace, warn};

use crate::config::Config;
use crate::southbound::{WorkerCounters, WorkerMsg, WorkerTx, start_worker};

pub struct Manager {
    // Running native configuration.
    config: SoftwireConfig,
    // External-dialect translator.
    translator: IetfTranslator,
    // Last instant the counters stopped being comparable.
    discontinuity_time: DateTime<Utc>,
    // Forwarding workers.
    workers: Vec<WorkerTx>,
    // Counter snapshots published by the workers.
    counters: WorkerCounters,
    // Channel used to receive messages from the management clients.
    rx_clients: Receiver<Request>,
}

// ===== impl Manager =====

impl Manager {
    pub(crate) fn init(config: &Config) -> (Manager, Sender<Request>) {
        let (tx_clients, rx_clients) = channel(4);

        let workers = config
            .workers
            .iter()
            .map(|worker_id| start_worker(*worker_id))
            .collect();

        let manager = Manager {
            config: SoftwireConfig {
                name: Some(config.instance_name.clone()),
                ..Default::default()
            },
            translator: IetfTranslator::new(&config.instance_name),
            discontinuity_time: Utc::now(),
            workers,
            counters: WorkerCounters::default(),
            rx_clients,
        };
        (manager, tx_clients)
    }

    // Main event loop.
    #[instrument(skip_all, name = "manager")]
    pub(crate) async fn run(mut self, mut signal_rx: Receiver<()>) {
        loop {
            tokio::select! {
                Some(request) = self.rx_clients.recv() => {
                    self.process_client_msg(request);
                }
                _ = signal_rx.recv() => {
                    self.rx_clients.close();
                    self.workers.clear();
                    return;
                }
                else => break,
            }
        }
    }

    // Processes a message received from a management client.
    fn process_client_msg(&mut self, request: Request) {
        trace!(?request, "received client request");

        match request {
            Request::GetConfig(request) => {
                let response = match request.dialect {
                    Dialect::Native => {
                        GetConfigResponse::Native(self.config.clone())
                    }
                    Dialect::IetfSoftwireBr => GetConfigResponse::Ietf(
                        self.translator.get_config(&self.config),
                    ),
                };
                if let Some(responder) = request.responder {
                    let _ = responder.send(response);
                }
            }
            Request::GetState(request) => {
                let state = self.unified_state();
                let response = match request.dialect {
                    Dialect::Native => GetStateResponse::Native(state),
                    Dialect::IetfSoftwireBr => GetStateResponse::Ietf(
                        self.translator.get_state(&state, &self.config),
                    ),
                };
                if let Some(responder) = request.responder {
                    let _ = responder.send(response);
                }
            }
            Request::Mutate(request) => {
                let response = self.process_mutation(
                    request.dialect,
                    request.verb,
                    &request.path,
                    &request.value,
                );
                if let Err(error) = &response {
                    error.log();
                }
                if let Some(responder) = request.responder {
                    let _ = responder.send(response);
                }
            }
        }
    }

    // Evaluates one mutation in either dialect. External-dialect mutations
    // are first rewritten into native ones; each native mutation is then
    // applied and either hot-patched into the live forwarding table or
    // taken through the full-reconfiguration path.
    fn process_mutation(
        &mut self,
        dialect: Dialect,
        verb: Verb,
        path: &str,
        value: &MutateValue,
    ) -> Result<MutateResponse, Error> {
        let native_actions = match dialect {
            Dialect::Native => vec![native_action(verb, path, value)?],
            Dialect::IetfSoftwireBr => match verb {
                Verb::Set => {
                    let value = set_value(value)?;
                    self.translator.set_config(&self.config, path, value)?
                }
                Verb::Add => {
                    let MutateValue::IetfEntries(entries) = value else {
                        return Err(Error::InvalidValue(
                            "bulk add takes binding entries".to_owned(),
                        ));
                    };
                    self.translator.add_config(&self.config, path, entries)?
                }
                Verb::Remove => {
                    self.translator.remove_config(&self.config, path)?
                }
            },
        };

        // Multi-step mutations are not transactional: a failure partway
        // leaves the earlier steps applied and is surfaced to the
        // operator.
        let mut hot_patched = true;
        for action in &native_actions {
            hot_patched &= self.apply_native_action(action)?;
        }

        // Counters are no longer comparable across an accepted change.
        self.discontinuity_time = Utc::now();
        Ok(MutateResponse { hot_patched })
    }

    // Applies one native mutation: invalidate the composed view, update
    // the running configuration, then consult the planner. Returns whether
    // the mutation was hot-patched.
    fn apply_native_action(&mut self, action: &Action) -> Result<bool, Error> {
        let (verb, path, text) = match action {
            Action::Set { path, value, .. } => {
                (Verb::Set, path, value.as_deref())
            }
            Action::Add { path, value, .. } => {
                (Verb::Add, path, Some(value.as_str()))
            }
            Action::Remove { path, .. } => (Verb::Remove, path, None),
            Action::Commit | Action::CallAppMethodWithBlob { .. } => {
                return Err(Error::InvalidValue(
                    "not a configuration mutation".to_owned(),
                ));
            }
        };
        let path = DataPath::parse(path)?;

        let softwires = match verb {
            Verb::Add => parse_softwires(text.unwrap_or_default())?,
            _ => vec![],
        };
        let arg = match verb {
            Verb::Add => MutationArg::Softwires(&softwires),
            Verb::Set => {
                text.map_or(MutationArg::None, MutationArg::Scalar)
            }
            Verb::Remove => MutationArg::None,
        };

        self.translator.pre_update();

        let old = self.config.clone();
        match verb {
            Verb::Set => self.config.apply_set(&path, text)?,
            Verb::Add => self.config.apply_add(&path, softwires.clone())?,
            Verb::Remove => self.config.apply_remove(&path)?,
        }

        match planner::plan(&old, &self.config, verb, &path, &arg)? {
            Some(actions) => {
                debug!(%path, count = %actions.len(), "hot-patch plan");
                for action in actions {
                    self.dispatch(action);
                }
                Ok(true)
            }
            None => {
                warn!(%path, "change requires full reconfiguration");
                for worker in &self.workers {
                    worker
                        .send(WorkerMsg::Reconfigure(self.config.clone()));
                }
                Ok(false)
            }
        }
    }

    // Dispatches one plan action to every forwarding worker, in plan
    // order.
    fn dispatch(&self, action: Action) {
        for worker in &self.workers {
            worker.send(WorkerMsg::Action(action.clone()));
        }
    }

    // Aggregates the per-worker state trees into the unified native state.
    fn unified_state(&self) -> SoftwireState {
        let reader = StateReader::new(&self.counters);
        let instances =
            self.workers.iter().map(|worker| reader.read(worker.worker_id));
        state::merge(self.discontinuity_time, instances)
    }
}

// ===== helper functions =====

// Builds the native mutation action of a native-dialect client request.
fn native_action(
    verb: Verb,
    path: &str,
    value: &MutateValue,
) -> Result<Action, Error> {
    let dialect = Dialect::Native;
    let path = path.to_owned();
    match (verb, value) {
        (Verb::Set, MutateValue::Scalar(value)) => Ok(Action::Set {
            dialect,
            path,
            value: Some(value.clone()),
        }),
        (Verb::Set, MutateValue::None) => Ok(Action::Set {
            dialect,
            path,
            value: None,
        }),
        (Verb::Add, MutateValue::Scalar(text)) => Ok(Action::Add {
            dialect,
            path,
            value: text.clone(),
        }),
        (Verb::Add, MutateValue::NativeSoftwires(softwires)) => {
            Ok(Action::Add {
                dialect,
                path,
                value: aftr_bindingtable::text::format_softwires(softwires),
            })
        }
        (Verb::Remove, MutateValue::None) => {
            Ok(Action::Remove { dialect, path })
        }
        _ => Err(Error::InvalidValue(
            "mutation value doesn't match the verb".to_owned(),
        )),
    }
}

fn set_value(value: &MutateValue) -> Result<SetValue<'_>, Error> {
    match value {
        MutateValue::Scalar(value) => Ok(SetValue::Scalar(value)),
        MutateValue::IetfEntryPatch(patch) => {
            Ok(SetValue::EntryPatch(patch))
        }
        _ => Err(Error::InvalidValue(
            "set takes a scalar or an entry value".to_owned(),
        )),
    }
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use aftr_bindingtable::text::format_softwires;
    use aftr_bindingtable::{PortSet, Softwire};
    use aftr_northbound::ietf::{IetfBindingEntry, IetfPortSet};
    use const_addrs::{ip4, ip6};
    use maplit::btreemap;
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    use super::*;

    fn test_manager() -> (Manager, UnboundedReceiver<WorkerMsg>) {
        let (channel_tx, channel_rx) = unbounded_channel();
        let (_, rx_clients) = channel(4);
        let manager = Manager {
            config: SoftwireConfig {
                name: Some("br".to_owned()),
                ..Default::default()
            },
            translator: IetfTranslator::new("br"),
            discontinuity_time: Utc::now(),
            workers: vec![WorkerTx::new(1, channel_tx)],
            counters: WorkerCounters::default(),
            rx_clients,
        };
        (manager, channel_rx)
    }

    fn softwire(ipv4: &str, psid: u16) -> Softwire {
        Softwire {
            ipv4: ipv4.parse().unwrap(),
            psid,
            b4_ipv6: ip6!("2001:db8::2"),
            br_address: ip6!("2001:db8::1"),
            port_set: Some(PortSet {
                psid_length: 4,
                shift: 12,
            }),
        }
    }

    fn drain(rx: &mut UnboundedReceiver<WorkerMsg>) -> Vec<WorkerMsg> {
        let mut msgs = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            msgs.push(msg);
        }
        msgs
    }

    #[test]
    fn test_native_add_hot_patch() {
        let (mut manager, mut rx) = test_manager();
        manager
            .config
            .binding_table
            .insert(softwire("192.0.2.1", 1))
            .unwrap();

        let batch = [softwire("192.0.2.1", 2)];
        let response = manager
            .process_mutation(
                Dialect::Native,
                Verb::Add,
                "/softwire-config/binding-table/softwire",
                &MutateValue::Scalar(format_softwires(&batch)),
            )
            .unwrap();

        assert!(response.hot_patched);
        assert!(manager.config.binding_table.contains_key(&(
            ip4!("192.0.2.1"),
            2
        )));

        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 2);
        assert!(matches!(
            msgs[0],
            WorkerMsg::Action(Action::CallAppMethodWithBlob { .. })
        ));
        assert!(matches!(msgs[1], WorkerMsg::Action(Action::Commit)));
    }

    #[test]
    fn test_native_add_restart() {
        let (mut manager, mut rx) = test_manager();

        let batch = [softwire("192.0.2.1", 1)];
        let response = manager
            .process_mutation(
                Dialect::Native,
                Verb::Add,
                "/softwire-config/binding-table/softwire",
                &MutateValue::NativeSoftwires(batch.to_vec()),
            )
            .unwrap();

        // A brand-new managed address falls back to full reconfiguration.
        assert!(!response.hot_patched);
        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 1);
        assert!(matches!(msgs[0], WorkerMsg::Reconfigure(_)));
    }

    #[test]
    fn test_native_add_duplicate_key() {
        let (mut manager, mut rx) = test_manager();
        manager
            .config
            .binding_table
            .insert(softwire("192.0.2.1", 1))
            .unwrap();

        let batch = [softwire("192.0.2.1", 1)];
        let result = manager.process_mutation(
            Dialect::Native,
            Verb::Add,
            "/softwire-config/binding-table/softwire",
            &MutateValue::NativeSoftwires(batch.to_vec()),
        );

        assert_eq!(result, Err(Error::DuplicateKey((ip4!("192.0.2.1"), 1))));
        assert_eq!(manager.config.binding_table.len(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_ietf_icmp_rate_set() {
        let (mut manager, mut rx) = test_manager();

        let response = manager
            .process_mutation(
                Dialect::IetfSoftwireBr,
                Verb::Set,
                "/br-instances/binding/bind-instance[name=br]\
                 /icmp-policy/icmpv4-errors/icmpv4-rate",
                &MutateValue::Scalar("100".to_owned()),
            )
            .unwrap();

        assert!(!response.hot_patched);
        let erl = &manager.config.external_interface.error_rate_limiting;
        assert_eq!(erl.packets, 200);
        assert_eq!(erl.period, 2);
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn test_ietf_remove_entry() {
        let (mut manager, mut rx) = test_manager();
        manager
            .config
            .binding_table
            .insert(softwire("192.0.2.1", 7))
            .unwrap();

        let response = manager
            .process_mutation(
                Dialect::IetfSoftwireBr,
                Verb::Remove,
                "/br-instances/binding/bind-instance[name=br]\
                 /binding-table/binding-entry[binding-ipv6info=2001:db8::2]",
                &MutateValue::None,
            )
            .unwrap();

        assert!(response.hot_patched);
        assert!(manager.config.binding_table.is_empty());

        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 2);
        assert!(matches!(msgs[1], WorkerMsg::Action(Action::Commit)));
    }

    #[test]
    fn test_ietf_bulk_add() {
        let (mut manager, _rx) = test_manager();
        manager
            .config
            .binding_table
            .insert(softwire("192.0.2.1", 1))
            .unwrap();

        let entries = vec![IetfBindingEntry {
            binding_ipv6info: ip6!("2001:db8::9"),
            binding_ipv4_addr: ip4!("192.0.2.1"),
            br_ipv6_addr: ip6!("2001:db8::1"),
            port_set: IetfPortSet {
                psid_offset: 12,
                psid_len: 4,
                psid: 9,
            },
        }];
        let response = manager
            .process_mutation(
                Dialect::IetfSoftwireBr,
                Verb::Add,
                "/br-instances/binding/bind-instance[name=br]\
                 /binding-table/binding-entry",
                &MutateValue::IetfEntries(entries),
            )
            .unwrap();

        assert!(response.hot_patched);
        assert!(manager.config.binding_table.contains_key(&(
            ip4!("192.0.2.1"),
            9
        )));
    }

    #[test]
    fn test_state_aggregation() {
        let (mut manager, _rx) = test_manager();
        manager.counters.publish(
            1,
            btreemap! { "in-ipv4-packets".to_owned() => 42 },
        );

        let state = manager.unified_state();
        assert_eq!(state.counters["in-ipv4-packets"], 42);
        assert_eq!(state.instances[&1].counters["in-ipv4-packets"], 42);
    }

    #[test]
    fn test_discontinuity_reset_on_accepted_change() {
        let (mut manager, _rx) = test_manager();
        let before = manager.discontinuity_time;

        manager
            .process_mutation(
                Dialect::Native,
                Verb::Set,
                "/softwire-config/name",
                &MutateValue::Scalar("br2".to_owned()),
            )
            .unwrap();

        assert_eq!(manager.config.name.as_deref(), Some("br2"));
        assert!(manager.discontinuity_time >= before);
    }
}
