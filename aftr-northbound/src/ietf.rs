//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use aftr_bindingtable::text::format_softwires;
use aftr_bindingtable::{BindingTable, PortSet, Softwire, SoftwireKey};
use aftr_yang::Dialect;
use aftr_yang::path::DataPath;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::{Action, ActionPlan};
use crate::configuration::{
    SoftwireConfig, parse_leaf, paths, softwire_path,
};
use crate::error::Error;
use crate::state::SoftwireState;

// Counters translated name-for-name from the native state tree.
const COUNTER_MAP: [(&str, &str); 12] = [
    ("in-ipv4-bytes", "rcvd-ipv4-bytes"),
    ("in-ipv4-packets", "rcvd-ipv4-packets"),
    ("in-ipv6-bytes", "rcvd-ipv6-bytes"),
    ("in-ipv6-packets", "rcvd-ipv6-packets"),
    ("out-ipv4-bytes", "sent-ipv4-bytes"),
    ("out-ipv4-packets", "sent-ipv4-packets"),
    ("out-ipv6-bytes", "sent-ipv6-bytes"),
    ("out-ipv6-packets", "sent-ipv6-packets"),
    ("drop-all-ipv4-iface-bytes", "dropped-ipv4-bytes"),
    ("drop-all-ipv4-iface-packets", "dropped-ipv4-packets"),
    ("drop-all-ipv6-iface-bytes", "dropped-ipv6-bytes"),
    ("drop-all-ipv6-iface-packets", "dropped-ipv6-packets"),
];

// Counters the external dialect requires but the forwarding engine doesn't
// track. Reported as a fixed placeholder.
const PLACEHOLDER_COUNTERS: [&str; 2] =
    ["dropped-icmpv4-bytes", "dropped-icmpv4-packets"];
const PLACEHOLDER_VALUE: u64 = 0;

/// The external-dialect view of one binding.
///
/// Indexed by the B4 IPv6 address, unlike the native table which is keyed
/// by `(ipv4, psid)` and therefore admits duplicate B4 addresses.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct IetfBindingEntry {
    pub binding_ipv6info: Ipv6Addr,
    pub binding_ipv4_addr: Ipv4Addr,
    pub br_ipv6_addr: Ipv6Addr,
    pub port_set: IetfPortSet,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct IetfPortSet {
    pub psid_offset: u8,
    pub psid_len: u8,
    pub psid: u16,
}

/// A partial update of one external binding entry. Unset fields are
/// retained from the existing entry.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BindingEntryPatch {
    pub binding_ipv6info: Option<Ipv6Addr>,
    pub binding_ipv4_addr: Option<Ipv4Addr>,
    pub br_ipv6_addr: Option<Ipv6Addr>,
    pub psid_offset: Option<u8>,
    pub psid_len: Option<u8>,
    pub psid: Option<u16>,
}

/// The composed external configuration view.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct IetfConfig {
    pub instance_name: String,
    pub binding_table: BTreeMap<Ipv6Addr, IetfBindingEntry>,
}

/// One composition result. `dropped_duplicates` lists the native softwires
/// that could not be represented because another entry already claimed
/// their B4 address; the external view is incomplete whenever it is
/// non-empty.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ComposedConfig {
    pub config: IetfConfig,
    pub dropped_duplicates: Vec<SoftwireKey>,
}

/// The external-dialect state view.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct IetfState {
    pub discontinuity_time: String,
    pub traffic_stat: BTreeMap<String, u64>,
    pub icmpv4_error_rate: u64,
    pub icmpv6_error_rate: u64,
}

/// Bidirectional translator between the native and external dialects.
///
/// Holds the one cached composed view; `pre_update` is the sole
/// invalidation trigger. Callers sharing a translator across threads must
/// serialize access so a mutation-and-invalidate sequence never interleaves
/// with a composition in progress.
#[derive(Debug)]
pub struct IetfTranslator {
    instance_name: String,
    cache: Option<Arc<ComposedConfig>>,
}

// Recognized external path shapes. Anything else is unsupported.
#[derive(Debug, Eq, PartialEq)]
enum PathShape<'a> {
    InstanceLeaf(&'a str),
    IcmpPolicyLeaf { v6: bool, leaf: &'a str },
    BindingEntryList,
    BindingEntry(Ipv6Addr),
    BindingEntryLeaf(Ipv6Addr, &'a str),
    PortSetLeaf(Ipv6Addr, &'a str),
}

/// A `set_config` payload.
#[derive(Clone, Debug)]
pub enum SetValue<'a> {
    Scalar(&'a str),
    EntryPatch(&'a BindingEntryPatch),
}

// ===== impl IetfTranslator =====

impl IetfTranslator {
    pub fn new(instance_name: &str) -> IetfTranslator {
        IetfTranslator {
            instance_name: instance_name.to_owned(),
            cache: None,
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Composes the external configuration view, reusing the cached result
    /// until the next `pre_update` notification.
    ///
    /// The external binding table is keyed by B4 address; native softwires
    /// whose B4 address is already taken are dropped (first occurrence
    /// wins) and reported through `dropped_duplicates` plus one loud
    /// diagnostic per composition. This translation is lossy by design.
    pub fn get_config(
        &mut self,
        native: &SoftwireConfig,
    ) -> Arc<ComposedConfig> {
        if let Some(cached) = &self.cache {
            return cached.clone();
        }

        let mut binding_table = BTreeMap::new();
        let mut dropped_duplicates = Vec::new();
        for softwire in native.binding_table.iter() {
            match binding_table.entry(softwire.b4_ipv6) {
                Entry::Vacant(entry) => {
                    entry.insert(ietf_entry_from_softwire(softwire));
                }
                Entry::Occupied(_) => {
                    dropped_duplicates.push(softwire.key());
                }
            }
        }
        if !dropped_duplicates.is_empty() {
            warn!(
                dropped = %dropped_duplicates
                    .iter()
                    .map(|(ipv4, psid)| format!("{ipv4}/{psid}"))
                    .join(" "),
                "binding table is incomplete in the external view: \
                 duplicate B4 addresses"
            );
        }

        let instance_name = native
            .name
            .clone()
            .unwrap_or_else(|| self.instance_name.clone());
        let composed = Arc::new(ComposedConfig {
            config: IetfConfig {
                instance_name,
                binding_table,
            },
            dropped_duplicates,
        });
        self.cache = Some(composed.clone());
        composed
    }

    /// Maps aggregated native state into the external dialect. Counter
    /// names translate through a static table; the ICMP error rates are
    /// computed from the native rate-limiting configuration.
    pub fn get_state(
        &self,
        state: &SoftwireState,
        native: &SoftwireConfig,
    ) -> IetfState {
        let mut traffic_stat = BTreeMap::new();
        for (native_name, ietf_name) in COUNTER_MAP {
            let value = state.counters.get(native_name).copied().unwrap_or(0);
            traffic_stat.insert(ietf_name.to_owned(), value);
        }
        for name in PLACEHOLDER_COUNTERS {
            traffic_stat.insert(name.to_owned(), PLACEHOLDER_VALUE);
        }

        IetfState {
            discontinuity_time: state.discontinuity_time.clone(),
            traffic_stat,
            icmpv4_error_rate: error_rate(
                &native.external_interface.error_rate_limiting,
            ),
            icmpv6_error_rate: error_rate(
                &native.internal_interface.error_rate_limiting,
            ),
        }
    }

    /// Rewrites an external `set` into native mutations.
    pub fn set_config(
        &mut self,
        native: &SoftwireConfig,
        path: &str,
        value: SetValue<'_>,
    ) -> Result<ActionPlan, Error> {
        let path = DataPath::parse(path)?;
        match self.recognize(&path)? {
            PathShape::InstanceLeaf("name") => {
                let value = scalar(&path, value)?;
                Ok(vec![set_action(paths::NAME, value)])
            }
            PathShape::InstanceLeaf(leaf) => Err(Error::UnrecognizedLeaf(
                "bind-instance".to_owned(),
                leaf.to_owned(),
            )),
            PathShape::IcmpPolicyLeaf { v6: false, leaf } => {
                let value = scalar(&path, value)?;
                match leaf {
                    // The external rate has denominator-2 period
                    // semantics: decompose into the native packets/period
                    // pair.
                    "icmpv4-rate" => {
                        let rate: u64 = parse_leaf(value)?;
                        Ok(vec![
                            set_action(
                                paths::EXTERNAL_RATE_PACKETS,
                                &(rate * 2).to_string(),
                            ),
                            set_action(paths::EXTERNAL_RATE_PERIOD, "2"),
                        ])
                    }
                    "allow-incoming-icmp" => {
                        let allow: bool = parse_leaf(value)?;
                        Ok(vec![set_action(
                            paths::EXTERNAL_ALLOW_INCOMING_ICMP,
                            &allow.to_string(),
                        )])
                    }
                    _ => Err(Error::UnrecognizedLeaf(
                        "icmpv4-errors".to_owned(),
                        leaf.to_owned(),
                    )),
                }
            }
            PathShape::IcmpPolicyLeaf { v6: true, leaf } => {
                let value = scalar(&path, value)?;
                match leaf {
                    "icmpv6-rate" => {
                        let rate: u64 = parse_leaf(value)?;
                        Ok(vec![
                            set_action(
                                paths::INTERNAL_RATE_PACKETS,
                                &(rate * 2).to_string(),
                            ),
                            set_action(paths::INTERNAL_RATE_PERIOD, "2"),
                        ])
                    }
                    "generate-icmpv6-errors" => {
                        let generate: bool = parse_leaf(value)?;
                        Ok(vec![set_action(
                            paths::INTERNAL_GENERATE_ICMP_ERRORS,
                            &generate.to_string(),
                        )])
                    }
                    _ => Err(Error::UnrecognizedLeaf(
                        "icmpv6-errors".to_owned(),
                        leaf.to_owned(),
                    )),
                }
            }
            PathShape::BindingEntry(b4) => {
                let SetValue::EntryPatch(patch) = value else {
                    return Err(Error::InvalidValue(
                        "binding-entry writes take an entry value".to_owned(),
                    ));
                };
                self.replace_entry(native, &path, b4, patch)
            }
            PathShape::BindingEntryLeaf(b4, leaf) => {
                let value = scalar(&path, value)?;
                let mut patch = BindingEntryPatch::default();
                match leaf {
                    "binding-ipv6info" => {
                        patch.binding_ipv6info = Some(parse_leaf(value)?)
                    }
                    "binding-ipv4-addr" => {
                        patch.binding_ipv4_addr = Some(parse_leaf(value)?)
                    }
                    "br-ipv6-addr" => {
                        patch.br_ipv6_addr = Some(parse_leaf(value)?)
                    }
                    _ => {
                        return Err(Error::UnrecognizedLeaf(
                            "binding-entry".to_owned(),
                            leaf.to_owned(),
                        ));
                    }
                }
                self.replace_entry(native, &path, b4, &patch)
            }
            PathShape::PortSetLeaf(b4, leaf) => {
                let value = scalar(&path, value)?;
                let mut patch = BindingEntryPatch::default();
                match leaf {
                    "psid-offset" => {
                        patch.psid_offset = Some(parse_leaf(value)?)
                    }
                    "psid-len" => patch.psid_len = Some(parse_leaf(value)?),
                    "psid" => patch.psid = Some(parse_leaf(value)?),
                    _ => {
                        return Err(Error::UnrecognizedLeaf(
                            "port-set".to_owned(),
                            leaf.to_owned(),
                        ));
                    }
                }
                self.replace_entry(native, &path, b4, &patch)
            }
            PathShape::BindingEntryList => {
                Err(Error::UnsupportedPath(path.to_string()))
            }
        }
    }

    /// Rewrites an external bulk add of binding entries into one native
    /// add. The whole batch is validated before any action is emitted.
    pub fn add_config(
        &mut self,
        native: &SoftwireConfig,
        path: &str,
        entries: &[IetfBindingEntry],
    ) -> Result<ActionPlan, Error> {
        let path = DataPath::parse(path)?;
        if self.recognize(&path)? != PathShape::BindingEntryList {
            return Err(Error::UnsupportedPath(path.to_string()));
        }

        let mut softwires = Vec::with_capacity(entries.len());
        let mut batch_keys = std::collections::BTreeSet::new();
        for entry in entries {
            let softwire = softwire_from_ietf_entry(entry)?;
            let key = softwire.key();
            if native.binding_table.contains_key(&key)
                || !batch_keys.insert(key)
            {
                return Err(Error::DuplicateKey(key));
            }
            softwires.push(softwire);
        }

        Ok(vec![Action::Add {
            dialect: Dialect::Native,
            path: paths::SOFTWIRE.to_owned(),
            value: format_softwires(&softwires),
        }])
    }

    /// Rewrites an external remove of one fully-keyed binding entry into a
    /// native remove.
    pub fn remove_config(
        &mut self,
        native: &SoftwireConfig,
        path: &str,
    ) -> Result<ActionPlan, Error> {
        let path = DataPath::parse(path)?;
        let PathShape::BindingEntry(b4) = self.recognize(&path)? else {
            return Err(Error::UnsupportedPath(path.to_string()));
        };

        let composed = self.get_config(native);
        let entry = composed
            .config
            .binding_table
            .get(&b4)
            .ok_or_else(|| Error::UnsupportedPath(path.to_string()))?;
        let key = (entry.binding_ipv4_addr, entry.port_set.psid);

        Ok(vec![Action::Remove {
            dialect: Dialect::Native,
            path: softwire_path(&key),
        }])
    }

    /// Notification hook invoked before any native mutation is applied.
    /// Unconditionally drops the cached composed view; there is no other
    /// invalidation trigger.
    pub fn pre_update(&mut self) {
        self.cache = None;
    }

    // Classifies an external path against the closed set of recognized
    // shapes, validating the addressed instance along the way.
    fn recognize<'a>(
        &self,
        path: &'a DataPath,
    ) -> Result<PathShape<'a>, Error> {
        let components = path.components();
        let names =
            components.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();

        if names.len() < 4
            || names[..3] != ["br-instances", "binding", "bind-instance"]
        {
            return Err(Error::UnsupportedPath(path.to_string()));
        }
        let requested = path
            .query_value(2, "name")
            .ok_or_else(|| Error::UnsupportedPath(path.to_string()))?;
        if requested != self.instance_name {
            return Err(Error::InstanceMismatch(
                requested.to_owned(),
                self.instance_name.clone(),
            ));
        }

        match &names[3..] {
            &[leaf] => Ok(PathShape::InstanceLeaf(leaf)),
            &["icmp-policy", family, leaf] => {
                let v6 = match family {
                    "icmpv4-errors" => false,
                    "icmpv6-errors" => true,
                    _ => {
                        return Err(Error::UnsupportedPath(path.to_string()));
                    }
                };
                Ok(PathShape::IcmpPolicyLeaf { v6, leaf })
            }
            &["binding-table", "binding-entry"] => {
                match entry_query(path)? {
                    Some(b4) => Ok(PathShape::BindingEntry(b4)),
                    None => Ok(PathShape::BindingEntryList),
                }
            }
            &["binding-table", "binding-entry", "port-set", leaf] => {
                let b4 = entry_query(path)?.ok_or_else(|| {
                    Error::UnsupportedPath(path.to_string())
                })?;
                Ok(PathShape::PortSetLeaf(b4, leaf))
            }
            &["binding-table", "binding-entry", leaf] => {
                let b4 = entry_query(path)?.ok_or_else(|| {
                    Error::UnsupportedPath(path.to_string())
                })?;
                Ok(PathShape::BindingEntryLeaf(b4, leaf))
            }
            _ => Err(Error::UnsupportedPath(path.to_string())),
        }
    }

    // Entry-level writes follow remove-old-then-add-new: the existing
    // entry comes from the cached composed view, unspecified fields are
    // retained, the old native entry is removed by key and the merged
    // replacement added.
    fn replace_entry(
        &mut self,
        native: &SoftwireConfig,
        path: &DataPath,
        b4: Ipv6Addr,
        patch: &BindingEntryPatch,
    ) -> Result<ActionPlan, Error> {
        let composed = self.get_config(native);
        let old = composed
            .config
            .binding_table
            .get(&b4)
            .ok_or_else(|| Error::UnsupportedPath(path.to_string()))?;

        let new = IetfBindingEntry {
            binding_ipv6info: patch
                .binding_ipv6info
                .unwrap_or(old.binding_ipv6info),
            binding_ipv4_addr: patch
                .binding_ipv4_addr
                .unwrap_or(old.binding_ipv4_addr),
            br_ipv6_addr: patch.br_ipv6_addr.unwrap_or(old.br_ipv6_addr),
            port_set: IetfPortSet {
                psid_offset: patch
                    .psid_offset
                    .unwrap_or(old.port_set.psid_offset),
                psid_len: patch.psid_len.unwrap_or(old.port_set.psid_len),
                psid: patch.psid.unwrap_or(old.port_set.psid),
            },
        };
        let new = softwire_from_ietf_entry(&new)?;

        let old_key = (old.binding_ipv4_addr, old.port_set.psid);
        if new.key() != old_key
            && native.binding_table.contains_key(&new.key())
        {
            return Err(Error::DuplicateKey(new.key()));
        }

        Ok(vec![
            Action::Remove {
                dialect: Dialect::Native,
                path: softwire_path(&old_key),
            },
            Action::Add {
                dialect: Dialect::Native,
                path: paths::SOFTWIRE.to_owned(),
                value: new.to_config_text(),
            },
        ])
    }
}

// ===== global functions =====

/// Converts a whole external binding table back into a native one. Used by
/// the full-reconfiguration path and round-trip tests.
pub fn native_binding_table_from_ietf(
    table: &BTreeMap<Ipv6Addr, IetfBindingEntry>,
) -> Result<BindingTable, Error> {
    let mut native = BindingTable::new();
    for entry in table.values() {
        native.insert(softwire_from_ietf_entry(entry)?)?;
    }
    Ok(native)
}

fn ietf_entry_from_softwire(softwire: &Softwire) -> IetfBindingEntry {
    let port_set = softwire.port_set.unwrap_or(PortSet {
        psid_length: 0,
        shift: 0,
    });
    IetfBindingEntry {
        binding_ipv6info: softwire.b4_ipv6,
        binding_ipv4_addr: softwire.ipv4,
        br_ipv6_addr: softwire.br_address,
        port_set: IetfPortSet {
            psid_offset: port_set.shift,
            psid_len: port_set.psid_length,
            psid: softwire.psid,
        },
    }
}

fn softwire_from_ietf_entry(
    entry: &IetfBindingEntry,
) -> Result<Softwire, Error> {
    let port_set = PortSet {
        psid_length: entry.port_set.psid_len,
        shift: entry.port_set.psid_offset,
    };
    if !port_set.is_valid() {
        return Err(Error::InvalidRange(port_set));
    }
    Ok(Softwire {
        ipv4: entry.binding_ipv4_addr,
        psid: entry.port_set.psid,
        b4_ipv6: entry.binding_ipv6info,
        br_address: entry.br_ipv6_addr,
        port_set: Some(port_set),
    })
}

// Extracts the B4 address key of a binding-entry component, if present.
fn entry_query(path: &DataPath) -> Result<Option<Ipv6Addr>, Error> {
    match path.query_value(4, "binding-ipv6info") {
        Some(value) => Ok(Some(parse_leaf(value)?)),
        None => Ok(None),
    }
}

fn error_rate(erl: &crate::configuration::ErrorRateLimiting) -> u64 {
    match erl.period {
        0 => 0,
        period => erl.packets / period as u64,
    }
}

fn set_action(path: &str, value: &str) -> Action {
    Action::Set {
        dialect: Dialect::Native,
        path: path.to_owned(),
        value: Some(value.to_owned()),
    }
}

fn scalar<'a>(
    path: &DataPath,
    value: SetValue<'a>,
) -> Result<&'a str, Error> {
    match value {
        SetValue::Scalar(value) => Ok(value),
        SetValue::EntryPatch(_) => {
            Err(Error::InvalidValue(format!("{path} takes a scalar value")))
        }
    }
}
