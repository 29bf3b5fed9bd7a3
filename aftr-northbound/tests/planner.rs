//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use aftr_bindingtable::packing::{SoftwireKeyRecord, SoftwireRecord};
use aftr_bindingtable::{PortSet, Softwire};
use aftr_northbound::api::{Action, Verb};
use aftr_northbound::configuration::SoftwireConfig;
use aftr_northbound::error::Error;
use aftr_northbound::planner::{
    self, LWAFTR_APP, METHOD_ADD_SOFTWIRE, METHOD_REMOVE_SOFTWIRE,
    MutationArg,
};
use aftr_yang::path::DataPath;
use const_addrs::ip4;

fn softwire(ipv4: &str, psid: u16) -> Softwire {
    Softwire {
        ipv4: ipv4.parse().unwrap(),
        psid,
        b4_ipv6: "2001:db8::2".parse().unwrap(),
        br_address: "2001:db8::1".parse().unwrap(),
        port_set: Some(PortSet {
            psid_length: 4,
            shift: 12,
        }),
    }
}

fn config_with(softwires: &[Softwire]) -> SoftwireConfig {
    let mut config = SoftwireConfig::default();
    for softwire in softwires {
        config.binding_table.insert(softwire.clone()).unwrap();
    }
    config
}

fn softwire_list_path() -> DataPath {
    DataPath::parse("/softwire-config/binding-table/softwire").unwrap()
}

#[test]
fn test_add_managed_address_is_hot_patchable() {
    let old = config_with(&[softwire("192.0.2.1", 1)]);
    let entries = vec![softwire("192.0.2.1", 2), softwire("192.0.2.1", 3)];
    let mut new = old.clone();
    for entry in &entries {
        new.binding_table.insert(entry.clone()).unwrap();
    }

    let path = softwire_list_path();
    let arg = MutationArg::Softwires(&entries);
    assert!(!planner::requires_restart(&old, Verb::Add, &path, &arg));

    let plan = planner::plan(&old, &new, Verb::Add, &path, &arg)
        .unwrap()
        .unwrap();

    // One invoke per entry, then exactly one trailing commit.
    assert_eq!(plan.len(), 3);
    assert_eq!(plan.last(), Some(&Action::Commit));
    assert_eq!(
        plan.iter().filter(|action| **action == Action::Commit).count(),
        1
    );
    for (action, entry) in plan.iter().zip(&entries) {
        let Action::CallAppMethodWithBlob {
            target,
            method,
            blob,
        } = action
        else {
            panic!("expected an invoke action");
        };
        assert_eq!(target, LWAFTR_APP);
        assert_eq!(method, METHOD_ADD_SOFTWIRE);
        let record = SoftwireRecord::decode(blob).unwrap();
        assert_eq!(record.ipv4, entry.ipv4);
        assert_eq!(record.psid, entry.psid);
    }
}

#[test]
fn test_add_new_address_requires_restart() {
    let old = config_with(&[softwire("192.0.2.1", 1)]);
    // One entry of the batch introduces a brand-new managed address: the
    // whole batch takes the restart path.
    let entries = vec![softwire("192.0.2.1", 2), softwire("192.0.2.99", 1)];
    let mut new = old.clone();
    for entry in &entries {
        new.binding_table.insert(entry.clone()).unwrap();
    }

    let path = softwire_list_path();
    let arg = MutationArg::Softwires(&entries);
    assert!(planner::requires_restart(&old, Verb::Add, &path, &arg));
    assert_eq!(
        planner::plan(&old, &new, Verb::Add, &path, &arg).unwrap(),
        None
    );
}

#[test]
fn test_remove_is_hot_patchable() {
    let old = config_with(&[softwire("192.0.2.1", 7)]);
    let new = config_with(&[]);

    let path = DataPath::parse(
        "/softwire-config/binding-table/softwire[ipv4=192.0.2.1][psid=7]",
    )
    .unwrap();
    let arg = MutationArg::None;
    assert!(!planner::requires_restart(&old, Verb::Remove, &path, &arg));

    let plan = planner::plan(&old, &new, Verb::Remove, &path, &arg)
        .unwrap()
        .unwrap();
    assert_eq!(plan.len(), 2);
    assert_eq!(plan[1], Action::Commit);

    let Action::CallAppMethodWithBlob { method, blob, .. } = &plan[0] else {
        panic!("expected an invoke action");
    };
    assert_eq!(method, METHOD_REMOVE_SOFTWIRE);
    assert_eq!(
        SoftwireKeyRecord::decode(blob).unwrap(),
        SoftwireKeyRecord {
            ipv4: ip4!("192.0.2.1"),
            psid: 7,
        }
    );
}

#[test]
fn test_remove_unknown_key() {
    let old = config_with(&[]);
    let path = DataPath::parse(
        "/softwire-config/binding-table/softwire[ipv4=192.0.2.1][psid=7]",
    )
    .unwrap();
    assert!(matches!(
        planner::plan(&old, &old, Verb::Remove, &path, &MutationArg::None),
        Err(Error::UnsupportedPath(_))
    ));
}

#[test]
fn test_set_name_is_a_noop_plan() {
    let old = config_with(&[]);
    let path = DataPath::parse("/softwire-config/name").unwrap();
    let plan = planner::plan(
        &old,
        &old,
        Verb::Set,
        &path,
        &MutationArg::Scalar("br2"),
    )
    .unwrap();
    assert_eq!(plan, Some(vec![]));
}

#[test]
fn test_other_mutations_fall_through() {
    let old = config_with(&[]);
    let path = DataPath::parse(
        "/softwire-config/external-interface/error-rate-limiting/packets",
    )
    .unwrap();
    let plan = planner::plan(
        &old,
        &old,
        Verb::Set,
        &path,
        &MutationArg::Scalar("200"),
    )
    .unwrap();
    assert_eq!(plan, None);
}
