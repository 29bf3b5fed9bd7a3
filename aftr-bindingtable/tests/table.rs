//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use aftr_bindingtable::{BindingTable, PortSet, Softwire, TableError};
use const_addrs::{ip4, ip6};

fn softwire(ipv4: &str, psid: u16) -> Softwire {
    Softwire {
        ipv4: ipv4.parse().unwrap(),
        psid,
        b4_ipv6: ip6!("2001:db8::2"),
        br_address: ip6!("2001:db8::1"),
        port_set: Some(PortSet {
            psid_length: 6,
            shift: 10,
        }),
    }
}

#[test]
fn test_insert_and_lookup() {
    let mut table = BindingTable::new();
    table.insert(softwire("192.0.2.1", 1)).unwrap();
    table.insert(softwire("192.0.2.1", 2)).unwrap();
    table.insert(softwire("192.0.2.2", 1)).unwrap();

    assert_eq!(table.len(), 3);
    assert!(table.contains_key(&(ip4!("192.0.2.1"), 2)));
    assert!(!table.contains_key(&(ip4!("192.0.2.1"), 3)));
    assert_eq!(
        table.get(&(ip4!("192.0.2.2"), 1)).map(|sw| sw.psid),
        Some(1)
    );
}

#[test]
fn test_insert_duplicate_key() {
    let mut table = BindingTable::new();
    table.insert(softwire("192.0.2.1", 1)).unwrap();
    assert_eq!(
        table.insert(softwire("192.0.2.1", 1)),
        Err(TableError::DuplicateKey((ip4!("192.0.2.1"), 1)))
    );
    assert_eq!(table.len(), 1);
}

#[test]
fn test_insert_invalid_range() {
    let mut table = BindingTable::new();
    let mut sw = softwire("192.0.2.1", 1);
    sw.port_set = Some(PortSet {
        psid_length: 9,
        shift: 8,
    });
    assert_eq!(
        table.insert(sw),
        Err(TableError::InvalidRange(PortSet {
            psid_length: 9,
            shift: 8,
        }))
    );
    assert!(table.is_empty());
}

#[test]
fn test_managed_address_index() {
    let mut table = BindingTable::new();
    table.insert(softwire("192.0.2.1", 1)).unwrap();
    table.insert(softwire("192.0.2.2", 1)).unwrap();

    assert!(table.is_managed_ipv4(ip4!("192.0.2.1")));
    assert!(table.is_managed_ipv4(ip4!("192.0.2.2")));
    assert!(!table.is_managed_ipv4(ip4!("192.0.2.3")));

    // Adding another softwire for an already-managed address leaves the
    // membership test unchanged for every other address.
    table.insert(softwire("192.0.2.1", 2)).unwrap();
    assert!(table.is_managed_ipv4(ip4!("192.0.2.1")));
    assert!(table.is_managed_ipv4(ip4!("192.0.2.2")));
    assert!(!table.is_managed_ipv4(ip4!("192.0.2.3")));
}

#[test]
fn test_remove_updates_index() {
    let mut table = BindingTable::new();
    table.insert(softwire("192.0.2.1", 1)).unwrap();
    table.insert(softwire("192.0.2.1", 2)).unwrap();

    // The address stays managed while one softwire remains.
    assert!(table.remove(&(ip4!("192.0.2.1"), 1)).is_some());
    assert!(table.is_managed_ipv4(ip4!("192.0.2.1")));

    // The last removal drops the address from the index.
    assert!(table.remove(&(ip4!("192.0.2.1"), 2)).is_some());
    assert!(!table.is_managed_ipv4(ip4!("192.0.2.1")));

    assert!(table.remove(&(ip4!("192.0.2.1"), 2)).is_none());
}

#[test]
fn test_port_set_lookup() {
    let mut table = BindingTable::new();
    table.insert(softwire("192.0.2.1", 1)).unwrap();
    assert_eq!(
        table.port_set(ip4!("192.0.2.1")),
        Some(&PortSet {
            psid_length: 6,
            shift: 10,
        })
    );
    assert_eq!(table.port_set(ip4!("192.0.2.9")), None);
}
