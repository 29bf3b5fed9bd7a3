//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod packing;
pub mod text;

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

// Type aliases.
pub type SoftwireKey = (Ipv4Addr, u16);

/// PSID parameters restricting the 16-bit port space of a shared IPv4
/// address.
///
/// `psid_length` bits of every port number carry the PSID and `shift` bits
/// below them are reserved, so `psid_length + shift` can never exceed 16.
/// `shift` is serialized as `reserved-ports-bit-count` in the native text
/// format.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PortSet {
    pub psid_length: u8,
    pub shift: u8,
}

/// One CGN binding: maps an IPv4 address and PSID to the customer-side B4
/// tunnel endpoint and the border-relay address serving it.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Softwire {
    pub ipv4: Ipv4Addr,
    pub psid: u16,
    pub b4_ipv6: Ipv6Addr,
    pub br_address: Ipv6Addr,
    pub port_set: Option<PortSet>,
}

/// The authoritative softwire collection of one instance.
///
/// Next to the entries themselves the table maintains the managed-address
/// index: the PSID parameters of every IPv4 address covered by at least one
/// softwire. The forwarding engine keeps a structural lookup table keyed by
/// that index, so whether an address is already managed decides hot-patch
/// eligibility.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct BindingTable {
    softwires: BTreeMap<SoftwireKey, Softwire>,
    psid_map: BTreeMap<Ipv4Addr, PortSet>,
}

// Binding table errors.
#[derive(Debug, Eq, PartialEq)]
pub enum TableError {
    DuplicateKey(SoftwireKey),
    InvalidRange(PortSet),
}

// ===== impl PortSet =====

impl PortSet {
    pub const PORT_BITS: u16 = 16;

    pub fn is_valid(&self) -> bool {
        self.psid_length as u16 + self.shift as u16 <= Self::PORT_BITS
    }
}

// ===== impl Softwire =====

impl Softwire {
    pub fn key(&self) -> SoftwireKey {
        (self.ipv4, self.psid)
    }
}

// ===== impl BindingTable =====

impl BindingTable {
    pub fn new() -> BindingTable {
        Default::default()
    }

    /// Inserts a softwire, rejecting duplicate `(ipv4, psid)` keys and
    /// out-of-range PSID parameters. The first softwire of an address also
    /// registers the address in the managed-address index.
    pub fn insert(&mut self, softwire: Softwire) -> Result<(), TableError> {
        if let Some(port_set) = &softwire.port_set
            && !port_set.is_valid()
        {
            return Err(TableError::InvalidRange(*port_set));
        }

        let key = softwire.key();
        if self.softwires.contains_key(&key) {
            return Err(TableError::DuplicateKey(key));
        }

        if let Some(port_set) = &softwire.port_set {
            self.psid_map.entry(softwire.ipv4).or_insert(*port_set);
        }
        self.softwires.insert(key, softwire);
        Ok(())
    }

    /// Removes a softwire by key. The address leaves the managed-address
    /// index once its last softwire is gone.
    pub fn remove(&mut self, key: &SoftwireKey) -> Option<Softwire> {
        let softwire = self.softwires.remove(key)?;
        if !self.softwires.keys().any(|(ipv4, _)| *ipv4 == key.0) {
            self.psid_map.remove(&key.0);
        }
        Some(softwire)
    }

    pub fn get(&self, key: &SoftwireKey) -> Option<&Softwire> {
        self.softwires.get(key)
    }

    pub fn contains_key(&self, key: &SoftwireKey) -> bool {
        self.softwires.contains_key(key)
    }

    /// Membership test of the managed-address index.
    pub fn is_managed_ipv4(&self, addr: Ipv4Addr) -> bool {
        self.psid_map.contains_key(&addr)
    }

    pub fn port_set(&self, addr: Ipv4Addr) -> Option<&PortSet> {
        self.psid_map.get(&addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Softwire> + '_ {
        self.softwires.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SoftwireKey> + '_ {
        self.softwires.keys()
    }

    pub fn len(&self) -> usize {
        self.softwires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.softwires.is_empty()
    }
}

// ===== impl TableError =====

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableError::DuplicateKey((ipv4, psid)) => {
                write!(f, "duplicate softwire key (ipv4 {ipv4}, psid {psid})")
            }
            TableError::InvalidRange(port_set) => {
                write!(
                    f,
                    "psid-length {} plus reserved bits {} exceeds the 16-bit \
                     port space",
                    port_set.psid_length, port_set.shift
                )
            }
        }
    }
}

impl std::error::Error for TableError {}
