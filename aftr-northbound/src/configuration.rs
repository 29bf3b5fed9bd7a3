//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use aftr_bindingtable::{BindingTable, Softwire, SoftwireKey};
use aftr_yang::path::DataPath;
use serde::{Deserialize, Serialize};

use crate::error::Error;

// Native schema paths recognized by the typed configuration model.
pub mod paths {
    pub const NAME: &str = "/softwire-config/name";
    pub const SOFTWIRE: &str = "/softwire-config/binding-table/softwire";
    pub const EXTERNAL_RATE_PACKETS: &str =
        "/softwire-config/external-interface/error-rate-limiting/packets";
    pub const EXTERNAL_RATE_PERIOD: &str =
        "/softwire-config/external-interface/error-rate-limiting/period";
    pub const EXTERNAL_ALLOW_INCOMING_ICMP: &str =
        "/softwire-config/external-interface/allow-incoming-icmp";
    pub const INTERNAL_RATE_PACKETS: &str =
        "/softwire-config/internal-interface/error-rate-limiting/packets";
    pub const INTERNAL_RATE_PERIOD: &str =
        "/softwire-config/internal-interface/error-rate-limiting/period";
    pub const INTERNAL_GENERATE_ICMP_ERRORS: &str =
        "/softwire-config/internal-interface/generate-icmp-errors";

    pub const NAME_PATTERN: [&str; 2] = ["softwire-config", "name"];
    pub const SOFTWIRE_PATTERN: [&str; 3] =
        ["softwire-config", "binding-table", "softwire"];
}

/// The native running configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct SoftwireConfig {
    pub name: Option<String>,
    pub external_interface: InterfaceCfg,
    pub internal_interface: InterfaceCfg,
    pub binding_table: BindingTable,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct InterfaceCfg {
    pub allow_incoming_icmp: bool,
    pub generate_icmp_errors: bool,
    pub error_rate_limiting: ErrorRateLimiting,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ErrorRateLimiting {
    pub packets: u64,
    pub period: u32,
}

// ===== impl SoftwireConfig =====

impl SoftwireConfig {
    /// Applies a native `set` mutation to the typed model. Only the leaves
    /// the typed model knows are handled here; everything else belongs to
    /// the generic schema-driven mechanism.
    pub fn apply_set(
        &mut self,
        path: &DataPath,
        value: Option<&str>,
    ) -> Result<(), Error> {
        if path.matches(&paths::NAME_PATTERN) {
            self.name = value.map(str::to_owned);
            return Ok(());
        }

        let value = value
            .ok_or_else(|| Error::InvalidValue("missing value".to_owned()))?;
        if path.matches(&[
            "softwire-config",
            "external-interface",
            "error-rate-limiting",
            "packets",
        ]) {
            self.external_interface.error_rate_limiting.packets =
                parse_leaf(value)?;
        } else if path.matches(&[
            "softwire-config",
            "external-interface",
            "error-rate-limiting",
            "period",
        ]) {
            self.external_interface.error_rate_limiting.period =
                parse_leaf(value)?;
        } else if path.matches(&[
            "softwire-config",
            "internal-interface",
            "error-rate-limiting",
            "packets",
        ]) {
            self.internal_interface.error_rate_limiting.packets =
                parse_leaf(value)?;
        } else if path.matches(&[
            "softwire-config",
            "internal-interface",
            "error-rate-limiting",
            "period",
        ]) {
            self.internal_interface.error_rate_limiting.period =
                parse_leaf(value)?;
        } else if path.matches(&[
            "softwire-config",
            "external-interface",
            "allow-incoming-icmp",
        ]) {
            self.external_interface.allow_incoming_icmp = parse_leaf(value)?;
        } else if path.matches(&[
            "softwire-config",
            "internal-interface",
            "generate-icmp-errors",
        ]) {
            self.internal_interface.generate_icmp_errors = parse_leaf(value)?;
        } else {
            return Err(Error::UnsupportedPath(path.to_string()));
        }
        Ok(())
    }

    /// Applies a native `add` of softwires to the binding table. The whole
    /// batch is validated up front; nothing is inserted on error.
    pub fn apply_add(
        &mut self,
        path: &DataPath,
        softwires: Vec<Softwire>,
    ) -> Result<(), Error> {
        if !path.matches(&paths::SOFTWIRE_PATTERN) {
            return Err(Error::UnsupportedPath(path.to_string()));
        }

        let mut batch_keys = std::collections::BTreeSet::new();
        for softwire in &softwires {
            if let Some(port_set) = &softwire.port_set
                && !port_set.is_valid()
            {
                return Err(Error::InvalidRange(*port_set));
            }
            let key = softwire.key();
            if self.binding_table.contains_key(&key)
                || !batch_keys.insert(key)
            {
                return Err(Error::DuplicateKey(key));
            }
        }

        for softwire in softwires {
            self.binding_table.insert(softwire)?;
        }
        Ok(())
    }

    /// Applies a native `remove` of one fully-keyed softwire.
    pub fn apply_remove(&mut self, path: &DataPath) -> Result<(), Error> {
        if !path.matches(&paths::SOFTWIRE_PATTERN) {
            return Err(Error::UnsupportedPath(path.to_string()));
        }
        let key = softwire_key_from_query(path, 2)?;
        self.binding_table
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| Error::UnsupportedPath(path.to_string()))
    }
}

// ===== configuration defaults =====

impl Default for InterfaceCfg {
    fn default() -> InterfaceCfg {
        InterfaceCfg {
            allow_incoming_icmp: true,
            generate_icmp_errors: true,
            error_rate_limiting: Default::default(),
        }
    }
}

impl Default for ErrorRateLimiting {
    fn default() -> ErrorRateLimiting {
        ErrorRateLimiting {
            packets: 0,
            period: 2,
        }
    }
}

// ===== global functions =====

/// Extracts the `(ipv4, psid)` key from the list query of the component at
/// `index`.
pub fn softwire_key_from_query(
    path: &DataPath,
    index: usize,
) -> Result<SoftwireKey, Error> {
    let ipv4 = path
        .query_value(index, "ipv4")
        .ok_or_else(|| Error::UnsupportedPath(path.to_string()))?;
    let psid = path
        .query_value(index, "psid")
        .ok_or_else(|| Error::UnsupportedPath(path.to_string()))?;
    Ok((parse_leaf(ipv4)?, parse_leaf(psid)?))
}

/// Renders the fully-keyed native path of one softwire.
pub fn softwire_path(key: &SoftwireKey) -> String {
    format!("{}[ipv4={}][psid={}]", paths::SOFTWIRE, key.0, key.1)
}

pub(crate) fn parse_leaf<T>(value: &str) -> Result<T, Error>
where
    T: std::str::FromStr,
{
    value
        .parse()
        .map_err(|_| Error::InvalidValue(value.to_owned()))
}
