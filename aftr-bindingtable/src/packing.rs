//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::{PortSet, Softwire, SoftwireKey};

// Type aliases.
pub type DecodeResult<T> = Result<T, DecodeError>;

//
// Softwire Record Format.
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                          IPv4 Address                         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |             PSID              |           (reserved)          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +                                                               +
// |                        B4 IPv6 Address                        |
// +                                                               +
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +                                                               +
// |                        BR IPv6 Address                        |
// +                                                               +
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct SoftwireRecord {
    pub ipv4: Ipv4Addr,
    pub psid: u16,
    pub b4_ipv6: Ipv6Addr,
    pub br_address: Ipv6Addr,
}

//
// Softwire Key Record Format.
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                          IPv4 Address                         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |             PSID              |           (reserved)          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct SoftwireKeyRecord {
    pub ipv4: Ipv4Addr,
    pub psid: u16,
}

//
// PSID-Map Record Format.
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                          IPv4 Address                         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |          PSID Length          |             Shift             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PsidMapRecord {
    pub ipv4: Ipv4Addr,
    pub psid_length: u8,
    pub shift: u8,
}

/// The binary record pair the forwarding table accepts for one softwire.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PackedSoftwire {
    pub softwire: SoftwireRecord,
    pub psid_map: PsidMapRecord,
}

#[derive(Debug, Eq, PartialEq)]
pub enum PackError {
    MissingPortSet(SoftwireKey),
}

#[derive(Debug, Eq, PartialEq)]
pub enum DecodeError {
    InvalidLength(usize),
}

// ===== impl SoftwireRecord =====

impl SoftwireRecord {
    pub const LENGTH: usize = 40;

    // Encodes the softwire record into a bytes buffer.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::LENGTH);
        buf.put_u32(self.ipv4.into());
        buf.put_u16(self.psid);
        buf.put_u16(0);
        buf.put_slice(&self.b4_ipv6.octets());
        buf.put_slice(&self.br_address.octets());
        buf
    }

    // Decodes the softwire record from a bytes buffer.
    pub fn decode(data: &[u8]) -> DecodeResult<SoftwireRecord> {
        if data.len() != Self::LENGTH {
            return Err(DecodeError::InvalidLength(data.len()));
        }

        let mut buf = Bytes::copy_from_slice(data);
        let ipv4 = Ipv4Addr::from(buf.get_u32());
        let psid = buf.get_u16();
        let _ = buf.get_u16();
        let b4_ipv6 = Ipv6Addr::from(buf.get_u128());
        let br_address = Ipv6Addr::from(buf.get_u128());

        Ok(SoftwireRecord {
            ipv4,
            psid,
            b4_ipv6,
            br_address,
        })
    }
}

// ===== impl SoftwireKeyRecord =====

impl SoftwireKeyRecord {
    pub const LENGTH: usize = 8;

    // Encodes the softwire key record into a bytes buffer.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::LENGTH);
        buf.put_u32(self.ipv4.into());
        buf.put_u16(self.psid);
        buf.put_u16(0);
        buf
    }

    // Decodes the softwire key record from a bytes buffer.
    pub fn decode(data: &[u8]) -> DecodeResult<SoftwireKeyRecord> {
        if data.len() != Self::LENGTH {
            return Err(DecodeError::InvalidLength(data.len()));
        }

        let mut buf = Bytes::copy_from_slice(data);
        let ipv4 = Ipv4Addr::from(buf.get_u32());
        let psid = buf.get_u16();

        Ok(SoftwireKeyRecord { ipv4, psid })
    }
}

// ===== impl PsidMapRecord =====

impl PsidMapRecord {
    pub const LENGTH: usize = 8;

    // Encodes the PSID-map record into a bytes buffer.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::LENGTH);
        buf.put_u32(self.ipv4.into());
        buf.put_u16(self.psid_length.into());
        buf.put_u16(self.shift.into());
        buf
    }

    // Decodes the PSID-map record from a bytes buffer.
    pub fn decode(data: &[u8]) -> DecodeResult<PsidMapRecord> {
        if data.len() != Self::LENGTH {
            return Err(DecodeError::InvalidLength(data.len()));
        }

        let mut buf = Bytes::copy_from_slice(data);
        let ipv4 = Ipv4Addr::from(buf.get_u32());
        let psid_length = buf.get_u16() as u8;
        let shift = buf.get_u16() as u8;

        Ok(PsidMapRecord {
            ipv4,
            psid_length,
            shift,
        })
    }
}

// ===== impl PackedSoftwire =====

impl PackedSoftwire {
    // Recovers the softwire from its packed record pair.
    pub fn unpack(&self) -> Softwire {
        Softwire {
            ipv4: self.softwire.ipv4,
            psid: self.softwire.psid,
            b4_ipv6: self.softwire.b4_ipv6,
            br_address: self.softwire.br_address,
            port_set: Some(PortSet {
                psid_length: self.psid_map.psid_length,
                shift: self.psid_map.shift,
            }),
        }
    }
}

// ===== impl Softwire =====

impl Softwire {
    /// Packs the softwire into the record pair consumed by the forwarding
    /// table. Pure; fails when the entry carries no PSID parameters.
    pub fn pack(&self) -> Result<PackedSoftwire, PackError> {
        let port_set = self
            .port_set
            .as_ref()
            .ok_or(PackError::MissingPortSet(self.key()))?;

        Ok(PackedSoftwire {
            softwire: SoftwireRecord {
                ipv4: self.ipv4,
                psid: self.psid,
                b4_ipv6: self.b4_ipv6,
                br_address: self.br_address,
            },
            psid_map: PsidMapRecord {
                ipv4: self.ipv4,
                psid_length: port_set.psid_length,
                shift: port_set.shift,
            },
        })
    }

    /// The key record used by remove-by-key dispatch.
    pub fn key_record(&self) -> SoftwireKeyRecord {
        SoftwireKeyRecord {
            ipv4: self.ipv4,
            psid: self.psid,
        }
    }
}

// ===== impl PackError =====

impl std::fmt::Display for PackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackError::MissingPortSet((ipv4, psid)) => {
                write!(
                    f,
                    "softwire (ipv4 {ipv4}, psid {psid}) has no port-set \
                     parameters"
                )
            }
        }
    }
}

impl std::error::Error for PackError {}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidLength(length) => {
                write!(f, "invalid record length ({length} bytes)")
            }
        }
    }
}

impl std::error::Error for DecodeError {}
