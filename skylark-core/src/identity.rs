// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifier types for the three roles of the access network.
//!
//! Permanent identifiers (`Supi` for devices, `RelayId` for relays) are bound
//! to a long-term secret at provisioning time and never change. A
//! [`TemporaryId`] is issued by the anchor per authenticated session and
//! replaces the permanent identifier on the air interface for the lifetime of
//! that session.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Subscription Permanent Identifier of an end device.
///
/// Only the device itself and the anchor's subscriber store ever see this
/// value in the clear; on the wire it travels encrypted inside the SUCI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Supi(String);

impl Supi {
    pub fn new(supi: impl Into<String>) -> Self {
        Self(supi.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Supi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Supi {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Permanent identifier of a relay, assigned at provisioning time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelayId(u64);

impl RelayId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relay-{}", self.0)
    }
}

impl From<u64> for RelayId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Transport-level correlation id for a device.
///
/// Relays key their per-device session records by this value. It carries no
/// identity information; the permanent identity stays between the device and
/// the anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(u64);

impl DeviceId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device-{}", self.0)
    }
}

impl From<u64> for DeviceId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Size of anchor-issued temporary identifiers.
pub const TEMPORARY_ID_SIZE: usize = 16;

/// Opaque, anchor-issued token replacing a permanent identity for one
/// authenticated session scope.
///
/// A fresh temporary id is generated per successful authentication run and
/// lives until the owning entity disconnects, fails a handover or is
/// superseded by re-authentication.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporaryId([u8; TEMPORARY_ID_SIZE]);

impl TemporaryId {
    pub const fn from_bytes(bytes: [u8; TEMPORARY_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TEMPORARY_ID_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for TemporaryId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for TemporaryId {
    type Error = IdentityError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let value_len = value.len();
        let checked: [u8; TEMPORARY_ID_SIZE] = value
            .try_into()
            .map_err(|_| IdentityError::InvalidLength(value_len, TEMPORARY_ID_SIZE))?;
        Ok(Self(checked))
    }
}

impl FromStr for TemporaryId {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(value)?.as_slice())
    }
}

impl fmt::Display for TemporaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TemporaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TemporaryId").field(&self.to_hex()).finish()
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid identifier length {0}, expected {1}")]
    InvalidLength(usize, usize),

    #[error("invalid hex encoding in identifier")]
    InvalidHexEncoding(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{IdentityError, TemporaryId};

    #[test]
    fn temporary_id_hex_round_trip() {
        let tid = TemporaryId::from_bytes([7; 16]);
        let parsed = TemporaryId::from_str(&tid.to_hex()).unwrap();
        assert_eq!(tid, parsed);
    }

    #[test]
    fn temporary_id_rejects_wrong_length() {
        assert!(matches!(
            TemporaryId::try_from([1u8; 4].as_slice()),
            Err(IdentityError::InvalidLength(4, 16))
        ));
    }
}
