// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term subscriber state owned by the anchor.
use std::collections::HashMap;

use skylark_core::{RelayId, Supi};
use thiserror::Error;

use crate::keys::LongTermKey;

/// Holds long-term keys and last-accepted sequence numbers for devices and
/// relays, keyed by permanent identity.
///
/// The store is the single authority for the freshness gate: an
/// authentication attempt is accepted only if its SQN is strictly greater
/// than the last accepted value, and acceptance adopts the presented value.
/// Both steps happen inside [`SubscriberStore::accept_sqn`] under one `&mut`
/// borrow, which serialises concurrent attempts for the same identity by
/// construction.
#[derive(Debug, Default)]
pub struct SubscriberStore {
    devices: HashMap<Supi, DeviceEntry>,
    relays: HashMap<RelayId, LongTermKey>,
}

#[derive(Debug)]
struct DeviceEntry {
    key: LongTermKey,
    last_accepted_sqn: u64,
}

impl SubscriberStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisions a device subscription. Re-provisioning an identity resets
    /// its sequence baseline.
    pub fn provision_device(&mut self, supi: Supi, key: LongTermKey) {
        self.devices.insert(
            supi,
            DeviceEntry {
                key,
                last_accepted_sqn: 0,
            },
        );
    }

    /// Provisions a relay's long-term key.
    pub fn provision_relay(&mut self, relay_id: RelayId, key: LongTermKey) {
        self.relays.insert(relay_id, key);
    }

    pub fn device_key(&self, supi: &Supi) -> Result<&LongTermKey, SubscriberError> {
        self.devices
            .get(supi)
            .map(|entry| &entry.key)
            .ok_or_else(|| SubscriberError::UnknownDevice(supi.clone()))
    }

    pub fn relay_key(&self, relay_id: RelayId) -> Result<&LongTermKey, SubscriberError> {
        self.relays
            .get(&relay_id)
            .ok_or(SubscriberError::UnknownRelay(relay_id))
    }

    pub fn is_relay_provisioned(&self, relay_id: RelayId) -> bool {
        self.relays.contains_key(&relay_id)
    }

    /// Last accepted sequence number for a device, `0` before the first
    /// accepted attempt.
    pub fn last_accepted_sqn(&self, supi: &Supi) -> Result<u64, SubscriberError> {
        self.devices
            .get(supi)
            .map(|entry| entry.last_accepted_sqn)
            .ok_or_else(|| SubscriberError::UnknownDevice(supi.clone()))
    }

    /// Check-then-set acceptance of a presented sequence number.
    ///
    /// Returns the stale baseline when the presented value is not strictly
    /// greater; on acceptance the baseline adopts the presented value.
    pub fn accept_sqn(&mut self, supi: &Supi, presented: u64) -> Result<(), SqnOutcome> {
        let entry = match self.devices.get_mut(supi) {
            Some(entry) => entry,
            None => return Err(SqnOutcome::Unknown),
        };
        if presented > entry.last_accepted_sqn {
            entry.last_accepted_sqn = presented;
            Ok(())
        } else {
            Err(SqnOutcome::Stale {
                last_accepted: entry.last_accepted_sqn,
            })
        }
    }
}

/// Result of a failed sequence-number acceptance.
#[derive(Debug, PartialEq, Eq)]
pub enum SqnOutcome {
    Unknown,
    Stale { last_accepted: u64 },
}

#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("unknown device subscription {0}")]
    UnknownDevice(Supi),

    #[error("unknown relay subscription {0}")]
    UnknownRelay(RelayId),
}
