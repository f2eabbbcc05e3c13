// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anchor-issued handover token.
use serde::{Deserialize, Serialize};
use skylark_core::{Clock, Timestamp};

use crate::keys::SessionKey;

/// Time-bounded credential letting a device re-authenticate to a new relay
/// without a synchronous anchor round trip.
///
/// Carries the temporary group key `TGKi = kdf(GKUAV, TIDi ‖ TST)` and its
/// expiry timestamp. The device receives it encrypted inside the device
/// grant after assisted authentication; the target relay never receives the
/// token itself, it recomputes `TGKi` from the group key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    tgk: SessionKey,
    expires_at: Timestamp,
}

impl Token {
    pub(crate) fn new(tgk: SessionKey, expires_at: Timestamp) -> Self {
        Self { tgk, expires_at }
    }

    pub(crate) fn tgk(&self) -> &SessionKey {
        &self.tgk
    }

    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    /// A token whose expiry equals the current second is already expired;
    /// there is no instant at which `expires_at` itself is valid.
    pub fn is_expired(&self, clock: &impl Clock) -> bool {
        clock.now() >= self.expires_at
    }
}
