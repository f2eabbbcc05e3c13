// SPDX-License-Identifier: MIT OR Apache-2.0

//! The anchor role: stationary base station and home of the subscriber
//! store.
//!
//! The anchor challenges relays (phase A), verifies and issues credentials
//! for relay-assisted device authentication (phase B) and passively records
//! completed handovers (phase C). It owns the subscriber store and the group
//! key; everything else refers to it by identifier only.
use std::collections::HashMap;

use skylark_core::cbor::{decode_cbor, encode_cbor, DecodeError, EncodeError};
use skylark_core::{Clock, RelayId, Supi, TemporaryId, Timestamp};
use thiserror::Error;
use tracing::{debug, warn};

use crate::crypto::aead::{self, AeadError};
use crate::crypto::aka::{f1, f1_star, AMF_SIZE};
use crate::crypto::kem::{self, DecapsulationKey, EncapsulationKey, KemError};
use crate::crypto::{Rng, RngError};
use crate::keys::{GroupKey, LongTermKey, SessionKey};
use crate::message::{
    AuthChallenge, AuthRequest, Auts, ConcealedIdentity, DeviceAuthParams, DeviceAuthReply,
    DeviceGrant, HandoverInform, RelayConfirmation, RelayGrant,
};
use crate::subscriber::{SqnOutcome, SubscriberError, SubscriberStore};
use crate::token::Token;
use crate::vectors::{
    auth_vector, hashed_response, masking_key, relay_device_key, tags_match, temporary_group_key,
};

/// Network-wide parameters the anchor shares with its subscribers at
/// provisioning time.
#[derive(Clone, Debug)]
pub struct AnchorConfig {
    /// Serving network name folded into every expected response.
    pub serving_network: String,
    /// Authentication management field.
    pub amf: [u8; AMF_SIZE],
    /// Validity of handover tokens in seconds.
    pub token_validity: u64,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            serving_network: "TestNet".into(),
            amf: [0x00, 0x00],
            token_validity: 3600,
        }
    }
}

/// Authentication progress of one relay, as seen by the anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayPhase {
    /// Challenge sent, confirmation outstanding. There is no timeout; an
    /// unconfirmed relay stays here until re-challenged.
    PendingAuth,
    /// Confirmation received; the relay may forward device authentication.
    Authorized,
}

#[derive(Debug)]
struct RelayRecord {
    phase: RelayPhase,
    kran: SessionKey,
    tid: TemporaryId,
}

#[derive(Debug)]
struct HandoverRecord {
    relay_tid: TemporaryId,
    device_tid: TemporaryId,
    recorded_at: Timestamp,
}

/// Anchor role (gNB).
#[derive(Debug)]
pub struct Anchor {
    config: AnchorConfig,
    store: SubscriberStore,
    group_key: GroupKey,
    decapsulation_key: DecapsulationKey,
    encapsulation_key: EncapsulationKey,
    relays: HashMap<RelayId, RelayRecord>,
    handover_log: Vec<HandoverRecord>,
}

impl Anchor {
    /// Creates an anchor with a fresh KEM key pair and group key.
    pub fn new(config: AnchorConfig, rng: &Rng) -> Result<Self, AnchorError> {
        let (decapsulation_key, encapsulation_key) = kem::generate_key_pair(rng)?;
        let group_key = GroupKey::generate(rng)?;
        Ok(Self {
            config,
            store: SubscriberStore::new(),
            group_key,
            decapsulation_key,
            encapsulation_key,
            relays: HashMap::new(),
            handover_log: Vec::new(),
        })
    }

    /// Public encapsulation key, provisioned into every device.
    pub fn encapsulation_key(&self) -> EncapsulationKey {
        self.encapsulation_key
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    /// Provisions a device subscription into the subscriber store.
    pub fn provision_device(&mut self, supi: Supi, key: LongTermKey) {
        self.store.provision_device(supi, key);
    }

    /// Registers a relay and its long-term key.
    pub fn provision_relay(&mut self, relay_id: RelayId, key: LongTermKey) {
        self.store.provision_relay(relay_id, key);
    }

    /// Phase A, step 1: challenge a provisioned relay.
    ///
    /// Derives the relay session key and expected response from the relay's
    /// long-term key and a fresh challenge, seals the relay's temporary
    /// identity together with the group key, and records both pending
    /// confirmation. Re-initiating replaces any earlier pending state.
    pub fn initiate_relay_authentication(
        &mut self,
        relay_id: RelayId,
        rng: &Rng,
    ) -> Result<AuthChallenge, AnchorError> {
        let key = self.store.relay_key(relay_id)?;
        let r = rng.challenge()?;
        let vector = auth_vector(key, &r, &self.config.serving_network);
        let tid = TemporaryId::from_bytes(rng.random_array()?);

        let grant = RelayGrant {
            tid,
            group_key: self.group_key.clone(),
        };
        let c = aead::encrypt(vector.kran.as_bytes(), &encode_cbor(&grant)?, rng)?;
        let hres_star = hashed_response(&vector.kran, &c, &vector.res_star);

        debug!(%relay_id, %tid, "issued relay authentication challenge");
        self.relays.insert(
            relay_id,
            RelayRecord {
                phase: RelayPhase::PendingAuth,
                kran: vector.kran,
                tid,
            },
        );
        Ok(AuthChallenge { hres_star, c, r })
    }

    /// Phase A, step 2: accept the relay's confirmation and authorize it.
    ///
    /// The confirmation carries no cryptographic proof — it is taken on
    /// trust of the transport. A hardened design would demand a proof
    /// derived from KRAN here.
    pub fn receive_relay_confirmation(
        &mut self,
        confirmation: RelayConfirmation,
    ) -> Result<(), AnchorError> {
        let record = self
            .relays
            .get_mut(&confirmation.relay_id)
            .ok_or(AnchorError::NoPendingAuthentication(confirmation.relay_id))?;
        record.phase = RelayPhase::Authorized;
        debug!(relay_id = %confirmation.relay_id, tid = %record.tid, "relay authorized");
        Ok(())
    }

    /// Authentication progress of a relay, if any was ever challenged.
    pub fn relay_phase(&self, relay_id: RelayId) -> Option<RelayPhase> {
        self.relays.get(&relay_id).map(|record| record.phase)
    }

    /// Temporary identity issued to a relay.
    pub fn relay_tid(&self, relay_id: RelayId) -> Option<TemporaryId> {
        self.relays.get(&relay_id).map(|record| record.tid)
    }

    /// Phase B: process a device authentication request forwarded by an
    /// authorized relay.
    ///
    /// Order of checks: forwarding relay authorization, identity
    /// concealment, MAC, then sequence freshness. MAC and sequence failures
    /// are replies, not errors — the affected identity stays in a
    /// well-defined state and a fresh attempt can always be made.
    pub fn process_device_auth_request(
        &mut self,
        request: AuthRequest,
        clock: &impl Clock,
        rng: &Rng,
    ) -> Result<DeviceAuthReply, AnchorError> {
        let relay_tid = self.authorized_relay_tid(&request.relay_tid)?;

        // Recover the challenge and open the concealed identity before any
        // key lookup is possible.
        let r_secret = kem::decapsulate(&self.decapsulation_key, &request.suci.c1)?;
        let r = *r_secret.as_bytes();
        let msk = masking_key(&r);
        let identity: ConcealedIdentity = match aead::decrypt(msk.as_bytes(), &request.suci.c2)
            .ok()
            .and_then(|plaintext| decode_cbor(&plaintext).ok())
        {
            Some(identity) => identity,
            None => {
                warn!(device = %request.device, "unopenable identity field in SUCI");
                return Ok(DeviceAuthReply::MacFailure);
            }
        };

        let key = match self.store.device_key(&identity.supi) {
            Ok(key) => key.clone(),
            Err(_) => {
                // An unknown identity is indistinguishable from a bad MAC on
                // the wire.
                warn!(device = %request.device, "unknown subscription in SUCI");
                return Ok(DeviceAuthReply::MacFailure);
            }
        };

        let xmac = f1(key.as_bytes(), identity.sqn, &r, &self.config.amf);
        if !tags_match(&xmac, &request.suci.mac) {
            warn!(device = %request.device, supi = %identity.supi, "device MAC check failed");
            return Ok(DeviceAuthReply::MacFailure);
        }

        if let Err(outcome) = self.store.accept_sqn(&identity.supi, identity.sqn) {
            let last_accepted = match outcome {
                SqnOutcome::Stale { last_accepted } => last_accepted,
                // The key lookup above guarantees the entry exists.
                SqnOutcome::Unknown => return Ok(DeviceAuthReply::MacFailure),
            };
            warn!(
                supi = %identity.supi,
                presented = identity.sqn,
                last_accepted,
                "sequence number out of sync",
            );
            let c_sqn = aead::encrypt(msk.as_bytes(), &last_accepted.to_be_bytes(), rng)?;
            let macs = f1_star(key.as_bytes(), last_accepted, &r, &self.config.amf);
            return Ok(DeviceAuthReply::SyncFailure(Auts { c_sqn, macs }));
        }

        // Freshness and integrity verified; issue credentials.
        let device_tid = TemporaryId::from_bytes(rng.random_array()?);
        let vector = auth_vector(&key, &r, &self.config.serving_network);
        let kuav = relay_device_key(&vector.kran, &device_tid, &relay_tid);

        let expires_at = clock.now() + self.config.token_validity;
        let tgk = temporary_group_key(&self.group_key, &device_tid, expires_at);
        let grant = DeviceGrant {
            tid: device_tid,
            token: Token::new(tgk, expires_at),
        };
        let ci = aead::encrypt(vector.kran.as_bytes(), &encode_cbor(&grant)?, rng)?;
        let hres_star = hashed_response(&vector.kran, &ci, &vector.res_star);

        debug!(
            supi = %identity.supi,
            %device_tid,
            %relay_tid,
            token_expires_at = expires_at,
            "device authenticated",
        );
        Ok(DeviceAuthReply::Accepted(DeviceAuthParams {
            hres_star,
            ci,
            device_tid,
            kuav,
        }))
    }

    /// Phase C: record a completed handover. Advisory only — the anchor
    /// never gates the handover itself.
    pub fn receive_handover_inform(&mut self, inform: HandoverInform, clock: &impl Clock) {
        debug!(
            relay_tid = %inform.relay_tid,
            device_tid = %inform.device_tid,
            "handover recorded",
        );
        self.handover_log.push(HandoverRecord {
            relay_tid: inform.relay_tid,
            device_tid: inform.device_tid,
            recorded_at: clock.now(),
        });
    }

    /// Completed handovers, as `(relay TID, device TID, recorded at)`.
    pub fn handover_log(&self) -> impl Iterator<Item = (TemporaryId, TemporaryId, Timestamp)> + '_ {
        self.handover_log
            .iter()
            .map(|record| (record.relay_tid, record.device_tid, record.recorded_at))
    }

    /// Last accepted sequence number for a device identity.
    pub fn last_accepted_sqn(&self, supi: &Supi) -> Result<u64, AnchorError> {
        Ok(self.store.last_accepted_sqn(supi)?)
    }

    fn authorized_relay_tid(&self, relay_tid: &TemporaryId) -> Result<TemporaryId, AnchorError> {
        self.relays
            .values()
            .find(|record| record.phase == RelayPhase::Authorized && record.tid == *relay_tid)
            .map(|record| record.tid)
            .ok_or(AnchorError::UnauthorizedRelay(*relay_tid))
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn relay_session_key(&self, relay_id: RelayId) -> Option<&SessionKey> {
        self.relays.get(&relay_id).map(|record| &record.kran)
    }
}

#[derive(Debug, Error)]
pub enum AnchorError {
    #[error(transparent)]
    Subscriber(#[from] SubscriberError),

    #[error("no pending authentication for {0}")]
    NoPendingAuthentication(RelayId),

    #[error("relay {0} is not authorized to forward device authentication")]
    UnauthorizedRelay(TemporaryId),

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    Kem(#[from] KemError),

    #[error(transparent)]
    Aead(#[from] AeadError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
