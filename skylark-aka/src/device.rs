// SPDX-License-Identifier: MIT OR Apache-2.0

//! The device role: end subscriber authenticating through a relay.
use skylark_core::cbor::{decode_cbor, encode_cbor, DecodeError, EncodeError};
use skylark_core::{Clock, Supi, TemporaryId};
use thiserror::Error;
use tracing::{debug, warn};

use crate::crypto::aead::{self, AeadError};
use crate::crypto::aka::{f1, f1_star, AMF_SIZE};
use crate::crypto::kem::{self, EncapsulationKey, KemError, SharedSecret};
use crate::crypto::{Rng, RngError};
use crate::keys::{LongTermKey, SessionKey};
use crate::message::{
    AssistedAuthResponse, Auts, ConcealedIdentity, DeviceGrant, HandoverChallenge, HandoverConfirm,
    HandoverRequest, Suci,
};
use crate::token::Token;
use crate::vectors::{
    auth_vector, handover_mac, handover_relay_device_key, handover_response,
    hashed_handover_response, hashed_response, masking_key, relay_device_key, tags_match,
};

/// Connection lifecycle of a device.
///
/// `Failed` is entered when the network itself fails verification (or
/// declares the device's MAC bad); it is absorbing for the current session
/// but a fresh connection attempt may always be started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceState {
    Idle,
    Connecting,
    Connected,
    Handover,
    Failed,
}

/// In-flight authentication attempt; only the recovered challenge is kept.
#[derive(Debug)]
struct Attempt {
    r: SharedSecret,
}

#[derive(Debug)]
struct Session {
    tid: TemporaryId,
    relay_tid: TemporaryId,
    kuav: SessionKey,
    token: Token,
}

#[derive(Debug)]
struct PendingHandover {
    target_tid: TemporaryId,
    r1: [u8; 32],
}

/// Device role (UE).
#[derive(Debug)]
pub struct Device {
    supi: Supi,
    key: LongTermKey,
    amf: [u8; AMF_SIZE],
    serving_network: String,
    anchor_key: EncapsulationKey,
    sqn: u64,
    state: DeviceState,
    attempt: Option<Attempt>,
    session: Option<Session>,
    handover: Option<PendingHandover>,
}

impl Device {
    /// Creates a provisioned device. `anchor_key` is the anchor's public
    /// encapsulation key; `key`, `amf` and `serving_network` must match the
    /// values in the anchor's subscriber store.
    pub fn new(
        supi: Supi,
        key: LongTermKey,
        amf: [u8; AMF_SIZE],
        serving_network: impl Into<String>,
        anchor_key: EncapsulationKey,
    ) -> Self {
        Self {
            supi,
            key,
            amf,
            serving_network: serving_network.into(),
            anchor_key,
            sqn: 0,
            state: DeviceState::Idle,
            attempt: None,
            session: None,
            handover: None,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Local sequence counter; advanced before every attempt.
    pub fn sqn(&self) -> u64 {
        self.sqn
    }

    /// Temporary identity of the current session.
    pub fn temporary_id(&self) -> Option<TemporaryId> {
        self.session.as_ref().map(|session| session.tid)
    }

    /// Temporary identity of the relay currently serving this device.
    pub fn relay_tid(&self) -> Option<TemporaryId> {
        self.session.as_ref().map(|session| session.relay_tid)
    }

    /// Session key shared with the serving relay.
    pub fn session_key(&self) -> Option<&SessionKey> {
        self.session.as_ref().map(|session| &session.kuav)
    }

    /// Handover token of the current session.
    pub fn token(&self) -> Option<&Token> {
        self.session.as_ref().map(|session| &session.token)
    }

    /// Phase B, step 1: conceal identity and sequence number into a SUCI.
    ///
    /// Advances the sequence counter first, so a rejected attempt never
    /// reuses a value. Allowed from `Idle`, `Failed` or `Connected` (a
    /// reconnect abandons the existing session); an attempt already in
    /// flight must conclude first.
    pub fn initiate_connection(&mut self, rng: &Rng) -> Result<Suci, DeviceError> {
        match self.state {
            DeviceState::Idle | DeviceState::Failed | DeviceState::Connected => {}
            state => return Err(DeviceError::InvalidState(state)),
        }
        self.session = None;
        self.handover = None;
        self.sqn += 1;

        let (c1, r) = kem::encapsulate(&self.anchor_key, rng)?;
        let msk = masking_key(r.as_bytes());
        let identity = ConcealedIdentity {
            supi: self.supi.clone(),
            sqn: self.sqn,
        };
        let c2 = aead::encrypt(msk.as_bytes(), &encode_cbor(&identity)?, rng)?;
        let mac = f1(self.key.as_bytes(), self.sqn, r.as_bytes(), &self.amf);

        debug!(supi = %self.supi, sqn = self.sqn, "initiating connection");
        self.attempt = Some(Attempt { r });
        self.state = DeviceState::Connecting;
        Ok(Suci { c1, c2, mac })
    }

    /// Phase B, step 2: verify the network's response and install the
    /// session.
    ///
    /// The hashed expected response is checked before the grant is opened;
    /// a mismatch means the network failed to prove knowledge of the
    /// long-term key and the attempt ends in `Failed`. A grant carrying an
    /// already-expired token is refused the same way.
    pub fn handle_assisted_auth_response(
        &mut self,
        response: AssistedAuthResponse,
        clock: &impl Clock,
    ) -> Result<(), DeviceError> {
        let attempt = self.in_flight_attempt()?;
        let r = *attempt.r.as_bytes();
        let vector = auth_vector(&self.key, &r, &self.serving_network);
        let expected = hashed_response(&vector.kran, &response.ci, &vector.res_star);
        if !tags_match(&expected, &response.hres_star) {
            warn!(supi = %self.supi, "network authentication failed");
            self.fail_attempt();
            return Err(DeviceError::NetworkAuthenticationFailed);
        }

        let grant: DeviceGrant = match aead::decrypt(vector.kran.as_bytes(), &response.ci)
            .ok()
            .and_then(|plaintext| decode_cbor(&plaintext).ok())
        {
            Some(grant) => grant,
            None => {
                self.fail_attempt();
                return Err(DeviceError::NetworkAuthenticationFailed);
            }
        };

        if grant.token.is_expired(clock) {
            warn!(supi = %self.supi, "granted token is already expired");
            self.fail_attempt();
            return Err(DeviceError::TokenExpired);
        }

        let kuav = relay_device_key(&vector.kran, &grant.tid, &response.relay_tid);
        debug!(
            supi = %self.supi,
            tid = %grant.tid,
            relay_tid = %response.relay_tid,
            token_expires_at = grant.token.expires_at(),
            "connected",
        );
        self.session = Some(Session {
            tid: grant.tid,
            relay_tid: response.relay_tid,
            kuav,
            token: grant.token,
        });
        self.attempt = None;
        self.state = DeviceState::Connected;
        Ok(())
    }

    /// Phase B, resynchronisation: adopt the network's sequence baseline.
    ///
    /// On a verified AUTS the local counter jumps to the network's last
    /// accepted value and the device returns to `Idle`; the caller is
    /// expected to retry [`Device::initiate_connection`], which advances
    /// past the adopted baseline. An unverifiable AUTS ends in `Failed`.
    pub fn handle_sync_failure(&mut self, auts: Auts) -> Result<(), DeviceError> {
        let attempt = self.in_flight_attempt()?;
        let r = *attempt.r.as_bytes();
        let msk = masking_key(&r);
        let sqn_hn = match aead::decrypt(msk.as_bytes(), &auts.c_sqn)
            .ok()
            .and_then(|plaintext| plaintext.try_into().ok())
            .map(u64::from_be_bytes)
        {
            Some(sqn) => sqn,
            None => {
                self.fail_attempt();
                return Err(DeviceError::ResynchronisationFailed);
            }
        };
        let expected = f1_star(self.key.as_bytes(), sqn_hn, &r, &self.amf);
        if !tags_match(&expected, &auts.macs) {
            warn!(supi = %self.supi, "resynchronisation payload verification failed");
            self.fail_attempt();
            return Err(DeviceError::ResynchronisationFailed);
        }

        debug!(supi = %self.supi, from = self.sqn, to = sqn_hn, "sequence counter resynchronised");
        self.sqn = sqn_hn;
        self.attempt = None;
        self.state = DeviceState::Idle;
        Ok(())
    }

    /// Phase B: the network declared the attempt unverifiable. Terminal for
    /// this attempt.
    pub fn handle_mac_failure(&mut self) -> Result<(), DeviceError> {
        self.in_flight_attempt()?;
        warn!(supi = %self.supi, "network rejected authentication attempt");
        self.fail_attempt();
        Ok(())
    }

    /// Phase C, step 1: request admission to a new relay using the token.
    ///
    /// An expired token is rejected locally without leaving `Connected`;
    /// the device must reconnect through a relay to obtain a fresh one.
    pub fn initiate_handover(
        &mut self,
        target_tid: TemporaryId,
        clock: &impl Clock,
        rng: &Rng,
    ) -> Result<HandoverRequest, DeviceError> {
        if self.state != DeviceState::Connected {
            return Err(DeviceError::InvalidState(self.state));
        }
        // Connected implies a session.
        let session = self.session.as_ref().ok_or(DeviceError::NoSession)?;
        if session.token.is_expired(clock) {
            return Err(DeviceError::TokenExpired);
        }

        let r1 = rng.challenge()?;
        let mac = handover_mac(session.token.tgk(), &target_tid, &session.tid, &r1);
        debug!(supi = %self.supi, tid = %session.tid, target = %target_tid, "initiating handover");
        let request = HandoverRequest {
            device_tid: session.tid,
            mac,
            r1,
            expires_at: session.token.expires_at(),
        };
        self.handover = Some(PendingHandover { target_tid, r1 });
        self.state = DeviceState::Handover;
        Ok(request)
    }

    /// Phase C, step 2: authenticate the target relay and confirm.
    ///
    /// A mismatched challenge means the target could not recompute the
    /// token's key; the device falls back to `Connected` on its current
    /// relay as if the handover was never attempted.
    pub fn handle_handover_challenge(
        &mut self,
        challenge: HandoverChallenge,
    ) -> Result<HandoverConfirm, DeviceError> {
        if self.state != DeviceState::Handover {
            return Err(DeviceError::InvalidState(self.state));
        }
        let pending = self.handover.take().ok_or(DeviceError::NoSession)?;
        let session = self.session.as_mut().ok_or(DeviceError::NoSession)?;

        let res = handover_response(
            session.token.tgk(),
            &pending.target_tid,
            &session.tid,
            &pending.r1,
            &challenge.r2,
        );
        let expected = hashed_handover_response(&res, &challenge.r2);
        if !tags_match(&expected, &challenge.hres) {
            warn!(supi = %self.supi, target = %pending.target_tid, "target relay verification failed");
            self.state = DeviceState::Connected;
            return Err(DeviceError::HandoverRejected);
        }

        session.kuav = handover_relay_device_key(session.token.tgk(), &pending.target_tid, &session.tid);
        session.relay_tid = pending.target_tid;
        debug!(supi = %self.supi, relay_tid = %pending.target_tid, "handed over");
        self.state = DeviceState::Connected;
        Ok(HandoverConfirm { xres: res })
    }

    /// Phase C: give up on an in-flight handover attempt.
    ///
    /// Used when the target relay rejected the request (token expired in
    /// flight, unverifiable token) or never answered. Discards the pending
    /// state and returns to `Connected`; the current relay link, session
    /// key and token are untouched.
    pub fn abandon_handover(&mut self) -> Result<(), DeviceError> {
        if self.state != DeviceState::Handover {
            return Err(DeviceError::InvalidState(self.state));
        }
        debug!(supi = %self.supi, "handover abandoned");
        self.handover = None;
        self.state = DeviceState::Connected;
        Ok(())
    }

    /// Drops the current session and returns to `Idle`.
    pub fn disconnect(&mut self) {
        self.session = None;
        self.handover = None;
        self.attempt = None;
        self.state = DeviceState::Idle;
    }

    fn in_flight_attempt(&self) -> Result<&Attempt, DeviceError> {
        if self.state != DeviceState::Connecting {
            return Err(DeviceError::InvalidState(self.state));
        }
        self.attempt.as_ref().ok_or(DeviceError::NoSession)
    }

    fn fail_attempt(&mut self) {
        self.attempt = None;
        self.state = DeviceState::Failed;
    }
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("operation not valid in state {0:?}")]
    InvalidState(DeviceState),

    #[error("no session state for this operation")]
    NoSession,

    #[error("network authentication failed")]
    NetworkAuthenticationFailed,

    #[error("resynchronisation payload did not verify")]
    ResynchronisationFailed,

    #[error("handover token expired")]
    TokenExpired,

    #[error("target relay failed handover verification")]
    HandoverRejected,

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
