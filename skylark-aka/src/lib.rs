// SPDX-License-Identifier: MIT OR Apache-2.0

//! `skylark-aka` implements mutual authentication and key agreement for a
//! three-tier wireless access network: a stationary anchor, mobile relays
//! which must authenticate to the anchor before carrying traffic, and end
//! devices which authenticate through an already-authenticated relay and can
//! later hand over between relays without a synchronous anchor round trip.
//!
//! ## Three phases
//!
//! - **Relay service authentication** ([`Anchor::initiate_relay_authentication`]):
//!   the anchor challenges a provisioned relay; both sides derive a relay
//!   session key from the relay's long-term secret, the relay proves the
//!   anchor's authenticity by recomputing the hashed expected response and
//!   receives its temporary identity together with the group key shared by
//!   all authenticated relays.
//! - **Relay-assisted device authentication** ([`Device::initiate_connection`]):
//!   the device conceals its permanent identity and sequence number inside a
//!   SUCI, the relay forwards it, the anchor verifies freshness and
//!   integrity, and issues the device a temporary identity plus a
//!   time-bounded handover token — all encrypted under a session key only
//!   the device can derive.
//! - **Device handover authentication** ([`Device::initiate_handover`]): the
//!   device re-authenticates to a new relay using nothing but the token it
//!   obtained earlier; the anchor is informed asynchronously and never gates
//!   the handover.
//!
//! ## Structure
//!
//! Roles are plain state machines mutated through `&mut self`; they never
//! hold references to their peers. Every operation consumes an incoming
//! message and returns the message to deliver next (or a terminal result),
//! leaving routing to the caller. Randomness and wall-clock time are
//! injected ([`Rng`], [`skylark_core::Clock`]) so that every exchange can be
//! replayed deterministically in tests.
//!
//! The cryptographic primitives (an X25519 DH-KEM, HKDF, an HMAC-based
//! MILENAGE-style function family and XChaCha20-Poly1305) live in [`crypto`]
//! behind narrow call contracts; the protocol logic only depends on their
//! determinism, not on their construction.
mod anchor;
pub mod crypto;
mod device;
mod keys;
pub mod message;
mod relay;
mod subscriber;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
#[cfg(test)]
mod tests;
mod token;
mod vectors;

pub use anchor::{Anchor, AnchorConfig, AnchorError, RelayPhase};
pub use crypto::{Rng, RngError};
pub use device::{Device, DeviceError, DeviceState};
pub use keys::{GroupKey, KEY_SIZE, LongTermKey, SessionKey};
pub use relay::{Relay, RelayError};
pub use subscriber::{SqnOutcome, SubscriberError, SubscriberStore};
pub use token::Token;
