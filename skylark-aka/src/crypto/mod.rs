// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic capabilities consumed by the protocol roles.
//!
//! The protocol logic treats these as opaque call contracts: same inputs,
//! same outputs. Swapping a construction (for example replacing the X25519
//! key encapsulation with a lattice-based one) must not change any role
//! code.
pub mod aead;
pub mod aka;
pub mod kdf;
pub mod kem;
mod rng;
mod secret;
pub mod sha2;

pub use rng::{Rng, RngError};
pub use secret::Secret;
