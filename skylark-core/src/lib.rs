// SPDX-License-Identifier: MIT OR Apache-2.0

//! `skylark-core` provides the shared plumbing for the skylark access-network
//! protocol crates: identifier newtypes for the three roles, timestamps with
//! an injectable clock and CBOR encoding helpers.
//!
//! The protocol itself lives in `skylark-aka`; this crate deliberately knows
//! nothing about keys or messages so that identifiers can be passed around as
//! plain lookup values without dragging in cryptography. Back-references
//! between roles (a device pointing at its serving relay, a relay pointing at
//! its anchor) are always expressed as these identifiers and resolved through
//! whatever directory the orchestration layer provides, never as owning
//! handles.
pub mod cbor;
mod identity;
mod time;

pub use identity::{DeviceId, IdentityError, RelayId, Supi, TEMPORARY_ID_SIZE, TemporaryId};
#[cfg(any(test, feature = "test_utils"))]
pub use time::ManualClock;
pub use time::{Clock, SystemClock, Timestamp};
