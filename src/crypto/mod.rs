// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic primitives and random number generator.
//!
//! Algorithms:
//! - X25519 ECDH key agreement
//! - Ed25519 identity keys with Ed25519→X25519 conversion
//! - Anonymous sealed box (ephemeral X25519 + HKDF-SHA256 + ChaCha20-Poly1305)
//! - SHA2 hashing
//!
//! Random Number Generator:
//! - ChaCha20 stream cipher, seeded via `getrandom`
pub mod aead;
pub mod ed25519;
pub mod hkdf;
mod rng;
pub mod sealed_box;
mod secret;
pub mod sha2;
pub mod x25519;

pub use rng::{Rng, RngError};
pub use secret::Secret;
