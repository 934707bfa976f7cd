// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces to external collaborators.
mod cert_store;

pub use cert_store::CertStore;
