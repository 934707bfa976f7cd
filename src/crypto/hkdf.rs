// SPDX-License-Identifier: MIT OR Apache-2.0

//! HKDF-SHA256 key derivation.
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;

/// Derives `N` bytes of key material from input keying material.
pub fn hkdf_sha256<const N: usize>(
    salt: &[u8],
    ikm: &[u8],
    info: &[u8],
) -> Result<[u8; N], HkdfError> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut out = [0u8; N];
    hkdf.expand(info, &mut out)
        .map_err(|_| HkdfError::InvalidOutputLength)?;
    Ok(out)
}

#[derive(Debug, Error)]
pub enum HkdfError {
    #[error("requested output length is invalid for hkdf-sha256")]
    InvalidOutputLength,
}

#[cfg(test)]
mod tests {
    use super::hkdf_sha256;

    #[test]
    fn deterministic_expansion() {
        let out_1: [u8; 32] = hkdf_sha256(b"salt", b"input key material", b"info").unwrap();
        let out_2: [u8; 32] = hkdf_sha256(b"salt", b"input key material", b"info").unwrap();
        assert_eq!(out_1, out_2);

        let different: [u8; 32] = hkdf_sha256(b"salt", b"input key material", b"other").unwrap();
        assert_ne!(out_1, different);
    }
}
