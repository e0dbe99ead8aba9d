//! Cache fingerprints.
//!
//! A [`Fingerprint`] is a SHA-256 digest over document content and the
//! effective OCR parameters. Two requests with identical fingerprints are
//! interchangeable by definition; the digest is collision-resistant, so any
//! differing input yields a different fingerprint with overwhelming
//! probability.

use crate::types::DocumentFormat;
use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic digest identifying a document + parameter combination.
///
/// Equality defines cache identity. The zoom factor is hashed via its IEEE
/// bit pattern so that every representable value is distinguished exactly.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint for one request.
    ///
    /// Pure and deterministic; fields are separated by NUL bytes so that
    /// adjacent variable-length inputs cannot alias.
    pub fn compute(
        content: &[u8],
        format: DocumentFormat,
        language: &str,
        zoom: f32,
        page_cap: usize,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hasher.update([0u8]);
        hasher.update(format.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(language.as_bytes());
        hasher.update([0u8]);
        hasher.update(zoom.to_bits().to_le_bytes());
        hasher.update((page_cap as u64).to_le_bytes());
        Self(hasher.finalize().into())
    }

    /// Full digest as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 12 hex chars, for log fields.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
