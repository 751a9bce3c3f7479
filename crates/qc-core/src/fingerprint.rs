//! Input fingerprints (SHA-256) for reproducibility and audit
use crate::data_model::NormalizedInput;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FingerprintType {
    #[serde(rename = "SHA256")]
    Sha256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFingerprint {
    #[serde(rename = "type")]
    pub kind: FingerprintType,
    /// Lowercase hex digest
    pub value: String,
}

impl InputFingerprint {
    pub fn sha256(value: impl Into<String>) -> Self {
        Self {
            kind: FingerprintType::Sha256,
            value: value.into(),
        }
    }

    /// Compare digests ignoring hex case
    pub fn matches(&self, other: &InputFingerprint) -> bool {
        self.kind == other.kind && self.value.eq_ignore_ascii_case(&other.value)
    }
}

/// Fingerprint raw bytes (uploaded files)
pub fn fingerprint_bytes(bytes: &[u8]) -> InputFingerprint {
    let digest = Sha256::digest(bytes);
    InputFingerprint::sha256(hex::encode(digest))
}

/// Fingerprint a normalized input through its canonical JSON encoding.
/// Object keys serialize in sorted order, so equal inputs hash equally.
pub fn fingerprint_input(input: &NormalizedInput) -> Result<InputFingerprint, serde_json::Error> {
    let bytes = serde_json::to_vec(input)?;
    Ok(fingerprint_bytes(&bytes))
}
