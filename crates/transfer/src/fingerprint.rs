//! Content fingerprints.
//!
//! Any two payloads sharing a fingerprint are treated as identical content
//! and may share one physical blob. MD5 is the default because existing
//! clients compute it before uploading; SHA-256 can be configured instead.

use std::path::Path;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::TransferError;

/// Digest used to fingerprint content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl FingerprintAlgorithm {
    /// Length of the hex-encoded digest.
    pub fn hex_len(self) -> usize {
        match self {
            FingerprintAlgorithm::Md5 => 32,
            FingerprintAlgorithm::Sha256 => 64,
        }
    }

    /// Starts an incremental digest.
    pub fn hasher(self) -> Fingerprinter {
        let inner = match self {
            FingerprintAlgorithm::Md5 => HasherInner::Md5(Md5::new()),
            FingerprintAlgorithm::Sha256 => HasherInner::Sha256(Sha256::new()),
        };
        Fingerprinter { inner }
    }

    /// Computes the hex-encoded digest of `data`.
    pub fn digest(self, data: &[u8]) -> String {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize_hex()
    }

    /// Computes the hex-encoded digest of an entire file.
    pub async fn digest_file(self, path: &Path) -> Result<String, TransferError> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = self.hasher();
        let mut buf = vec![0u8; 8192];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize_hex())
    }

    /// Validates a client-supplied fingerprint and returns it lowercased.
    ///
    /// Fingerprints name staging directories and tracker keys, so anything
    /// other than hex of the expected length is rejected.
    pub fn parse(self, candidate: &str) -> Result<String, TransferError> {
        let candidate = candidate.trim();
        if candidate.len() != self.hex_len() {
            return Err(TransferError::InvalidFingerprint(format!(
                "expected {} hex characters, got {}",
                self.hex_len(),
                candidate.len()
            )));
        }
        if !candidate.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TransferError::InvalidFingerprint(format!(
                "not a hex digest: {candidate}"
            )));
        }
        Ok(candidate.to_ascii_lowercase())
    }
}

/// Incremental digest over streamed bytes.
pub struct Fingerprinter {
    inner: HasherInner,
}

enum HasherInner {
    Md5(Md5),
    Sha256(Sha256),
}

impl Fingerprinter {
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.inner {
            HasherInner::Md5(h) => h.update(data),
            HasherInner::Sha256(h) => h.update(data),
        }
    }

    pub fn finalize_hex(self) -> String {
        match self.inner {
            HasherInner::Md5(h) => hex::encode(h.finalize()),
            HasherInner::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}
