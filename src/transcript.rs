//! Running handshake transcript.
//!
//! All handshake messages, in both directions, are appended here in wire
//! order. The bytes stay available so the digest can be produced for
//! whichever hash the cipher suite ends up requiring, and so partial
//! digests (for CertificateVerify) remain possible after more data has
//! been appended.

use sha2::{Digest, Sha256, Sha384};

use crate::buffer::Buf;

/// Hash algorithms supported for the transcript digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
}

/// Accumulates handshake bytes and digests them on demand.
#[derive(Debug, Default)]
pub struct Transcript {
    data: Buf,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything accumulated so far.
    pub fn reset(&mut self) {
        self.data.clear();
    }

    /// Append handshake bytes.
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// The accumulated bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Digest the accumulated bytes. The transcript keeps accumulating
    /// afterwards; this does not consume anything.
    pub fn hash(&self, algorithm: HashAlgorithm) -> Vec<u8> {
        match algorithm {
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(&self.data[..]);
                hasher.finalize().to_vec()
            }
            HashAlgorithm::Sha384 => {
                let mut hasher = Sha384::new();
                hasher.update(&self.data[..]);
                hasher.finalize().to_vec()
            }
        }
    }
}
