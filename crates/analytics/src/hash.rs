//! Content fingerprints attached to acknowledgments.
//!
//! Two digests travel with every acknowledgment:
//!
//! - **Response hash**: SHA-256 over the full generated text. Lets the service
//!   correlate an acknowledgment with the exact text the model produced.
//! - **AEPI checksum**: MD5 over the enhanced prompt text. The service issues
//!   its own MD5 for the prompt it handed out, so the two can be compared
//!   byte-for-byte.
//!
//! ```text
//! response_hash = hex(SHA-256(utf8(text)))
//! aepi_checksum = hex(MD5(utf8(aepi_text)))
//! ```
//!
//! # Examples
//!
//! ```rust
//! use analytics::{checksum_text, hash_text};
//!
//! assert_eq!(hash_text("hello world").len(), 64);
//! assert_eq!(checksum_text("hello world").len(), 32);
//! ```

use md5::Md5;
use sha2::{Digest, Sha256};

/// Hash arbitrary text with SHA-256 and return a lowercase hex digest.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// MD5 checksum of `text` as a lowercase hex digest.
///
/// Not a security primitive; it only has to match the checksum the service
/// computes for the same prompt.
pub fn checksum_text(text: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
