//! Content digest of secret messages (MD5, lowercase hex).
//!
//! This is a consistency check between the client's decoded copy and the
//! server's stored copy, not a cryptographic proof of receipt.

use crate::error::CommandError;
use md5::{Digest, Md5};

/// Length of a digest rendered as hex.
pub const DIGEST_HEX_LEN: usize = 32;

/// MD5 over the UTF-8 bytes of `message`, as 32 lowercase hex characters.
pub fn digest_of(message: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(message.as_bytes());
    hex::encode(hasher.finalize())
}

/// True when `candidate` is exactly 32 lowercase hex characters.
pub fn is_well_formed(candidate: &str) -> bool {
    candidate.len() == DIGEST_HEX_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Check a client-submitted digest against the digest of `expected_message`.
///
/// The format is checked first; values are only compared for well-formed input.
pub fn validate(submitted: Option<&str>, expected_message: &str) -> Result<(), CommandError> {
    let submitted = match submitted {
        Some(s) if is_well_formed(s) => s,
        _ => return Err(CommandError::InvalidChecksumFormat),
    };
    if submitted != digest_of(expected_message) {
        return Err(CommandError::BadChecksum);
    }
    Ok(())
}
