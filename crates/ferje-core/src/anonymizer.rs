use sha2::{Digest, Sha256};

/// Length of a pseudonym in hex characters.
pub const PSEUDONYM_LEN: usize = 64;

/// One-way, unsalted SHA-256 pseudonym of an MMSI, as lowercase hex.
///
/// Unsalted: a given MMSI yields the same `ferryId` in every run.
pub fn anonymize_mmsi(mmsi: &str) -> String {
    let digest = Sha256::digest(mmsi.trim().as_bytes());
    hex::encode(digest)
}
