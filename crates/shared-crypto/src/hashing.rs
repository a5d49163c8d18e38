//! Hashing utilities.
//!
//! Everything on the wire and in storage is identified by SHA-256; the
//! 16-byte partial hash is the compact transaction identifier peers use to
//! request missing transactions.

use shared_types::{Hash, PartialHash, PARTIAL_HASH_LEN};
use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of `data`.
#[inline]
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&digest);
    output
}

/// Hash two child digests into their parent node digest.
#[inline]
pub fn sha256_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let digest = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&digest);
    output
}

/// First 16 bytes of the SHA-256 of `data`.
#[inline]
pub fn partial_hash(data: &[u8]) -> PartialHash {
    let full = sha256(data);
    let mut output = [0u8; PARTIAL_HASH_LEN];
    output.copy_from_slice(&full[..PARTIAL_HASH_LEN]);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_deterministic() {
        assert_eq!(sha256(b"hello world"), sha256(b"hello world"));
        assert_ne!(sha256(b"hello world"), sha256(b"hello worlds"));
    }

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_partial_hash_is_prefix() {
        let full = sha256(b"some transaction");
        let partial = partial_hash(b"some transaction");
        assert_eq!(&full[..16], &partial[..]);
    }

    #[test]
    fn test_sha256_pair_order_matters() {
        let a = sha256(b"a");
        let b = sha256(b"b");
        assert_ne!(sha256_pair(&a, &b), sha256_pair(&b, &a));
    }
}
