//! Content fingerprint for change detection.
//!
//! A fingerprint is the lowercase hex SHA-256 of an ordered sequence of
//! strings. Each value is fed to the hasher as its UTF-8 byte length (8-byte
//! big-endian) followed by its bytes, so moving a character across a field
//! boundary always changes the digest and an empty string never looks like
//! the [`MISSING`] sentinel.
//!
//! ```rust
//! use issn_harvest::fingerprint::fingerprint;
//!
//! let a = fingerprint(["a|b", "c"]);
//! let b = fingerprint(["a", "b|c"]);
//! assert_ne!(a, b);
//! assert_eq!(a.len(), 64);
//! ```

use sha2::{Digest, Sha256};

/// Rendering of an absent attribute inside the fingerprint tuple.
pub const MISSING: &str = "None";

/// Compute the digest of an ordered sequence of values.
pub fn fingerprint<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for value in values {
        let bytes = value.as_ref().as_bytes();
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}
