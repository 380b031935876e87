//! Cache Entry Module
//!
//! Lookup results, content digests and the store admission policy shared by
//! every backend.

use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tracing::{error, info};

/// Reserved digest marking a negative ("confirmed no icon") result.
///
/// Never collides with a real digest, which is 64 lowercase hex characters.
pub const SENTINEL_DIGEST: &str = "FALLBACK_ICON";

// == Lookup ==
/// Result of a cache lookup for one `(resolver, authority)` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Nothing has been cached for this key
    Miss,
    /// A previous resolution found no icon
    NegativeHit,
    /// Cached icon bytes and their mime type
    PositiveHit { data: Vec<u8>, mime: String },
}

impl Lookup {
    /// True for both positive and negative hits.
    pub fn is_hit(&self) -> bool {
        !matches!(self, Lookup::Miss)
    }

    /// Converts a hit into the `(data, mime)` pair, `None` otherwise.
    pub fn into_icon(self) -> Option<(Vec<u8>, String)> {
        match self {
            Lookup::PositiveHit { data, mime } => Some((data, mime)),
            _ => None,
        }
    }
}

// == Admission ==
/// A write that passed the store policy.
#[derive(Debug, PartialEq, Eq)]
pub enum Admitted<'a> {
    /// Record a negative result under [`SENTINEL_DIGEST`]
    Negative,
    /// Record a blob
    Blob {
        digest: String,
        mime: &'a str,
        data: &'a [u8],
    },
}

impl Admitted<'_> {
    /// Digest the mapping entry will point at.
    pub fn digest(&self) -> &str {
        match self {
            Admitted::Negative => SENTINEL_DIGEST,
            Admitted::Blob { digest, .. } => digest,
        }
    }
}

/// Applies the store policy common to all backends.
///
/// - no data: negative result, a supplied mime type is ignored
/// - data without mime type: rejected, logged as an error
/// - data larger than `blob_max_bytes`: rejected, logged as info
///
/// Returns `None` when the write must be skipped.
pub fn admit<'a>(
    resolver: &str,
    authority: &str,
    mime: Option<&'a str>,
    data: Option<&'a [u8]>,
    blob_max_bytes: u64,
) -> Option<Admitted<'a>> {
    let Some(data) = data else {
        return Some(Admitted::Negative);
    };

    let Some(mime) = mime else {
        error!(
            "favicon resolver {} tries to cache mime-type None for authority {}",
            resolver, authority
        );
        return None;
    };

    let bytes_c = data.len() as u64;
    if bytes_c > blob_max_bytes {
        info!(
            "favicon of resolver: {} / authority: {} too big to cache (bytes: {})",
            resolver, authority, bytes_c
        );
        return None;
    }

    Some(Admitted::Blob {
        digest: sha256_hex(data),
        mime,
        data,
    })
}

// == Utility Functions ==
/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Returns current Unix timestamp in seconds.
pub fn current_timestamp_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(sha256_hex(b""), SENTINEL_DIGEST);
    }

    #[test]
    fn test_admit_negative_ignores_mime() {
        let admitted = admit("r", "a.example", Some("image/png"), None, 10);
        assert_eq!(admitted, Some(Admitted::Negative));
        assert_eq!(admitted.unwrap().digest(), SENTINEL_DIGEST);
    }

    #[test]
    fn test_admit_rejects_missing_mime() {
        assert!(admit("r", "a.example", None, Some(b"PNGDATA"), 100).is_none());
    }

    #[test]
    fn test_admit_rejects_oversize() {
        let data = vec![0u8; 11];
        assert!(admit("r", "a.example", Some("image/png"), Some(&data), 10).is_none());
    }

    #[test]
    fn test_admit_size_boundary_is_inclusive() {
        let data = vec![7u8; 10];
        let admitted = admit("r", "a.example", Some("image/png"), Some(&data), 10).unwrap();
        match admitted {
            Admitted::Blob { digest, mime, data } => {
                assert_eq!(digest, sha256_hex(&[7u8; 10]));
                assert_eq!(mime, "image/png");
                assert_eq!(data.len(), 10);
            }
            Admitted::Negative => panic!("expected a blob"),
        }
    }

    #[test]
    fn test_lookup_helpers() {
        assert!(!Lookup::Miss.is_hit());
        assert!(Lookup::NegativeHit.is_hit());
        assert_eq!(Lookup::NegativeHit.into_icon(), None);

        let hit = Lookup::PositiveHit {
            data: b"PNGDATA".to_vec(),
            mime: "image/png".to_string(),
        };
        assert!(hit.is_hit());
        assert_eq!(
            hit.into_icon(),
            Some((b"PNGDATA".to_vec(), "image/png".to_string()))
        );
    }
}
