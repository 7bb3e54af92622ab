//! Association value handed back by a negotiator.
//!
//! The shared secret is kept out of `Debug` output and serialization; only
//! a SHA-256 fingerprint ever leaves this type.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex characters kept from the secret digest
const FINGERPRINT_LEN: usize = 16;

#[derive(Clone, Serialize, Deserialize)]
pub struct Association {
    pub handle: String,
    #[serde(skip_serializing, default)]
    secret: String,
    pub issued_at: DateTime<Utc>,
    pub lifetime_secs: u64,
    pub assoc_type: String,
}

impl Association {
    pub fn new(
        handle: impl Into<String>,
        secret: impl Into<String>,
        issued_at: DateTime<Utc>,
        lifetime_secs: u64,
        assoc_type: impl Into<String>,
    ) -> Self {
        Self {
            handle: handle.into(),
            secret: secret.into(),
            issued_at,
            lifetime_secs,
            assoc_type: assoc_type.into(),
        }
    }

    /// Association issued now that lives for `expires_in` seconds.
    pub fn from_expires_in(
        expires_in: u64,
        handle: impl Into<String>,
        secret: impl Into<String>,
        assoc_type: impl Into<String>,
    ) -> Self {
        Self::new(handle, secret, Utc::now(), expires_in, assoc_type)
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Expiry instant, or `None` when the lifetime runs past what
    /// `DateTime<Utc>` can represent.
    pub fn checked_expires_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.lifetime_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| self.issued_at.checked_add_signed(lifetime))
    }

    /// Expiry instant, saturating at the latest representable time.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.checked_expires_at().unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Seconds left before expiry, zero once expired.
    pub fn remaining(&self) -> u64 {
        self.expires_at()
            .signed_duration_since(Utc::now())
            .num_seconds()
            .max(0) as u64
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at()
    }

    /// Short digest of the secret, safe to log and compare across runs.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.secret.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(FINGERPRINT_LEN);
        hex
    }
}

impl std::fmt::Debug for Association {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Association")
            .field("handle", &self.handle)
            .field("secret", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("lifetime_secs", &self.lifetime_secs)
            .field("assoc_type", &self.assoc_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_expires_in() {
        let assoc = Association::from_expires_in(3600, "assoc handle", "s3krit", "HMAC-SHA1");
        assert_eq!(assoc.handle, "assoc handle");
        assert_eq!(assoc.assoc_type, "HMAC-SHA1");
        assert!(!assoc.is_expired());
        assert!(assoc.remaining() > 3590);
    }

    #[test]
    fn test_expired_association() {
        let issued = Utc::now() - Duration::seconds(120);
        let assoc = Association::new("h", "s", issued, 60, "HMAC-SHA1");
        assert!(assoc.is_expired());
        assert_eq!(assoc.remaining(), 0);
    }

    #[test]
    fn test_huge_lifetime_saturates() {
        let assoc = Association::from_expires_in(100_000_000_000_000, "h", "s", "HMAC-SHA1");
        assert_eq!(assoc.checked_expires_at(), None);
        assert_eq!(assoc.expires_at(), DateTime::<Utc>::MAX_UTC);
        assert!(!assoc.is_expired());
        assert!(assoc.remaining() > 0);

        let assoc = Association::from_expires_in(u64::MAX, "h", "s", "HMAC-SHA1");
        assert_eq!(assoc.expires_at(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_secret_never_rendered() {
        let assoc = Association::from_expires_in(60, "h", "s3krit", "HMAC-SHA1");
        assert!(!format!("{:?}", assoc).contains("s3krit"));
        assert!(!serde_json::to_string(&assoc).unwrap().contains("s3krit"));
    }

    #[test]
    fn test_fingerprint_stable() {
        let a = Association::from_expires_in(60, "h1", "s3krit", "HMAC-SHA1");
        let b = Association::from_expires_in(90, "h2", "s3krit", "HMAC-SHA1");
        let c = Association::from_expires_in(60, "h1", "other", "HMAC-SHA1");
        assert_eq!(a.fingerprint().len(), FINGERPRINT_LEN);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
