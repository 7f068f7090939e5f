//! Remembered-device assertions for two-factor bypass.
//!
//! After a device completes two-factor, the tracker issues a signed,
//! time-bounded assertion the host stores client-side (typically a cookie).
//! On later sign-ins the coordinator consults the assertion and skips the
//! challenge while it verifies. The tracker keeps no state: the token is
//! `base64url(account_id|expires)` plus an HMAC-SHA256 tag, so rotating the
//! tracker key revokes every remembered device at once.

use crate::config::RememberedDeviceOptions;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies remembered-device assertions.
#[derive(Clone)]
pub struct RememberedDeviceTracker {
    key: Vec<u8>,
    options: RememberedDeviceOptions,
}

impl RememberedDeviceTracker {
    /// Create a tracker with the given signing key.
    #[must_use]
    pub fn new(key: impl Into<Vec<u8>>, options: RememberedDeviceOptions) -> Self {
        Self {
            key: key.into(),
            options,
        }
    }

    /// Create a tracker with a random key.
    ///
    /// Assertions do not survive a process restart with a random key; pass a
    /// stable key to [`new`](Self::new) for that.
    #[must_use]
    pub fn with_random_key(options: RememberedDeviceOptions) -> Self {
        use rand::RngCore;
        let mut key = vec![0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self::new(key, options)
    }

    /// Issue an assertion that this device completed two-factor for the
    /// account. Returns the token to hand to the transport layer.
    pub fn remember(&self, account_id: &str) -> String {
        self.remember_at(account_id, SystemTime::now())
    }

    /// Issue an assertion anchored at a specific instant (useful for tests).
    pub fn remember_at(&self, account_id: &str, now: SystemTime) -> String {
        let expires = now + self.options.trust_duration;
        let expires_unix = expires
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        let payload = format!("{account_id}|{expires_unix}");
        let tag = self.sign(payload.as_bytes());
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(tag)
        )
    }

    /// Whether a token is a valid, unexpired assertion for this account.
    pub fn is_remembered(&self, account_id: &str, token: &str) -> bool {
        self.is_remembered_at(account_id, token, SystemTime::now())
    }

    /// Verify a token at a specific instant (useful for tests).
    pub fn is_remembered_at(&self, account_id: &str, token: &str, now: SystemTime) -> bool {
        let Some((payload_b64, tag_b64)) = token.split_once('.') else {
            return false;
        };
        let (Ok(payload), Ok(tag)) = (
            URL_SAFE_NO_PAD.decode(payload_b64),
            URL_SAFE_NO_PAD.decode(tag_b64),
        ) else {
            return false;
        };

        let expected = self.sign(&payload);
        if expected.ct_eq(&tag).unwrap_u8() != 1 {
            return false;
        }

        let Ok(payload) = String::from_utf8(payload) else {
            return false;
        };
        let Some((token_account, expires)) = payload.rsplit_once('|') else {
            return false;
        };
        if token_account != account_id {
            return false;
        }
        let Ok(expires_unix) = expires.parse::<u64>() else {
            return false;
        };

        let now_unix = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        now_unix < expires_unix
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC-SHA256 accepts keys of any length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> RememberedDeviceTracker {
        RememberedDeviceTracker::new(b"test-signing-key".to_vec(), RememberedDeviceOptions::new())
    }

    #[test]
    fn issued_assertion_verifies() {
        let tracker = tracker();
        let token = tracker.remember("user-1");
        assert!(tracker.is_remembered("user-1", &token));
    }

    #[test]
    fn assertion_is_account_specific() {
        let tracker = tracker();
        let token = tracker.remember("user-1");
        assert!(!tracker.is_remembered("user-2", &token));
    }

    #[test]
    fn assertion_expires() {
        let tracker = RememberedDeviceTracker::new(
            b"test-signing-key".to_vec(),
            RememberedDeviceOptions::new().trust_duration(Duration::from_secs(60)),
        );
        let issued_at = SystemTime::now();
        let token = tracker.remember_at("user-1", issued_at);

        assert!(tracker.is_remembered_at("user-1", &token, issued_at + Duration::from_secs(59)));
        assert!(!tracker.is_remembered_at("user-1", &token, issued_at + Duration::from_secs(61)));
    }

    #[test]
    fn tampered_tokens_fail() {
        let tracker = tracker();
        let token = tracker.remember("user-1");

        let mut tampered = token.clone();
        tampered.pop();
        assert!(!tracker.is_remembered("user-1", &tampered));

        assert!(!tracker.is_remembered("user-1", "garbage"));
        assert!(!tracker.is_remembered("user-1", ""));
        assert!(!tracker.is_remembered("user-1", "a.b"));
    }

    #[test]
    fn key_rotation_revokes_all_assertions() {
        let first = tracker();
        let token = first.remember("user-1");

        let rotated = RememberedDeviceTracker::new(
            b"different-key".to_vec(),
            RememberedDeviceOptions::new(),
        );
        assert!(!rotated.is_remembered("user-1", &token));
    }

    #[test]
    fn account_ids_containing_separator_are_handled() {
        let tracker = tracker();
        let token = tracker.remember("user|odd");
        assert!(tracker.is_remembered("user|odd", &token));
        assert!(!tracker.is_remembered("user", &token));
    }
}
