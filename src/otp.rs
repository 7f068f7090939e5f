//! Time-based one-time passwords (RFC 6238 / RFC 4226).
//!
//! Codes are derived from an HMAC-SHA1 over the 30-second time step counter,
//! optionally mixed with a modifier string. The modifier is what binds a code
//! to a purpose (password reset, a specific new email address, ...): a code
//! computed with one modifier never verifies under another.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha1 = Hmac<Sha1>;

/// Width of the time step window, per RFC 6238.
const TIME_STEP: Duration = Duration::from_secs(30);

/// Codes from this many steps either side of "now" are accepted, giving a
/// ±90 second total skew tolerance.
const VALIDATION_WINDOW: i64 = 2;

/// Secret length in bytes (160 bits, matching the SHA-1 block).
const SECRET_LEN: usize = 20;

/// Generate a fresh 20-byte secret from the OS CSPRNG.
pub fn generate_secret() -> [u8; SECRET_LEN] {
    let mut secret = [0u8; SECRET_LEN];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    secret
}

/// The time step number for an instant: `floor(unix_seconds / 30)`.
pub fn time_step(now: SystemTime) -> u64 {
    let elapsed = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    elapsed / TIME_STEP.as_secs()
}

/// Compute the 6-digit code for a secret at a specific time step.
///
/// The counter is serialized as an 8-byte big-endian integer; a non-empty
/// modifier has its UTF-8 bytes appended before the HMAC. Truncation follows
/// RFC 4226 §5.3.
pub fn compute_code(secret: &[u8], time_step_number: u64, modifier: Option<&str>) -> u32 {
    let mut mac = HmacSha1::new_from_slice(secret)
        .expect("HMAC-SHA1 accepts keys of any length");

    mac.update(&time_step_number.to_be_bytes());
    if let Some(modifier) = modifier.filter(|m| !m.is_empty()) {
        mac.update(modifier.as_bytes());
    }
    let hash = mac.finalize().into_bytes();

    // Dynamic truncation: low nibble of the last byte picks the offset.
    let offset = (hash[19] & 0x0F) as usize;
    let binary = u32::from_be_bytes([
        hash[offset] & 0x7F,
        hash[offset + 1],
        hash[offset + 2],
        hash[offset + 3],
    ]);

    binary % 1_000_000
}

/// Render a code as the zero-padded 6-digit string shown to users.
pub fn format_code(code: u32) -> String {
    format!("{code:06}")
}

/// Validate a submitted code against the current time.
pub fn validate(secret: &[u8], code: u32, modifier: Option<&str>) -> bool {
    validate_at(secret, code, modifier, SystemTime::now())
}

/// Validate a submitted code at a specific instant (useful for testing).
///
/// Accepts the code for the current step and any step within
/// [`VALIDATION_WINDOW`] of it. The comparison deliberately checks every step
/// in the window rather than returning early, so validation time does not
/// depend on which step matched.
pub fn validate_at(secret: &[u8], code: u32, modifier: Option<&str>, now: SystemTime) -> bool {
    let current = time_step(now) as i64;
    let mut matched = false;
    for step in (current - VALIDATION_WINDOW)..=(current + VALIDATION_WINDOW) {
        if step < 0 {
            continue;
        }
        if compute_code(secret, step as u64, modifier) == code {
            matched = true;
        }
    }
    matched
}
