//! Sign-in outcome and challenge types.

use serde::{Deserialize, Serialize};

/// Ephemeral artifact issued after a successful password check when a
/// two-factor challenge is required. The transport layer carries it between
/// the challenge and completion steps; its lifetime is bounded by that layer,
/// not by this crate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoFactorChallenge {
    /// The account that passed the first factor.
    pub account_id: String,
    /// The external login provider used for the first factor, if any.
    pub login_provider: Option<String>,
}

impl TwoFactorChallenge {
    /// Challenge for a password-based first factor.
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            login_provider: None,
        }
    }

    /// Challenge for an external-login first factor.
    pub fn for_login(account_id: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            login_provider: Some(provider.into()),
        }
    }
}

/// The externally observable result of a sign-in step.
///
/// Expected failures are values here, never errors: a wrong password, an
/// unknown account name, and a rejected two-factor code all surface as
/// `Failed`, deliberately indistinguishable from each other. `LockedOut` is
/// revealed; `TwoFactorRequired` is control flow, not an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignInOutcome {
    /// The session has been established.
    Success,
    /// The credential or code did not verify (or the account does not
    /// exist — callers cannot tell which).
    Failed,
    /// The account is locked out until its lockout window elapses.
    LockedOut,
    /// An external policy (e.g. unconfirmed email) forbids sign-in.
    NotAllowed,
    /// The first factor passed; a second factor is required.
    TwoFactorRequired(TwoFactorChallenge),
}

impl SignInOutcome {
    /// Whether a session was established.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether a two-factor challenge was issued.
    #[must_use]
    pub fn is_two_factor_required(&self) -> bool {
        matches!(self, Self::TwoFactorRequired(_))
    }

    /// The issued challenge, if any.
    #[must_use]
    pub fn challenge(&self) -> Option<&TwoFactorChallenge> {
        match self {
            Self::TwoFactorRequired(challenge) => Some(challenge),
            _ => None,
        }
    }
}

/// Result of a two-factor completion attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TwoFactorResult {
    /// The sign-in outcome.
    pub outcome: SignInOutcome,
    /// A remembered-device assertion to hand to the transport layer, present
    /// only when the caller asked to remember the device and the code
    /// verified.
    pub remembered_device: Option<String>,
}

impl TwoFactorResult {
    pub(crate) fn of(outcome: SignInOutcome) -> Self {
        Self {
            outcome,
            remembered_device: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_round_trips_through_serde() {
        let challenge = TwoFactorChallenge::for_login("u1", "github");
        let json = serde_json::to_string(&challenge).unwrap();
        let back: TwoFactorChallenge = serde_json::from_str(&json).unwrap();
        assert_eq!(back, challenge);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_string(&SignInOutcome::LockedOut).unwrap();
        assert_eq!(json, r#"{"status":"locked_out"}"#);

        let json =
            serde_json::to_string(&SignInOutcome::TwoFactorRequired(TwoFactorChallenge::new("u1")))
                .unwrap();
        assert!(json.contains(r#""status":"two_factor_required""#));
        assert!(json.contains(r#""account_id":"u1""#));
    }

    #[test]
    fn outcome_accessors() {
        assert!(SignInOutcome::Success.is_success());
        assert!(!SignInOutcome::Failed.is_success());

        let outcome = SignInOutcome::TwoFactorRequired(TwoFactorChallenge::new("u1"));
        assert!(outcome.is_two_factor_required());
        assert_eq!(outcome.challenge().unwrap().account_id, "u1");
        assert!(SignInOutcome::Failed.challenge().is_none());
    }
}
