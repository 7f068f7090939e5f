/// The main error type for seawall operations.
///
/// Expected authentication outcomes (wrong password, locked out, two-factor
/// required) are *not* errors — they are returned as
/// [`SignInOutcome`](crate::signin::SignInOutcome) values. This enum covers
/// token-format problems, misconfiguration, store-level conflicts, and
/// infrastructure failures.
#[derive(Debug, thiserror::Error)]
pub enum SeawallError {
    /// A submitted credential failed verification where a typed outcome is
    /// not available (e.g. token service verification APIs).
    #[error("Invalid credential")]
    InvalidCredential,

    /// A token did not verify against the account's current state.
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    /// A one-time code was already redeemed.
    #[error("Token already used")]
    TokenAlreadyUsed,

    /// A token provider name was requested that is not registered.
    ///
    /// This indicates misconfiguration, not bad user input, and is surfaced
    /// as an error at call time rather than folded into a sign-in outcome.
    #[error("Unknown token provider: {0}")]
    UnknownTokenProvider(String),

    /// The store rejected an update because the entity changed underneath us.
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Malformed input to a codec (e.g. a non-Base32 authenticator key).
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// An operation the provider does not support, such as per-request
    /// generation of batch-only recovery codes. A programmer error, like
    /// [`UnknownTokenProvider`](Self::UnknownTokenProvider).
    #[error("Unsupported token operation: {0}")]
    UnsupportedOperation(String),

    /// A collaborator (store, hasher, session layer) failed. Distinct from
    /// authentication failures so callers can tell "wrong password" from
    /// "database unreachable".
    #[error("Service unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl SeawallError {
    /// Wrap an arbitrary collaborator failure as `Unavailable`.
    pub fn unavailable(err: impl Into<anyhow::Error>) -> Self {
        Self::Unavailable(err.into())
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SeawallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_message_names_the_provider() {
        let err = SeawallError::UnknownTokenProvider("Sms".to_string());
        assert_eq!(err.to_string(), "Unknown token provider: Sms");
    }

    #[test]
    fn unavailable_preserves_source() {
        let err = SeawallError::unavailable(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "db down",
        ));
        assert!(err.to_string().contains("db down"));
    }
}
