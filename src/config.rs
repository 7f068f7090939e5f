//! Configuration options for lockout, token providers, and remembered devices.

use std::time::Duration;

/// Default maximum failed attempts before lockout.
const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;

/// Default lockout duration (5 minutes). Production deployments typically
/// raise this to an hour.
const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

/// Default remembered-device lifetime (14 days).
const DEFAULT_TRUST_DURATION: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Lockout policy configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockoutOptions {
    /// Failed attempts tolerated before the account is locked.
    pub max_failed_access_attempts: u32,
    /// How long the account stays locked once tripped.
    pub lockout_duration: Duration,
}

impl Default for LockoutOptions {
    fn default() -> Self {
        Self {
            max_failed_access_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout_duration: DEFAULT_LOCKOUT_DURATION,
        }
    }
}

impl LockoutOptions {
    /// Create options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failed-attempt threshold.
    #[must_use]
    pub fn max_failed_access_attempts(mut self, max: u32) -> Self {
        self.max_failed_access_attempts = max;
        self
    }

    /// Set the lockout duration.
    #[must_use]
    pub fn lockout_duration(mut self, duration: Duration) -> Self {
        self.lockout_duration = duration;
        self
    }
}

/// Maps each token purpose to the provider name that backs it.
///
/// The defaults bind the well-known provider names registered by
/// [`TokenProviderRegistry::with_defaults`](crate::token::TokenProviderRegistry::with_defaults);
/// callers can point any purpose at any registered provider independently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenOptions {
    /// Provider backing password reset tokens.
    pub password_reset_provider: String,
    /// Provider backing email change confirmation tokens.
    pub change_email_provider: String,
    /// Provider backing phone change confirmation tokens.
    pub change_phone_provider: String,
    /// Provider backing authenticator-app two-factor codes.
    pub authenticator_provider: String,
}

impl Default for TokenOptions {
    fn default() -> Self {
        Self {
            password_reset_provider: crate::token::provider_names::DEFAULT.to_string(),
            change_email_provider: crate::token::provider_names::EMAIL.to_string(),
            change_phone_provider: crate::token::provider_names::PHONE.to_string(),
            authenticator_provider: crate::token::provider_names::AUTHENTICATOR.to_string(),
        }
    }
}

impl TokenOptions {
    /// Create options with the well-known defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider backing password reset tokens.
    #[must_use]
    pub fn password_reset_provider(mut self, name: impl Into<String>) -> Self {
        self.password_reset_provider = name.into();
        self
    }

    /// Set the provider backing email change tokens.
    #[must_use]
    pub fn change_email_provider(mut self, name: impl Into<String>) -> Self {
        self.change_email_provider = name.into();
        self
    }

    /// Set the provider backing phone change tokens.
    #[must_use]
    pub fn change_phone_provider(mut self, name: impl Into<String>) -> Self {
        self.change_phone_provider = name.into();
        self
    }

    /// Set the provider backing authenticator two-factor codes.
    #[must_use]
    pub fn authenticator_provider(mut self, name: impl Into<String>) -> Self {
        self.authenticator_provider = name.into();
        self
    }
}

/// Configuration for the remembered-device tracker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RememberedDeviceOptions {
    /// How long a device stays remembered after completing two-factor.
    pub trust_duration: Duration,
}

impl Default for RememberedDeviceOptions {
    fn default() -> Self {
        Self {
            trust_duration: DEFAULT_TRUST_DURATION,
        }
    }
}

impl RememberedDeviceOptions {
    /// Create options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trust duration.
    #[must_use]
    pub fn trust_duration(mut self, duration: Duration) -> Self {
        self.trust_duration = duration;
        self
    }
}
