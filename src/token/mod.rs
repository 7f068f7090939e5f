//! Token providers: generation and validation of proof-of-possession codes.
//!
//! Three provider families back the well-known names:
//!
//! - [`StampBoundTokenProvider`] derives codes from the account's current
//!   security stamp, so any stamp rotation silently revokes every
//!   outstanding code. Backs `"Default"`, `"Email"`, and `"Phone"`.
//! - [`AuthenticatorTokenProvider`] derives codes from the independent
//!   authenticator secret, matching standard TOTP-app behavior. Backs
//!   `"Authenticator"`.
//! - [`RecoveryCodeProvider`] redeems pre-generated one-time codes. Backs
//!   `"Recovery"`.

mod authenticator;
mod recovery;
mod stamp;

pub use authenticator::AuthenticatorTokenProvider;
pub use recovery::{generate_batch, RecoveryCodeProvider};
pub use stamp::StampBoundTokenProvider;

use crate::config::TokenOptions;
use crate::error::{Result, SeawallError};
use crate::store::{Account, AccountStore, RecoveryRedemption};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Well-known provider names.
pub mod provider_names {
    /// Stamp-bound provider used for password reset.
    pub const DEFAULT: &str = "Default";
    /// Stamp-bound provider used for email change confirmation.
    pub const EMAIL: &str = "Email";
    /// Stamp-bound provider used for phone change confirmation.
    pub const PHONE: &str = "Phone";
    /// Authenticator-app provider.
    pub const AUTHENTICATOR: &str = "Authenticator";
    /// Recovery code provider.
    pub const RECOVERY: &str = "Recovery";
}

/// Token purposes. The purpose participates in stamp-bound derivation, so a
/// token generated for one purpose never verifies under another.
pub mod purpose {
    /// Password reset.
    pub const RESET_PASSWORD: &str = "ResetPassword";

    /// Email change, bound to the new address being confirmed.
    pub fn change_email(new_email: &str) -> String {
        format!("ChangeEmail:{new_email}")
    }

    /// Phone change, bound to the new number being confirmed.
    pub fn change_phone(new_phone: &str) -> String {
        format!("ChangePhone:{new_phone}")
    }

    /// Two-factor sign-in.
    pub const TWO_FACTOR: &str = "TwoFactor";
}

/// A token provider: generates and validates codes for an account.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Generate a code for the given purpose.
    async fn generate(&self, purpose: &str, account: &Account) -> Result<String>;

    /// Validate a submitted code for the given purpose.
    ///
    /// `Ok(false)` means the code did not verify; errors are reserved for
    /// typed conditions ([`SeawallError::TokenAlreadyUsed`]) and
    /// infrastructure failures.
    async fn validate(&self, purpose: &str, token: &str, account: &Account) -> Result<bool>;

    /// Whether this provider can generate tokens for the account at all.
    async fn can_generate_for(&self, account: &Account) -> bool;
}

/// Caller-configurable mapping from provider name to provider.
#[derive(Clone, Default)]
pub struct TokenProviderRegistry {
    providers: HashMap<String, Arc<dyn TokenProvider>>,
}

impl TokenProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the well-known defaults bound: `"Default"`,
    /// `"Email"`, and `"Phone"` to stamp-bound providers, `"Authenticator"`
    /// to the authenticator provider, and `"Recovery"` to the recovery code
    /// provider.
    #[must_use]
    pub fn with_defaults<S: AccountStore + 'static>(store: Arc<S>) -> Self {
        let mut registry = Self::new();
        registry.register(provider_names::DEFAULT, Arc::new(StampBoundTokenProvider));
        registry.register(provider_names::EMAIL, Arc::new(StampBoundTokenProvider));
        registry.register(provider_names::PHONE, Arc::new(StampBoundTokenProvider));
        registry.register(
            provider_names::AUTHENTICATOR,
            Arc::new(AuthenticatorTokenProvider),
        );
        registry.register(
            provider_names::RECOVERY,
            Arc::new(RecoveryCodeProvider::new(store)),
        );
        registry
    }

    /// Register (or replace) a provider under a name.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn TokenProvider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Look up a provider by name.
    ///
    /// An unregistered name is a configuration error and surfaces as
    /// [`SeawallError::UnknownTokenProvider`] rather than a sign-in failure.
    pub fn get(&self, name: &str) -> Result<Arc<dyn TokenProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| SeawallError::UnknownTokenProvider(name.to_string()))
    }

    /// Registered names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

/// Store-aware facade over the provider registry.
///
/// Owns the sensitive mutations: security stamp rotation, authenticator key
/// reset, and recovery code batches. Generated codes are returned to the
/// caller, which forwards them to its own delivery channel; this crate never
/// sends anything.
pub struct TokenService<S: AccountStore> {
    store: Arc<S>,
    registry: TokenProviderRegistry,
    options: TokenOptions,
}

impl<S: AccountStore + 'static> TokenService<S> {
    /// Create a service with the default registry and options.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        let registry = TokenProviderRegistry::with_defaults(store.clone());
        Self {
            store,
            registry,
            options: TokenOptions::default(),
        }
    }

    /// Replace the provider registry.
    #[must_use]
    pub fn with_registry(mut self, registry: TokenProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the token options.
    #[must_use]
    pub fn with_options(mut self, options: TokenOptions) -> Self {
        self.options = options;
        self
    }

    /// The provider registry.
    #[must_use]
    pub fn registry(&self) -> &TokenProviderRegistry {
        &self.registry
    }

    /// Generate a token for a purpose through a named provider.
    pub async fn generate_token(
        &self,
        account: &Account,
        provider_name: &str,
        purpose: &str,
    ) -> Result<String> {
        self.registry.get(provider_name)?.generate(purpose, account).await
    }

    /// Verify a token for a purpose through a named provider.
    pub async fn verify_token(
        &self,
        account: &Account,
        provider_name: &str,
        purpose: &str,
        token: &str,
    ) -> Result<bool> {
        self.registry
            .get(provider_name)?
            .validate(purpose, token, account)
            .await
    }

    /// Generate a password reset token.
    pub async fn generate_password_reset_token(&self, account: &Account) -> Result<String> {
        self.generate_token(
            account,
            &self.options.password_reset_provider,
            purpose::RESET_PASSWORD,
        )
        .await
    }

    /// Verify a password reset token.
    pub async fn verify_password_reset_token(
        &self,
        account: &Account,
        token: &str,
    ) -> Result<bool> {
        self.verify_token(
            account,
            &self.options.password_reset_provider,
            purpose::RESET_PASSWORD,
            token,
        )
        .await
    }

    /// Generate a confirmation token bound to a new email address.
    pub async fn generate_change_email_token(
        &self,
        account: &Account,
        new_email: &str,
    ) -> Result<String> {
        self.generate_token(
            account,
            &self.options.change_email_provider,
            &purpose::change_email(new_email),
        )
        .await
    }

    /// Verify an email change token against the address it was issued for.
    pub async fn verify_change_email_token(
        &self,
        account: &Account,
        new_email: &str,
        token: &str,
    ) -> Result<bool> {
        self.verify_token(
            account,
            &self.options.change_email_provider,
            &purpose::change_email(new_email),
            token,
        )
        .await
    }

    /// Generate a confirmation token bound to a new phone number.
    pub async fn generate_change_phone_token(
        &self,
        account: &Account,
        new_phone: &str,
    ) -> Result<String> {
        self.generate_token(
            account,
            &self.options.change_phone_provider,
            &purpose::change_phone(new_phone),
        )
        .await
    }

    /// Verify a phone change token against the number it was issued for.
    pub async fn verify_change_phone_token(
        &self,
        account: &Account,
        new_phone: &str,
        token: &str,
    ) -> Result<bool> {
        self.verify_token(
            account,
            &self.options.change_phone_provider,
            &purpose::change_phone(new_phone),
            token,
        )
        .await
    }

    /// Generate a two-factor code through the configured authenticator
    /// provider.
    pub async fn generate_two_factor_token(&self, account: &Account) -> Result<String> {
        self.generate_token(
            account,
            &self.options.authenticator_provider,
            purpose::TWO_FACTOR,
        )
        .await
    }

    /// Verify a two-factor code through the configured authenticator
    /// provider.
    pub async fn verify_two_factor_token(&self, account: &Account, token: &str) -> Result<bool> {
        self.verify_token(
            account,
            &self.options.authenticator_provider,
            purpose::TWO_FACTOR,
            token,
        )
        .await
    }

    /// Provider names able to serve a two-factor challenge for this account.
    pub async fn two_factor_providers(&self, account: &Account) -> Vec<String> {
        let mut names = Vec::new();
        for (name, provider) in &self.registry.providers {
            if provider.can_generate_for(account).await {
                names.push(name.clone());
            }
        }
        names.sort();
        names
    }

    /// Rotate the account's security stamp, revoking every outstanding
    /// stamp-bound token at once. Called on any sensitive mutation.
    pub async fn rotate_security_stamp(&self, mut account: Account) -> Result<Account> {
        account.security_stamp = uuid::Uuid::new_v4().to_string();
        let account = self.store.update(account).await?;
        tracing::info!(
            target: "token.stamp.rotated",
            account_id = %account.id,
            "Security stamp rotated; outstanding stamp-bound tokens revoked"
        );
        Ok(account)
    }

    /// Generate a fresh authenticator secret for the account, replacing any
    /// existing one, and rotate the stamp. Returns the updated account and
    /// the Base32 key to show the user.
    pub async fn reset_authenticator_key(&self, mut account: Account) -> Result<(Account, String)> {
        let key = crate::encoding::encode(&crate::otp::generate_secret());
        account.authenticator_key = Some(key.clone());
        account.security_stamp = uuid::Uuid::new_v4().to_string();
        let account = self.store.update(account).await?;
        tracing::info!(
            target: "token.authenticator.key_reset",
            account_id = %account.id,
            "Authenticator key reset"
        );
        Ok((account, key))
    }

    /// Generate a batch of recovery codes, atomically discarding any
    /// previous batch. Returns the plain codes for one-time display.
    pub async fn generate_recovery_codes(
        &self,
        account: &Account,
        count: usize,
    ) -> Result<Vec<String>> {
        let codes = generate_batch(count);
        self.store.replace_recovery_codes(&account.id, &codes).await?;
        tracing::info!(
            target: "token.recovery.batch_generated",
            account_id = %account.id,
            count = count,
            "Recovery code batch generated; previous batch discarded"
        );
        Ok(codes)
    }

    /// Redeem a recovery code, returning how many remain.
    ///
    /// Fails with [`SeawallError::TokenAlreadyUsed`] on reuse and
    /// [`SeawallError::InvalidOrExpiredToken`] for codes never issued.
    pub async fn redeem_recovery_code(&self, account: &Account, code: &str) -> Result<usize> {
        let normalized = recovery::normalize(code);
        match self.store.redeem_recovery_code(&account.id, &normalized).await? {
            RecoveryRedemption::Redeemed { remaining } => {
                tracing::info!(
                    target: "token.recovery.redeemed",
                    account_id = %account.id,
                    remaining = remaining,
                    "Recovery code redeemed"
                );
                Ok(remaining)
            }
            RecoveryRedemption::AlreadyUsed => Err(SeawallError::TokenAlreadyUsed),
            RecoveryRedemption::Invalid => Err(SeawallError::InvalidOrExpiredToken),
        }
    }
}
