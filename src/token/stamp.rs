//! Stamp-bound token provider.

use crate::error::Result;
use crate::otp;
use crate::store::Account;
use crate::token::TokenProvider;
use async_trait::async_trait;

/// Derives codes from the account's current security stamp.
///
/// The stamp bytes are the TOTP secret and `"Totp:{purpose}:{account_id}"`
/// is the HMAC modifier, so a code is bound to one account and one purpose.
/// Validation always recomputes from the *current* stamp; there is no token
/// store and no expiry list — rotating the stamp is the revocation mechanism.
#[derive(Clone, Copy, Debug, Default)]
pub struct StampBoundTokenProvider;

impl StampBoundTokenProvider {
    fn modifier(purpose: &str, account: &Account) -> String {
        format!("Totp:{purpose}:{}", account.id)
    }
}

#[async_trait]
impl TokenProvider for StampBoundTokenProvider {
    async fn generate(&self, purpose: &str, account: &Account) -> Result<String> {
        let modifier = Self::modifier(purpose, account);
        let step = otp::time_step(std::time::SystemTime::now());
        let code = otp::compute_code(account.security_stamp.as_bytes(), step, Some(&modifier));
        Ok(otp::format_code(code))
    }

    async fn validate(&self, purpose: &str, token: &str, account: &Account) -> Result<bool> {
        let code: u32 = match token.trim().parse() {
            Ok(code) if code < 1_000_000 => code,
            _ => return Ok(false),
        };
        let modifier = Self::modifier(purpose, account);
        let valid = otp::validate(account.security_stamp.as_bytes(), code, Some(&modifier));
        if !valid {
            tracing::debug!(
                target: "token.stamp.rejected",
                account_id = %account.id,
                purpose = %purpose,
                "Stamp-bound token failed validation"
            );
        }
        Ok(valid)
    }

    async fn can_generate_for(&self, account: &Account) -> bool {
        !account.security_stamp.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account::new("alice")
    }

    #[tokio::test]
    async fn generated_token_validates_for_same_purpose() {
        let provider = StampBoundTokenProvider;
        let account = account();

        let token = provider.generate("ResetPassword", &account).await.unwrap();
        assert_eq!(token.len(), 6);
        assert!(provider
            .validate("ResetPassword", &token, &account)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn token_is_purpose_specific() {
        let provider = StampBoundTokenProvider;
        let account = account();

        let token = provider.generate("ResetPassword", &account).await.unwrap();
        assert!(!provider
            .validate("ChangeEmail:x@example.com", &token, &account)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn token_is_account_specific() {
        let provider = StampBoundTokenProvider;
        let alice = account();
        let bob = Account::new("bob");

        let token = provider.generate("ResetPassword", &alice).await.unwrap();
        assert!(!provider.validate("ResetPassword", &token, &bob).await.unwrap());
    }

    #[tokio::test]
    async fn stamp_rotation_invalidates_token() {
        let provider = StampBoundTokenProvider;
        let mut account = account();

        let token = provider.generate("ResetPassword", &account).await.unwrap();
        account.security_stamp = uuid::Uuid::new_v4().to_string();
        assert!(!provider
            .validate("ResetPassword", &token, &account)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn garbage_tokens_fail_without_error() {
        let provider = StampBoundTokenProvider;
        let account = account();

        assert!(!provider.validate("ResetPassword", "", &account).await.unwrap());
        assert!(!provider
            .validate("ResetPassword", "not-a-code", &account)
            .await
            .unwrap());
        assert!(!provider
            .validate("ResetPassword", "12345678", &account)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn can_generate_requires_a_stamp() {
        let provider = StampBoundTokenProvider;
        let mut account = account();
        assert!(provider.can_generate_for(&account).await);

        account.security_stamp = String::new();
        assert!(!provider.can_generate_for(&account).await);
    }
}
