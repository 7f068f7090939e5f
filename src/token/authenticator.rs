//! Authenticator-app token provider.

use crate::encoding;
use crate::error::Result;
use crate::otp;
use crate::store::Account;
use crate::token::TokenProvider;
use async_trait::async_trait;

/// Derives codes from the account's authenticator secret.
///
/// No purpose or modifier participates — the same code an authenticator app
/// shows is valid regardless of what the caller passes as `purpose`, which is
/// how every standard TOTP app behaves. The secret is independent of the
/// security stamp, so stamp rotation does not invalidate authenticator codes.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthenticatorTokenProvider;

#[async_trait]
impl TokenProvider for AuthenticatorTokenProvider {
    async fn generate(&self, _purpose: &str, account: &Account) -> Result<String> {
        let key = account
            .authenticator_key
            .as_deref()
            .ok_or(crate::SeawallError::InvalidOrExpiredToken)?;
        let secret = encoding::decode(key)?;
        let step = otp::time_step(std::time::SystemTime::now());
        Ok(otp::format_code(otp::compute_code(&secret, step, None)))
    }

    async fn validate(&self, _purpose: &str, token: &str, account: &Account) -> Result<bool> {
        let key = match account.authenticator_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => return Ok(false),
        };
        let secret = match encoding::decode(key) {
            Ok(secret) => secret,
            Err(_) => {
                tracing::warn!(
                    target: "token.authenticator.bad_key",
                    account_id = %account.id,
                    "Stored authenticator key is not valid base32"
                );
                return Ok(false);
            }
        };

        // Users paste codes with spaces or dashes; strip them first.
        let cleaned = token.replace([' ', '-'], "");
        let code: u32 = match cleaned.parse() {
            Ok(code) if code < 1_000_000 => code,
            _ => return Ok(false),
        };

        Ok(otp::validate(&secret, code, None))
    }

    async fn can_generate_for(&self, account: &Account) -> bool {
        account
            .authenticator_key
            .as_deref()
            .is_some_and(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_with_key() -> Account {
        let mut account = Account::new("alice");
        account.authenticator_key = Some(encoding::encode(b"12345678901234567890"));
        account
    }

    #[tokio::test]
    async fn generated_code_validates() {
        let provider = AuthenticatorTokenProvider;
        let account = account_with_key();

        let code = provider.generate("TwoFactor", &account).await.unwrap();
        assert!(provider.validate("TwoFactor", &code, &account).await.unwrap());
    }

    #[tokio::test]
    async fn purpose_does_not_participate() {
        let provider = AuthenticatorTokenProvider;
        let account = account_with_key();

        let code = provider.generate("TwoFactor", &account).await.unwrap();
        // The same app code verifies whatever purpose the caller names.
        assert!(provider
            .validate("SomethingElse", &code, &account)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn accepts_codes_with_spaces_and_dashes() {
        let provider = AuthenticatorTokenProvider;
        let account = account_with_key();

        let code = provider.generate("TwoFactor", &account).await.unwrap();
        let spaced = format!("{} {}", &code[..3], &code[3..]);
        let dashed = format!("{}-{}", &code[..3], &code[3..]);
        assert!(provider.validate("TwoFactor", &spaced, &account).await.unwrap());
        assert!(provider.validate("TwoFactor", &dashed, &account).await.unwrap());
    }

    #[tokio::test]
    async fn missing_key_fails_validation_quietly() {
        let provider = AuthenticatorTokenProvider;
        let account = Account::new("alice");

        assert!(!provider.validate("TwoFactor", "123456", &account).await.unwrap());
        assert!(!provider.can_generate_for(&account).await);
    }

    #[tokio::test]
    async fn corrupt_key_fails_validation_quietly() {
        let provider = AuthenticatorTokenProvider;
        let mut account = Account::new("alice");
        account.authenticator_key = Some("not base32 at all!".to_string());

        assert!(!provider.validate("TwoFactor", "123456", &account).await.unwrap());
    }

    #[tokio::test]
    async fn survives_stamp_rotation() {
        let provider = AuthenticatorTokenProvider;
        let mut account = account_with_key();

        let code = provider.generate("TwoFactor", &account).await.unwrap();
        account.security_stamp = uuid::Uuid::new_v4().to_string();
        assert!(provider.validate("TwoFactor", &code, &account).await.unwrap());
    }
}
