//! Recovery code provider.

use crate::error::{Result, SeawallError};
use crate::store::{Account, AccountStore, RecoveryRedemption};
use crate::token::TokenProvider;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;

/// Characters used in recovery codes. No `0`, `O`, `1`, or `I` so codes read
/// back unambiguously.
const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Characters per group; codes render as `XXXXX-XXXXX`.
const GROUP_LEN: usize = 5;

/// Generate a batch of recovery codes from the OS CSPRNG.
///
/// Callers display the batch once and persist it through
/// [`AccountStore::replace_recovery_codes`], which discards any earlier
/// batch in the same step.
pub fn generate_batch(count: usize) -> Vec<String> {
    let mut rng = rand::rngs::OsRng;
    (0..count)
        .map(|_| {
            let group = |rng: &mut rand::rngs::OsRng| {
                (0..GROUP_LEN)
                    .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
                    .collect::<String>()
            };
            format!("{}-{}", group(&mut rng), group(&mut rng))
        })
        .collect()
}

/// Normalize a submitted code to the stored form: upper-case, groups joined
/// with a single dash.
pub(crate) fn normalize(code: &str) -> String {
    let stripped: String = code
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if stripped.len() == GROUP_LEN * 2 {
        format!("{}-{}", &stripped[..GROUP_LEN], &stripped[GROUP_LEN..])
    } else {
        stripped
    }
}

/// Redeems pre-generated one-time recovery codes through the account store.
///
/// Redemption is an atomic remove-if-present on the store side, so two
/// concurrent attempts with the same code allow at most one success.
pub struct RecoveryCodeProvider<S: AccountStore> {
    store: Arc<S>,
}

impl<S: AccountStore> RecoveryCodeProvider<S> {
    /// Create a provider over the given store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: AccountStore> TokenProvider for RecoveryCodeProvider<S> {
    /// Recovery codes are batch-generated up front, never per request.
    async fn generate(&self, _purpose: &str, _account: &Account) -> Result<String> {
        Err(SeawallError::UnsupportedOperation(
            "recovery codes are generated as a batch, not per request".to_string(),
        ))
    }

    async fn validate(&self, _purpose: &str, token: &str, account: &Account) -> Result<bool> {
        let normalized = normalize(token);
        match self
            .store
            .redeem_recovery_code(&account.id, &normalized)
            .await?
        {
            RecoveryRedemption::Redeemed { remaining } => {
                tracing::info!(
                    target: "token.recovery.redeemed",
                    account_id = %account.id,
                    remaining = remaining,
                    "Recovery code redeemed"
                );
                Ok(true)
            }
            RecoveryRedemption::AlreadyUsed => Err(SeawallError::TokenAlreadyUsed),
            RecoveryRedemption::Invalid => Ok(false),
        }
    }

    async fn can_generate_for(&self, account: &Account) -> bool {
        self.store
            .recovery_codes_remaining(&account.id)
            .await
            .map(|n| n > 0)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test::InMemoryAccountStore;

    fn setup() -> (Arc<InMemoryAccountStore>, RecoveryCodeProvider<InMemoryAccountStore>, Account) {
        let store = Arc::new(InMemoryAccountStore::new());
        let account = Account::new("alice");
        store.add_account(account.clone());
        let provider = RecoveryCodeProvider::new(store.clone());
        (store, provider, account)
    }

    #[test]
    fn batch_has_grouped_format() {
        let codes = generate_batch(10);
        assert_eq!(codes.len(), 10);
        for code in &codes {
            assert_eq!(code.len(), GROUP_LEN * 2 + 1);
            assert_eq!(code.as_bytes()[GROUP_LEN], b'-');
            assert!(code
                .chars()
                .filter(|c| *c != '-')
                .all(|c| CHARSET.contains(&(c as u8))));
        }
    }

    #[test]
    fn normalize_handles_user_formatting() {
        assert_eq!(normalize("abcde-fghjk"), "ABCDE-FGHJK");
        assert_eq!(normalize("ABCDEFGHJK"), "ABCDE-FGHJK");
        assert_eq!(normalize(" abcde fghjk "), "ABCDE-FGHJK");
    }

    #[tokio::test]
    async fn each_code_redeems_exactly_once() {
        let (store, provider, account) = setup();
        let codes = generate_batch(15);
        store
            .replace_recovery_codes(&account.id, &codes)
            .await
            .unwrap();

        for code in &codes {
            assert!(provider.validate("", code, &account).await.unwrap());
        }
        for code in &codes {
            let err = provider.validate("", code, &account).await.unwrap_err();
            assert!(matches!(err, SeawallError::TokenAlreadyUsed));
        }
    }

    #[tokio::test]
    async fn per_request_generation_is_a_typed_error() {
        let (_store, provider, account) = setup();
        let err = provider.generate("TwoFactor", &account).await.unwrap_err();
        assert!(matches!(err, SeawallError::UnsupportedOperation(_)));
    }

    #[tokio::test]
    async fn unknown_code_is_invalid_not_used() {
        let (store, provider, account) = setup();
        store
            .replace_recovery_codes(&account.id, &generate_batch(5))
            .await
            .unwrap();

        assert!(!provider.validate("", "ZZZZZ-ZZZZZ", &account).await.unwrap());
    }

    #[tokio::test]
    async fn new_batch_invalidates_old_batch() {
        let (store, provider, account) = setup();
        let first = generate_batch(5);
        store
            .replace_recovery_codes(&account.id, &first)
            .await
            .unwrap();

        let second = generate_batch(5);
        store
            .replace_recovery_codes(&account.id, &second)
            .await
            .unwrap();

        // Codes from the first batch are gone entirely, not "used".
        assert!(!provider.validate("", &first[0], &account).await.unwrap());
        assert!(provider.validate("", &second[0], &account).await.unwrap());
    }

    #[tokio::test]
    async fn can_generate_reflects_remaining_codes() {
        let (store, provider, account) = setup();
        assert!(!provider.can_generate_for(&account).await);

        let codes = generate_batch(1);
        store
            .replace_recovery_codes(&account.id, &codes)
            .await
            .unwrap();
        assert!(provider.can_generate_for(&account).await);

        provider.validate("", &codes[0], &account).await.unwrap();
        assert!(!provider.can_generate_for(&account).await);
    }
}
