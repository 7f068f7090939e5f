//! Progressive lockout decisions.
//!
//! The policy is a pure function over the account's counters and a caller
//! supplied clock; persisting the resulting state is the coordinator's job,
//! through the account store's optimistic-concurrency update.

use crate::config::LockoutOptions;
use crate::store::Account;
use std::time::{SystemTime, UNIX_EPOCH};

/// The new counter state produced by a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockoutDecision {
    /// The new failed-attempt count to persist.
    pub failed_access_count: u32,
    /// The new lockout end to persist (unchanged unless the attempt tripped
    /// the threshold).
    pub lockout_end: Option<SystemTime>,
    /// Whether this attempt tripped the lockout.
    pub just_locked: bool,
}

/// Lockout decision logic.
#[derive(Clone, Debug, Default)]
pub struct LockoutPolicy {
    options: LockoutOptions,
}

impl LockoutPolicy {
    /// Create a policy from options.
    #[must_use]
    pub fn new(options: LockoutOptions) -> Self {
        Self { options }
    }

    /// The configured options.
    #[must_use]
    pub fn options(&self) -> &LockoutOptions {
        &self.options
    }

    /// Decide the counter state after a failed attempt.
    ///
    /// Accounts with lockout disabled never accumulate state. When the
    /// incremented count reaches the threshold, the lockout window opens and
    /// the counter restarts at zero, so the attempt budget is fresh once the
    /// window elapses.
    #[must_use]
    pub fn on_failure(&self, account: &Account, now: SystemTime) -> LockoutDecision {
        if !account.lockout_enabled {
            return LockoutDecision {
                failed_access_count: account.failed_access_count,
                lockout_end: account.lockout_end,
                just_locked: false,
            };
        }

        let count = account.failed_access_count + 1;
        if count >= self.options.max_failed_access_attempts {
            let end = now + self.options.lockout_duration;
            tracing::warn!(
                target: "signin.lockout.account_locked",
                account_id = %account.id,
                attempts = count,
                duration_secs = self.options.lockout_duration.as_secs(),
                "Account locked due to failed attempts"
            );
            return LockoutDecision {
                failed_access_count: 0,
                lockout_end: Some(end),
                just_locked: true,
            };
        }

        LockoutDecision {
            failed_access_count: count,
            lockout_end: account.lockout_end,
            just_locked: false,
        }
    }

    /// Whether the account is locked out at `now`.
    ///
    /// `lockout_end` is exclusive, and the epoch value counts as "never
    /// locked" rather than "locked until 1970".
    #[must_use]
    pub fn is_locked_out(&self, account: &Account, now: SystemTime) -> bool {
        account.lockout_enabled
            && matches!(account.lockout_end, Some(end) if end != UNIX_EPOCH && end > now)
    }

    /// The counter value after a successful authentication: always zero,
    /// even for accounts with lockout disabled.
    #[must_use]
    pub fn on_success(&self) -> u32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn account() -> Account {
        Account::new("alice")
    }

    fn policy(max: u32) -> LockoutPolicy {
        LockoutPolicy::new(
            LockoutOptions::new()
                .max_failed_access_attempts(max)
                .lockout_duration(Duration::from_secs(300)),
        )
    }

    #[test]
    fn failures_accumulate_until_threshold() {
        let policy = policy(3);
        let mut acct = account();
        let now = SystemTime::now();

        let d = policy.on_failure(&acct, now);
        assert_eq!(d.failed_access_count, 1);
        assert!(!d.just_locked);
        acct.failed_access_count = d.failed_access_count;

        let d = policy.on_failure(&acct, now);
        assert_eq!(d.failed_access_count, 2);
        assert!(!d.just_locked);
        acct.failed_access_count = d.failed_access_count;

        let d = policy.on_failure(&acct, now);
        assert!(d.just_locked);
        assert_eq!(d.failed_access_count, 0);
        assert_eq!(d.lockout_end, Some(now + Duration::from_secs(300)));
    }

    #[test]
    fn threshold_trip_resets_counter_to_zero() {
        let policy = policy(2);
        let mut acct = account();
        let now = SystemTime::now();

        acct.failed_access_count = policy.on_failure(&acct, now).failed_access_count;
        let d = policy.on_failure(&acct, now);
        assert!(d.just_locked);
        assert_eq!(d.failed_access_count, 0);

        // A failure after the window elapses starts a fresh count at 1.
        acct.failed_access_count = d.failed_access_count;
        acct.lockout_end = None;
        let d = policy.on_failure(&acct, now + Duration::from_secs(301));
        assert_eq!(d.failed_access_count, 1);
        assert!(!d.just_locked);
    }

    #[test]
    fn disabled_lockout_leaves_counters_untouched() {
        let policy = policy(1);
        let mut acct = account();
        acct.lockout_enabled = false;
        acct.failed_access_count = 7;

        let d = policy.on_failure(&acct, SystemTime::now());
        assert_eq!(d.failed_access_count, 7);
        assert_eq!(d.lockout_end, None);
        assert!(!d.just_locked);
    }

    #[test]
    fn locked_out_requires_strictly_future_end() {
        let policy = policy(5);
        let now = SystemTime::now();
        let mut acct = account();

        acct.lockout_end = Some(now + Duration::from_secs(60));
        assert!(policy.is_locked_out(&acct, now));

        // Exclusive bound: an end equal to now is expired.
        acct.lockout_end = Some(now);
        assert!(!policy.is_locked_out(&acct, now));

        acct.lockout_end = Some(now - Duration::from_secs(1));
        assert!(!policy.is_locked_out(&acct, now));

        acct.lockout_end = None;
        assert!(!policy.is_locked_out(&acct, now));
    }

    #[test]
    fn epoch_lockout_end_is_never_locked() {
        let policy = policy(5);
        let mut acct = account();
        acct.lockout_end = Some(UNIX_EPOCH);
        // Even with a clock before the epoch the zero value means "never
        // locked", not "locked until 1970".
        assert!(!policy.is_locked_out(&acct, UNIX_EPOCH - Duration::from_secs(10)));
        assert!(!policy.is_locked_out(&acct, SystemTime::now()));
    }

    #[test]
    fn disabled_lockout_is_never_locked_out() {
        let policy = policy(5);
        let now = SystemTime::now();
        let mut acct = account();
        acct.lockout_enabled = false;
        acct.lockout_end = Some(now + Duration::from_secs(600));
        assert!(!policy.is_locked_out(&acct, now));
    }

    #[test]
    fn success_resets_counter() {
        assert_eq!(policy(5).on_success(), 0);
    }
}
