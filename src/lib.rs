//! Seawall - account security tokens and sign-in orchestration
//!
//! Seawall issues, validates, and invalidates short-lived proof-of-possession
//! tokens for account security operations (password reset, email/phone
//! confirmation, two-factor authentication) and orchestrates the multi-step
//! sign-in protocol that uses them: password verification, progressive
//! lockout, two-factor challenges, recovery-code fallback, and remembered
//! devices.
//!
//! # Features
//!
//! - **TOTP engine**: RFC 6238/4226 codes with purpose-binding modifiers
//! - **Stamp-bound tokens**: every token derives from the account's security
//!   stamp, so one stamp rotation revokes them all — no token table
//! - **Authenticator support**: standard TOTP-app codes over a Base32 secret
//! - **Recovery codes**: batched, single-use, atomically redeemed
//! - **Lockout**: pure decision functions over failed-attempt counters
//! - **Sign-in coordinator**: the state machine tying it all together
//!
//! Persistence, password hashing, and session transport stay behind narrow
//! traits ([`AccountStore`], [`PasswordVerifier`], [`SessionManager`]);
//! seawall is a library a host maps its transport onto, not a server.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use seawall::{SignInCoordinator, SignInOutcome};
//! use std::sync::Arc;
//!
//! let coordinator = SignInCoordinator::new(store, hasher, sessions);
//!
//! match coordinator.password_sign_in("alice", password, false, true, None).await? {
//!     SignInOutcome::Success => { /* signed in */ }
//!     SignInOutcome::TwoFactorRequired(challenge) => {
//!         // Prompt for a code, then:
//!         coordinator.complete_two_factor(&challenge, "Authenticator", code, true, false).await?;
//!     }
//!     SignInOutcome::LockedOut => { /* tell the user to wait */ }
//!     _ => { /* rejected */ }
//! }
//! ```

pub mod config;
pub mod encoding;
mod error;
pub mod lockout;
pub mod otp;
pub mod remembered;
pub mod signin;
pub mod store;
pub mod token;

// Re-exports for public API
pub use config::{LockoutOptions, RememberedDeviceOptions, TokenOptions};
pub use error::{Result, SeawallError};
pub use lockout::{LockoutDecision, LockoutPolicy};
pub use remembered::RememberedDeviceTracker;
pub use signin::{SignInCoordinator, SignInOutcome, TwoFactorChallenge, TwoFactorResult};
pub use store::{
    Account, AccountStore, AuthenticationMethod, ExternalLogin, PasswordCheck, PasswordVerifier,
    RecoveryRedemption, RequireConfirmedEmail, SessionManager, SignInPolicy,
};
pub use token::{
    AuthenticatorTokenProvider, RecoveryCodeProvider, StampBoundTokenProvider, TokenProvider,
    TokenProviderRegistry, TokenService,
};
