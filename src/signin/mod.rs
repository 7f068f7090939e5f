//! Sign-in orchestration.
//!
//! [`SignInCoordinator`] sequences the external collaborators (account
//! store, password hasher, session layer) with the crate's own lockout
//! policy, token providers, and remembered-device tracker into the
//! multi-step sign-in protocol.

mod coordinator;
mod types;

pub use coordinator::SignInCoordinator;
pub use types::{SignInOutcome, TwoFactorChallenge, TwoFactorResult};
