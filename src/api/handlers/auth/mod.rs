//! Authentication, sessions, and account self-service.
//!
//! The auth model is layered: a session token is an HS256 JWT whose digest
//! must also match a live row in `account_sessions`. Signature validity alone
//! never grants access, so logout and password reset revoke access at once.
//!
//! Reset and verification tokens carry a distinct `purpose` claim and their
//! digests are stored on the account with an expiry, making them single-use.

pub(crate) mod login;
pub(crate) mod password;
pub(crate) mod password_reset;
pub(crate) mod principal;
pub(crate) mod register;
pub(crate) mod session;
mod state;
pub(crate) mod storage;
pub(crate) mod token;
pub(crate) mod types;
pub(crate) mod utils;
pub(crate) mod verification;

#[cfg(test)]
mod tests;

pub use principal::{require_auth, require_permission, require_role, Principal};
pub use state::AuthConfig;
