//! # Klienta (Multi-tenant CRM backend)
//!
//! `klienta` is a CRM REST API built around a strict authentication and
//! authorization core: accounts, roles with typed permission maps, and
//! bearer-token sessions backed by PostgreSQL.
//!
//! ## Authentication
//!
//! Passwords are hashed with Argon2id and never stored or logged in plain
//! text. Login issues a signed, time-limited JWT whose SHA-256 digest is
//! recorded in `account_sessions`; a token authenticates a request only while
//! its session row exists, so logout is immediate revocation.
//!
//! - **Lockout:** five consecutive failed logins lock the account for 30
//!   minutes. Unknown email and wrong password return the same generic 401.
//! - **Single-use tokens:** password-reset and email-verification tokens are
//!   stored as digests with an expiry and cleared on first use.
//!
//! ## Authorization
//!
//! Every role carries a permission map (feature -> view/create/edit/delete).
//! Route guards check role names (`superadmin`, `admin`) or individual
//! permission bits. At most one active superadmin role can exist, enforced by
//! a partial unique index.
//!
//! ## CRM resources
//!
//! Leads, customers, tickets, tasks, meetings, projects, quotations, and
//! invoices expose authenticated CRUD under `/api`.

pub mod api;
pub mod cli;
#[cfg(test)]
pub(crate) mod test_support;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
