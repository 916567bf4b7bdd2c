//! Command-line argument dispatch and server initialization.
//!
//! This module maps validated CLI arguments to the action executed by the
//! binary, currently only starting the API server.

use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
///
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let jwt_secret = matches
        .get_one::<String>("jwt-secret")
        .cloned()
        .context("missing required argument: --jwt-secret")?;

    let get_i64 = |name: &str| matches.get_one::<i64>(name).copied().unwrap_or_default();
    let get_u64 = |name: &str| matches.get_one::<u64>(name).copied().unwrap_or_default();

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret: SecretString::from(jwt_secret),
        frontend_base_url: matches
            .get_one::<String>("frontend-base-url")
            .cloned()
            .unwrap_or_else(|| "https://klienta.dev".to_string()),
        session_ttl_seconds: get_i64("session-ttl-seconds"),
        reset_token_ttl_seconds: get_i64("reset-token-ttl-seconds"),
        verification_token_ttl_seconds: get_i64("verification-token-ttl-seconds"),
        lockout_threshold: matches
            .get_one::<i32>("lockout-threshold")
            .copied()
            .unwrap_or(5),
        lockout_seconds: get_i64("lockout-seconds"),
        email_outbox_poll_seconds: get_u64("email-outbox-poll-seconds"),
        email_outbox_batch_size: matches
            .get_one::<usize>("email-outbox-batch-size")
            .copied()
            .unwrap_or(10),
        email_outbox_max_attempts: matches
            .get_one::<u32>("email-outbox-max-attempts")
            .copied()
            .unwrap_or(5),
        email_outbox_backoff_base_seconds: get_u64("email-outbox-backoff-base-seconds"),
        email_outbox_backoff_max_seconds: get_u64("email-outbox-backoff-max-seconds"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn handler_builds_server_action_from_env() {
        temp_env::with_vars(
            [
                (
                    "KLIENTA_DSN",
                    Some("postgres://user@localhost:5432/klienta"),
                ),
                ("KLIENTA_JWT_SECRET", Some("dispatch-secret")),
                ("KLIENTA_SESSION_TTL_SECONDS", Some("7200")),
                ("KLIENTA_LOCKOUT_THRESHOLD", Some("3")),
            ],
            || {
                let matches = commands::new().get_matches_from(vec!["klienta"]);
                let action = handler(&matches).expect("handler should succeed");

                let Action::Server(args) = action;
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, "postgres://user@localhost:5432/klienta");
                assert_eq!(args.jwt_secret.expose_secret(), "dispatch-secret");
                assert_eq!(args.session_ttl_seconds, 7200);
                assert_eq!(args.lockout_threshold, 3);
                assert_eq!(args.email_outbox_batch_size, 10);
            },
        );
    }
}
