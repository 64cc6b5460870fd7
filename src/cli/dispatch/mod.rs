use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
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
        .map(SecretString::from)
        .context("missing required argument: --jwt-secret")?;

    let frontend_base_url = matches
        .get_one::<String>("frontend-base-url")
        .cloned()
        .unwrap_or_else(|| "http://localhost:4200".to_string());
    let token_ttl_seconds = matches
        .get_one::<i64>("token-ttl-seconds")
        .copied()
        .unwrap_or(432_000);
    let jwt_ttl_seconds = matches
        .get_one::<i64>("jwt-ttl-seconds")
        .copied()
        .unwrap_or(86_400);

    let mailer_from = matches.get_one::<String>("mailer-from").cloned();
    let smtp_host = matches.get_one::<String>("smtp-host").cloned();
    let smtp_username = matches.get_one::<String>("smtp-username").cloned();
    let smtp_password = matches
        .get_one::<String>("smtp-password")
        .cloned()
        .map(SecretString::from);

    Ok(Action::Server(Args {
        port,
        dsn,
        frontend_base_url,
        token_ttl_seconds,
        jwt_secret,
        jwt_ttl_seconds,
        mailer_from,
        smtp_host,
        smtp_username,
        smtp_password,
    }))
}
