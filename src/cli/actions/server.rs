use crate::{
    accounts::{
        config::AccountsConfig,
        store::{AccountStore, MemoryAccountStore, PgAccountStore},
        Services,
    },
    api,
    mailer::{LogMailer, Mailer, SmtpMailer},
};
use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

const MEMORY_DSN: &str = "memory://";

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_base_url: String,
    pub token_ttl_seconds: i64,
    pub jwt_secret: SecretString,
    pub jwt_ttl_seconds: i64,
    pub mailer_from: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store or mailer cannot be set up, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let store = account_store(&args.dsn).await?;
    let mailer = mailer(&args)?;

    let mut config = AccountsConfig::new(args.frontend_base_url.clone())
        .with_token_ttl_seconds(args.token_ttl_seconds)
        .with_jwt_ttl_seconds(args.jwt_ttl_seconds);
    if let Some(from) = args.mailer_from {
        config = config.with_mailer_from(from);
    }

    let services = Services::new(store, mailer, &config, &args.jwt_secret);

    let result = api::new(args.port, services, config.frontend_base_url()).await;
    crate::cli::telemetry::shutdown_tracer();
    result
}

async fn account_store(dsn: &str) -> Result<Arc<dyn AccountStore>> {
    if dsn.trim() == MEMORY_DSN {
        warn!("Using the in-memory account store; accounts are lost on restart");
        return Ok(Arc::new(MemoryAccountStore::new()));
    }

    let store = PgAccountStore::connect(dsn).await?;
    store.migrate().await?;
    Ok(Arc::new(store))
}

fn mailer(args: &Args) -> Result<Arc<dyn Mailer>> {
    match &args.smtp_host {
        Some(host) => Ok(Arc::new(SmtpMailer::new(
            host,
            args.smtp_username.clone(),
            args.smtp_password.clone(),
        )?)),
        None => {
            warn!("No SMTP host configured; account mails are only logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("frontend_base_url", args.frontend_base_url.clone()),
        ("token_ttl_seconds", args.token_ttl_seconds.to_string()),
        ("jwt_ttl_seconds", args.jwt_ttl_seconds.to_string()),
        (
            "smtp_host",
            args.smtp_host.clone().unwrap_or_else(|| "none".to_string()),
        ),
        ("smtp_password_set", args.smtp_password.is_some().to_string()),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\n{title}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}
