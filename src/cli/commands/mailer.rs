use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("mailer-from")
                .long("mailer-from")
                .help("Sender address for account mails")
                .env("CUSTODIA_MAILER_FROM")
                .default_value("no-reply@custodia.localhost"),
        )
        .arg(
            Arg::new("smtp-host")
                .long("smtp-host")
                .help("SMTP relay host; without it mails are only logged")
                .env("CUSTODIA_SMTP_HOST"),
        )
        .arg(
            Arg::new("smtp-username")
                .long("smtp-username")
                .help("SMTP username")
                .env("CUSTODIA_SMTP_USERNAME")
                .requires("smtp-host"),
        )
        .arg(
            Arg::new("smtp-password")
                .long("smtp-password")
                .help("SMTP password")
                .env("CUSTODIA_SMTP_PASSWORD")
                .hide_env_values(true)
                .requires("smtp-username"),
        )
}
