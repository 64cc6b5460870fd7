use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_jwt_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL used for verification and reset links")
                .env("CUSTODIA_FRONTEND_BASE_URL")
                .default_value("http://localhost:4200"),
        )
        .arg(
            Arg::new("token-ttl-seconds")
                .long("token-ttl-seconds")
                .help("Verification and reset token TTL in seconds")
                .env("CUSTODIA_TOKEN_TTL_SECONDS")
                .default_value("432000")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
}

fn with_jwt_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("jwt-secret")
                .long("jwt-secret")
                .help("HMAC secret used to sign access tokens")
                .env("CUSTODIA_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("jwt-ttl-seconds")
                .long("jwt-ttl-seconds")
                .help("Access token TTL in seconds")
                .env("CUSTODIA_JWT_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
}
