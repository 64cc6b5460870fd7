//! Account service configuration.

use chrono::Duration;

const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:4200";
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 5 * 24 * 60 * 60;
const DEFAULT_JWT_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_MAILER_FROM: &str = "no-reply@custodia.localhost";

#[derive(Clone, Debug)]
pub struct AccountsConfig {
    frontend_base_url: String,
    token_ttl_seconds: i64,
    jwt_ttl_seconds: i64,
    mailer_from: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FRONTEND_BASE_URL.to_string())
    }
}

impl AccountsConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            jwt_ttl_seconds: DEFAULT_JWT_TTL_SECONDS,
            mailer_from: DEFAULT_MAILER_FROM.to_string(),
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_jwt_ttl_seconds(mut self, seconds: i64) -> Self {
        self.jwt_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_mailer_from(mut self, from: String) -> Self {
        self.mailer_from = from;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn mailer_from(&self) -> &str {
        &self.mailer_from
    }

    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::seconds(self.token_ttl_seconds)
    }

    #[must_use]
    pub const fn jwt_ttl_seconds(&self) -> i64 {
        self.jwt_ttl_seconds
    }
}
