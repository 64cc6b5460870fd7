//! Payload predicates applied by the gate before anything touches the store.

use regex::Regex;
use std::sync::LazyLock;

// Local part: dot-separated atoms or a quoted string. Domain: an IPv4 literal
// in brackets or dotted labels ending in an alphabetic TLD.
static EMAIL_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(
        r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}))$"#,
    )
});

#[must_use]
pub fn is_email_valid(email: &str) -> bool {
    if email.is_empty() {
        return false;
    }
    EMAIL_PATTERN
        .as_ref()
        .is_ok_and(|pattern| pattern.is_match(email))
}

#[must_use]
pub fn is_password_valid(password: Option<&str>) -> bool {
    password.is_some_and(|password| !password.trim().is_empty())
}
