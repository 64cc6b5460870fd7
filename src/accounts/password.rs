//! Argon2id password hashing with a per-record salt (PHC string format).

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use rand::rngs::OsRng;
use tracing::error;

#[derive(Clone, Debug)]
pub struct Passwords {
    params: Params,
}

impl Default for Passwords {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Passwords {
    #[must_use]
    pub const fn with_params(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash `password` into a PHC string on the blocking pool.
    ///
    /// # Errors
    /// Returns an error if hashing fails.
    pub async fn hash(&self, password: &str) -> Result<String> {
        let argon2 = self.argon2();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hash_with(&argon2, &password))
            .await
            .context("password hashing task failed")?
    }

    /// Check `password` against a stored PHC string. A malformed hash never matches.
    pub async fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let argon2 = self.argon2();
        let password = password.to_string();
        let stored_hash = stored_hash.to_string();
        match tokio::task::spawn_blocking(move || verify_with(&argon2, &password, &stored_hash))
            .await
        {
            Ok(matches) => matches,
            Err(err) => {
                error!("password verification task failed: {err}");
                false
            }
        }
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| anyhow!("failed to hash password"))?
        .to_string();
    Ok(hash)
}

fn verify_with(argon2: &Argon2<'_>, password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    argon2.verify_password(password.as_bytes(), &parsed).is_ok()
}
