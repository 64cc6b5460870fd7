//! Account domain: model, persistence, gate, notifier and the services the
//! HTTP layer calls into.

pub mod authentication;
pub mod config;
pub mod error;
pub mod gate;
pub mod jwt;
pub mod management;
pub mod model;
pub mod notifier;
pub mod password;
pub mod store;
pub mod tokens;
pub mod users;
pub mod validation;

use crate::mailer::Mailer;
use authentication::Authentication;
use config::AccountsConfig;
use jwt::JwtKeys;
use management::AuthManagement;
use notifier::{Notifier, NotifyObserver};
use password::Passwords;
use secrecy::SecretString;
use std::sync::Arc;
use store::AccountStore;
use users::AccountService;

/// Everything a request handler needs, wired around one store and one notifier.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn AccountStore>,
    pub users: Arc<AccountService>,
    pub management: Arc<AuthManagement>,
    pub authentication: Arc<Authentication>,
}

impl Services {
    #[must_use]
    pub fn new(
        store: Arc<dyn AccountStore>,
        mailer: Arc<dyn Mailer>,
        config: &AccountsConfig,
        jwt_secret: &SecretString,
    ) -> Self {
        ServicesBuilder::new(store, mailer, config, jwt_secret).build()
    }

    #[must_use]
    pub fn builder(
        store: Arc<dyn AccountStore>,
        mailer: Arc<dyn Mailer>,
        config: &AccountsConfig,
        jwt_secret: &SecretString,
    ) -> ServicesBuilder {
        ServicesBuilder::new(store, mailer, config, jwt_secret)
    }
}

/// Lets callers swap the hashing cost or hook into notifications.
pub struct ServicesBuilder {
    store: Arc<dyn AccountStore>,
    mailer: Arc<dyn Mailer>,
    config: AccountsConfig,
    keys: Arc<JwtKeys>,
    passwords: Passwords,
    observer: Option<Arc<dyn NotifyObserver>>,
}

impl ServicesBuilder {
    fn new(
        store: Arc<dyn AccountStore>,
        mailer: Arc<dyn Mailer>,
        config: &AccountsConfig,
        jwt_secret: &SecretString,
    ) -> Self {
        Self {
            store,
            mailer,
            keys: Arc::new(JwtKeys::new(jwt_secret, config.jwt_ttl_seconds())),
            config: config.clone(),
            passwords: Passwords::default(),
            observer: None,
        }
    }

    #[must_use]
    pub fn passwords(mut self, passwords: Passwords) -> Self {
        self.passwords = passwords;
        self
    }

    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn NotifyObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn build(self) -> Services {
        let mut notifier = Notifier::new(
            self.mailer,
            self.config.mailer_from().to_string(),
            self.config.frontend_base_url(),
        );
        if let Some(observer) = self.observer {
            notifier = notifier.with_observer(observer);
        }
        let notifier = Arc::new(notifier);
        let passwords = Arc::new(self.passwords);
        let token_ttl = self.config.token_ttl();

        Services {
            users: Arc::new(AccountService::new(
                self.store.clone(),
                notifier.clone(),
                passwords.clone(),
                token_ttl,
            )),
            management: Arc::new(AuthManagement::new(
                self.store.clone(),
                notifier,
                passwords.clone(),
                token_ttl,
            )),
            authentication: Arc::new(Authentication::new(
                self.store.clone(),
                passwords,
                self.keys,
            )),
            store: self.store,
        }
    }
}
