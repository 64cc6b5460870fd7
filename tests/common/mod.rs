#![allow(dead_code)]

use anyhow::{anyhow, Context, Result};
use argon2::Params;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use custodia::{
    accounts::{
        config::AccountsConfig,
        notifier::{AccountSnapshot, NotifierType, NotifyObserver},
        password::Passwords,
        store::MemoryAccountStore,
        Services,
    },
    api,
    mailer::{MailRequest, Mailer},
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use tower::ServiceExt;

/// Keeps every delivered mail; can be switched to fail.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailRequest>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<MailRequest> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &MailRequest) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("smtp relay unavailable"));
        }
        self.sent
            .lock()
            .map_err(|_| anyhow!("mailer lock poisoned"))?
            .push(mail.clone());
        Ok(())
    }
}

/// Sees raw tokens before they are mailed.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(NotifierType, AccountSnapshot)>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<(NotifierType, AccountSnapshot)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn last(&self, kind: NotifierType) -> Option<AccountSnapshot> {
        self.events()
            .into_iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, snapshot)| snapshot)
    }
}

impl NotifyObserver for RecordingObserver {
    fn on_notify(&self, kind: NotifierType, snapshot: &AccountSnapshot) {
        if let Ok(mut events) = self.events.lock() {
            events.push((kind, snapshot.clone()));
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryAccountStore>,
    pub mailer: Arc<RecordingMailer>,
    pub observer: Arc<RecordingObserver>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        let store = Arc::new(MemoryAccountStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let observer = Arc::new(RecordingObserver::default());
        let config = AccountsConfig::new("http://localhost:4200".to_string())
            .with_mailer_from("mailer@server.io".to_string());
        let params = Params::new(8, 1, 1, None).map_err(|e| anyhow!("argon2 params: {e}"))?;

        let services = Services::builder(
            store.clone(),
            mailer.clone(),
            &config,
            &SecretString::from("integration-secret".to_string()),
        )
        .passwords(Passwords::with_params(params))
        .observer(observer.clone())
        .build();

        Ok(Self {
            router: api::app(services),
            store,
            mailer,
            observer,
        })
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
        };
        Ok(TestResponse { status, body })
    }

    pub async fn post(&self, uri: &str, body: Value) -> Result<TestResponse> {
        self.request(Method::POST, uri, Some(body), None).await
    }

    pub async fn manage(&self, action: &str, value: Value) -> Result<TestResponse> {
        self.post("/authManagement", json!({"action": action, "value": value}))
            .await
    }

    pub async fn signup(&self, email: &str, password: &str) -> Result<Value> {
        let response = self
            .post("/users", json!({"email": email, "password": password}))
            .await?;
        anyhow::ensure!(
            response.status == StatusCode::CREATED,
            "signup failed: {:?}",
            response.body
        );
        Ok(response.body)
    }

    /// Sign up and verify through the mailed link.
    pub async fn verified_user(&self, email: &str, password: &str) -> Result<Value> {
        self.signup(email, password).await?;
        let token = self.last_link_token()?;
        let response = self.manage("verifySignupLong", json!(token)).await?;
        anyhow::ensure!(
            response.status == StatusCode::CREATED,
            "verify failed: {:?}",
            response.body
        );
        Ok(response.body)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let response = self
            .post(
                "/authentication",
                json!({"strategy": "local", "email": email, "password": password}),
            )
            .await?;
        anyhow::ensure!(
            response.status == StatusCode::CREATED,
            "login failed: {:?}",
            response.body
        );
        response.body["accessToken"]
            .as_str()
            .map(ToString::to_string)
            .context("missing accessToken")
    }

    /// Last path segment of the most recent mail, i.e. the token of a link mail.
    pub fn last_link_token(&self) -> Result<String> {
        let sent = self.mailer.sent();
        let mail = sent.last().context("no mail sent")?;
        mail.html
            .rsplit('/')
            .next()
            .map(ToString::to_string)
            .context("mail has no link")
    }
}

pub fn assert_error(response: &TestResponse, code: u16, name: &str, message: &str) {
    assert_eq!(response.status.as_u16(), code, "body: {:?}", response.body);
    assert_eq!(
        response.body,
        json!({"code": code, "name": name, "message": message})
    );
}
