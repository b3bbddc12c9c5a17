//! # funnelhub-adapter-webhook-reqwest
//!
//! Delivers automation webhooks over HTTP with [reqwest](https://docs.rs/reqwest).
//!
//! ## Responsibilities
//! - Implement the `WebhookClient` port defined in `funnelhub-app::ports`
//! - Send the JSON body with the configured HTTP method and timeout
//! - Report transport failures and non-2xx responses as integration errors
//!
//! ## Dependency rule
//! Depends on `funnelhub-app` (for the port trait) and `funnelhub-domain` (for errors).

use std::time::Duration;

use reqwest::Method;

use funnelhub_app::ports::WebhookClient;
use funnelhub_domain::error::FunnelError;

const BODY_PREVIEW_LIMIT: usize = 256;

/// Errors raised while delivering a webhook.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("unsupported HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("webhook request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("webhook {url} answered {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to build HTTP client")]
    Client(#[from] reqwest::Error),
}

impl From<WebhookError> for FunnelError {
    fn from(err: WebhookError) -> Self {
        Self::integration(err)
    }
}

fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    let mut out: String = trimmed.chars().take(BODY_PREVIEW_LIMIT).collect();
    if trimmed.chars().count() > BODY_PREVIEW_LIMIT {
        out.push_str("...");
    }
    out
}

fn parse_method(method: &str) -> Result<Method, WebhookError> {
    match method.to_ascii_uppercase().as_str() {
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "GET" => Ok(Method::GET),
        "DELETE" => Ok(Method::DELETE),
        _ => Err(WebhookError::InvalidMethod(method.to_string())),
    }
}

/// [`WebhookClient`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestWebhookClient {
    http: reqwest::Client,
}

impl ReqwestWebhookClient {
    /// Build a client whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Client`] if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("funnelhub/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    async fn send(&self, url: &str, method: &str, body: serde_json::Value) -> Result<u16, WebhookError> {
        let method = parse_method(method)?;
        let resp = self
            .http
            .request(method, url)
            .json(&body)
            .send()
            .await
            .map_err(|source| WebhookError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(status.as_u16());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(WebhookError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: preview_body(&body),
        })
    }
}

impl WebhookClient for ReqwestWebhookClient {
    async fn deliver(
        &self,
        url: &str,
        method: &str,
        body: serde_json::Value,
    ) -> Result<(), FunnelError> {
        match self.send(url, method, body).await {
            Ok(status) => {
                tracing::debug!(url, method, status, "webhook delivered");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(url, method, error = %err, "webhook delivery failed");
                Err(err.into())
            }
        }
    }
}
