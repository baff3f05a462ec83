//! Shared HTTP plumbing for adapters
//!
//! Sends a request, retries connection-level failures with exponential
//! backoff, and turns every non-success outcome into a classified
//! [`Failure`].

use crate::backend::AdapterOptions;
use crate::error::{Error, Result};
use crate::failure::{ErrorKind, Failure};
use crate::util::sanitize_error;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// First delay between connection retries
const INITIAL_RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// HTTP client plus retry policy for one adapter
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    client: Client,
    retry_attempts: u32,
}

impl HttpTransport {
    pub(crate) fn new(options: AdapterOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            retry_attempts: options.retry_attempts,
        })
    }

    /// Send and decode a JSON body, classifying any failure
    pub(crate) async fn send_json<T, F>(
        &self,
        backend_id: &str,
        build: F,
    ) -> std::result::Result<T, Failure>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let body = self.send(backend_id, build).await?;
        serde_json::from_str(&body).map_err(|e| {
            Failure::new(
                ErrorKind::ParsingError,
                format!("invalid response body: {}", e),
                backend_id,
            )
        })
    }

    /// Send and return the raw success body
    pub(crate) async fn send<F>(
        &self,
        backend_id: &str,
        build: F,
    ) -> std::result::Result<String, Failure>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut policy = ExponentialBackoff {
            initial_interval: INITIAL_RETRY_INTERVAL,
            max_elapsed_time: None,
            ..Default::default()
        };
        let mut attempt = 0u32;

        let response = loop {
            match build(&self.client).send().await {
                Ok(response) => break response,
                Err(e) if e.is_connect() && attempt < self.retry_attempts => {
                    attempt += 1;
                    let delay = policy.next_backoff().unwrap_or(INITIAL_RETRY_INTERVAL);
                    warn!(
                        backend = %backend_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(transport_failure(&e, backend_id)),
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_failure(&e, backend_id))?;

        if !status.is_success() {
            debug!(
                backend = %backend_id,
                status = status.as_u16(),
                "Provider returned error status"
            );
            return Err(Failure::classify(
                Some(status.as_u16()),
                &error_message(&body),
                backend_id,
            ));
        }

        Ok(body)
    }
}

/// Reqwest errors echo the request URL, which may carry credentials
fn transport_failure(error: &reqwest::Error, backend_id: &str) -> Failure {
    let message = sanitize_error(&error.to_string());
    if error.is_timeout() || error.is_connect() {
        return Failure::new(ErrorKind::NetworkError, message, backend_id);
    }
    if error.is_decode() {
        return Failure::new(ErrorKind::ParsingError, message, backend_id);
    }
    Failure::classify(error.status().map(|s| s.as_u16()), &message, backend_id)
}

/// Pull the human message out of common provider error envelopes
///
/// Handles `{"error": {"message": ...}}`, `{"error": "..."}` and
/// `{"message": ...}`; anything else is returned as-is.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };

    let error = value.get("error");
    let message = error
        .and_then(|e| e.get("message"))
        .or_else(|| error.filter(|e| e.is_string()))
        .or_else(|| value.get("message"))
        .and_then(|m| m.as_str());

    let kind = error
        .and_then(|e| e.get("type").or_else(|| e.get("status")))
        .and_then(|t| t.as_str());

    match (kind, message) {
        (Some(kind), Some(message)) => format!("{}: {}", kind, message),
        (None, Some(message)) => message.to_string(),
        _ => body.to_string(),
    }
}

/// Trim a trailing slash so paths can be appended
pub(crate) fn base_url(configured: Option<&str>, default: &str) -> String {
    configured
        .filter(|u| !u.trim().is_empty())
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}
