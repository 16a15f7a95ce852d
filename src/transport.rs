//! HTTP plumbing shared by the blocking and async call paths.
//!
//! The client never talks to `reqwest` directly. It posts JSON through the
//! [`Transport`] (blocking) or [`AsyncTransport`] trait, so callers can inject
//! their own connection pool, and tests can script replies. Both traits are
//! implemented for the matching `reqwest` client.
//!
//! Status handling lives in [`classify`], which both paths feed into the same
//! retry loop:
//!
//! | Reply                          | Outcome                          |
//! |--------------------------------|----------------------------------|
//! | transport failure              | retry, then `Network`            |
//! | 429                            | retry, then `RateLimit`          |
//! | 5xx                            | retry, then `Server`             |
//! | 401 / 403                      | `Authentication`                 |
//! | other 4xx                      | `UnexpectedResponse`             |
//! | anything else, bad JSON/shape  | `UnexpectedResponse`             |
//! | anything else, valid JSON      | parsed [`AdResponse`]            |

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::{API_KEY_HEADER_NAME, SDK_HEADER_NAME, SDK_NAME, SDK_VERSION, SDK_VERSION_HEADER_NAME};
use crate::error::{snippet, AdSdkError};
use crate::retry::AttemptOutcome;
use crate::types::AdResponse;

/// A JSON POST ready to be sent.
#[derive(Debug, Clone, Copy)]
pub struct HttpRequest<'a> {
    pub url: &'a str,
    pub headers: &'a [(&'static str, String)],
    pub body: &'a Value,
    pub timeout: Duration,
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The exchange did not produce a reply at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport failure: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Blocking JSON POST.
pub trait Transport: Send + Sync {
    fn post_json(&self, request: &HttpRequest<'_>) -> Result<HttpReply, TransportError>;
}

/// Non-blocking JSON POST.
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    async fn post_json(&self, request: &HttpRequest<'_>) -> Result<HttpReply, TransportError>;
}

impl Transport for reqwest::blocking::Client {
    fn post_json(&self, request: &HttpRequest<'_>) -> Result<HttpReply, TransportError> {
        let mut builder = self
            .post(request.url)
            .timeout(request.timeout)
            .json(request.body);
        for (name, value) in request.headers {
            builder = builder.header(*name, value.as_str());
        }
        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(HttpReply { status, body })
    }
}

#[async_trait]
impl AsyncTransport for reqwest::Client {
    async fn post_json(&self, request: &HttpRequest<'_>) -> Result<HttpReply, TransportError> {
        let mut builder = self
            .post(request.url)
            .timeout(request.timeout)
            .json(request.body);
        for (name, value) in request.headers {
            builder = builder.header(*name, value.as_str());
        }
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }
}

/// Headers identifying the SDK and authenticating the caller.
pub(crate) fn sdk_headers(api_key: &str) -> Vec<(&'static str, String)> {
    vec![
        (SDK_HEADER_NAME, SDK_NAME.to_string()),
        (SDK_VERSION_HEADER_NAME, SDK_VERSION.to_string()),
        (API_KEY_HEADER_NAME, api_key.to_string()),
    ]
}

/// Map one exchange to a retry decision.
pub fn classify(outcome: Result<HttpReply, TransportError>) -> AttemptOutcome<AdResponse> {
    let reply = match outcome {
        Ok(reply) => reply,
        Err(err) => {
            return AttemptOutcome::Retry(AdSdkError::Network(format!(
                "Network error during request: {err}"
            )));
        }
    };

    match reply.status {
        429 => AttemptOutcome::Retry(AdSdkError::RateLimit {
            message: "Rate limited".into(),
            status: reply.status,
            snippet: snippet(&reply.body),
        }),
        500..=599 => AttemptOutcome::Retry(AdSdkError::Server {
            message: "Server error".into(),
            status: reply.status,
            snippet: snippet(&reply.body),
        }),
        401 | 403 => AttemptOutcome::Done(Err(AdSdkError::Authentication {
            message: "Authentication failed".into(),
            status: reply.status,
            snippet: snippet(&reply.body),
        })),
        400..=499 => AttemptOutcome::Done(Err(unexpected("Unexpected client error", &reply))),
        _ => AttemptOutcome::Done(parse_ad_response(&reply)),
    }
}

fn parse_ad_response(reply: &HttpReply) -> Result<AdResponse, AdSdkError> {
    let value: Value = serde_json::from_str(&reply.body)
        .map_err(|_| unexpected("Invalid JSON response", reply))?;
    AdResponse::from_value(value).map_err(|_| unexpected("Unexpected response structure", reply))
}

fn unexpected(message: &str, reply: &HttpReply) -> AdSdkError {
    AdSdkError::UnexpectedResponse {
        message: message.to_string(),
        status: Some(reply.status),
        snippet: snippet(&reply.body),
    }
}

type Factory<T> = Box<dyn Fn() -> Result<Arc<T>, AdSdkError> + Send + Sync>;

enum SlotState<T: ?Sized> {
    Pending,
    Ready(Arc<T>),
    Closed,
}

/// Holds one transport and remembers whether the client created it.
///
/// Owned transports are built on first use and dropped by [`close`]. Injected
/// transports are never released by the client.
///
/// [`close`]: TransportSlot::close
pub(crate) struct TransportSlot<T: ?Sized> {
    state: RwLock<SlotState<T>>,
    factory: Option<Factory<T>>,
}

impl<T: ?Sized> TransportSlot<T> {
    pub(crate) fn injected(transport: Arc<T>) -> Self {
        Self {
            state: RwLock::new(SlotState::Ready(transport)),
            factory: None,
        }
    }

    pub(crate) fn lazy<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<T>, AdSdkError> + Send + Sync + 'static,
    {
        Self {
            state: RwLock::new(SlotState::Pending),
            factory: Some(Box::new(factory)),
        }
    }

    pub(crate) fn is_owned(&self) -> bool {
        self.factory.is_some()
    }

    pub(crate) fn get(&self) -> Result<Arc<T>, AdSdkError> {
        {
            let state = self.state.read().map_err(|_| poisoned())?;
            match &*state {
                SlotState::Ready(transport) => return Ok(Arc::clone(transport)),
                SlotState::Closed => return Err(AdSdkError::Sdk("client is closed".into())),
                SlotState::Pending => {}
            }
        }

        let mut state = self.state.write().map_err(|_| poisoned())?;
        match &*state {
            SlotState::Ready(transport) => Ok(Arc::clone(transport)),
            SlotState::Closed => Err(AdSdkError::Sdk("client is closed".into())),
            SlotState::Pending => {
                let factory = self
                    .factory
                    .as_ref()
                    .ok_or_else(|| AdSdkError::Sdk("transport slot has no factory".into()))?;
                let transport = factory()?;
                *state = SlotState::Ready(Arc::clone(&transport));
                Ok(transport)
            }
        }
    }

    /// Release an owned transport. Idempotent; a no-op for injected ones.
    pub(crate) fn close(&self) {
        if !self.is_owned() {
            return;
        }
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *state = SlotState::Closed;
    }
}

fn poisoned() -> AdSdkError {
    AdSdkError::Sdk("transport lock poisoned".into())
}

pub(crate) fn default_blocking(timeout: Duration) -> Result<Arc<dyn Transport>, AdSdkError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AdSdkError::Sdk(format!("failed to build http client: {e}")))?;
    Ok(Arc::new(client))
}

pub(crate) fn default_async(timeout: Duration) -> Result<Arc<dyn AsyncTransport>, AdSdkError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AdSdkError::Sdk(format!("failed to build http client: {e}")))?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn done(outcome: AttemptOutcome<AdResponse>) -> Result<AdResponse, AdSdkError> {
        match outcome {
            AttemptOutcome::Done(result) => result,
            AttemptOutcome::Retry(err) => panic!("expected final outcome, got retry: {err}"),
        }
    }

    fn retry(outcome: AttemptOutcome<AdResponse>) -> AdSdkError {
        match outcome {
            AttemptOutcome::Retry(err) => err,
            AttemptOutcome::Done(result) => panic!("expected retry, got {result:?}"),
        }
    }

    #[test]
    fn transient_failures_retry() {
        let err = retry(classify(Err(TransportError::Timeout("slow".into()))));
        assert_eq!(err.code(), "network_error");

        let err = retry(classify(Ok(HttpReply::new(429, "slow down"))));
        assert_eq!(err.status_code(), Some(429));
        assert_eq!(err.response_snippet(), Some("slow down"));

        let err = retry(classify(Ok(HttpReply::new(503, ""))));
        assert_eq!(err.code(), "server_error");
        assert_eq!(err.response_snippet(), None);
    }

    #[test]
    fn auth_failures_are_final() {
        for status in [401, 403] {
            let err = done(classify(Ok(HttpReply::new(status, "nope")))).unwrap_err();
            assert_eq!(err.code(), "authentication_error");
            assert_eq!(err.status_code(), Some(status));
        }
    }

    #[test]
    fn other_client_errors_are_unexpected() {
        let err = done(classify(Ok(HttpReply::new(422, "{}")))).unwrap_err();
        assert_eq!(err.code(), "unexpected_response");
        assert_eq!(err.status_code(), Some(422));
    }

    #[test]
    fn bad_bodies_are_unexpected() {
        let err = done(classify(Ok(HttpReply::new(200, "<html>")))).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON response"));

        let err = done(classify(Ok(HttpReply::new(200, "[1,2]")))).unwrap_err();
        assert!(err.to_string().contains("Unexpected response structure"));

        let err = done(classify(Ok(HttpReply::new(200, r#"{"success": "yes"}"#)))).unwrap_err();
        assert_eq!(err.code(), "unexpected_response");
    }

    #[test]
    fn incomplete_aepi_is_unexpected() {
        let body = r#"{"success": true, "aepi": {"status": "ok"}}"#;
        let err = done(classify(Ok(HttpReply::new(200, body)))).unwrap_err();
        assert_eq!(err.code(), "unexpected_response");
        assert!(err.to_string().contains("Unexpected response structure"));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        let err = retry(classify(Ok(HttpReply::new(500, body))));
        assert_eq!(err.response_snippet().map(str::len), Some(200));
    }

    #[test]
    fn valid_body_parses() {
        let body = r#"{"success": true, "aepi": {"status": "ok", "aepi_text": "enhanced", "checksum": "c", "size_bytes": 8}}"#;
        let response = done(classify(Ok(HttpReply::new(200, body)))).unwrap();
        assert_eq!(response.aepi_text(), Some("enhanced"));
    }

    #[test]
    fn headers_identify_sdk() {
        let headers = sdk_headers("key-0123456789");
        assert!(headers.contains(&("X-Adstract-SDK", "adstractai-rust".to_string())));
        assert!(headers.contains(&("X-Adstract-SDK-Version", SDK_VERSION.to_string())));
        assert!(headers.contains(&("X-Adstract-API-Key", "key-0123456789".to_string())));
    }

    #[test]
    fn lazy_slot_builds_once_and_closes() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let slot: TransportSlot<str> = TransportSlot::lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::from("pool"))
        });
        assert_eq!(built.load(Ordering::SeqCst), 0);
        assert_eq!(&*slot.get().unwrap(), "pool");
        assert_eq!(&*slot.get().unwrap(), "pool");
        assert_eq!(built.load(Ordering::SeqCst), 1);

        slot.close();
        slot.close();
        assert_eq!(slot.get().unwrap_err(), AdSdkError::Sdk("client is closed".into()));
    }

    #[test]
    fn injected_slot_survives_close() {
        let shared: Arc<str> = Arc::from("caller pool");
        let slot = TransportSlot::injected(Arc::clone(&shared));
        assert!(!slot.is_owned());
        slot.close();
        assert_eq!(&*slot.get().unwrap(), "caller pool");
        assert_eq!(Arc::strong_count(&shared), 2);
    }
}
