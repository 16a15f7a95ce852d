//! The [`Adstract`] client: enhancement calls and acknowledgment reporting.
//!
//! ## Call surfaces
//!
//! | Method                          | Fails?  | Path     |
//! |---------------------------------|---------|----------|
//! | `request_ad`                    | yes     | blocking |
//! | `request_ad_async`              | yes     | async    |
//! | `request_ad_or_default`         | never   | blocking |
//! | `request_ad_or_default_async`   | never   | async    |
//! | `analyse_and_report`            | never   | blocking |
//! | `analyse_and_report_async`      | never   | async    |
//!
//! The fallback surface is the strict one plus a catch-and-map step, so both
//! share every validation and transport rule. Blocking calls must not be made
//! from inside an async runtime; use the `_async` variants there.

use std::sync::Arc;
use std::time::Duration;

use analytics::{analyze, AdMarkers, Analytics, WrappingType};
use serde_json::Value;
use tracing::{Instrument, Level};

use crate::ack::{build_ad_ack, build_error_ad_ack, log_delivery, AdAck};
use crate::config::{AdstractConfig, AD_ACK_ENDPOINT, AD_INJECTION_ENDPOINT};
use crate::error::AdSdkError;
use crate::request::{AdRequest, AdRequestConfiguration};
use crate::retry::{execute_with_retry, execute_with_retry_async, RetryConfig, RetryResult};
use crate::transport::{
    classify, default_async, default_blocking, sdk_headers, AsyncTransport, HttpRequest,
    Transport, TransportSlot,
};
use crate::types::{AdResponse, Conversation, EnhancementResult};

/// Builds an [`Adstract`] client, optionally with caller-owned transports.
pub struct AdstractBuilder {
    config: AdstractConfig,
    transport: Option<Arc<dyn Transport>>,
    async_transport: Option<Arc<dyn AsyncTransport>>,
}

impl AdstractBuilder {
    /// Use a caller-supplied blocking transport. The client never releases it.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a caller-supplied async transport. The client never releases it.
    pub fn async_transport(mut self, transport: Arc<dyn AsyncTransport>) -> Self {
        self.async_transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<Adstract, AdSdkError> {
        let config = self.config;
        config
            .validate()
            .map_err(|e| AdSdkError::Validation(e.to_string()))?;
        let api_key = config.resolve_api_key()?;
        let timeout = config.timeout();

        let blocking = match self.transport {
            Some(transport) => TransportSlot::injected(transport),
            None => TransportSlot::lazy(move || default_blocking(timeout)),
        };
        let nonblocking = match self.async_transport {
            Some(transport) => TransportSlot::injected(transport),
            None => TransportSlot::lazy(move || default_async(timeout)),
        };

        Ok(Adstract {
            headers: sdk_headers(&api_key),
            base_url: config.resolve_base_url(),
            timeout,
            retry: config.retry_config(),
            wrapping_type: config.wrapping_type,
            blocking,
            nonblocking,
        })
    }
}

/// Client for the Adstract ad-injection service.
///
/// Cheap to share behind an `Arc`; every call owns its own request and
/// response, and the transports are safe for concurrent use.
pub struct Adstract {
    headers: Vec<(&'static str, String)>,
    base_url: String,
    timeout: Duration,
    retry: RetryConfig,
    wrapping_type: WrappingType,
    blocking: TransportSlot<dyn Transport>,
    nonblocking: TransportSlot<dyn AsyncTransport>,
}

impl std::fmt::Debug for Adstract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adstract")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("wrapping_type", &self.wrapping_type)
            .finish_non_exhaustive()
    }
}

impl Adstract {
    /// Client with default transports.
    pub fn new(config: AdstractConfig) -> Result<Self, AdSdkError> {
        Self::builder(config).build()
    }

    pub fn builder(config: AdstractConfig) -> AdstractBuilder {
        AdstractBuilder {
            config,
            transport: None,
            async_transport: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn wrapping_type(&self) -> WrappingType {
        self.wrapping_type
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Enhance `prompt`, surfacing every failure.
    ///
    /// A response with `success != true` or without enhanced prompt text is
    /// an [`AdSdkError::AdEnhancement`] carrying that response.
    pub fn request_ad(
        &self,
        prompt: &str,
        config: &AdRequestConfiguration,
    ) -> Result<EnhancementResult, AdSdkError> {
        self.enhance(prompt, config, config.resolve_conversation())
    }

    pub async fn request_ad_async(
        &self,
        prompt: &str,
        config: &AdRequestConfiguration,
    ) -> Result<EnhancementResult, AdSdkError> {
        self.enhance_async(prompt, config, config.resolve_conversation())
            .await
    }

    /// Enhance `prompt`, falling back to it unchanged on any failure.
    pub fn request_ad_or_default(
        &self,
        prompt: &str,
        config: &AdRequestConfiguration,
    ) -> EnhancementResult {
        let conversation = config.resolve_conversation();
        let resolved = conversation.as_ref().ok().cloned();
        match self.enhance(prompt, config, conversation) {
            Ok(result) => result,
            Err(err) => fallback(prompt, resolved, err),
        }
    }

    pub async fn request_ad_or_default_async(
        &self,
        prompt: &str,
        config: &AdRequestConfiguration,
    ) -> EnhancementResult {
        let conversation = config.resolve_conversation();
        let resolved = conversation.as_ref().ok().cloned();
        match self.enhance_async(prompt, config, conversation).await {
            Ok(result) => result,
            Err(err) => fallback(prompt, resolved, err),
        }
    }

    /// Analytics for `llm_response` against the ad in `result`.
    pub fn analyse(
        &self,
        result: &EnhancementResult,
        llm_response: &str,
    ) -> Result<Analytics, AdSdkError> {
        let response = result
            .ad_response()
            .ok_or_else(|| AdSdkError::Validation("enhancement result has no ad response".into()))?;
        let markers = AdMarkers::from_parts(
            response.tracking_identifier.as_deref(),
            response.tracking_url.as_deref(),
            response.sponsored_label.as_deref(),
        )?;
        Ok(analyze(&markers, llm_response, self.wrapping_type)?)
    }

    /// The acknowledgment [`Adstract::analyse_and_report`] would send.
    pub fn build_ad_ack(
        &self,
        result: &EnhancementResult,
        llm_response: &str,
    ) -> Result<AdAck, AdSdkError> {
        build_ad_ack(result, llm_response, self.wrapping_type)
    }

    /// Analyse `llm_response` and deliver the acknowledgment. Never fails.
    ///
    /// Does nothing, without any network call, when `result` is not a
    /// successful enhancement.
    ///
    /// # Panics
    ///
    /// When the client owns its blocking transport, the first blocking call
    /// builds a `reqwest::blocking::Client`, which panics inside an async
    /// runtime. Use [`Adstract::analyse_and_report_async`] there, or call this
    /// from `tokio::task::spawn_blocking`.
    pub fn analyse_and_report(&self, result: &EnhancementResult, llm_response: &str) {
        let Some((ad_response_id, body)) = self.prepare_ack(result, llm_response) else {
            return;
        };
        let span = tracing::span!(
            Level::DEBUG,
            "adstract.ad_ack",
            ad_response_id = ad_response_id.as_deref().unwrap_or_default()
        );
        let _guard = span.enter();

        let transport = match self.blocking.get() {
            Ok(transport) => transport,
            Err(err) => {
                tracing::error!(error = %err, "ad_ack_delivery_failed");
                return;
            }
        };
        let url = self.url(AD_ACK_ENDPOINT);
        let outcome = transport.post_json(&self.http_request(&url, &body));
        log_delivery(ad_response_id.as_deref(), outcome);
    }

    pub async fn analyse_and_report_async(&self, result: &EnhancementResult, llm_response: &str) {
        let Some((ad_response_id, body)) = self.prepare_ack(result, llm_response) else {
            return;
        };
        let span = tracing::span!(
            Level::DEBUG,
            "adstract.ad_ack",
            ad_response_id = ad_response_id.as_deref().unwrap_or_default()
        );

        async {
            let transport = match self.nonblocking.get() {
                Ok(transport) => transport,
                Err(err) => {
                    tracing::error!(error = %err, "ad_ack_delivery_failed");
                    return;
                }
            };
            let url = self.url(AD_ACK_ENDPOINT);
            let outcome = transport.post_json(&self.http_request(&url, &body)).await;
            log_delivery(ad_response_id.as_deref(), outcome);
        }
        .instrument(span)
        .await
    }

    /// Release the transports this client created. Idempotent.
    ///
    /// Injected transports are left untouched. After closing, calls that
    /// need an owned transport fail with [`AdSdkError::Sdk`].
    pub fn close(&self) {
        self.blocking.close();
        self.nonblocking.close();
    }

    fn enhance(
        &self,
        prompt: &str,
        config: &AdRequestConfiguration,
        conversation: Result<Conversation, AdSdkError>,
    ) -> Result<EnhancementResult, AdSdkError> {
        let (conversation, payload) = self.prepare(prompt, config, conversation)?;
        let span = tracing::span!(
            Level::DEBUG,
            "adstract.request_ad",
            prompt_len = prompt.len(),
            session_id = %conversation.session_id
        );
        let _guard = span.enter();

        let transport = self.blocking.get()?;
        let url = self.url(AD_INJECTION_ENDPOINT);
        let request = self.http_request(&url, &payload);
        let outcome = execute_with_retry(&self.retry, |_| classify(transport.post_json(&request)));
        let response = settle(outcome)?;
        into_enhancement(prompt, conversation, response)
    }

    async fn enhance_async(
        &self,
        prompt: &str,
        config: &AdRequestConfiguration,
        conversation: Result<Conversation, AdSdkError>,
    ) -> Result<EnhancementResult, AdSdkError> {
        let (conversation, payload) = self.prepare(prompt, config, conversation)?;
        let span = tracing::span!(
            Level::DEBUG,
            "adstract.request_ad",
            prompt_len = prompt.len(),
            session_id = %conversation.session_id
        );

        async {
            let transport = self.nonblocking.get()?;
            let url = self.url(AD_INJECTION_ENDPOINT);
            let request = self.http_request(&url, &payload);
            let transport = &transport;
            let outcome = execute_with_retry_async(&self.retry, |_| async move {
                classify(transport.post_json(&request).await)
            })
            .await;
            let response = settle(outcome)?;
            into_enhancement(prompt, conversation, response)
        }
        .instrument(span)
        .await
    }

    /// Validate inputs and encode the request body. No I/O.
    fn prepare(
        &self,
        prompt: &str,
        config: &AdRequestConfiguration,
        conversation: Result<Conversation, AdSdkError>,
    ) -> Result<(Conversation, Value), AdSdkError> {
        config.require_headers()?;
        let conversation = conversation?;
        let request = AdRequest::build(prompt, conversation.clone(), config, self.wrapping_type)?;
        let payload = request.to_payload()?;
        Ok((conversation, payload))
    }

    fn prepare_ack(
        &self,
        result: &EnhancementResult,
        llm_response: &str,
    ) -> Option<(Option<String>, Value)> {
        if !result.success() {
            tracing::debug!(success = false, "ad_ack_skipped");
            return None;
        }
        let ack = match build_ad_ack(result, llm_response, self.wrapping_type) {
            Ok(ack) => ack,
            Err(err) => {
                tracing::error!(error = %err, "ad_ack_build_failed");
                build_error_ad_ack(result, llm_response, &err)
            }
        };
        match serde_json::to_value(&ack) {
            Ok(body) => Some((ack.ad_response_id, body)),
            Err(err) => {
                tracing::error!(error = %err, "ad_ack_encode_failed");
                None
            }
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn http_request<'a>(&'a self, url: &'a str, body: &'a Value) -> HttpRequest<'a> {
        HttpRequest {
            url,
            headers: &self.headers,
            body,
            timeout: self.timeout,
        }
    }
}

fn settle(outcome: RetryResult<AdResponse>) -> Result<AdResponse, AdSdkError> {
    tracing::debug!(
        attempts = outcome.attempts,
        elapsed_ms = outcome.total_duration.as_millis() as u64,
        success = outcome.is_success(),
        "ad_request_complete"
    );
    outcome.into_result()
}

fn into_enhancement(
    prompt: &str,
    conversation: Conversation,
    response: AdResponse,
) -> Result<EnhancementResult, AdSdkError> {
    if !response.is_success() {
        return Err(AdSdkError::AdEnhancement {
            message: format!("no ad available for prompt of {} chars", prompt.chars().count()),
            response: Some(Box::new(response)),
        });
    }
    let Some(aepi_text) = response.aepi_text().map(str::to_owned) else {
        return Err(AdSdkError::AdEnhancement {
            message: "ad response has no aepi".into(),
            response: Some(Box::new(response)),
        });
    };
    Ok(EnhancementResult::enhanced(aepi_text, conversation, response))
}

fn fallback(
    prompt: &str,
    conversation: Option<Conversation>,
    error: AdSdkError,
) -> EnhancementResult {
    tracing::debug!(code = error.code(), error = %error, "ad_request_fallback");
    let response = error.ad_response().cloned();
    EnhancementResult::fallback(prompt.to_string(), conversation, error, response)
}
