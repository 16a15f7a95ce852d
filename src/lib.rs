//! Client for the Adstract ad-enhancement service.
//!
//! A caller hands the client a user prompt plus a little request context
//! (session or conversation, user agent, forwarded-for address). The service
//! answers with an enhanced prompt that asks the language model to weave an
//! ad into its reply. Once the model has answered, the client analyses that
//! reply and posts an acknowledgment describing how the ad was used.
//!
//! ```text
//! prompt ──> request_ad ──> EnhancementResult ──> (your LLM) ──> analyse_and_report
//!                 │                                                     │
//!                 └── POST /api/ad-injection/start/    POST /api/ad-ack/ad-ack/create/ ──┘
//! ```
//!
//! Two call styles are offered. `request_ad` and `request_ad_async` surface
//! every failure as an [`AdSdkError`]. `request_ad_or_default` and its async
//! twin never fail: on any error they hand back the original prompt inside an
//! [`EnhancementResult::Fallback`], so the caller can always proceed.
//!
//! ```no_run
//! use adstract::{AdRequestConfiguration, Adstract, AdstractConfig};
//!
//! # fn main() -> Result<(), adstract::AdSdkError> {
//! let client = Adstract::new(AdstractConfig::default().with_api_key("sk-live-0123456789"))?;
//! let context = AdRequestConfiguration::for_session(
//!     "session-42",
//!     "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0",
//!     "203.0.113.7",
//! );
//!
//! let result = client.request_ad_or_default("Suggest a weekend hike", &context);
//! let llm_reply = format!("(model output for: {})", result.prompt());
//! client.analyse_and_report(&result, &llm_reply);
//! client.close();
//! # Ok(())
//! # }
//! ```
//!
//! The text analysis itself lives in the `adstract-analytics` crate and is
//! re-exported here.

mod ack;
mod client;
mod config;
mod error;
mod metadata;
mod request;
pub mod retry;
mod transport;
mod types;

pub use crate::ack::{
    build_ad_ack, build_error_ad_ack, AdAck, AdStatus, Compliance, Diagnostics, ErrorTracking,
    ExternalMetadata,
};
pub use crate::client::{Adstract, AdstractBuilder};
pub use crate::config::{
    AdstractConfig, ConfigLoadError, AD_ACK_ENDPOINT, AD_INJECTION_ENDPOINT, API_KEY_ENV,
    API_KEY_HEADER_NAME, BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_MAX_ADS, DEFAULT_MAX_LATENCY_MS,
    DEFAULT_RETRIES, DEFAULT_TIMEOUT_SECS, MAX_RETRIES, MIN_API_KEY_LEN, SDK_HEADER_NAME,
    SDK_NAME, SDK_TYPE, SDK_VERSION, SDK_VERSION_HEADER_NAME,
};
pub use crate::error::{AdSdkError, DEFAULT_ERROR_CODE, SNIPPET_LIMIT};
pub use crate::metadata::{
    parse_browser_family, parse_device_type, parse_os_family, ClientMetadata, DeviceType,
    RequestMetadata, MIN_USER_AGENT_LEN,
};
pub use crate::request::{AdRequest, AdRequestConfiguration, MIN_PROMPT_LEN};
pub use crate::transport::{
    classify, AsyncTransport, HttpReply, HttpRequest, Transport, TransportError,
};
pub use crate::types::{
    AdResponse, AepiData, Conversation, EnhancementResult, ASSISTANT_MESSAGE_PREFIX,
    USER_MESSAGE_PREFIX,
};

pub use analytics::{
    analyze, analyze_with, checksum_text, classify_placement, count_occurrences, count_words,
    hash_text, AdMarkers, Analytics, AnalyticsError, LabelDelimited, Placement, TagDelimited,
    WrappingStrategy, WrappingType, MIDDLE_THRESHOLD, NOT_IMPLEMENTED, OVERLOADED_RATIO,
    PLAIN_TAG, TOP_THRESHOLD, XML_TAG,
};
