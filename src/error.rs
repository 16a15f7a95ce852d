use analytics::AnalyticsError;
use thiserror::Error;

use crate::types::AdResponse;

/// Machine code used when an acknowledgment reports an SDK-side failure.
pub const DEFAULT_ERROR_CODE: &str = "sdk_error";

/// Longest response body excerpt carried on an error.
pub const SNIPPET_LIMIT: usize = 200;

/// Every failure the client can surface.
///
/// Strict calls return these directly; fallback calls and the acknowledgment
/// reporter swallow them into a result field or a log event.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum AdSdkError {
    /// Input was malformed. Raised before any I/O.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A required input was absent or empty.
    #[error("missing parameter: {0}")]
    MissingParameter(String),
    /// The service rejected the API key (401/403).
    #[error("authentication failed ({status}): {message}")]
    Authentication {
        message: String,
        status: u16,
        snippet: Option<String>,
    },
    /// 429 after all retries.
    #[error("rate limited ({status}): {message}")]
    RateLimit {
        message: String,
        status: u16,
        snippet: Option<String>,
    },
    /// 5xx after all retries.
    #[error("server error ({status}): {message}")]
    Server {
        message: String,
        status: u16,
        snippet: Option<String>,
    },
    /// Connection or timeout failure after all retries.
    #[error("network error: {0}")]
    Network(String),
    /// Any other 4xx, or a body that is not the expected JSON.
    #[error("unexpected response: {message}")]
    UnexpectedResponse {
        message: String,
        status: Option<u16>,
        snippet: Option<String>,
    },
    /// A well-formed response that carries no usable ad.
    #[error("ad enhancement failed: {message}")]
    AdEnhancement {
        message: String,
        response: Option<Box<AdResponse>>,
    },
    /// Internal failure that should not happen.
    #[error("sdk error: {0}")]
    Sdk(String),
}

impl AdSdkError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AdSdkError::Validation(_) => "validation_error",
            AdSdkError::MissingParameter(_) => "missing_parameter",
            AdSdkError::Authentication { .. } => "authentication_error",
            AdSdkError::RateLimit { .. } => "rate_limit_error",
            AdSdkError::Server { .. } => "server_error",
            AdSdkError::Network(_) => "network_error",
            AdSdkError::UnexpectedResponse { .. } => "unexpected_response",
            AdSdkError::AdEnhancement { .. } => "ad_enhancement_error",
            AdSdkError::Sdk(_) => DEFAULT_ERROR_CODE,
        }
    }

    /// HTTP status attached to the failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AdSdkError::Authentication { status, .. }
            | AdSdkError::RateLimit { status, .. }
            | AdSdkError::Server { status, .. } => Some(*status),
            AdSdkError::UnexpectedResponse { status, .. } => *status,
            _ => None,
        }
    }

    /// Truncated response body attached to the failure, if any.
    pub fn response_snippet(&self) -> Option<&str> {
        match self {
            AdSdkError::Authentication { snippet, .. }
            | AdSdkError::RateLimit { snippet, .. }
            | AdSdkError::Server { snippet, .. }
            | AdSdkError::UnexpectedResponse { snippet, .. } => snippet.as_deref(),
            _ => None,
        }
    }

    /// Ad response carried by an [`AdSdkError::AdEnhancement`].
    pub fn ad_response(&self) -> Option<&AdResponse> {
        match self {
            AdSdkError::AdEnhancement { response, .. } => response.as_deref(),
            _ => None,
        }
    }

    /// Consume the error, returning the ad response it carried.
    pub fn into_ad_response(self) -> Option<AdResponse> {
        match self {
            AdSdkError::AdEnhancement { response, .. } => response.map(|r| *r),
            _ => None,
        }
    }
}

impl From<AnalyticsError> for AdSdkError {
    fn from(value: AnalyticsError) -> Self {
        match value {
            AnalyticsError::MissingMarker(name) => {
                AdSdkError::Validation(format!("ad response is missing {name}"))
            }
            other => AdSdkError::Sdk(other.to_string()),
        }
    }
}

/// First [`SNIPPET_LIMIT`] characters of `body`, or `None` when empty.
pub(crate) fn snippet(body: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    Some(body.chars().take(SNIPPET_LIMIT).collect())
}
