//! Acknowledgments reporting how an injected ad was used.
//!
//! An [`AdAck`] bundles the analytics computed over the model's output with
//! policy checks and the digests that let the service tie the
//! report back to the prompt it issued.
//!
//! Policy and status use different comparisons against
//! [`DEFAULT_MAX_ADS`]: a response with exactly one ad both satisfies
//! `max_ads_policy_ok` (`<=`) and reports `ad_status = ok` (`>=`).

use analytics::{
    analyze, checksum_text, hash_text, AdMarkers, Analytics, WrappingType,
};
use serde::{Deserialize, Serialize};

use crate::config::{
    DEFAULT_MAX_ADS, DEFAULT_MAX_LATENCY_MS, SDK_NAME, SDK_TYPE, SDK_VERSION,
};
use crate::error::{AdSdkError, DEFAULT_ERROR_CODE};
use crate::transport::{HttpReply, TransportError};
use crate::types::EnhancementResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdStatus {
    /// At least one ad was detected in the output.
    Ok,
    NoAdUsed,
    /// The acknowledgment could not be computed.
    Error,
}

impl AdStatus {
    pub fn from_ads_detected(total: usize) -> Self {
        if total >= DEFAULT_MAX_ADS {
            AdStatus::Ok
        } else {
            AdStatus::NoAdUsed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdStatus::Ok => "ok",
            AdStatus::NoAdUsed => "no_ad_used",
            AdStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub sdk_type: String,
    pub sdk_version: String,
    pub sdk_name: String,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            sdk_type: SDK_TYPE.to_string(),
            sdk_version: SDK_VERSION.to_string(),
            sdk_name: SDK_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compliance {
    pub max_ads_policy_ok: bool,
    pub max_latency_policy_ok: bool,
}

impl Compliance {
    pub fn evaluate(total_ads_detected: usize, execution_time_ms: f64) -> Self {
        Self {
            max_ads_policy_ok: total_ads_detected <= DEFAULT_MAX_ADS,
            max_latency_policy_ok: execution_time_ms <= DEFAULT_MAX_LATENCY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTracking {
    pub error_code: String,
    pub error_message: String,
}

/// Digests and conversation ids attached to an acknowledgment.
///
/// Every field is filled on a regular acknowledgment. A degraded one carries
/// whatever could still be derived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalMetadata {
    /// SHA-256 of the model output.
    pub response_hash: String,
    /// MD5 of the enhanced prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aepi_checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Assistant-turn message id (`msg_u_` rewritten to `msg_a_`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Body of `POST /api/ad-ack/ad-ack/create/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdAck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_response_id: Option<String>,
    pub ad_status: AdStatus,
    pub analytics: Analytics,
    pub diagnostics: Diagnostics,
    pub compliance: Compliance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_tracking: Option<ErrorTracking>,
    pub external_metadata: ExternalMetadata,
}

/// Build the acknowledgment for a successful enhancement.
///
/// Fails when the result lacks what the analytics need: an ad response with
/// enhanced prompt text, execution time and non-empty markers, plus a
/// conversation.
pub fn build_ad_ack(
    result: &EnhancementResult,
    llm_response: &str,
    wrapping_type: WrappingType,
) -> Result<AdAck, AdSdkError> {
    let response = result
        .ad_response()
        .ok_or_else(|| AdSdkError::Validation("enhancement result has no ad response".into()))?;
    let conversation = result
        .conversation()
        .ok_or_else(|| AdSdkError::Validation("enhancement result has no conversation".into()))?;
    let aepi_text = response
        .aepi_text()
        .ok_or_else(|| AdSdkError::Validation("ad response has no aepi_text".into()))?;
    let execution_time_ms = response
        .execution_time_ms
        .ok_or_else(|| AdSdkError::Validation("ad response has no execution_time_ms".into()))?;

    let markers = AdMarkers::from_parts(
        response.tracking_identifier.as_deref(),
        response.tracking_url.as_deref(),
        response.sponsored_label.as_deref(),
    )?;
    let analytics = analyze(&markers, llm_response, wrapping_type)?;

    Ok(AdAck {
        ad_response_id: response.ad_response_id.clone(),
        ad_status: AdStatus::from_ads_detected(analytics.total_ads_detected),
        compliance: Compliance::evaluate(analytics.total_ads_detected, execution_time_ms),
        analytics,
        diagnostics: Diagnostics::default(),
        error_tracking: None,
        external_metadata: ExternalMetadata {
            response_hash: hash_text(llm_response),
            aepi_checksum: Some(checksum_text(aepi_text)),
            conversation_id: Some(conversation.conversation_id.clone()),
            session_id: Some(conversation.session_id.clone()),
            message_id: Some(conversation.ack_message_id()),
        },
    })
}

/// Acknowledgment sent when [`build_ad_ack`] failed.
pub fn build_error_ad_ack(
    result: &EnhancementResult,
    llm_response: &str,
    error: &AdSdkError,
) -> AdAck {
    let response = result.ad_response();
    let conversation = result.conversation();

    AdAck {
        ad_response_id: response.and_then(|r| r.ad_response_id.clone()),
        ad_status: AdStatus::Error,
        analytics: Analytics::unavailable(),
        diagnostics: Diagnostics::default(),
        compliance: Compliance::default(),
        error_tracking: Some(ErrorTracking {
            error_code: DEFAULT_ERROR_CODE.to_string(),
            error_message: error.to_string(),
        }),
        external_metadata: ExternalMetadata {
            response_hash: hash_text(llm_response),
            aepi_checksum: response.and_then(|r| r.aepi_text()).map(checksum_text),
            conversation_id: conversation.map(|c| c.conversation_id.clone()),
            session_id: conversation.map(|c| c.session_id.clone()),
            message_id: conversation.map(|c| c.ack_message_id()),
        },
    }
}

/// Log the outcome of an acknowledgment POST. Never fails.
pub(crate) fn log_delivery(ad_response_id: Option<&str>, outcome: Result<HttpReply, TransportError>) {
    match outcome {
        Ok(reply) if reply.is_success() => {
            tracing::debug!(
                ad_response_id = ad_response_id.unwrap_or_default(),
                status = reply.status,
                "ad_ack_delivered"
            );
        }
        Ok(reply) => {
            tracing::warn!(
                ad_response_id = ad_response_id.unwrap_or_default(),
                status = reply.status,
                response = %crate::error::snippet(&reply.body).unwrap_or_default(),
                "ad_ack_rejected"
            );
        }
        Err(err) => {
            tracing::error!(
                ad_response_id = ad_response_id.unwrap_or_default(),
                error = %err,
                "ad_ack_delivery_failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AdResponse, AepiData, Conversation};
    use analytics::{Placement, NOT_IMPLEMENTED};

    fn enhanced(execution_time_ms: Option<f64>) -> EnhancementResult {
        let response = AdResponse {
            ad_response_id: Some("resp-1".into()),
            success: Some(true),
            execution_time_ms,
            aepi: Some(AepiData {
                status: "ok".into(),
                aepi_text: "enhanced prompt".into(),
                checksum: checksum_text("enhanced prompt"),
                size_bytes: 15,
                extra: Default::default(),
            }),
            tracking_url: Some("https://t.example/c".into()),
            tracking_identifier: Some("trk-1".into()),
            sponsored_label: Some("Sponsored".into()),
            ..AdResponse::default()
        };
        EnhancementResult::enhanced(
            "enhanced prompt".into(),
            Conversation::from_session_at("sess-1", 1_700_000_000_000),
            response,
        )
    }

    #[test]
    fn single_ad_is_ok_and_within_policy() {
        let result = enhanced(Some(250.0));
        let ack = build_ad_ack(&result, "Answer <ADS>trk-1 https://t.example/c</ADS>", WrappingType::Xml)
            .unwrap();
        assert_eq!(ack.ad_status, AdStatus::Ok);
        assert!(ack.compliance.max_ads_policy_ok);
        assert!(ack.compliance.max_latency_policy_ok);
        assert_eq!(ack.analytics.total_links, 1);
        assert_eq!(ack.ad_response_id.as_deref(), Some("resp-1"));
        assert!(ack.error_tracking.is_none());
    }

    #[test]
    fn status_and_policy_boundaries() {
        let result = enhanced(Some(1000.0));
        let none = build_ad_ack(&result, "no ads here", WrappingType::Xml).unwrap();
        assert_eq!(none.ad_status, AdStatus::NoAdUsed);
        assert!(none.compliance.max_ads_policy_ok);
        assert!(none.compliance.max_latency_policy_ok);

        let two = build_ad_ack(&result, "<ADS>trk-1 trk-1</ADS>", WrappingType::Xml).unwrap();
        assert_eq!(two.ad_status, AdStatus::Ok);
        assert!(!two.compliance.max_ads_policy_ok);

        let slow = build_ad_ack(&enhanced(Some(1000.5)), "x", WrappingType::Xml).unwrap();
        assert!(!slow.compliance.max_latency_policy_ok);
    }

    #[test]
    fn external_metadata_digests_and_ids() {
        let result = enhanced(Some(10.0));
        let text = "model output";
        let ack = build_ad_ack(&result, text, WrappingType::Xml).unwrap();
        let meta = &ack.external_metadata;
        assert_eq!(meta.response_hash, hash_text(text));
        assert_eq!(meta.aepi_checksum.as_deref(), Some(checksum_text("enhanced prompt").as_str()));
        assert_eq!(meta.conversation_id.as_deref(), Some("sess-1"));
        assert_eq!(meta.message_id.as_deref(), Some("msg_a_1700000000000"));
    }

    #[test]
    fn missing_execution_time_fails_build() {
        let err = build_ad_ack(&enhanced(None), "x", WrappingType::Xml).unwrap_err();
        assert!(err.to_string().contains("execution_time_ms"));
    }

    #[test]
    fn missing_marker_fails_build() {
        let mut result = enhanced(Some(1.0));
        if let EnhancementResult::Enhanced { response, .. } = &mut result {
            response.tracking_url = None;
        }
        let err = build_ad_ack(&result, "x", WrappingType::Xml).unwrap_err();
        assert!(err.to_string().contains("tracking_url"));
    }

    #[test]
    fn error_ack_is_degraded() {
        let result = enhanced(None);
        let err = AdSdkError::Validation("ad response has no execution_time_ms".into());
        let ack = build_error_ad_ack(&result, "text", &err);
        assert_eq!(ack.ad_status, AdStatus::Error);
        assert!(!ack.compliance.max_ads_policy_ok);
        assert!(!ack.compliance.max_latency_policy_ok);
        assert_eq!(ack.analytics.valid_links, NOT_IMPLEMENTED);
        assert_eq!(ack.analytics.general_placement_position, Placement::Unknown);
        let tracking = ack.error_tracking.as_ref().unwrap();
        assert_eq!(tracking.error_code, "sdk_error");
        assert!(tracking.error_message.contains("execution_time_ms"));
        assert_eq!(ack.external_metadata.message_id.as_deref(), Some("msg_a_1700000000000"));
    }

    #[test]
    fn ack_serializes_snake_case() {
        let ack = build_ad_ack(&enhanced(Some(5.0)), "<ADS>trk-1</ADS>", WrappingType::Xml).unwrap();
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["ad_status"], "ok");
        assert_eq!(json["diagnostics"]["sdk_type"], "web");
        assert_eq!(json["diagnostics"]["sdk_name"], "adstractai-rust");
        assert_eq!(json["analytics"]["general_placement_position"], "top");
        assert!(json.get("error_tracking").is_none());
        assert_eq!(AdStatus::NoAdUsed.as_str(), "no_ad_used");
        assert_eq!(serde_json::to_value(AdStatus::NoAdUsed).unwrap(), "no_ad_used");
    }
}
