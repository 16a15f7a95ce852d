//! Wire and result types shared by the request, orchestration and
//! acknowledgment layers.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AdSdkError;

/// Prefix of message ids minted for user turns.
pub const USER_MESSAGE_PREFIX: &str = "msg_u_";
/// Prefix the acknowledgment uses for the assistant turn.
pub const ASSISTANT_MESSAGE_PREFIX: &str = "msg_a_";

/// Identifies the conversation turn an ad request belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub session_id: String,
    pub message_id: String,
}

impl Conversation {
    pub fn new(
        conversation_id: impl Into<String>,
        session_id: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            session_id: session_id.into(),
            message_id: message_id.into(),
        }
    }

    /// Derive a conversation from a bare session id, stamping the message id
    /// with the current epoch milliseconds.
    pub fn from_session(session_id: &str) -> Self {
        Self::from_session_at(session_id, Utc::now().timestamp_millis())
    }

    /// Same as [`Conversation::from_session`] with an explicit timestamp.
    pub fn from_session_at(session_id: &str, epoch_millis: i64) -> Self {
        Self::new(
            session_id,
            session_id,
            format!("{USER_MESSAGE_PREFIX}{epoch_millis}"),
        )
    }

    pub fn validate(&self) -> Result<(), AdSdkError> {
        for (name, value) in [
            ("conversation_id", &self.conversation_id),
            ("session_id", &self.session_id),
            ("message_id", &self.message_id),
        ] {
            if value.is_empty() {
                return Err(AdSdkError::Validation(format!(
                    "conversation.{name} must not be empty"
                )));
            }
        }
        Ok(())
    }

    /// Message id used on the acknowledgment for this turn.
    pub fn ack_message_id(&self) -> String {
        self.message_id
            .replace(USER_MESSAGE_PREFIX, ASSISTANT_MESSAGE_PREFIX)
    }
}

/// Enhanced-prompt information returned by the service.
///
/// All four known fields are required; an `aepi` object missing any of them
/// fails to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AepiData {
    pub status: String,
    pub aepi_text: String,
    pub checksum: String,
    pub size_bytes: u64,
    /// Fields this client does not know about, kept for round-tripping.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of the ad-injection endpoint.
///
/// Every field is optional and unknown fields are preserved, since the
/// service evolves independently of the client. A 2xx response with
/// `success == Some(false)` means no ad was available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aepi: Option<AepiData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsored_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AdResponse {
    /// Parse a response body. Anything other than a JSON object is rejected.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if !value.is_object() {
            return Err(serde::de::Error::custom("response body must be a JSON object"));
        }
        serde_json::from_value(value)
    }

    /// Enhanced prompt text, if the response carries one.
    pub fn aepi_text(&self) -> Option<&str> {
        self.aepi.as_ref().map(|aepi| aepi.aepi_text.as_str())
    }

    pub fn is_success(&self) -> bool {
        self.success == Some(true)
    }
}

/// Outcome of an enhancement call.
///
/// `Enhanced` only comes out of a successful strict call. `Fallback` keeps
/// the caller's prompt and records why the enhancement was skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum EnhancementResult {
    Enhanced {
        prompt: String,
        conversation: Conversation,
        response: Box<AdResponse>,
    },
    Fallback {
        prompt: String,
        /// `None` only when the caller supplied neither a session id nor a
        /// conversation.
        conversation: Option<Conversation>,
        error: AdSdkError,
        response: Option<Box<AdResponse>>,
    },
}

impl EnhancementResult {
    pub fn enhanced(prompt: String, conversation: Conversation, response: AdResponse) -> Self {
        EnhancementResult::Enhanced {
            prompt,
            conversation,
            response: Box::new(response),
        }
    }

    pub fn fallback(
        prompt: String,
        conversation: Option<Conversation>,
        error: AdSdkError,
        response: Option<AdResponse>,
    ) -> Self {
        EnhancementResult::Fallback {
            prompt,
            conversation,
            error,
            response: response.map(Box::new),
        }
    }

    /// Prompt to forward to the language model.
    pub fn prompt(&self) -> &str {
        match self {
            EnhancementResult::Enhanced { prompt, .. }
            | EnhancementResult::Fallback { prompt, .. } => prompt,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, EnhancementResult::Enhanced { .. })
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        match self {
            EnhancementResult::Enhanced { conversation, .. } => Some(conversation),
            EnhancementResult::Fallback { conversation, .. } => conversation.as_ref(),
        }
    }

    pub fn ad_response(&self) -> Option<&AdResponse> {
        match self {
            EnhancementResult::Enhanced { response, .. } => Some(&**response),
            EnhancementResult::Fallback { response, .. } => response.as_deref(),
        }
    }

    pub fn error(&self) -> Option<&AdSdkError> {
        match self {
            EnhancementResult::Enhanced { .. } => None,
            EnhancementResult::Fallback { error, .. } => Some(error),
        }
    }
}
