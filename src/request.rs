//! Building and validating the ad-injection request.
//!
//! Checks run in a fixed order, all before any network I/O:
//!
//! 1. `user_agent` and `x_forwarded_for` are present
//! 2. a conversation can be resolved (explicit, or derived from a session id)
//! 3. the user agent is long enough to classify
//! 4. the assembled request is well formed (prompt length, conversation ids,
//!    semver SDK version)

use analytics::WrappingType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AdSdkError;
use crate::metadata::{ClientMetadata, RequestMetadata};
use crate::types::Conversation;

/// Shortest prompt the service accepts.
pub const MIN_PROMPT_LEN: usize = 3;

/// Per-call context describing the end user and the conversation turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdRequestConfiguration {
    /// Used to derive a conversation when `conversation` is absent.
    pub session_id: Option<String>,
    /// Takes precedence over `session_id`.
    pub conversation: Option<Conversation>,
    pub user_agent: String,
    pub x_forwarded_for: String,
}

impl AdRequestConfiguration {
    pub fn for_session(
        session_id: impl Into<String>,
        user_agent: impl Into<String>,
        x_forwarded_for: impl Into<String>,
    ) -> Self {
        Self {
            session_id: Some(session_id.into()),
            conversation: None,
            user_agent: user_agent.into(),
            x_forwarded_for: x_forwarded_for.into(),
        }
    }

    pub fn for_conversation(
        conversation: Conversation,
        user_agent: impl Into<String>,
        x_forwarded_for: impl Into<String>,
    ) -> Self {
        Self {
            session_id: None,
            conversation: Some(conversation),
            user_agent: user_agent.into(),
            x_forwarded_for: x_forwarded_for.into(),
        }
    }

    pub fn require_headers(&self) -> Result<(), AdSdkError> {
        if self.user_agent.is_empty() {
            return Err(AdSdkError::MissingParameter(
                "user_agent parameter is required".into(),
            ));
        }
        if self.x_forwarded_for.is_empty() {
            return Err(AdSdkError::MissingParameter(
                "x_forwarded_for parameter is required".into(),
            ));
        }
        Ok(())
    }

    /// The explicit conversation, else one derived from the session id.
    ///
    /// Derivation stamps the current time, so call this once per request.
    pub fn resolve_conversation(&self) -> Result<Conversation, AdSdkError> {
        if let Some(conversation) = &self.conversation {
            return Ok(conversation.clone());
        }
        match self.session_id.as_deref() {
            Some(session_id) if !session_id.is_empty() => {
                Ok(Conversation::from_session(session_id))
            }
            _ => Err(AdSdkError::MissingParameter(
                "Either session_id or conversation parameter is required".into(),
            )),
        }
    }
}

/// Body of `POST /api/ad-injection/start/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdRequest {
    pub prompt: String,
    pub conversation: Conversation,
    pub metadata: RequestMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapping_type: Option<WrappingType>,
}

impl AdRequest {
    /// Assemble a request for an already resolved conversation.
    pub fn build(
        prompt: &str,
        conversation: Conversation,
        config: &AdRequestConfiguration,
        wrapping_type: WrappingType,
    ) -> Result<Self, AdSdkError> {
        let client = ClientMetadata::from_headers(&config.user_agent, &config.x_forwarded_for)?;
        let request = Self {
            prompt: prompt.to_string(),
            conversation,
            metadata: RequestMetadata { client },
            wrapping_type: Some(wrapping_type),
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), AdSdkError> {
        if self.prompt.chars().count() < MIN_PROMPT_LEN {
            return Err(AdSdkError::Validation(format!(
                "prompt must be at least {MIN_PROMPT_LEN} characters"
            )));
        }
        self.conversation.validate()?;
        self.metadata.client.validate()
    }

    pub fn to_payload(&self) -> Result<Value, AdSdkError> {
        serde_json::to_value(self)
            .map_err(|e| AdSdkError::Sdk(format!("failed to encode ad request: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0 Safari/537.36";

    #[test]
    fn missing_headers_are_reported_first() {
        let config = AdRequestConfiguration::default();
        let err = config.require_headers().unwrap_err();
        assert!(matches!(err, AdSdkError::MissingParameter(ref m) if m.contains("user_agent")));

        let config = AdRequestConfiguration {
            user_agent: UA.into(),
            ..Default::default()
        };
        let err = config.require_headers().unwrap_err();
        assert!(matches!(err, AdSdkError::MissingParameter(ref m) if m.contains("x_forwarded_for")));
    }

    #[test]
    fn conversation_takes_precedence_over_session() {
        let conv = Conversation::new("conv-1", "sess-1", "msg-1");
        let config = AdRequestConfiguration {
            session_id: Some("other".into()),
            ..AdRequestConfiguration::for_conversation(conv.clone(), UA, "1.2.3.4")
        };
        assert_eq!(config.resolve_conversation().unwrap(), conv);
    }

    #[test]
    fn session_id_derives_conversation() {
        let config = AdRequestConfiguration::for_session("sess-9", UA, "1.2.3.4");
        let conv = config.resolve_conversation().unwrap();
        assert_eq!(conv.conversation_id, "sess-9");
        assert_eq!(conv.session_id, "sess-9");
        assert!(conv.message_id.starts_with("msg_u_"));
    }

    #[test]
    fn empty_or_absent_session_is_missing() {
        for session_id in [None, Some(String::new())] {
            let config = AdRequestConfiguration {
                session_id,
                user_agent: UA.into(),
                x_forwarded_for: "1.2.3.4".into(),
                conversation: None,
            };
            assert_eq!(config.resolve_conversation().unwrap_err().code(), "missing_parameter");
        }
    }

    #[test]
    fn build_produces_wire_payload() {
        let config = AdRequestConfiguration::for_session("sess-1", UA, "203.0.113.7");
        let conv = Conversation::from_session_at("sess-1", 42);
        let request = AdRequest::build("What is Rust?", conv, &config, WrappingType::Xml).unwrap();
        let payload = request.to_payload().unwrap();

        assert_eq!(payload["prompt"], "What is Rust?");
        assert_eq!(payload["conversation"]["message_id"], "msg_u_42");
        assert_eq!(payload["metadata"]["client"]["device_type"], "desktop");
        assert_eq!(payload["metadata"]["client"]["os_family"], "Windows");
        assert_eq!(payload["metadata"]["client"]["x_forwarded_for"], "203.0.113.7");
        assert_eq!(payload["wrapping_type"], "xml");
    }

    #[test]
    fn short_prompt_is_rejected() {
        let config = AdRequestConfiguration::for_session("sess-1", UA, "1.2.3.4");
        let conv = Conversation::from_session_at("sess-1", 1);
        let err = AdRequest::build("hi", conv, &config, WrappingType::Xml).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn short_user_agent_is_rejected() {
        let config = AdRequestConfiguration::for_session("sess-1", "tiny", "1.2.3.4");
        let conv = Conversation::from_session_at("sess-1", 1);
        let err = AdRequest::build("a long prompt", conv, &config, WrappingType::Xml).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn empty_conversation_field_is_rejected() {
        let config = AdRequestConfiguration::for_session("sess-1", UA, "1.2.3.4");
        let conv = Conversation::new("", "s", "m");
        let err = AdRequest::build("a long prompt", conv, &config, WrappingType::Plain).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }
}
