//! Client metadata derived from the end user's request headers.
//!
//! Only a digest of the user agent leaves the process; the raw string is used
//! locally to classify the device, OS and browser with plain substring
//! heuristics.
//!
//! ```text
//! user agent ──┬─ sha256 ──────────────► user_agent_hash
//!              ├─ device heuristics ───► device_type
//!              ├─ os heuristics ───────► os_family?
//!              └─ browser heuristics ──► browser_family?
//! x-forwarded-for ─────────────────────► x_forwarded_for
//! ```

use analytics::hash_text;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::SDK_VERSION;
use crate::error::AdSdkError;

/// Shortest user agent accepted for classification.
pub const MIN_USER_AGENT_LEN: usize = 10;

static SEMVER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("semver pattern compiles"));

const BOT_TOKENS: [&str; 5] = ["bot", "crawler", "spider", "slurp", "bingpreview"];
const DESKTOP_TOKENS: [&str; 4] = ["windows", "macintosh", "linux", "cros"];
const OS_CANDIDATES: [(&str, &str); 9] = [
    ("windows", "Windows"),
    ("android", "Android"),
    ("iphone", "iOS"),
    ("ipad", "iOS"),
    ("ios", "iOS"),
    ("mac os x", "macOS"),
    ("macintosh", "macOS"),
    ("cros", "ChromeOS"),
    ("linux", "Linux"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
    Bot,
    Unknown,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Bot => "bot",
            DeviceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sent as `metadata.client` on every ad request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    pub user_agent_hash: String,
    pub device_type: DeviceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_family: Option<String>,
    pub sdk_version: String,
    pub x_forwarded_for: String,
}

impl ClientMetadata {
    /// Classify `user_agent` and stamp the build's SDK version.
    pub fn from_headers(user_agent: &str, x_forwarded_for: &str) -> Result<Self, AdSdkError> {
        if user_agent.chars().count() < MIN_USER_AGENT_LEN {
            return Err(AdSdkError::Validation(format!(
                "user_agent must be at least {MIN_USER_AGENT_LEN} characters"
            )));
        }
        let metadata = Self {
            user_agent_hash: hash_text(user_agent),
            device_type: parse_device_type(user_agent),
            os_family: parse_os_family(user_agent).map(str::to_owned),
            browser_family: parse_browser_family(user_agent).map(str::to_owned),
            sdk_version: SDK_VERSION.to_owned(),
            x_forwarded_for: x_forwarded_for.to_owned(),
        };
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn validate(&self) -> Result<(), AdSdkError> {
        if !SEMVER.is_match(&self.sdk_version) {
            return Err(AdSdkError::Validation(
                "sdk_version must be a semver string".into(),
            ));
        }
        Ok(())
    }
}

/// Wrapper producing the `{"client": {...}}` shape on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub client: ClientMetadata,
}

pub fn parse_device_type(user_agent: &str) -> DeviceType {
    let value = user_agent.to_lowercase();
    let has = |token: &str| value.contains(token);
    if BOT_TOKENS.iter().any(|&t| has(t)) {
        DeviceType::Bot
    } else if has("ipad") || has("tablet") {
        DeviceType::Tablet
    } else if has("mobile") || has("iphone") || has("android") {
        DeviceType::Mobile
    } else if DESKTOP_TOKENS.iter().any(|&t| has(t)) {
        DeviceType::Desktop
    } else {
        DeviceType::Unknown
    }
}

/// First matching OS family in priority order.
pub fn parse_os_family(user_agent: &str) -> Option<&'static str> {
    let value = user_agent.to_lowercase();
    OS_CANDIDATES
        .iter()
        .find(|(token, _)| value.contains(token))
        .map(|(_, label)| *label)
}

pub fn parse_browser_family(user_agent: &str) -> Option<&'static str> {
    let value = user_agent.to_lowercase();
    let has = |token: &str| value.contains(token);
    if has("edg") {
        Some("Edge")
    } else if has("opr") || has("opera") {
        Some("Opera")
    } else if has("chrome") && !has("chromium") {
        Some("Chrome")
    } else if has("safari") && !has("chrome") && !has("chromium") {
        Some("Safari")
    } else if has("firefox") {
        Some("Firefox")
    } else if has("chromium") {
        Some("Chromium")
    } else {
        None
    }
}
