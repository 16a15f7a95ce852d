use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound (inclusive) of the relative offset classified as `top`.
pub const TOP_THRESHOLD: f64 = 0.25;
/// Upper bound (inclusive) of the relative offset classified as `middle`.
pub const MIDDLE_THRESHOLD: f64 = 0.75;

/// Where the first ad block opens within the generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Top,
    Middle,
    Bottom,
    /// No ad block was extracted.
    None,
    /// Empty text, or blocks exist but the position could not be determined.
    Unknown,
}

impl Placement {
    pub fn as_str(self) -> &'static str {
        match self {
            Placement::Top => "top",
            Placement::Middle => "middle",
            Placement::Bottom => "bottom",
            Placement::None => "none",
            Placement::Unknown => "unknown",
        }
    }

    /// Classify a relative offset in `[0, 1]`.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio <= TOP_THRESHOLD {
            Placement::Top
        } else if ratio <= MIDDLE_THRESHOLD {
            Placement::Middle
        } else {
            Placement::Bottom
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Placement of the ad opening at byte offset `marker` in `text`.
///
/// Offsets are compared in characters, not bytes, so multi-byte text before
/// the marker does not skew the ratio.
pub fn classify_placement(text: &str, has_blocks: bool, marker: Option<usize>) -> Placement {
    let total_chars = text.chars().count();
    if total_chars == 0 {
        return Placement::Unknown;
    }
    if !has_blocks {
        return Placement::None;
    }
    let Some(offset) = marker else {
        return Placement::Unknown;
    };
    let Some(prefix) = text.get(..offset) else {
        return Placement::Unknown;
    };
    let offset_chars = prefix.chars().count();
    Placement::from_ratio(offset_chars as f64 / total_chars as f64)
}
