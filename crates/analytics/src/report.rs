//! Analytics computed over one piece of generated text.

use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;
use crate::placement::{classify_placement, Placement};
use crate::wrapping::{LabelDelimited, TagDelimited, WrappingStrategy, WrappingType, PLAIN_TAG};

/// Ad-word ratio above which a response counts as overloaded.
pub const OVERLOADED_RATIO: f64 = 0.8;

/// Value reported for metrics that are not computed yet.
pub const NOT_IMPLEMENTED: i64 = -1;

/// Literals from the ad response that the analysis searches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdMarkers<'a> {
    pub tracking_identifier: &'a str,
    pub tracking_url: &'a str,
    pub sponsored_label: &'a str,
}

impl<'a> AdMarkers<'a> {
    /// Build markers from optional response fields, rejecting absent or empty ones.
    pub fn from_parts(
        tracking_identifier: Option<&'a str>,
        tracking_url: Option<&'a str>,
        sponsored_label: Option<&'a str>,
    ) -> Result<Self, AnalyticsError> {
        Ok(Self {
            tracking_identifier: required(tracking_identifier, "tracking_identifier")?,
            tracking_url: required(tracking_url, "tracking_url")?,
            sponsored_label: required(sponsored_label, "sponsored_label")?,
        })
    }
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, AnalyticsError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AnalyticsError::MissingMarker(name)),
    }
}

/// Usage report for a single generated response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    /// Tracking-identifier occurrences inside ad blocks. Repeats within one
    /// block each count.
    pub total_ads_detected: usize,
    pub valid_links: i64,
    pub invalid_links: i64,
    /// Tracking-URL occurrences anywhere in the text.
    pub total_links: usize,
    pub total_words: usize,
    /// Ad words over total words, rounded to two decimals.
    pub ad_word_ratio: f64,
    pub is_overloaded: bool,
    pub sponsored_labels_count: usize,
    pub format_valid: bool,
    pub general_placement_position: Placement,
    pub natural_flow_score: i64,
    pub overall_response_score: i64,
    pub ad_score: i64,
}

impl Analytics {
    /// Placeholder used when the text could not be analysed at all.
    pub fn unavailable() -> Self {
        Self {
            total_ads_detected: 0,
            valid_links: NOT_IMPLEMENTED,
            invalid_links: NOT_IMPLEMENTED,
            total_links: 0,
            total_words: 0,
            ad_word_ratio: 0.0,
            is_overloaded: false,
            sponsored_labels_count: 0,
            format_valid: false,
            general_placement_position: Placement::Unknown,
            natural_flow_score: NOT_IMPLEMENTED,
            overall_response_score: NOT_IMPLEMENTED,
            ad_score: NOT_IMPLEMENTED,
        }
    }
}

/// Analyse `text` with the strategy matching `wrapping`.
pub fn analyze(
    markers: &AdMarkers<'_>,
    text: &str,
    wrapping: WrappingType,
) -> Result<Analytics, AnalyticsError> {
    match wrapping {
        WrappingType::Xml => Ok(analyze_with(TagDelimited::ads(), markers, text)),
        WrappingType::Plain => {
            let strategy = LabelDelimited::new(markers.sponsored_label, PLAIN_TAG)?;
            Ok(analyze_with(&strategy, markers, text))
        }
    }
}

/// Analyse `text` with an explicit strategy.
pub fn analyze_with(
    strategy: &dyn WrappingStrategy,
    markers: &AdMarkers<'_>,
    text: &str,
) -> Analytics {
    let blocks = strategy.extract_blocks(text);

    let total_ads_detected = blocks
        .iter()
        .map(|block| count_occurrences(block, markers.tracking_identifier))
        .sum();

    let total_words = count_words(text);
    let ad_words: usize = blocks.iter().map(|block| count_words(block)).sum();
    let ad_word_ratio = if total_words > 0 {
        round2(ad_words as f64 / total_words as f64)
    } else {
        0.0
    };

    let general_placement_position =
        classify_placement(text, !blocks.is_empty(), strategy.first_marker_offset(text));

    Analytics {
        total_ads_detected,
        valid_links: NOT_IMPLEMENTED,
        invalid_links: NOT_IMPLEMENTED,
        total_links: count_occurrences(text, markers.tracking_url),
        total_words,
        ad_word_ratio,
        is_overloaded: ad_word_ratio > OVERLOADED_RATIO,
        sponsored_labels_count: count_occurrences(text, markers.sponsored_label),
        format_valid: true,
        general_placement_position,
        natural_flow_score: NOT_IMPLEMENTED,
        overall_response_score: NOT_IMPLEMENTED,
        ad_score: NOT_IMPLEMENTED,
    }
}

/// Non-overlapping, case-sensitive occurrences of `needle`.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Whitespace-separated token count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Two decimals, ties to even.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
