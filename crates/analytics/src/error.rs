use thiserror::Error;

/// Errors that can occur while analysing generated text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnalyticsError {
    /// A marker required for counting (tracking identifier, tracking URL or
    /// sponsored label) was absent or empty on the ad response.
    #[error("missing ad marker: {0}")]
    MissingMarker(&'static str),
    /// A delimiter pattern could not be compiled.
    #[error("invalid wrapping pattern: {0}")]
    Pattern(String),
}
