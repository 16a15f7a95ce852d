//! Adstract analytics layer.
//!
//! Given the text a language model produced after receiving an enhanced
//! prompt, this crate finds the ad blocks the model emitted and reports how
//! they were used. It also hosts the digests that travel with an
//! acknowledgment.
//!
//! ## What we compute
//!
//! - Ad blocks, under either wrapping convention (`<ADS>...</ADS>` or
//!   `label ... ˼`)
//! - Tracking-identifier occurrences inside those blocks
//! - Tracking-URL and sponsored-label occurrences across the whole text
//! - Word totals, the ad-word ratio and the overload flag
//! - Coarse placement of the first ad block (top, middle, bottom)
//!
//! ## Pure function guarantee
//!
//! No I/O, no clock, no globals beyond a compiled regex. The same markers,
//! text and wrapping type always produce the same [`Analytics`].
//!
//! ```rust
//! use analytics::{analyze, AdMarkers, Placement, WrappingType};
//!
//! let markers = AdMarkers {
//!     tracking_identifier: "id1",
//!     tracking_url: "https://t.example/x",
//!     sponsored_label: "Sponsored",
//! };
//! let out = analyze(&markers, "<ADS>id1 id1</ADS> and more text", WrappingType::Xml).unwrap();
//! assert_eq!(out.total_ads_detected, 2);
//! assert_eq!(out.general_placement_position, Placement::Top);
//! ```

mod error;
mod hash;
mod placement;
mod report;
mod wrapping;

pub use crate::error::AnalyticsError;
pub use crate::hash::{checksum_text, hash_text};
pub use crate::placement::{classify_placement, Placement, MIDDLE_THRESHOLD, TOP_THRESHOLD};
pub use crate::report::{
    analyze, analyze_with, count_occurrences, count_words, AdMarkers, Analytics,
    NOT_IMPLEMENTED, OVERLOADED_RATIO,
};
pub use crate::wrapping::{
    LabelDelimited, TagDelimited, WrappingStrategy, WrappingType, PLAIN_TAG, XML_TAG,
};
