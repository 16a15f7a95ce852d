//! Delimiter conventions used to demarcate ad blocks in generated text.
//!
//! The service instructs the model to wrap sponsored content in one of two
//! ways:
//!
//! - **xml**: a structural tag pair, `<ADS> ... </ADS>`.
//! - **plain**: free text running from the sponsored label (for example
//!   `"Sponsored"`) up to the terminator character `˼`.
//!
//! Both conventions are matched case-insensitively, across line breaks and
//! non-greedily, so `<ads>a</ads> b <ADS>c</ADS>` yields two blocks.
//!
//! The analytics engine only talks to [`WrappingStrategy`]; the two
//! implementations are [`TagDelimited`] and [`LabelDelimited`].

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AnalyticsError;

/// Tag name used by the xml convention.
pub const XML_TAG: &str = "ADS";

/// Terminator closing a plain-mode ad block.
pub const PLAIN_TAG: &str = "˼";

static ADS_STRATEGY: Lazy<TagDelimited> = Lazy::new(|| {
    TagDelimited::new(XML_TAG).expect("the built-in ADS tag pattern always compiles")
});

/// Which wrapping convention the model was asked to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WrappingType {
    #[default]
    Xml,
    Plain,
}

impl WrappingType {
    pub fn as_str(self) -> &'static str {
        match self {
            WrappingType::Xml => "xml",
            WrappingType::Plain => "plain",
        }
    }
}

impl fmt::Display for WrappingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WrappingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xml" => Ok(WrappingType::Xml),
            "plain" => Ok(WrappingType::Plain),
            other => Err(format!("wrapping_type must be 'xml' or 'plain', got '{other}'")),
        }
    }
}

/// Locates ad blocks and the marker that opens the first one.
pub trait WrappingStrategy: Send + Sync {
    /// Inner content of every ad block, in document order.
    fn extract_blocks<'t>(&self, text: &'t str) -> Vec<&'t str>;

    /// Byte offset of the first opening marker, if any.
    fn first_marker_offset(&self, text: &str) -> Option<usize>;
}

/// `<TAG> ... </TAG>` blocks.
#[derive(Debug, Clone)]
pub struct TagDelimited {
    block: Regex,
    open: Regex,
}

impl TagDelimited {
    pub fn new(tag: &str) -> Result<Self, AnalyticsError> {
        if tag.is_empty() {
            return Err(AnalyticsError::Pattern("tag name must not be empty".into()));
        }
        let tag = regex::escape(tag);
        Ok(Self {
            block: compile(&format!("<{tag}>(.*?)</{tag}>"))?,
            open: compile(&format!("<{tag}>"))?,
        })
    }

    /// Shared strategy for the default `<ADS>` tag.
    pub fn ads() -> &'static TagDelimited {
        &ADS_STRATEGY
    }
}

impl WrappingStrategy for TagDelimited {
    fn extract_blocks<'t>(&self, text: &'t str) -> Vec<&'t str> {
        capture_blocks(&self.block, text)
    }

    fn first_marker_offset(&self, text: &str) -> Option<usize> {
        self.open.find(text).map(|m| m.start())
    }
}

/// `label ... terminator` blocks.
#[derive(Debug, Clone)]
pub struct LabelDelimited {
    block: Regex,
    anchor: Regex,
}

impl LabelDelimited {
    pub fn new(label: &str, terminator: &str) -> Result<Self, AnalyticsError> {
        if label.is_empty() {
            return Err(AnalyticsError::MissingMarker("sponsored_label"));
        }
        if terminator.is_empty() {
            return Err(AnalyticsError::Pattern("terminator must not be empty".into()));
        }
        let label = regex::escape(label);
        let terminator = regex::escape(terminator);
        Ok(Self {
            block: compile(&format!("{label}(.*?){terminator}"))?,
            anchor: compile(&label)?,
        })
    }
}

impl WrappingStrategy for LabelDelimited {
    fn extract_blocks<'t>(&self, text: &'t str) -> Vec<&'t str> {
        capture_blocks(&self.block, text)
    }

    fn first_marker_offset(&self, text: &str) -> Option<usize> {
        self.anchor.find(text).map(|m| m.start())
    }
}

fn compile(pattern: &str) -> Result<Regex, AnalyticsError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| AnalyticsError::Pattern(e.to_string()))
}

fn capture_blocks<'t>(re: &Regex, text: &'t str) -> Vec<&'t str> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}
