//! Content buckets and the record types stored in them.
//!
//! Every bucket holds one JSON object per file. Records are decoded with
//! serde and then checked by [`ContentRecord::validate`], so a document that
//! parses but is missing required content is rejected at load time instead
//! of rendering blank fields.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four fixed content categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Programs,
    Closures,
    Documents,
    Information,
}

impl Bucket {
    /// All buckets, in indexing order.
    pub const ALL: [Bucket; 4] = [
        Bucket::Programs,
        Bucket::Closures,
        Bucket::Documents,
        Bucket::Information,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Programs => "programs",
            Bucket::Closures => "closures",
            Bucket::Documents => "documents",
            Bucket::Information => "information",
        }
    }

    /// File name of this bucket's manifest (`<bucket>.json`).
    pub fn manifest_name(&self) -> String {
        format!("{}.json", self.as_str())
    }

    /// Transport path of a document in this bucket (`<bucket>/<file>`).
    pub fn document_path(&self, file: &str) -> String {
        format!("{}/{}", self.as_str(), file)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bucket::ALL
            .iter()
            .copied()
            .find(|b| b.as_str() == s.trim())
            .ok_or_else(|| {
                format!(
                    "unknown bucket '{}'. Must be one of: programs, closures, documents, information",
                    s
                )
            })
    }
}

/// A record type that can be decoded from a bucket document.
pub trait ContentRecord: DeserializeOwned + Send + 'static {
    /// The bucket this record type lives in.
    const BUCKET: Bucket;

    /// Whether titles must be unique across the bucket.
    const UNIQUE_TITLE: bool = false;

    fn title(&self) -> &str;

    /// Schema checks that serde cannot express. Returns a reason on failure.
    fn validate(&self) -> Result<(), String> {
        require_text("title", self.title())
    }
}

fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("`{}` must not be empty", field))
    } else {
        Ok(())
    }
}

fn require_amount(field: &str, value: Option<f64>) -> Result<(), String> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(format!(
            "`{}` must be a non-negative amount, got {}",
            field, v
        )),
        _ => Ok(()),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Programs
// ═══════════════════════════════════════════════════════════════════════

/// An enrollment program (infants, toddlers, preschool, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Display name, unique within the bucket.
    pub title: String,
    pub age_range: String,
    pub description: String,
    /// Staff-to-child ratio, e.g. `"1:4"`.
    pub ratio: String,
    pub tuition: Tuition,
    pub availability: Availability,
}

/// Tuition amounts in whole currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuition {
    pub full_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_in: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    /// Free-text status. `Openings`, `Open`, `Waitlist` and `Full` get
    /// dedicated badges; anything else renders neutral.
    pub status: String,
    pub max_capacity: u32,
    pub enrolled: u32,
    /// Stored open spots. Non-numeric values decode as absent.
    #[serde(
        default,
        deserialize_with = "lenient_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub open_spots: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_opening: Option<String>,
}

fn lenient_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        v.as_i64().or_else(|| {
            v.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        })
    }))
}

impl ContentRecord for Program {
    const BUCKET: Bucket = Bucket::Programs;
    const UNIQUE_TITLE: bool = true;

    fn title(&self) -> &str {
        &self.title
    }

    fn validate(&self) -> Result<(), String> {
        require_text("title", &self.title)?;
        require_amount("tuition.full_time", Some(self.tuition.full_time))?;
        require_amount("tuition.part_time", self.tuition.part_time)?;
        require_amount("tuition.drop_in", self.tuition.drop_in)?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Closures, documents, information
// ═══════════════════════════════════════════════════════════════════════

/// A day or range of days the center is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Closure {
    pub title: String,
    pub start: String,
    /// Last day of the closure; same as `start` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ContentRecord for Closure {
    const BUCKET: Bucket = Bucket::Closures;

    fn title(&self) -> &str {
        &self.title
    }

    fn validate(&self) -> Result<(), String> {
        require_text("title", &self.title)?;
        require_text("start", &self.start)
    }
}

/// A downloadable form or handbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    /// URL or site path of the asset.
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ContentRecord for Document {
    const BUCKET: Bucket = Bucket::Documents;

    fn title(&self) -> &str {
        &self.title
    }

    fn validate(&self) -> Result<(), String> {
        require_text("title", &self.title)?;
        require_text("file", &self.file)
    }
}

/// A bulletin board entry. Line breaks in `description` are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformationItem {
    pub title: String,
    #[serde(default, alias = "body", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ContentRecord for InformationItem {
    const BUCKET: Bucket = Bucket::Information;

    fn title(&self) -> &str {
        &self.title
    }
}
