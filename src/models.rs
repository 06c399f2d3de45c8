//! Data models for quotesync.
//!
//! This module defines the core entities: Quote and ConflictEntry.
//! Quote IDs are opaque strings; locally created quotes get a UUID7 hex id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a quote record came from. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Local,
    #[default]
    Remote,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn default_version() -> u64 {
    1
}

/// A single quote record.
///
/// `dirty` and `conflict` are only serialized while set, so a clean record
/// round-trips without bookkeeping fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Unique identifier, stable across sync
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author: String,
    pub category: String,
    /// Monotonic version, starts at 1
    #[serde(default = "default_version")]
    pub version: u64,
    /// Modified locally since the last successful upload
    #[serde(default, skip_serializing_if = "is_false")]
    pub dirty: bool,
    /// Diverges from the remote copy at the same version; awaiting resolution
    #[serde(default, skip_serializing_if = "is_false")]
    pub conflict: bool,
    #[serde(default)]
    pub origin: Origin,
}

/// The part of a quote that takes part in conflict detection.
#[derive(Serialize)]
struct QuoteContent<'a> {
    id: &'a str,
    text: &'a str,
    author: &'a str,
    category: &'a str,
    version: u64,
}

impl Quote {
    /// Create a new locally authored quote (version 1, dirty).
    pub fn new(text: impl Into<String>, category: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().simple().to_string(),
            text: text.into(),
            author: author.into(),
            category: category.into(),
            version: 1,
            dirty: true,
            conflict: false,
            origin: Origin::Local,
        }
    }

    /// Create a quote as received from a remote source.
    pub fn remote(
        id: impl Into<String>,
        text: impl Into<String>,
        category: impl Into<String>,
        version: u64,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            author: String::new(),
            category: category.into(),
            version,
            dirty: false,
            conflict: false,
            origin: Origin::Remote,
        }
    }

    /// Serialized content used for divergence checks.
    ///
    /// Excludes the dirty/conflict flags and the origin tag.
    pub fn content_json(&self) -> String {
        let content = QuoteContent {
            id: &self.id,
            text: &self.text,
            author: &self.author,
            category: &self.category,
            version: self.version,
        };
        // Serializing plain string/integer fields cannot fail.
        serde_json::to_string(&content).unwrap_or_default()
    }

    /// True if both records carry the same serialized content.
    pub fn same_content(&self, other: &Quote) -> bool {
        self.content_json() == other.content_json()
    }
}

/// A recorded divergence between the local and remote copy of one quote.
///
/// Holds copies, not references; resolution looks the id back up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub id: String,
    /// Local record as it was before the conflict flag was set
    pub local: Quote,
    pub remote: Quote,
}

/// Per-cycle merge counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub added: usize,
    pub updated: usize,
    pub conflicts: usize,
}
