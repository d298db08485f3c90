use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// One entry of the library export, produced by the out-of-process library
/// parser. Immutable input to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub path: String,
    #[serde(rename = "type")]
    pub mime_type: String,
}

impl Attachment {
    pub fn is_pdf(&self) -> bool {
        self.mime_type == PDF_MIME_TYPE
    }
}

/// Normalized text of a single physical page. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageExtraction {
    pub page: u32,
    pub text: String,
    pub guessed_lang: String,
}

/// On-disk `text.json` payload, written once per fingerprint and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionArtifact {
    pub pages: Vec<PageExtraction>,
    pub total_pages: u32,
    pub path: String,
}

/// A unit of data sent to the search index. One library document maps to
/// exactly one `Metadata` record plus one `Fulltext` record per extracted
/// page across all of its PDF attachments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record_type", rename_all = "lowercase")]
pub enum SearchRecord {
    Metadata {
        id: String,
        item_id: String,
        tags: Vec<String>,
        metadata: Value,
        attachment_fingerprints: Vec<String>,
    },
    Fulltext {
        id: String,
        item_id: String,
        fingerprint: String,
        total_pages: u32,
        fulltext: FulltextPage,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulltextPage {
    pub page: u32,
    pub text: String,
    pub guessed_lang: String,
}

impl SearchRecord {
    pub fn id(&self) -> &str {
        match self {
            SearchRecord::Metadata { id, .. } | SearchRecord::Fulltext { id, .. } => id,
        }
    }

    pub fn item_id(&self) -> &str {
        match self {
            SearchRecord::Metadata { item_id, .. } | SearchRecord::Fulltext { item_id, .. } => {
                item_id
            }
        }
    }
}

/// The last confirmed mapping of record id to record content, used as the
/// diff baseline. Keyed map, so two snapshots built from the same records
/// compare equal regardless of insertion order.
pub type RecordSnapshot = BTreeMap<String, SearchRecord>;

/// Attachment path to fingerprint, for attachments whose extraction
/// succeeded in the current run.
pub type PathFingerprints = BTreeMap<String, String>;
