use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the parser and its collaborators.
///
/// Only `Unparsable` can come out of a parse. Missing alignments, unknown markup and
/// missing metadata are absorbed into empty fields and sentinel values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TeiError {
    #[error("Document could not be parsed (byte {position}): {message}")]
    Unparsable { position: usize, message: String },

    #[error("Document unavailable: {url}: {reason}")]
    Unavailable { url: String, reason: String },

    #[error("Invalid parser settings: {0}")]
    Settings(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentMode {
    /// One source stream, lines grouped by their enclosing `seg`.
    #[serde(rename = "continuous")]
    Continuous,
    /// Independent `div[type=fragment]` blocks, each with its own original and translation.
    #[serde(rename = "fragmentary")]
    Fragmentary,
}

pub const UNTITLED: &str = "Untitled";
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub title: String,
    pub author: String,
    pub editor: String,
    pub publication_date: String,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        DocumentMetadata {
            title: UNTITLED.to_string(),
            author: UNKNOWN.to_string(),
            editor: UNKNOWN.to_string(),
            publication_date: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDocument {
    pub metadata: DocumentMetadata,
    pub mode: DocumentMode,
    pub sections: Vec<Section>,
    /// Keyed by anchor id, in order of declaration in the apparatus division.
    pub apparatus: IndexMap<String, ApparatusEntry>,
    /// Keyed by commentary entry id.
    pub commentary: IndexMap<String, CommentaryEntry>,
    /// Keyed by parallel fragment block id.
    pub fragments: IndexMap<String, FragmentEntry>,
    pub source_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    /// e.g. "vv. 335-339"
    pub label: String,
    pub verses: Vec<Verse>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verse {
    pub id: String,
    /// Empty for ghost verses.
    pub n: String,
    pub source_content: String,
    pub translation_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_fragment_content: Option<String>,
    pub segment_id: String,
    pub has_apparatus: bool,
    pub has_commentary: bool,
    pub has_fragment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Synthesized to carry an overflow fragment line.
    #[serde(default)]
    pub is_overflow: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApparatusEntry {
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub lemma: String,
    pub readings: Vec<Reading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub text: String,
    pub witness: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentaryEntry {
    pub id: String,
    /// A verse id, or the section id when the section has no verses.
    pub target: String,
    /// e.g. "335 Ecce autem"
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentEntry {
    pub id: String,
    /// Section ids the fragment block is linked to, in link order.
    pub targets: Vec<String>,
}
