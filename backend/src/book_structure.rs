//! Book structure: the sibling verse-block documents of a book, used for navigation.
//!
//! Fetching the XML is left to an [`XmlSource`]. [`BookIndex`] parses sibling documents
//! on demand and keeps each parsed result.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logger::info;
use crate::parser_settings::ParserSettings;
use crate::tei_parser::parse_tei_with_settings;
use crate::types::{ParsedDocument, TeiError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:1337";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookBlock {
    pub document_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub verse_block_name: Option<String>,
    pub xml_url: String,
}

impl BookBlock {
    pub fn display_name(&self) -> &str {
        self.verse_block_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.title.as_deref().filter(|s| !s.trim().is_empty()))
            .unwrap_or("Document")
    }

    pub fn list_from_json(json: &str) -> Result<Vec<BookBlock>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Supplies the raw XML text of a document.
pub trait XmlSource {
    fn fetch_xml_text(&self, url: &str) -> Result<String, TeiError>;
}

/// Absolute `http(s)` urls are kept, anything else is joined to `base`.
pub fn resolve_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'))
}

/// Reads documents from a directory. The path of an `http(s)` url is resolved
/// against the directory, so urls of an uploads server map to its local mirror.
pub struct FsXmlSource {
    root: PathBuf,
}

impl FsXmlSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsXmlSource { root: root.into() }
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        let path = match url.strip_prefix("http://").or_else(|| url.strip_prefix("https://")) {
            Some(rest) => rest.split_once('/').map(|(_, p)| p).unwrap_or(""),
            None => url,
        };
        self.root.join(path.trim_start_matches('/'))
    }
}

impl XmlSource for FsXmlSource {
    fn fetch_xml_text(&self, url: &str) -> Result<String, TeiError> {
        let path = self.path_for(url);
        fs::read_to_string(&path).map_err(|e| TeiError::Unavailable {
            url: url.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })
    }
}

pub struct BookIndex<S: XmlSource> {
    source: S,
    base_url: String,
    settings: ParserSettings,
    blocks: Vec<BookBlock>,
    cache: HashMap<String, ParsedDocument>,
}

impl<S: XmlSource> BookIndex<S> {
    pub fn new(source: S, blocks: Vec<BookBlock>) -> Self {
        BookIndex {
            source,
            base_url: DEFAULT_BASE_URL.to_string(),
            settings: ParserSettings::default(),
            blocks,
            cache: HashMap::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_settings(mut self, settings: ParserSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn blocks(&self) -> &[BookBlock] {
        &self.blocks
    }

    pub fn block(&self, document_id: &str) -> Option<&BookBlock> {
        self.blocks.iter().find(|b| b.document_id == document_id)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// The parsed document of a block, fetched and parsed on first access.
    pub fn document(&mut self, document_id: &str) -> Result<&ParsedDocument, TeiError> {
        if !self.cache.contains_key(document_id) {
            let block = self.block(document_id).ok_or_else(|| TeiError::Unavailable {
                url: document_id.to_string(),
                reason: "not part of the book structure".to_string(),
            })?;

            let url = resolve_url(&self.base_url, &block.xml_url);
            info(&format!("Loading {} from {}", block.display_name(), url));

            let xml = self.source.fetch_xml_text(&url)?;
            let parsed = parse_tei_with_settings(&xml, &self.settings)?;
            self.cache.insert(document_id.to_string(), parsed);
        }

        self.cache.get(document_id).ok_or_else(|| TeiError::Unavailable {
            url: document_id.to_string(),
            reason: "not cached".to_string(),
        })
    }
}
