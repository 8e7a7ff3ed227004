use std::fs;
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::types::TeiError;

/// Parser configuration. Every field has a default, so a settings file only needs to
/// name what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    pub conventions: IdConventions,
    pub translation_layout: TranslationLayout,
    pub editorial_markers: EditorialMarkers,
    pub witness_list_label: String,
    pub bibliography_label: String,
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            conventions: IdConventions::default(),
            translation_layout: TranslationLayout::Prose,
            editorial_markers: EditorialMarkers::Placeholder,
            witness_list_label: "Witnesses".to_string(),
            bibliography_label: "Bibliography".to_string(),
        }
    }
}

impl ParserSettings {
    pub fn from_json_str(json: &str) -> Result<Self, TeiError> {
        serde_json::from_str(json).map_err(|e| TeiError::Settings(e.to_string()))
    }

    pub fn load_from_json(path: &Path) -> Result<Self, TeiError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| TeiError::Settings(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
    }
}

/// One id-prefix substitution: a segment `la.5.335` with the rule `la.` -> `it.`
/// expects its counterpart at `it.5.335`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRule {
    pub source_prefix: String,
    pub counterpart_prefix: String,
}

impl PrefixRule {
    pub fn new(source_prefix: &str, counterpart_prefix: &str) -> Self {
        PrefixRule {
            source_prefix: source_prefix.to_string(),
            counterpart_prefix: counterpart_prefix.to_string(),
        }
    }

    pub fn apply(&self, source_id: &str) -> Option<String> {
        source_id
            .strip_prefix(&self.source_prefix)
            .map(|rest| format!("{}{}", self.counterpart_prefix, rest))
    }
}

/// The id conventions that tie the source stream to its counterpart streams.
/// Rules are tried in order; the first matching source prefix wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdConventions {
    pub translation: Vec<PrefixRule>,
    pub commentary: Vec<PrefixRule>,
}

impl Default for IdConventions {
    fn default() -> Self {
        IdConventions {
            translation: vec![PrefixRule::new("la.", "it.")],
            commentary: vec![PrefixRule::new("la.", "it.note.")],
        }
    }
}

impl IdConventions {
    pub fn translation_id(&self, source_id: &str) -> Option<String> {
        first_match(&self.translation, source_id)
    }

    pub fn commentary_id(&self, source_id: &str) -> Option<String> {
        first_match(&self.commentary, source_id)
    }
}

fn first_match(rules: &[PrefixRule], source_id: &str) -> Option<String> {
    rules.iter().find_map(|rule| rule.apply(source_id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranslationLayout {
    /// The whole translation block accompanies the first verse of the section.
    #[serde(rename = "prose")]
    Prose,
    /// The block is split at `<lb/>` and distributed verse by verse.
    #[serde(rename = "line_breaks")]
    LineBreaks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditorialMarkers {
    /// `gap` renders as a bracketed lacuna marker, `supplied` keeps its text in ⟨ ⟩.
    #[serde(rename = "placeholder")]
    Placeholder,
    /// `gap` and `supplied` render as nothing.
    #[serde(rename = "omit")]
    Omit,
}
