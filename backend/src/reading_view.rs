//! Queries used by the reading view: navigation between sections, verse lookup,
//! commentary cross-linking and display rules.

use crate::helpers::strip_pointer;
use crate::types::{ApparatusEntry, CommentaryEntry, ParsedDocument, Section, Verse};

impl ParsedDocument {
    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    pub fn section_index(&self, section_id: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.id == section_id)
    }

    pub fn prev_section(&self, section_id: &str) -> Option<&Section> {
        let idx = self.section_index(section_id)?;
        idx.checked_sub(1).and_then(|i| self.sections.get(i))
    }

    pub fn next_section(&self, section_id: &str) -> Option<&Section> {
        let idx = self.section_index(section_id)?;
        self.sections.get(idx + 1)
    }

    pub fn verse(&self, verse_id: &str) -> Option<&Verse> {
        self.sections
            .iter()
            .flat_map(|s| s.verses.iter())
            .find(|v| v.id == verse_id)
    }

    pub fn commentary_for_verse(&self, verse_id: &str) -> Vec<&CommentaryEntry> {
        self.commentary.values().filter(|c| c.target == verse_id).collect()
    }

    /// Entries targeting a verse of the section, or the section itself.
    pub fn commentary_for_section(&self, section_id: &str) -> Vec<&CommentaryEntry> {
        let Some(section) = self.section(section_id) else {
            return Vec::new();
        };
        self.commentary
            .values()
            .filter(|c| c.target == section.id || section.verses.iter().any(|v| v.id == c.target))
            .collect()
    }

    /// Whether the parallel fragments panel has anything to show.
    pub fn has_fragments(&self) -> bool {
        self.sections
            .iter()
            .flat_map(|s| s.verses.iter())
            .any(|v| v.source_fragment_content.is_some())
    }

    /// The apparatus entry behind a clicked anchor. Accepts `#id` pointers as well.
    pub fn variant_for_word(&self, anchor_id: &str) -> Option<&ApparatusEntry> {
        self.apparatus.get(strip_pointer(anchor_id))
    }
}

impl Section {
    /// "vv. 335-339" -> "335-339"
    pub fn display_label(&self) -> &str {
        self.label.strip_prefix("vv. ").unwrap_or(self.label.as_str())
    }

    /// The speaker is shown at the start of each new turn.
    pub fn shows_speaker(&self, index: usize) -> bool {
        let Some(speaker) = self.verses.get(index).and_then(|v| v.speaker.as_deref()) else {
            return false;
        };
        match index.checked_sub(1).and_then(|i| self.verses.get(i)) {
            Some(prev) => prev.speaker.as_deref() != Some(speaker),
            None => true,
        }
    }
}

impl Verse {
    /// Synthesized to carry overflow fragment lines, with no source line of its own.
    pub fn is_ghost(&self) -> bool {
        self.is_overflow
    }

    /// Verse numbers are shown on the first verse of a section and every fifth verse.
    pub fn shows_number(&self, index: usize) -> bool {
        if self.n.is_empty() {
            return false;
        }
        index == 0 || self.n.trim().parse::<u32>().is_ok_and(|n| n % 5 == 0)
    }
}
