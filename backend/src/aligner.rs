//! Cross-stream aligner
//!
//! Attaches translation, parallel fragment and commentary content to rendered sections.
//! A counterpart that can't be found leaves the field empty; it is logged, never an error.

use std::collections::HashMap;

use html_escape::encode_text;
use indexmap::IndexMap;

use crate::helpers::{leading_verse_number, strip_pointer};
use crate::inline_render::{render_content, render_content_excluding, render_line_broken, RenderContext};
use crate::logger::{debug, warn};
use crate::parser_settings::TranslationLayout;
use crate::segmenter::{extract_lines, find_stream, ExtractedLine, TextStream};
use crate::types::{CommentaryEntry, FragmentEntry, Section, Verse};
use crate::xml_tree::{XmlDocument, XmlElement};

// === Translation ===

pub fn align_translations(doc: &XmlDocument, sections: &mut [Section], ctx: &RenderContext) {
    let Some(stream) = find_stream(doc, TextStream::Translation) else {
        debug("No translation stream");
        return;
    };

    for section in sections.iter_mut() {
        let Some(counterpart_id) = ctx.settings.conventions.translation_id(&section.id) else {
            debug(&format!("No translation convention applies to {}", section.id));
            continue;
        };
        let Some(block) = stream.find_by_xml_id(&counterpart_id) else {
            debug(&format!("Translation {} not found for {}", counterpart_id, section.id));
            continue;
        };

        match ctx.settings.translation_layout {
            TranslationLayout::Prose => {
                if let Some(first) = section.verses.first_mut() {
                    first.translation_content = render_content(block, ctx);
                }
            }
            TranslationLayout::LineBreaks => distribute_lines(&mut section.verses, render_line_broken(block, ctx)),
        }
    }
}

/// One piece per verse. Pieces beyond the last verse are kept on the last verse.
fn distribute_lines(verses: &mut [Verse], pieces: Vec<String>) {
    let Some(last_idx) = verses.len().checked_sub(1) else {
        return;
    };

    for (i, piece) in pieces.into_iter().enumerate() {
        let verse = &mut verses[i.min(last_idx)];
        if verse.translation_content.is_empty() {
            verse.translation_content = piece;
        } else {
            verse.translation_content.push_str("<br/>");
            verse.translation_content.push_str(&piece);
        }
    }
}

// === Parallel source fragments ===

/// Next free verse slot per section, and the ghost verses added so far.
#[derive(Debug, Default)]
struct FragmentCursor {
    next: usize,
    ghosts: usize,
}

/// Id of the k-th (1-based) overflow verse of a section.
pub fn overflow_verse_id(section_id: &str, k: usize) -> String {
    format!("{}.overflow.{}", section_id, k)
}

/// Follows the `link` declarations of the source-fragments stream and attaches each
/// linked block's lines to its section, index by index. Returns the applied links keyed
/// by fragment block id.
pub fn align_fragments(
    doc: &XmlDocument,
    sections: &mut [Section],
    ctx: &RenderContext,
) -> IndexMap<String, FragmentEntry> {
    let mut fragments: IndexMap<String, FragmentEntry> = IndexMap::new();

    let Some(stream) = find_stream(doc, TextStream::SourceFragments) else {
        debug("No source fragments stream");
        return fragments;
    };

    let mut cursors: HashMap<usize, FragmentCursor> = HashMap::new();

    for link in stream.elements_by_tag("link") {
        let pointers: Vec<&str> = link
            .attr("target")
            .unwrap_or_default()
            .split_whitespace()
            .map(strip_pointer)
            .collect();

        if pointers.len() < 2 {
            warn(&format!("Fragment link with fewer than two targets skipped: {:?}", pointers));
            continue;
        }

        let Some((section_idx, fragment_id)) = resolve_link(&pointers, sections) else {
            warn(&format!("Fragment link to no known section skipped: {:?}", pointers));
            continue;
        };

        let Some(block) = stream.find_by_xml_id(fragment_id) else {
            warn(&format!("Fragment block {} not found, link skipped", fragment_id));
            continue;
        };

        let section = &mut sections[section_idx];
        let cursor = cursors.entry(section_idx).or_default();
        for line in extract_lines(block) {
            let content = render_fragment_line(&line, ctx);
            attach_fragment_line(section, cursor, content);
        }

        let entry = fragments
            .entry(fragment_id.to_string())
            .or_insert_with(|| FragmentEntry {
                id: fragment_id.to_string(),
                targets: Vec::new(),
            });
        if !entry.targets.contains(&section.id) {
            entry.targets.push(section.id.clone());
        }
    }

    fragments
}

/// The pointer naming a section is the source side; the first other pointer is the block.
fn resolve_link<'p>(pointers: &[&'p str], sections: &[Section]) -> Option<(usize, &'p str)> {
    pointers.iter().enumerate().find_map(|(pi, pointer)| {
        let section_idx = sections.iter().position(|s| s.id == *pointer)?;
        let fragment_id = pointers
            .iter()
            .enumerate()
            .find(|(oi, other)| *oi != pi && !other.is_empty())
            .map(|(_, other)| *other)?;
        Some((section_idx, fragment_id))
    })
}

fn render_fragment_line(line: &ExtractedLine, ctx: &RenderContext) -> String {
    let content = render_content(line.element, ctx);
    match (&line.speaker, line.turn_start) {
        (Some(speaker), true) => format!(
            "<span class=\"tei-speaker\">{}</span> {}",
            encode_text(speaker),
            content
        ),
        _ => content,
    }
}

fn attach_fragment_line(section: &mut Section, cursor: &mut FragmentCursor, content: String) {
    if cursor.next >= section.verses.len() {
        cursor.ghosts += 1;
        section.verses.push(Verse {
            id: overflow_verse_id(&section.id, cursor.ghosts),
            segment_id: section.id.clone(),
            is_overflow: true,
            ..Default::default()
        });
    }

    let verse = &mut section.verses[cursor.next];
    verse.source_fragment_content = Some(content);
    verse.has_fragment = true;
    cursor.next += 1;
}

// === Commentary ===

/// Builds commentary entries for every section whose commentary division exists.
pub fn align_commentary(
    doc: &XmlDocument,
    sections: &[Section],
    ctx: &RenderContext,
) -> IndexMap<String, CommentaryEntry> {
    let mut commentary: IndexMap<String, CommentaryEntry> = IndexMap::new();

    let Some(stream) = find_stream(doc, TextStream::Commentary) else {
        debug("No commentary stream");
        return commentary;
    };

    for section in sections {
        let Some(division_id) = ctx.settings.conventions.commentary_id(&section.id) else {
            debug(&format!("No commentary convention applies to {}", section.id));
            continue;
        };
        let Some(division) = stream.find_by_xml_id(&division_id) else {
            debug(&format!("Commentary {} not found for {}", division_id, section.id));
            continue;
        };

        for (k, seg) in leaf_segments(division).into_iter().enumerate() {
            let declared = seg
                .xml_id()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}.note.{}", division_id, k + 1));
            let id = unique_key(&commentary, declared);

            let mut entry = commentary_entry(seg, section, ctx);
            entry.id = id.clone();
            commentary.insert(id, entry);
        }
    }

    commentary
}

/// `seg` elements with no nested `seg`. A division that is itself such a segment is
/// its own single leaf.
fn leaf_segments(division: &XmlElement) -> Vec<&XmlElement> {
    let is_leaf = |el: &XmlElement| el.is("seg") && !el.has_descendant("seg");
    if is_leaf(division) {
        return vec![division];
    }
    division.descendants().filter(|el| is_leaf(el)).collect()
}

fn unique_key<V>(map: &IndexMap<String, V>, key: String) -> String {
    if !map.contains_key(&key) {
        return key;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}-{}", key, suffix);
        if !map.contains_key(&candidate) {
            warn(&format!("Duplicate commentary id {}, stored as {}", key, candidate));
            return candidate;
        }
        suffix += 1;
    }
}

fn commentary_entry(seg: &XmlElement, section: &Section, ctx: &RenderContext) -> CommentaryEntry {
    let title_el = seg
        .elements_by_tag("title")
        .find(|t| t.has_attr_value("type", "sub"))
        .or_else(|| seg.elements_by_tag("title").next());

    let title = match title_el {
        Some(t) => t.normalized_text(),
        None => seg
            .elements_by_tag("hi")
            .find(|hi| matches!(hi.attr("rend"), Some("bold") | Some("italic")))
            .map(XmlElement::normalized_text)
            .unwrap_or_default(),
    };

    let content = match title_el {
        Some(t) => render_content_excluding(seg, t, ctx),
        None => render_content(seg, ctx),
    };

    let target = leading_verse_number(&title)
        .and_then(|n| section.verses.iter().find(|v| v.n == n))
        .or_else(|| section.verses.first())
        .map(|v| v.id.clone())
        .unwrap_or_else(|| section.id.clone());

    CommentaryEntry {
        id: String::new(),
        target,
        title,
        content,
    }
}

/// `has_commentary` is true iff some entry targets the verse.
pub fn flag_commentary(sections: &mut [Section], commentary: &IndexMap<String, CommentaryEntry>) {
    for verse in sections.iter_mut().flat_map(|s| s.verses.iter_mut()) {
        verse.has_commentary = commentary.values().any(|c| c.target == verse.id);
    }
}
