//! TEI document parser
//!
//! Runs the whole pipeline: markup tree, mode detection, anchor pre-scan, segmentation,
//! rendering, cross-stream alignment and apparatus flagging. Only an unparsable payload
//! is an error.

use indexmap::IndexMap;

use crate::aligner::{align_commentary, align_fragments, align_translations, flag_commentary};
use crate::apparatus::{collect_variant_anchors, extract_apparatus, flag_verses};
use crate::header::{extract_metadata, render_source_description};
use crate::inline_render::{render_content, RenderContext};
use crate::logger::{debug, info};
use crate::parser_settings::ParserSettings;
use crate::segmenter::{detect_mode, segment, SectionPlan};
use crate::types::{DocumentMode, ParsedDocument, Section, TeiError, Verse};
use crate::xml_tree::XmlDocument;

/// Parse with the default settings.
pub fn parse_tei(xml: &str) -> Result<ParsedDocument, TeiError> {
    parse_tei_with_settings(xml, &ParserSettings::default())
}

pub fn parse_tei_with_settings(xml: &str, settings: &ParserSettings) -> Result<ParsedDocument, TeiError> {
    let doc = XmlDocument::parse(xml)?;
    Ok(build_document(&doc, settings))
}

/// Builds the view model from an already parsed tree.
pub fn build_document(doc: &XmlDocument, settings: &ParserSettings) -> ParsedDocument {
    let mode = detect_mode(doc);
    info(&format!("Parsing TEI document, {:?} mode", mode));

    // Must be known before any line is rendered
    let variant_anchors = collect_variant_anchors(doc);
    debug(&format!("{} variant anchors", variant_anchors.len()));

    let ctx = RenderContext::new(&variant_anchors, settings);

    let mut sections = render_sections(segment(doc, mode), &ctx);

    let fragments = match mode {
        DocumentMode::Continuous => {
            align_translations(doc, &mut sections, &ctx);
            align_fragments(doc, &mut sections, &ctx)
        }
        DocumentMode::Fragmentary => IndexMap::new(),
    };

    let commentary = align_commentary(doc, &sections, &ctx);
    flag_commentary(&mut sections, &commentary);

    let apparatus = extract_apparatus(doc, &ctx);
    flag_verses(&mut sections, &apparatus);

    let parsed = ParsedDocument {
        metadata: extract_metadata(doc),
        mode,
        sections,
        apparatus,
        commentary,
        fragments,
        source_description: render_source_description(doc, &ctx),
    };

    info(&format!(
        "Parsed '{}': {} sections, {} verses, {} apparatus entries, {} commentary entries",
        parsed.metadata.title,
        parsed.sections.len(),
        parsed.sections.iter().map(|s| s.verses.len()).sum::<usize>(),
        parsed.apparatus.len(),
        parsed.commentary.len(),
    ));

    parsed
}

fn render_sections(plans: Vec<SectionPlan>, ctx: &RenderContext) -> Vec<Section> {
    plans
        .into_iter()
        .map(|plan| {
            let verses = plan
                .verses
                .into_iter()
                .map(|v| Verse {
                    id: v.id,
                    n: v.n,
                    source_content: render_content(v.source, ctx),
                    translation_content: v.translation.map(|t| render_content(t, ctx)).unwrap_or_default(),
                    segment_id: plan.id.clone(),
                    speaker: v.speaker,
                    ..Default::default()
                })
                .collect();

            Section {
                id: plan.id,
                label: plan.label,
                verses,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unparsable_is_fatal() {
        let err = parse_tei("<TEI><text type=\"source\"><seg><l>x</seg></text></TEI>").unwrap_err();
        assert!(matches!(err, TeiError::Unparsable { .. }));
    }

    #[test]
    fn test_empty_document() {
        let parsed = parse_tei("<TEI/>").unwrap();
        assert_eq!(parsed.mode, DocumentMode::Continuous);
        assert!(parsed.sections.is_empty());
        assert!(parsed.apparatus.is_empty());
        assert_eq!(parsed.metadata.title, "Untitled");
        assert_eq!(parsed.source_description, "");
    }

    #[test]
    fn test_fragmentary_skips_continuous_alignment() {
        let parsed = parse_tei(r##"<TEI><text type="source">
            <div type="fragment" xml:id="la.1"><cit type="fragment"><quote><l>a</l></quote></cit></div>
        </text>
        <text type="translation"><seg xml:id="it.1">tradotto</seg></text>
        </TEI>"##).unwrap();

        assert_eq!(parsed.mode, DocumentMode::Fragmentary);
        assert_eq!(parsed.sections[0].verses[0].translation_content, "");
    }
}
