//! Apparatus extractor
//!
//! Two separate passes over the apparatus division. [`collect_variant_anchors`] runs
//! before any verse is rendered, so the renderer can mark variant anchors.
//! [`extract_apparatus`] and [`flag_verses`] run after all sections are rendered.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::helpers::{strip_pointer, witness_label, non_blank};
use crate::inline_render::{anchor_marker, render_content, RenderContext};
use crate::logger::warn;
use crate::segmenter::{find_stream, is_apparatus_div, TextStream};
use crate::types::{ApparatusEntry, Reading, Section, Variant};
use crate::xml_tree::{XmlDocument, XmlElement};

/// The first `div[type=apparatus]` of the source stream. Documents without a source
/// stream (fragment editions) are searched whole.
pub fn find_apparatus_division(doc: &XmlDocument) -> Option<&XmlElement> {
    let scope = find_stream(doc, TextStream::Source).unwrap_or_else(|| doc.root());
    scope.descendants().find(|el| is_apparatus_div(el))
}

/// The anchor id an `app` note applies to, from `@from` or `@target`.
fn app_anchor_id(app: &XmlElement) -> Option<String> {
    app.attr("from")
        .or_else(|| app.attr("target"))
        .map(|p| strip_pointer(p).to_string())
        .and_then(non_blank)
}

/// Phase one: the bare set of anchor ids referenced by apparatus notes.
pub fn collect_variant_anchors(doc: &XmlDocument) -> HashSet<String> {
    let Some(division) = find_apparatus_division(doc) else {
        return HashSet::new();
    };
    division.elements_by_tag("app").filter_map(app_anchor_id).collect()
}

/// Phase two: variant entries keyed by anchor id. Several notes for one anchor add
/// variant groups to the same entry.
pub fn extract_apparatus(doc: &XmlDocument, ctx: &RenderContext) -> IndexMap<String, ApparatusEntry> {
    let mut apparatus: IndexMap<String, ApparatusEntry> = IndexMap::new();

    let Some(division) = find_apparatus_division(doc) else {
        return apparatus;
    };

    for app in division.elements_by_tag("app") {
        let Some(anchor_id) = app_anchor_id(app) else {
            warn("Apparatus note without an anchor reference, skipped");
            continue;
        };

        apparatus
            .entry(anchor_id)
            .or_default()
            .variants
            .push(extract_variant(app, ctx));
    }

    apparatus
}

fn extract_variant(app: &XmlElement, ctx: &RenderContext) -> Variant {
    let lem = app.elements_by_tag("lem").next();

    let lemma = lem.map(|l| render_content(l, ctx)).unwrap_or_default();

    let attribution = lem
        .and_then(|l| l.attr("resp"))
        .or_else(|| app.attr("resp"))
        .map(witness_label)
        .and_then(non_blank);

    let readings = app
        .elements_by_tag("rdg")
        .map(|rdg| Reading {
            text: render_content(rdg, ctx),
            witness: rdg.attr("wit").map(witness_label).unwrap_or_default(),
        })
        .collect();

    Variant {
        lemma,
        readings,
        attribution,
    }
}

/// Sets `has_apparatus` on every verse whose rendered source content carries the marker
/// of an apparatus anchor.
pub fn flag_verses(sections: &mut [Section], apparatus: &IndexMap<String, ApparatusEntry>) {
    let markers: Vec<String> = apparatus.keys().map(|id| anchor_marker(id)).collect();

    for verse in sections.iter_mut().flat_map(|s| s.verses.iter_mut()) {
        verse.has_apparatus = markers.iter().any(|m| verse.source_content.contains(m.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser_settings::ParserSettings;
    use crate::types::Verse;

    const XML: &str = r##"<TEI><text type="source"><body>
        <seg xml:id="la.1.1"><l n="1"><w xml:id="w.1">Lemnos<anchor xml:id="app.1"/></w></l></seg>
        <div type="apparatus">
            <app from="#app.1">
                <lem resp="#Hill">Lemnos</lem>
                <rdg wit="#P #B">Lemnon</rdg>
                <rdg wit="#ω"><hi rend="italic">Lemni</hi></rdg>
            </app>
            <app target="#app.1"><lem>Lemnos</lem><rdg wit="#K">Lennos</rdg></app>
            <app from="#app.2"><rdg wit="#P">tum</rdg></app>
            <app><lem>orphan</lem></app>
        </div>
    </body></text></TEI>"##;

    #[test]
    fn test_collect_variant_anchors() {
        let doc = XmlDocument::parse(XML).unwrap();
        let anchors = collect_variant_anchors(&doc);
        assert_eq!(anchors.len(), 2);
        assert!(anchors.contains("app.1"));
        assert!(anchors.contains("app.2"));
    }

    #[test]
    fn test_no_apparatus_division() {
        let doc = XmlDocument::parse(r#"<TEI><text type="source"><seg><l>x</l></seg></text></TEI>"#).unwrap();
        assert!(collect_variant_anchors(&doc).is_empty());
    }

    #[test]
    fn test_extract_apparatus() {
        let doc = XmlDocument::parse(XML).unwrap();
        let anchors = collect_variant_anchors(&doc);
        let settings = ParserSettings::default();
        let ctx = RenderContext::new(&anchors, &settings);

        let apparatus = extract_apparatus(&doc, &ctx);
        assert_eq!(apparatus.keys().collect::<Vec<_>>(), vec!["app.1", "app.2"]);

        let entry = &apparatus["app.1"];
        assert_eq!(entry.variants.len(), 2);
        let first = &entry.variants[0];
        assert_eq!(first.lemma, "Lemnos");
        assert_eq!(first.attribution.as_deref(), Some("Hill"));
        assert_eq!(first.readings.len(), 2);
        assert_eq!(first.readings[0].text, "Lemnon");
        assert_eq!(first.readings[0].witness, "P B");
        assert_eq!(first.readings[1].text, r#"<em class="tei-hi">Lemni</em>"#);
        assert_eq!(first.readings[1].witness, "ω");
        assert!(entry.variants[1].attribution.is_none());

        // A note without a lemma still records its readings
        assert_eq!(apparatus["app.2"].variants[0].lemma, "");
        assert_eq!(apparatus["app.2"].variants[0].readings.len(), 1);
    }

    #[test]
    fn test_flag_verses() {
        let mut apparatus = IndexMap::new();
        apparatus.insert("app.1".to_string(), ApparatusEntry::default());

        let mut sections = vec![Section {
            id: "s".to_string(),
            label: "s".to_string(),
            verses: vec![
                Verse {
                    id: "v1".to_string(),
                    source_content: format!("x<span {}></span>", anchor_marker("app.1")),
                    ..Default::default()
                },
                Verse {
                    id: "v2".to_string(),
                    source_content: format!("y<span {}></span>", anchor_marker("app.10")),
                    ..Default::default()
                },
            ],
        }];

        flag_verses(&mut sections, &apparatus);
        assert!(sections[0].verses[0].has_apparatus);
        assert!(!sections[0].verses[1].has_apparatus);
    }
}
