//! Structural segmenter
//!
//! Partitions the source stream into ordered sections of raw line elements. Nothing is
//! rendered here: the plans borrow the tree and the parser renders them once the
//! variant-anchor set is known.

use crate::helpers::{id_suffix, non_blank, normalize_text};
use crate::types::DocumentMode;
use crate::xml_tree::{find_by_attr, XmlDocument, XmlElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStream {
    Source,
    Translation,
    SourceFragments,
    Commentary,
}

impl TextStream {
    /// Value of `text/@type` for this stream.
    pub fn type_value(&self) -> &'static str {
        match self {
            TextStream::Source => "source",
            TextStream::Translation => "translation",
            TextStream::SourceFragments => "sourcefragments",
            TextStream::Commentary => "commentary",
        }
    }
}

/// The first `text[type=...]` element of a stream.
pub fn find_stream(doc: &XmlDocument, stream: TextStream) -> Option<&XmlElement> {
    find_by_attr(doc.elements_by_tag("text"), "type", stream.type_value())
}

fn is_typed(el: &XmlElement, tag: &str, type_value: &str) -> bool {
    el.is(tag) && el.has_attr_value("type", type_value)
}

pub fn is_fragment_div(el: &XmlElement) -> bool {
    is_typed(el, "div", "fragment")
}

pub fn is_apparatus_div(el: &XmlElement) -> bool {
    is_typed(el, "div", "apparatus")
}

pub fn detect_mode(doc: &XmlDocument) -> DocumentMode {
    if doc.elements_by_tag("div").any(is_fragment_div) {
        DocumentMode::Fragmentary
    } else {
        DocumentMode::Continuous
    }
}

#[derive(Debug, Clone)]
pub struct SectionPlan<'a> {
    pub id: String,
    pub label: String,
    pub verses: Vec<VersePlan<'a>>,
}

#[derive(Debug, Clone)]
pub struct VersePlan<'a> {
    pub id: String,
    pub n: String,
    pub source: &'a XmlElement,
    /// The paired translation line, fragmentary mode only.
    pub translation: Option<&'a XmlElement>,
    pub speaker: Option<String>,
}

pub fn segment(doc: &XmlDocument, mode: DocumentMode) -> Vec<SectionPlan<'_>> {
    match mode {
        DocumentMode::Continuous => segment_continuous(doc),
        DocumentMode::Fragmentary => segment_fragmentary(doc),
    }
}

// === Continuous mode ===

pub fn segment_continuous(doc: &XmlDocument) -> Vec<SectionPlan<'_>> {
    let source = match find_stream(doc, TextStream::Source) {
        Some(s) => s,
        None => return Vec::new(),
    };

    let mut segs: Vec<(&XmlElement, Vec<&XmlElement>)> = Vec::new();
    collect_segment_lines(source, None, &mut segs);

    segs.into_iter()
        .filter(|(_, lines)| !lines.is_empty())
        .enumerate()
        .map(|(idx, (seg, lines))| {
            let id = seg
                .xml_id()
                .map(str::to_string)
                .unwrap_or_else(|| format!("section.{}", idx + 1));

            let verses: Vec<VersePlan> = lines
                .into_iter()
                .enumerate()
                .map(|(i, line)| continuous_verse(&id, i, line))
                .collect();

            let label = range_label(&verses).unwrap_or_else(|| id.clone());
            SectionPlan { id, label, verses }
        })
        .collect()
}

/// Assigns every `l` to its nearest enclosing `seg`. Lines outside any segment and the
/// apparatus division are not part of the reading text.
fn collect_segment_lines<'a>(
    el: &'a XmlElement,
    current: Option<usize>,
    segs: &mut Vec<(&'a XmlElement, Vec<&'a XmlElement>)>,
) {
    for child in el.child_elements() {
        if is_apparatus_div(child) {
            continue;
        }
        if child.is("seg") {
            segs.push((child, Vec::new()));
            let idx = segs.len() - 1;
            collect_segment_lines(child, Some(idx), segs);
        } else if child.is("l") {
            if let Some(idx) = current {
                segs[idx].1.push(child);
            }
        } else {
            collect_segment_lines(child, current, segs);
        }
    }
}

fn continuous_verse<'a>(section_id: &str, index: usize, line: &'a XmlElement) -> VersePlan<'a> {
    let declared_id = line.xml_id().map(str::to_string);
    let n = line
        .attr("n")
        .map(|n| n.trim().to_string())
        .or_else(|| declared_id.as_deref().map(|id| id_suffix(id).to_string()))
        .unwrap_or_default();

    let id = match declared_id {
        Some(id) => id,
        None if !n.is_empty() => format!("{}.{}", section_id, n),
        None => format!("{}.l{}", section_id, index + 1),
    };

    VersePlan {
        id,
        n,
        source: line,
        translation: None,
        speaker: None,
    }
}

/// "vv. 335-339" from the first and last verse numbers.
fn range_label(verses: &[VersePlan]) -> Option<String> {
    let first = verses.first().map(|v| v.n.as_str()).filter(|n| !n.is_empty())?;
    let last = verses.last().map(|v| v.n.as_str()).filter(|n| !n.is_empty())?;
    Some(format!("vv. {}-{}", first, last))
}

// === Fragmentary mode ===

pub fn segment_fragmentary(doc: &XmlDocument) -> Vec<SectionPlan<'_>> {
    doc.root()
        .outermost(&is_fragment_div)
        .into_iter()
        .enumerate()
        .map(|(idx, div)| fragment_section(div, idx))
        .collect()
}

fn fragment_section(div: &XmlElement, index: usize) -> SectionPlan<'_> {
    let id = div
        .xml_id()
        .map(str::to_string)
        .unwrap_or_else(|| format!("fragment.{}", index + 1));
    let label = fragment_label(div).unwrap_or_else(|| id.clone());

    let cit = div.descendants().find(|el| is_typed(el, "cit", "fragment"));

    let original = cit.and_then(|cit| {
        cit.descendants_pruned(&|el: &XmlElement| is_typed(el, "cit", "translation"))
            .into_iter()
            .find(|el| el.is("quote"))
    });

    let translation = cit
        .and_then(|cit| cit.descendants().find(|el| is_typed(el, "cit", "translation")))
        .and_then(|tr| tr.elements_by_tag("quote").next());

    let original_lines = original.map(extract_lines).unwrap_or_default();
    let translation_lines = translation.map(extract_lines).unwrap_or_default();

    let original_numbers: Vec<&str> = original_lines
        .iter()
        .filter_map(|l| declared_number(l.element))
        .collect();

    let verses = original_lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let n = declared_number(line.element).map(str::to_string);

            // A positional partner must not carry a number claimed by another original line
            let paired = n
                .as_deref()
                .and_then(|n| {
                    translation_lines
                        .iter()
                        .find(|t| declared_number(t.element) == Some(n))
                })
                .or_else(|| {
                    translation_lines.get(i).filter(|t| match declared_number(t.element) {
                        Some(tn) => !original_numbers.contains(&tn),
                        None => true,
                    })
                })
                .map(|t| t.element);

            let id = match (line.element.xml_id(), &n) {
                (Some(xml_id), _) => xml_id.to_string(),
                (None, Some(n)) => format!("{}.{}", id, n),
                (None, None) => format!("{}.{}", id, i + 1),
            };

            VersePlan {
                id,
                n: n.unwrap_or_else(|| (i + 1).to_string()),
                source: line.element,
                translation: paired,
                speaker: line.speaker.clone(),
            }
        })
        .collect();

    SectionPlan { id, label, verses }
}

fn declared_number(line: &XmlElement) -> Option<&str> {
    line.attr("n").map(str::trim).filter(|n| !n.is_empty())
}

fn fragment_label(div: &XmlElement) -> Option<String> {
    let head = div.first_child("head");

    let reference = div
        .first_child("ref")
        .or_else(|| head.and_then(|h| h.first_child("ref")))
        .map(XmlElement::normalized_text)
        .and_then(non_blank);

    reference
        .or_else(|| head.map(XmlElement::normalized_text).and_then(non_blank))
        .or_else(|| {
            div.attr("n")
                .map(normalize_text)
                .and_then(non_blank)
                .map(|n| format!("fr. {}", n))
        })
}

// === Speech-aware line extraction ===

#[derive(Debug, Clone)]
pub struct ExtractedLine<'a> {
    pub element: &'a XmlElement,
    pub speaker: Option<String>,
    /// First line of a speech turn.
    pub turn_start: bool,
}

/// Lines of a container, grouped by speech turn when the container has `sp` elements.
pub fn extract_lines(container: &XmlElement) -> Vec<ExtractedLine<'_>> {
    let turns = container.outermost(&|el: &XmlElement| el.is("sp"));

    if turns.is_empty() {
        return container
            .elements_by_tag("l")
            .map(|element| ExtractedLine {
                element,
                speaker: None,
                turn_start: false,
            })
            .collect();
    }

    let mut lines = Vec::new();
    for sp in turns {
        let speaker = sp
            .first_child("speaker")
            .map(XmlElement::normalized_text)
            .and_then(non_blank);

        for (i, element) in sp.elements_by_tag("l").enumerate() {
            lines.push(ExtractedLine {
                element,
                speaker: speaker.clone(),
                turn_start: i == 0,
            });
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> XmlDocument {
        XmlDocument::parse(xml).unwrap()
    }

    #[test]
    fn test_detect_mode() {
        let doc = parse(r#"<TEI><text type="source"><seg><l>x</l></seg></text></TEI>"#);
        assert_eq!(detect_mode(&doc), DocumentMode::Continuous);

        let doc = parse(r#"<TEI><text><body><div type="fragment"/></body></text></TEI>"#);
        assert_eq!(detect_mode(&doc), DocumentMode::Fragmentary);
    }

    #[test]
    fn test_continuous_sections_in_order() {
        let doc = parse(r#"<TEI>
            <text type="translation"><seg xml:id="it.1.1"><p>x</p></seg></text>
            <text type="source"><body>
                <seg xml:id="la.1.1"><l n="1">a</l><l n="2">b</l></seg>
                <seg xml:id="la.1.3"><lg><l n="3">c</l></lg></seg>
                <seg xml:id="empty"><p>no lines</p></seg>
                <div type="apparatus"><seg xml:id="app.seg"><l n="9">z</l></seg></div>
            </body></text>
        </TEI>"#);

        let sections = segment_continuous(&doc);
        let ids: Vec<&str> = sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["la.1.1", "la.1.3"]);
        assert_eq!(sections[0].label, "vv. 1-2");
        assert_eq!(sections[1].label, "vv. 3-3");
        assert_eq!(sections[0].verses.len(), 2);
        assert_eq!(sections[0].verses[1].id, "la.1.1.2");
    }

    #[test]
    fn test_nested_segments_take_nearest_lines() {
        let doc = parse(r#"<TEI><text type="source">
            <seg xml:id="outer"><l n="1">a</l><seg xml:id="inner"><l n="2">b</l></seg><l n="3">c</l></seg>
        </text></TEI>"#);

        let sections = segment_continuous(&doc);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].id, "outer");
        assert_eq!(sections[0].verses.iter().map(|v| v.n.as_str()).collect::<Vec<_>>(), vec!["1", "3"]);
        assert_eq!(sections[1].id, "inner");
        assert_eq!(sections[1].verses.len(), 1);
    }

    #[test]
    fn test_verse_ids_and_number_fallbacks() {
        let doc = parse(r#"<TEI><text type="source">
            <seg><l xml:id="Theb.5.335">a</l><l>b</l></seg>
        </text></TEI>"#);

        let sections = segment_continuous(&doc);
        let s = &sections[0];
        assert_eq!(s.id, "section.1");
        assert_eq!(s.verses[0].id, "Theb.5.335");
        assert_eq!(s.verses[0].n, "335");
        assert_eq!(s.verses[1].id, "section.1.l2");
        assert_eq!(s.verses[1].n, "");
        // Last number unrecoverable
        assert_eq!(s.label, "section.1");
    }

    #[test]
    fn test_no_source_stream() {
        let doc = parse(r#"<TEI><text type="translation"><seg><l>x</l></seg></text></TEI>"#);
        assert!(segment_continuous(&doc).is_empty());
    }

    #[test]
    fn test_extract_lines_with_speakers() {
        let doc = parse(r#"<quote>
            <sp><speaker>Ipsipile</speaker><l n="1">a</l><l n="2">b</l></sp>
            <sp><speaker> Coro </speaker><l n="3">c</l></sp>
        </quote>"#);

        let lines = extract_lines(doc.root());
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].speaker.as_deref(), Some("Ipsipile"));
        assert!(lines[0].turn_start);
        assert!(!lines[1].turn_start);
        assert_eq!(lines[2].speaker.as_deref(), Some("Coro"));
        assert!(lines[2].turn_start);
    }

    #[test]
    fn test_extract_lines_without_speakers() {
        let doc = parse(r#"<quote><l>a</l><lg><l>b</l></lg></quote>"#);
        let lines = extract_lines(doc.root());
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.speaker.is_none() && !l.turn_start));
    }

    #[test]
    fn test_fragment_sections() {
        let doc = parse(r#"<TEI><text><body>
            <div type="fragment" xml:id="fr.752f" n="752f">
                <head><ref>fr. 752f Kannicht</ref></head>
                <cit type="fragment">
                    <quote xml:lang="grc"><l n="1">α</l><l n="2">β</l></quote>
                    <cit type="translation"><quote><l n="2">B</l><l n="1">A</l></quote></cit>
                </cit>
            </div>
            <div type="fragment" n="753"><cit type="fragment"><quote><l>γ</l></quote></cit></div>
            <div type="fragment"><head>Incerta</head></div>
        </body></text></TEI>"#);

        let sections = segment_fragmentary(&doc);
        assert_eq!(sections.len(), 3);

        assert_eq!(sections[0].id, "fr.752f");
        assert_eq!(sections[0].label, "fr. 752f Kannicht");
        assert_eq!(sections[0].verses.len(), 2);
        assert_eq!(sections[0].verses[0].id, "fr.752f.1");
        // Paired by declared number, not by position
        assert_eq!(sections[0].verses[0].translation.map(|t| t.normalized_text()), Some("A".to_string()));

        assert_eq!(sections[1].id, "fragment.2");
        assert_eq!(sections[1].label, "fr. 753");
        assert_eq!(sections[1].verses[0].n, "1");
        assert_eq!(sections[1].verses[0].id, "fragment.2.1");
        assert!(sections[1].verses[0].translation.is_none());

        assert_eq!(sections[2].label, "Incerta");
        assert!(sections[2].verses.is_empty());
    }

    #[test]
    fn test_merged_translation_lines_pair_once() {
        let doc = parse(r#"<TEI><text><body>
            <div type="fragment" xml:id="fr.1">
                <cit type="fragment">
                    <quote><l n="1">α</l><l n="2">β</l><l n="3">γ</l></quote>
                    <cit type="translation"><quote><l n="1">uno e due</l><l n="3">tre</l></quote></cit>
                </cit>
            </div>
        </body></text></TEI>"#);

        let sections = segment_fragmentary(&doc);
        let translations: Vec<Option<String>> = sections[0]
            .verses
            .iter()
            .map(|v| v.translation.map(|t| t.normalized_text()))
            .collect();
        assert_eq!(
            translations,
            vec![Some("uno e due".to_string()), None, Some("tre".to_string())]
        );
    }

    #[test]
    fn test_unnumbered_translation_pairs_by_position() {
        let doc = parse(r#"<TEI><text><body>
            <div type="fragment" xml:id="fr.2">
                <cit type="fragment">
                    <quote><l n="1">α</l><l n="2">β</l></quote>
                    <cit type="translation"><quote><l>a</l><l n="7">b</l></quote></cit>
                </cit>
            </div>
        </body></text></TEI>"#);

        let sections = segment_fragmentary(&doc);
        let verses = &sections[0].verses;
        assert_eq!(verses[0].translation.map(|t| t.normalized_text()), Some("a".to_string()));
        assert_eq!(verses[1].translation.map(|t| t.normalized_text()), Some("b".to_string()));
    }
}
