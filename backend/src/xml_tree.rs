//! Markup tree reader
//!
//! Folds the quick-xml event stream into an owned element tree that can be queried by
//! tag name and attribute value. Element names are kept by local name, so `<tei:l>` and
//! `<l>` are the same element to every consumer.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

use crate::helpers::normalize_text;
use crate::types::TeiError;

/// Deepest element nesting accepted. Rendering and queries recurse once per level.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Local name, without namespace prefix.
    pub name: String,
    /// Raw qualified keys, e.g. `xml:id`, in declaration order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub root: XmlElement,
}

impl XmlDocument {
    /// Parse a complete XML document. Any well-formedness problem aborts the parse.
    pub fn parse(content: &str) -> Result<Self, TeiError> {
        let mut reader = Reader::from_str(content);
        reader.trim_text(false);
        reader.expand_empty_elements(false);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let position = reader.buffer_position();
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    check_depth(stack.len() + 1, position)?;
                    stack.push(element_from_start(e, position)?);
                }
                Ok(Event::Empty(ref e)) => {
                    check_depth(stack.len() + 1, position)?;
                    let element = element_from_start(e, position)?;
                    attach(&mut stack, &mut root, element, position)?;
                }
                Ok(Event::End(ref e)) => {
                    let element = stack.pop().ok_or_else(|| unparsable(
                        position,
                        format!("unexpected closing tag </{}>", String::from_utf8_lossy(e.name().as_ref())),
                    ))?;
                    attach(&mut stack, &mut root, element, position)?;
                }
                Ok(Event::Text(ref e)) => {
                    let text = unescape_text(e);
                    push_text(&mut stack, text, position)?;
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    push_text(&mut stack, text, position)?;
                }
                Ok(Event::Eof) => break,
                // Declarations, comments, processing instructions, doctype
                Ok(_) => {}
                Err(e) => return Err(unparsable(reader.buffer_position(), e.to_string())),
            }
        }

        if let Some(open) = stack.last() {
            return Err(unparsable(
                reader.buffer_position(),
                format!("unclosed element <{}>", open.name),
            ));
        }

        match root {
            Some(root) => Ok(XmlDocument { root }),
            None => Err(unparsable(0, "no root element".to_string())),
        }
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// All elements with the given local name, root included, in document order.
    pub fn elements_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        std::iter::once(&self.root)
            .chain(self.root.descendants())
            .filter(move |el| el.name == tag)
    }
}

fn unparsable(position: usize, message: String) -> TeiError {
    TeiError::Unparsable { position, message }
}

fn check_depth(depth: usize, position: usize) -> Result<(), TeiError> {
    if depth > MAX_DEPTH {
        return Err(unparsable(
            position,
            format!("elements nested deeper than {} levels", MAX_DEPTH),
        ));
    }
    Ok(())
}

fn element_from_start(start: &BytesStart, position: usize) -> Result<XmlElement, TeiError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| unparsable(position, format!("bad attribute on <{}>: {}", name, e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => decode_entities(&attr.value),
        };
        attributes.push((key, value));
    }

    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

/// Predefined and numeric references are resolved by the reader. Named references from
/// an unexpanded DTD (`&nbsp;`, `&mdash;`) are decoded as HTML entities instead of failing.
fn unescape_text(text: &BytesText) -> String {
    match text.unescape() {
        Ok(s) => s.into_owned(),
        Err(_) => decode_entities(text),
    }
}

fn decode_entities(raw: &[u8]) -> String {
    let raw: Cow<str> = String::from_utf8_lossy(raw);
    html_escape::decode_html_entities(&raw).into_owned()
}

fn push_text(stack: &mut [XmlElement], text: String, position: usize) -> Result<(), TeiError> {
    match stack.last_mut() {
        Some(parent) => {
            if !text.is_empty() {
                parent.children.push(XmlNode::Text(text));
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(unparsable(position, "text outside of the root element".to_string())),
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
    position: usize,
) -> Result<(), TeiError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(XmlNode::Element(element));
            Ok(())
        }
        None if root.is_some() => Err(unparsable(
            position,
            format!("more than one root element, found <{}>", element.name),
        )),
        None => {
            *root = Some(element);
            Ok(())
        }
    }
}

/// Pre-order walk over the element descendants of one element, excluding itself.
pub struct Descendants<'a> {
    stack: Vec<std::slice::Iter<'a, XmlNode>>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(top) = self.stack.last_mut() {
            match top.next() {
                Some(XmlNode::Element(el)) => {
                    self.stack.push(el.children.iter());
                    return Some(el);
                }
                Some(XmlNode::Text(_)) => continue,
                None => {
                    self.stack.pop();
                }
            }
        }
        None
    }
}

impl XmlElement {
    pub fn is(&self, tag: &str) -> bool {
        self.name == tag
    }

    /// Attribute by qualified key. An unqualified key also matches a prefixed attribute
    /// with the same local part (`type` matches `tei:type`), but never `xml:` or `xmlns:`.
    pub fn attr(&self, key: &str) -> Option<&str> {
        if let Some((_, v)) = self.attributes.iter().find(|(k, _)| k == key) {
            return Some(v.as_str());
        }
        if key.contains(':') {
            return None;
        }
        self.attributes
            .iter()
            .find(|(k, _)| match k.split_once(':') {
                Some((prefix, local)) => local == key && prefix != "xml" && prefix != "xmlns",
                None => false,
            })
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr_value(&self, key: &str, value: &str) -> bool {
        self.attr(key) == Some(value)
    }

    pub fn xml_id(&self) -> Option<&str> {
        self.attr("xml:id").or_else(|| self.attr("id"))
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    pub fn first_child(&self, tag: &str) -> Option<&XmlElement> {
        self.child_elements().find(|el| el.name == tag)
    }

    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![self.children.iter()],
        }
    }

    /// Descendant elements with the given local name, in document order.
    pub fn elements_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.descendants().filter(move |el| el.name == tag)
    }

    pub fn has_descendant(&self, tag: &str) -> bool {
        self.descendants().any(|el| el.name == tag)
    }

    pub fn find_by_xml_id(&self, id: &str) -> Option<&XmlElement> {
        if self.xml_id() == Some(id) {
            return Some(self);
        }
        self.descendants().find(|el| el.xml_id() == Some(id))
    }

    /// Descendants in document order, not descending into (nor yielding) elements for
    /// which `skip` is true.
    pub fn descendants_pruned<'a, F>(&'a self, skip: &F) -> Vec<&'a XmlElement>
    where
        F: Fn(&XmlElement) -> bool,
    {
        let mut out = Vec::new();
        collect_pruned(self, skip, &mut out);
        out
    }

    /// Outermost descendants matching `pred`; matches nested in a match are not returned.
    pub fn outermost<'a, F>(&'a self, pred: &F) -> Vec<&'a XmlElement>
    where
        F: Fn(&XmlElement) -> bool,
    {
        let mut out = Vec::new();
        collect_outermost(self, pred, &mut out);
        out
    }

    /// Concatenated text of all descendant text nodes, unmodified.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        push_text_content(self, &mut text);
        text
    }

    /// Text content with whitespace collapsed and trimmed.
    pub fn normalized_text(&self) -> String {
        normalize_text(&self.text_content())
    }
}

fn collect_pruned<'a, F>(el: &'a XmlElement, skip: &F, out: &mut Vec<&'a XmlElement>)
where
    F: Fn(&XmlElement) -> bool,
{
    for child in el.child_elements() {
        if skip(child) {
            continue;
        }
        out.push(child);
        collect_pruned(child, skip, out);
    }
}

fn collect_outermost<'a, F>(el: &'a XmlElement, pred: &F, out: &mut Vec<&'a XmlElement>)
where
    F: Fn(&XmlElement) -> bool,
{
    for child in el.child_elements() {
        if pred(child) {
            out.push(child);
        } else {
            collect_outermost(child, pred, out);
        }
    }
}

fn push_text_content(el: &XmlElement, out: &mut String) {
    for node in &el.children {
        match node {
            XmlNode::Text(t) => out.push_str(t),
            XmlNode::Element(child) => push_text_content(child, out),
        }
    }
}

/// First element among `elements` whose attribute `attr` equals `value`.
pub fn find_by_attr<'a, I>(elements: I, attr: &str, value: &str) -> Option<&'a XmlElement>
where
    I: IntoIterator<Item = &'a XmlElement>,
{
    elements.into_iter().find(|el| el.attr(attr) == Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_tree() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <TEI>
                <text type="source">
                    <seg xml:id="la.1.1"><l n="1">arma <w xml:id="w1">virumque</w></l></seg>
                </text>
            </TEI>"#;

        let doc = XmlDocument::parse(xml).unwrap();
        assert_eq!(doc.root().name, "TEI");

        let seg = doc.elements_by_tag("seg").next().unwrap();
        assert_eq!(seg.xml_id(), Some("la.1.1"));

        let l = seg.first_child("l").unwrap();
        assert_eq!(l.attr("n"), Some("1"));
        assert_eq!(l.text_content(), "arma virumque");
    }

    #[test]
    fn test_elements_by_tag_document_order() {
        let xml = r#"<r><a n="1"><a n="2"/></a><b><a n="3"/></b></r>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        let ns: Vec<&str> = doc.elements_by_tag("a").filter_map(|a| a.attr("n")).collect();
        assert_eq!(ns, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_find_by_attr() {
        let xml = r#"<r><text type="translation"/><text type="source"/></r>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        let source = find_by_attr(doc.elements_by_tag("text"), "type", "source");
        assert!(source.is_some());
        assert!(find_by_attr(doc.elements_by_tag("text"), "type", "commentary").is_none());
    }

    #[test]
    fn test_namespaced_document() {
        let xml = r#"<tei:TEI xmlns:tei="http://www.tei-c.org/ns/1.0">
                <tei:text tei:type="source"><tei:l n="5">x</tei:l></tei:text>
            </tei:TEI>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        let text = doc.elements_by_tag("text").next().unwrap();
        assert_eq!(text.attr("type"), Some("source"));
        assert_eq!(doc.elements_by_tag("l").count(), 1);
    }

    #[test]
    fn test_default_namespace() {
        let xml = r#"<TEI xmlns="http://www.tei-c.org/ns/1.0"><l xml:id="a.1">x</l></TEI>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        assert_eq!(doc.root().find_by_xml_id("a.1").map(|l| l.name.as_str()), Some("l"));
    }

    #[test]
    fn test_entities() {
        let xml = r#"<r a="x &amp; y">caelum &amp; terra&#160;&nbsp;mare</r>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        assert_eq!(doc.root().attr("a"), Some("x & y"));
        assert_eq!(doc.root().text_content(), "caelum & terra\u{a0}\u{a0}mare");
    }

    #[test]
    fn test_mismatched_tag_is_fatal() {
        let err = XmlDocument::parse("<r><l>x</seg></r>").unwrap_err();
        assert!(matches!(err, TeiError::Unparsable { .. }));
    }

    #[test]
    fn test_unclosed_element_is_fatal() {
        let err = XmlDocument::parse("<r><l>x</l>").unwrap_err();
        assert!(matches!(err, TeiError::Unparsable { .. }));
    }

    fn nested(depth: usize) -> String {
        format!("{}x{}", "<hi>".repeat(depth), "</hi>".repeat(depth))
    }

    #[test]
    fn test_nesting_depth_limit() {
        assert!(XmlDocument::parse(&nested(MAX_DEPTH)).is_ok());

        match XmlDocument::parse(&nested(MAX_DEPTH + 1)) {
            Err(TeiError::Unparsable { message, .. }) => assert!(message.contains("nested deeper")),
            other => panic!("Expected Unparsable, got {:?}", other.map(|_| ())),
        }

        let empty_at_limit = format!("{}<lb/>{}", "<hi>".repeat(MAX_DEPTH), "</hi>".repeat(MAX_DEPTH));
        assert!(XmlDocument::parse(&empty_at_limit).is_err());
    }

    #[test]
    fn test_empty_input_is_fatal() {
        assert!(XmlDocument::parse("").is_err());
        assert!(XmlDocument::parse("just text").is_err());
        assert!(XmlDocument::parse("<a/><b/>").is_err());
    }

    #[test]
    fn test_outermost_and_pruned() {
        let xml = r#"<r>
                <div type="fragment" n="1"><div type="fragment" n="inner"/></div>
                <div type="fragment" n="2"/>
            </r>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        let outer = doc.root().outermost(&|el: &XmlElement| el.is("div"));
        assert_eq!(outer.len(), 2);

        let pruned = doc.root().descendants_pruned(&|el: &XmlElement| el.attr("n") == Some("1"));
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].attr("n"), Some("2"));
    }
}
