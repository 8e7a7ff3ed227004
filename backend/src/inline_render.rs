//! Inline content renderer
//!
//! Rewrites an inline TEI subtree (a verse line, a translation block, a commentary note)
//! into annotated HTML-like text. Every element is classified once into an [`InlineTag`]
//! and the rule for that tag decides the output; anything unrecognized falls through to
//! its children, so text is never dropped because of an unknown tag.

use std::collections::HashSet;

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::helpers::{collapse_whitespace, normalize_text};
use crate::parser_settings::{EditorialMarkers, ParserSettings};
use crate::xml_tree::{XmlElement, XmlNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameKind {
    Place,
    Person,
    /// `<name type="...">`, "name" when untyped
    Generic(String),
}

impl NameKind {
    pub fn as_str(&self) -> &str {
        match self {
            NameKind::Place => "place",
            NameKind::Person => "person",
            NameKind::Generic(t) => t.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rend {
    Bold,
    Italic,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineTag {
    Gap,
    Supplied,
    Name(NameKind),
    Anchor,
    Word,
    Hi(Rend),
    Foreign,
    Ref,
    Bibl,
    Quote,
    LineBreak,
    /// Wrapper is dropped, children are rendered.
    Other,
}

impl InlineTag {
    pub fn classify(el: &XmlElement) -> Self {
        match el.name.as_str() {
            "gap" => InlineTag::Gap,
            "supplied" => InlineTag::Supplied,
            "placeName" => InlineTag::Name(NameKind::Place),
            "persName" => InlineTag::Name(NameKind::Person),
            "name" => InlineTag::Name(NameKind::Generic(
                el.attr("type").unwrap_or("name").to_string(),
            )),
            "anchor" => InlineTag::Anchor,
            "w" => InlineTag::Word,
            "hi" => InlineTag::Hi(match el.attr("rend") {
                Some("bold") => Rend::Bold,
                Some("italic") => Rend::Italic,
                other => Rend::Other(other.unwrap_or_default().to_string()),
            }),
            "foreign" => InlineTag::Foreign,
            "ref" => InlineTag::Ref,
            "bibl" => InlineTag::Bibl,
            "quote" | "q" => InlineTag::Quote,
            "lb" => InlineTag::LineBreak,
            _ => InlineTag::Other,
        }
    }
}

/// Shared, read-only state for one document's render pass.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Anchor ids referenced by the apparatus, known before any line is rendered.
    pub variant_anchors: &'a HashSet<String>,
    pub settings: &'a ParserSettings,
    /// An element to leave out of the output, e.g. a commentary title rendered separately.
    skip: Option<&'a XmlElement>,
}

impl<'a> RenderContext<'a> {
    pub fn new(variant_anchors: &'a HashSet<String>, settings: &'a ParserSettings) -> Self {
        RenderContext {
            variant_anchors,
            settings,
            skip: None,
        }
    }

    pub fn excluding<'b>(&self, element: &'b XmlElement) -> RenderContext<'b>
    where
        'a: 'b,
    {
        RenderContext {
            variant_anchors: self.variant_anchors,
            settings: self.settings,
            skip: Some(element),
        }
    }

    fn is_skipped(&self, el: &XmlElement) -> bool {
        self.skip.is_some_and(|s| std::ptr::eq(s, el))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    /// True if a variant anchor was rendered anywhere in this subtree.
    pub contains_variant: bool,
}

impl Rendered {
    fn text(html: String) -> Self {
        Rendered { html, contains_variant: false }
    }

    fn wrap(self, open: &str, close: &str) -> Self {
        Rendered {
            html: format!("{}{}{}", open, self.html, close),
            contains_variant: self.contains_variant,
        }
    }

    fn append(&mut self, other: Rendered) {
        self.html.push_str(&other.html);
        self.contains_variant |= other.contains_variant;
    }
}

/// The marker an anchor leaves in rendered content. Apparatus flagging searches for it.
pub fn anchor_marker(anchor_id: &str) -> String {
    format!("data-id=\"{}\"", encode_double_quoted_attribute(anchor_id))
}

/// Rendered content of an element, trimmed and with whitespace runs left by omitted
/// elements collapsed. The element's own tag is not applied.
pub fn render_content(el: &XmlElement, ctx: &RenderContext) -> String {
    normalize_text(&render_children(el, ctx).html)
}

/// Rendered content of an element, leaving out `skip` wherever it occurs inside.
pub fn render_content_excluding(el: &XmlElement, skip: &XmlElement, ctx: &RenderContext) -> String {
    render_content(el, &ctx.excluding(skip))
}

pub fn render_children(el: &XmlElement, ctx: &RenderContext) -> Rendered {
    let mut out = Rendered::default();
    for node in &el.children {
        out.append(render_node(node, ctx));
    }
    out
}

pub fn render_node(node: &XmlNode, ctx: &RenderContext) -> Rendered {
    match node {
        XmlNode::Text(text) => Rendered::text(encode_text(&collapse_whitespace(text)).into_owned()),
        XmlNode::Element(el) => render_element(el, ctx),
    }
}

pub fn render_element(el: &XmlElement, ctx: &RenderContext) -> Rendered {
    if ctx.is_skipped(el) {
        return Rendered::default();
    }

    match InlineTag::classify(el) {
        InlineTag::Gap => match ctx.settings.editorial_markers {
            EditorialMarkers::Omit => Rendered::default(),
            EditorialMarkers::Placeholder => {
                let reason = el
                    .attr("reason")
                    .map(|r| format!(" data-reason=\"{}\"", encode_double_quoted_attribute(r)))
                    .unwrap_or_default();
                Rendered::text(format!("<span class=\"tei-gap\"{}>[…]</span>", reason))
            }
        },

        InlineTag::Supplied => match ctx.settings.editorial_markers {
            EditorialMarkers::Omit => Rendered::default(),
            EditorialMarkers::Placeholder => {
                render_children(el, ctx).wrap("<span class=\"tei-supplied\">⟨", "⟩</span>")
            }
        },

        InlineTag::Name(kind) => {
            let open = format!(
                "<span class=\"tei-name\" data-type=\"{}\">",
                encode_double_quoted_attribute(kind.as_str())
            );
            render_children(el, ctx).wrap(&open, "</span>")
        }

        InlineTag::Anchor => {
            let id = el.xml_id().unwrap_or_default();
            let is_variant = ctx.variant_anchors.contains(id);
            let class = if is_variant { "tei-anchor is-variant-anchor" } else { "tei-anchor" };
            Rendered {
                html: format!("<span class=\"{}\" {}></span>", class, anchor_marker(id)),
                contains_variant: is_variant,
            }
        }

        InlineTag::Word => {
            let inner = render_children(el, ctx);
            let class = if inner.contains_variant { "tei-w has-variant" } else { "tei-w" };
            let open = format!(
                "<span class=\"{}\" data-id=\"{}\">",
                class,
                encode_double_quoted_attribute(el.xml_id().unwrap_or_default())
            );
            inner.wrap(&open, "</span>")
        }

        InlineTag::Hi(rend) => {
            let inner = render_children(el, ctx);
            match rend {
                Rend::Bold => inner.wrap("<strong class=\"tei-hi\">", "</strong>"),
                Rend::Italic => inner.wrap("<em class=\"tei-hi\">", "</em>"),
                Rend::Other(r) if r.is_empty() => inner.wrap("<span class=\"tei-hi\">", "</span>"),
                Rend::Other(r) => {
                    let open = format!(
                        "<span class=\"tei-hi\" data-rend=\"{}\">",
                        encode_double_quoted_attribute(&r)
                    );
                    inner.wrap(&open, "</span>")
                }
            }
        }

        InlineTag::Foreign => {
            let open = match el.attr("xml:lang").or_else(|| el.attr("lang")) {
                Some(lang) => format!("<em class=\"tei-foreign\" lang=\"{}\">", encode_double_quoted_attribute(lang)),
                None => "<em class=\"tei-foreign\">".to_string(),
            };
            render_children(el, ctx).wrap(&open, "</em>")
        }

        InlineTag::Ref => {
            let inner = render_children(el, ctx);
            match el.attr("target").map(str::trim).filter(|t| !t.is_empty()) {
                Some(target) if target.starts_with('#') => {
                    let open = format!("<a class=\"tei-ref\" href=\"{}\">", encode_double_quoted_attribute(target));
                    inner.wrap(&open, "</a>")
                }
                Some(target) => {
                    let open = format!(
                        "<a class=\"tei-ref\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">",
                        encode_double_quoted_attribute(target)
                    );
                    inner.wrap(&open, "</a>")
                }
                None => inner.wrap("<span class=\"tei-ref\">", "</span>"),
            }
        }

        InlineTag::Bibl => render_children(el, ctx).wrap("<span class=\"tei-bibl\">", "</span>"),

        InlineTag::Quote => render_children(el, ctx).wrap("“", "”"),

        InlineTag::LineBreak => Rendered::text("<br/>".to_string()),

        InlineTag::Other => render_children(el, ctx),
    }
}

/// Splits an element's rendered content at `<lb/>` boundaries. Line breaks nested in
/// plain wrappers (`p`, `ab`, ...) count as well; empty pieces are dropped.
pub fn render_line_broken(el: &XmlElement, ctx: &RenderContext) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    split_at_line_breaks(el, ctx, &mut current, &mut pieces);
    pieces.push(current);

    pieces
        .into_iter()
        .map(|p| normalize_text(&p))
        .filter(|p| !p.is_empty())
        .collect()
}

fn split_at_line_breaks(el: &XmlElement, ctx: &RenderContext, current: &mut String, pieces: &mut Vec<String>) {
    for node in &el.children {
        match node {
            XmlNode::Element(child) if child.is("lb") => {
                pieces.push(std::mem::take(current));
            }
            XmlNode::Element(child)
                if InlineTag::classify(child) == InlineTag::Other && child.has_descendant("lb") =>
            {
                split_at_line_breaks(child, ctx, current, pieces);
            }
            _ => current.push_str(&render_node(node, ctx).html),
        }
    }
}
