//! Document metadata and source description from the TEI header.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::helpers::non_blank;
use crate::inline_render::{render_content, render_element, render_node, RenderContext};
use crate::types::{DocumentMetadata, UNKNOWN, UNTITLED};
use crate::xml_tree::{XmlDocument, XmlElement, XmlNode};

fn first_text(scope: &XmlElement, tag: &str) -> Option<String> {
    scope
        .elements_by_tag(tag)
        .map(XmlElement::normalized_text)
        .find_map(non_blank)
}

pub fn extract_metadata(doc: &XmlDocument) -> DocumentMetadata {
    let mut metadata = DocumentMetadata::default();

    if let Some(title_stmt) = doc.elements_by_tag("titleStmt").next() {
        let main_title = title_stmt
            .elements_by_tag("title")
            .find(|t| t.has_attr_value("type", "main"))
            .map(XmlElement::normalized_text)
            .and_then(non_blank);

        metadata.title = main_title
            .or_else(|| first_text(title_stmt, "title"))
            .unwrap_or_else(|| UNTITLED.to_string());
        metadata.author = first_text(title_stmt, "author").unwrap_or_else(|| UNKNOWN.to_string());
        metadata.editor = first_text(title_stmt, "editor").unwrap_or_else(|| UNKNOWN.to_string());
    }

    if let Some(date) = doc
        .elements_by_tag("publicationStmt")
        .next()
        .and_then(|p| p.elements_by_tag("date").next())
    {
        metadata.publication_date = non_blank(date.normalized_text())
            .or_else(|| date.attr("when").map(|w| w.trim().to_string()))
            .unwrap_or_default();
    }

    metadata
}

/// Renders `sourceDesc` with witness lists and bibliographies as collapsible groups.
/// Empty when the header has no source description.
pub fn render_source_description(doc: &XmlDocument, ctx: &RenderContext) -> String {
    match doc.elements_by_tag("sourceDesc").next() {
        Some(source_desc) => render_block(source_desc, ctx).trim().to_string(),
        None => String::new(),
    }
}

fn is_block(el: &XmlElement) -> bool {
    matches!(el.name.as_str(), "listWit" | "listBibl" | "p")
}

fn render_block(el: &XmlElement, ctx: &RenderContext) -> String {
    let mut html = String::new();

    for node in &el.children {
        let XmlNode::Element(child) = node else {
            html.push_str(&render_node(node, ctx).html);
            continue;
        };

        match child.name.as_str() {
            "listWit" => html.push_str(&render_list(child, "tei-list-wit", &ctx.settings.witness_list_label, ctx)),
            "listBibl" => html.push_str(&render_list(child, "tei-list-bibl", &ctx.settings.bibliography_label, ctx)),
            "p" => html.push_str(&format!("<p>{}</p>", render_content(child, ctx))),
            // Wrappers such as msDesc that hold block content
            _ if child.descendants().any(is_block) => html.push_str(&render_block(child, ctx)),
            _ => html.push_str(&render_element(child, ctx).html),
        }
    }

    html
}

fn render_list(list: &XmlElement, class: &str, default_head: &str, ctx: &RenderContext) -> String {
    let head = list
        .first_child("head")
        .map(|h| render_content(h, ctx))
        .and_then(non_blank)
        .unwrap_or_else(|| encode_text(default_head).into_owned());

    let items: String = list
        .child_elements()
        .filter(|item| !item.is("head"))
        .map(|item| render_list_item(item, ctx))
        .collect();

    format!(
        "<details class=\"{}\" open><summary>{}</summary><ul>{}</ul></details>",
        class, head, items
    )
}

fn render_list_item(item: &XmlElement, ctx: &RenderContext) -> String {
    match item.name.as_str() {
        "witness" => {
            let content = render_content(item, ctx);
            match item.xml_id() {
                Some(id) => format!(
                    "<li class=\"tei-witness\" data-id=\"{}\"><span class=\"tei-siglum\">{}</span> {}</li>",
                    encode_double_quoted_attribute(id),
                    encode_text(id),
                    content
                ),
                None => format!("<li class=\"tei-witness\">{}</li>", content),
            }
        }
        "bibl" | "biblStruct" => format!("<li class=\"tei-bibl\">{}</li>", render_content(item, ctx)),
        "listWit" | "listBibl" => format!("<li>{}</li>", render_nested_list(item, ctx)),
        _ => format!("<li>{}</li>", render_content(item, ctx)),
    }
}

/// A nested list, rendered as its own group.
fn render_nested_list(list: &XmlElement, ctx: &RenderContext) -> String {
    if list.is("listWit") {
        render_list(list, "tei-list-wit", &ctx.settings.witness_list_label, ctx)
    } else {
        render_list(list, "tei-list-bibl", &ctx.settings.bibliography_label, ctx)
    }
}
