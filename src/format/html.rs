//! HTML pretty-printer.
//!
//! The document is parsed with `html5ever` into an `RcDom` and written back
//! one node per line, indented by depth. Whitespace-only text nodes are
//! dropped and other text has its ASCII whitespace collapsed, which is
//! invisible to the browser outside preformatted content.
//!
//! Content where whitespace matters is never touched: `script`/`style` (and
//! the other raw text elements) keep their text verbatim, and `pre`/
//! `textarea` subtrees are serialized exactly, on one line.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose text content is not escaped. `plaintext` is handled
/// separately.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "noscript",
];

/// Elements whose whitespace is significant.
const PREFORMATTED_ELEMENTS: &[&str] = &["pre", "textarea", "listing"];

/// Pretty-print an HTML document with `indent` spaces per level.
///
/// Misnested markup can be repaired differently once the printed tree is
/// parsed again. The result is always a fixed point: the first stable
/// printing is returned, and `source` itself when none is found.
pub fn format_html(source: &str, indent: usize) -> String {
    let once = print_document(source, indent);
    let twice = print_document(&once, indent);
    if once == twice {
        return once;
    }
    if print_document(&twice, indent) == twice {
        return twice;
    }
    source.to_string()
}

fn print_document(source: &str, indent: usize) -> String {
    let dom = parse_document(RcDom::default(), Default::default()).one(source);
    let mut printer = Printer {
        out: String::with_capacity(source.len() + source.len() / 2),
        indent,
        done: false,
    };
    for child in dom.document.children.borrow().iter() {
        printer.node(child, 0);
    }
    printer.out
}

struct Printer {
    out: String,
    indent: usize,
    /// Set after `<plaintext>`, which has no end tag and runs to the end of
    /// the document.
    done: bool,
}

impl Printer {
    fn line(&mut self, depth: usize, text: &str) {
        if self.done {
            return;
        }
        self.out.extend(std::iter::repeat_n(' ', depth * self.indent));
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn node(&mut self, handle: &Handle, depth: usize) {
        match &handle.data {
            NodeData::Document => {
                for child in handle.children.borrow().iter() {
                    self.node(child, depth);
                }
            }
            NodeData::Doctype {
                name,
                public_id,
                system_id,
            } => {
                let line = doctype(name, public_id, system_id);
                self.line(depth, &line);
            }
            NodeData::Text { contents } => {
                let text = collapse_whitespace(&contents.borrow());
                if !text.is_empty() {
                    self.line(depth, &escape_text(&text));
                }
            }
            NodeData::Comment { contents } => {
                self.line(depth, &format!("<!--{contents}-->"));
            }
            NodeData::ProcessingInstruction { .. } => {}
            NodeData::Element { name, attrs, .. } => {
                let tag: &str = &name.local;
                let is_html = &*name.ns == HTML_NS;
                let open = start_tag(tag, &attrs.borrow());

                if is_html && VOID_ELEMENTS.contains(&tag) {
                    self.line(depth, &open);
                    return;
                }
                if is_html && PREFORMATTED_ELEMENTS.contains(&tag) {
                    let mut exact = String::new();
                    serialize_exact(handle, &mut exact);
                    self.line(depth, &exact);
                    return;
                }
                if is_html && tag == "plaintext" {
                    if !self.done {
                        self.out.extend(std::iter::repeat_n(' ', depth * self.indent));
                        self.out.push_str(&open);
                        self.out.push_str(&raw_text(handle));
                        self.done = true;
                    }
                    return;
                }
                if is_html && is_raw_text(handle, tag) {
                    let raw = raw_text(handle);
                    self.line(depth, &format!("{open}{raw}</{tag}>"));
                    return;
                }

                let children = content_children(handle);
                if children.iter().all(is_blank) {
                    if is_html {
                        self.line(depth, &format!("{open}</{tag}>"));
                    } else {
                        let open = open.trim_end_matches('>');
                        self.line(depth, &format!("{open} />"));
                    }
                    return;
                }

                self.line(depth, &open);
                for child in &children {
                    self.node(child, depth + 1);
                }
                self.line(depth, &format!("</{tag}>"));
            }
        }
    }
}

/// Children of an element, or the contents of a `<template>`.
fn content_children(handle: &Handle) -> Vec<Handle> {
    if let NodeData::Element {
        template_contents, ..
    } = &handle.data
        && let Some(contents) = template_contents.borrow().as_ref()
    {
        return contents.children.borrow().clone();
    }
    handle.children.borrow().clone()
}

fn is_blank(handle: &Handle) -> bool {
    match &handle.data {
        NodeData::Text { contents } => contents.borrow().chars().all(|c| c.is_ascii_whitespace()),
        _ => false,
    }
}

/// Raw text elements hold only text. `noscript` parsed with scripting
/// disabled holds regular markup instead.
fn is_raw_text(handle: &Handle, tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
        && handle
            .children
            .borrow()
            .iter()
            .all(|c| matches!(c.data, NodeData::Text { .. }))
}

fn raw_text(handle: &Handle) -> String {
    let mut text = String::new();
    for child in handle.children.borrow().iter() {
        if let NodeData::Text { contents } = &child.data {
            text.push_str(&contents.borrow());
        }
    }
    text
}

/// Serialize a subtree without changing any whitespace.
fn serialize_exact(handle: &Handle, out: &mut String) {
    match &handle.data {
        NodeData::Text { contents } => out.push_str(&escape_text(&contents.borrow())),
        NodeData::Comment { contents } => {
            out.push_str("<!--");
            out.push_str(contents);
            out.push_str("-->");
        }
        NodeData::Element { name, attrs, .. } => {
            let tag: &str = &name.local;
            let is_html = &*name.ns == HTML_NS;
            out.push_str(&start_tag(tag, &attrs.borrow()));
            if is_html && VOID_ELEMENTS.contains(&tag) {
                return;
            }
            if is_html && is_raw_text(handle, tag) {
                out.push_str(&raw_text(handle));
            } else {
                let children = content_children(handle);
                // The parser drops one newline right after these start tags.
                if is_html
                    && PREFORMATTED_ELEMENTS.contains(&tag)
                    && let Some(NodeData::Text { contents }) = children.first().map(|c| &c.data)
                    && contents.borrow().starts_with('\n')
                {
                    out.push('\n');
                }
                for child in &children {
                    serialize_exact(child, out);
                }
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        NodeData::Document | NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => {}
    }
}

fn start_tag(tag: &str, attrs: &[html5ever::Attribute]) -> String {
    let mut open = format!("<{tag}");
    for attr in attrs {
        open.push(' ');
        if let Some(prefix) = &attr.name.prefix {
            open.push_str(prefix);
            open.push(':');
        }
        open.push_str(&attr.name.local);
        if !attr.value.is_empty() {
            open.push_str("=\"");
            open.push_str(&escape_attr(&attr.value));
            open.push('"');
        }
    }
    open.push('>');
    open
}

fn doctype(name: &str, public_id: &str, system_id: &str) -> String {
    let mut line = format!("<!DOCTYPE {name}");
    if !public_id.is_empty() {
        line.push_str(&format!(" PUBLIC \"{public_id}\""));
        if !system_id.is_empty() {
            line.push_str(&format!(" \"{system_id}\""));
        }
    } else if !system_id.is_empty() {
        line.push_str(&format!(" SYSTEM \"{system_id}\""));
    }
    line.push('>');
    line
}

/// Trim and collapse ASCII whitespace. Non-breaking spaces are content.
fn collapse_whitespace(text: &str) -> String {
    text.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            c => escaped.push(c),
        }
    }
    escaped
}
