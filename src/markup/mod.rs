//! A small owned markup tree.
//!
//! Chapter documents pulled out of third-party EPUBs are rarely strict XHTML,
//! so the parser here runs quick-xml with end-name checks disabled and repairs
//! nesting itself: void elements never take children, a stray close tag is
//! ignored, and a close tag for an outer element closes everything inside it.
//! Parsing stops quietly at the first hard syntax error and keeps what it has.

pub mod rich_text;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lower-cased local name; `#document` for the synthetic root.
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First descendant element with the given name, in document order.
    pub fn find(&self, name: &str) -> Option<&Element> {
        for child in &self.children {
            if let Node::Element(el) = child {
                if el.name == name {
                    return Some(el);
                }
                if let Some(found) = el.find(name) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// The `<body>` element if there is one, otherwise the element itself.
    pub fn body(&self) -> &Element {
        self.find("body").unwrap_or(self)
    }

    /// Concatenated text of all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
        }
    }
}

/// Parse a markup document or fragment into an owned tree rooted at `#document`.
pub fn parse_document(markup: &str) -> Element {
    let mut reader = Reader::from_str(markup);
    {
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.check_comments = false;
    }
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = vec![Element::new("#document")];

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let el = element_from(e);
                if VOID_ELEMENTS.contains(&el.name.as_str()) {
                    append(&mut stack, Node::Element(el));
                } else {
                    stack.push(el);
                }
            }
            Ok(Event::Empty(ref e)) => {
                append(&mut stack, Node::Element(element_from(e)));
            }
            Ok(Event::End(ref e)) => {
                let name = lower_name(e.local_name().as_ref());
                if let Some(pos) = stack.iter().rposition(|el| el.name == name)
                    && pos > 0
                {
                    while stack.len() > pos {
                        close_top(&mut stack);
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                let raw = String::from_utf8_lossy(e);
                let text = decode_entities(&raw);
                if !text.is_empty() {
                    append(&mut stack, Node::Text(text.into_owned()));
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                append(&mut stack, Node::Text(text));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::debug!(
                    "markup parse stopped at byte {}: {e}",
                    reader.buffer_position()
                );
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    stack.pop().unwrap_or_else(|| Element::new("#document"))
}

fn append(stack: &mut [Element], node: Node) {
    if let Some(top) = stack.last_mut() {
        // Keep adjacent text runs (text next to CDATA) in a single node.
        if let (Node::Text(new), Some(Node::Text(prev))) = (&node, top.children.last_mut()) {
            prev.push_str(new);
            return;
        }
        top.children.push(node);
    }
}

fn close_top(stack: &mut Vec<Element>) {
    if let Some(done) = stack.pop() {
        append(stack, Node::Element(done));
    }
}

fn element_from(e: &BytesStart<'_>) -> Element {
    let mut el = Element::new(lower_name(e.local_name().as_ref()));
    for attr in e.html_attributes().with_checks(false).flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = decode_entities(&raw).into_owned();
        el.attrs.push((key, value));
    }
    el
}

fn lower_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).to_ascii_lowercase()
}

/// Longest reference name looked at between `&` and `;`.
const MAX_REFERENCE_LEN: usize = 32;

/// Decode character references and common HTML entities one at a time. A
/// reference that cannot be resolved is kept as literal text.
fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let decoded = tail
            .find(';')
            .filter(|&end| end > 0 && end <= MAX_REFERENCE_LEN)
            .and_then(|end| resolve_reference(&tail[..end]).map(|text| (text, end + 1)));
        match decoded {
            Some((text, consumed)) => {
                out.push_str(&text);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn resolve_reference(name: &str) -> Option<Cow<'static, str>> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code).map(|c| Cow::Owned(c.to_string()));
    }
    resolve_entity(name).map(Cow::Borrowed)
}

fn resolve_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "hellip" => "\u{2026}",
        "middot" => "\u{b7}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        _ => return None,
    })
}
