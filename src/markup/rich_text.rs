use super::{Element, Node};

/// Tags copied through to the rich text with their attributes.
const PRESERVED_TAGS: &[&str] = &[
    "b", "strong", "i", "em", "u", "br", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "img",
];

/// Maps image paths inside a source archive to their renamed copies in the
/// book's working `images/` directory. Lives for a single import.
#[derive(Debug, Default, Clone)]
pub struct ImageMap {
    entries: Vec<(String, String)>,
}

impl ImageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, original: impl Into<String>, renamed: impl Into<String>) {
        self.entries.push((original.into(), renamed.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve an `<img src>` by its trailing file name.
    ///
    /// Source documents reference images relative to themselves
    /// (`../Images/a.png`) while archive paths are absolute (`OEBPS/Images/a.png`),
    /// so only the last path component is compared. Two archive images with the
    /// same file name in different directories are ambiguous; the first one
    /// inserted wins.
    pub fn resolve(&self, src: &str) -> Option<&str> {
        let wanted = file_name(src);
        if wanted.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(original, _)| file_name(original) == wanted)
            .map(|(_, renamed)| renamed.as_str())
    }
}

fn file_name(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Flatten a parsed document into the constrained rich-text form chapters are
/// stored in: plain text and newlines plus a short list of inline and
/// structural tags. Paragraphs become newline pairs and every other element is
/// dropped while its children are kept.
pub fn extract(doc: &Element, images: Option<&ImageMap>) -> String {
    let mut out = String::new();
    for child in &doc.body().children {
        process(child, images, &mut out);
    }
    out
}

fn process(node: &Node, images: Option<&ImageMap>, out: &mut String) {
    let el = match node {
        Node::Text(text) => {
            out.push_str(&escape_text(text));
            return;
        }
        Node::Element(el) => el,
    };

    match el.name.as_str() {
        "img" => write_img(el, images, out),
        "br" => out.push('\n'),
        "p" => {
            out.push('\n');
            process_children(el, images, out);
            out.push('\n');
        }
        name if PRESERVED_TAGS.contains(&name) => {
            out.push('<');
            out.push_str(name);
            write_attrs(el.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())), out);
            out.push('>');
            process_children(el, images, out);
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        // div, span, section, a, ... contribute only their content
        _ => process_children(el, images, out),
    }
}

fn process_children(el: &Element, images: Option<&ImageMap>, out: &mut String) {
    for child in &el.children {
        process(child, images, out);
    }
}

fn write_img(el: &Element, images: Option<&ImageMap>, out: &mut String) {
    let remapped = el
        .attr("src")
        .and_then(|src| match images.filter(|m| !m.is_empty()) {
            Some(map) => {
                let found = map.resolve(src);
                if found.is_none() {
                    log::debug!("no imported image matches {src}");
                }
                found
            }
            None => None,
        });

    out.push_str("<img");
    write_attrs(
        el.attrs.iter().map(|(k, v)| {
            if k == "src"
                && let Some(new_src) = remapped
            {
                (k.as_str(), new_src)
            } else {
                (k.as_str(), v.as_str())
            }
        }),
        out,
    );
    out.push_str(" />");
}

fn write_attrs<'a>(attrs: impl Iterator<Item = (&'a str, &'a str)>, out: &mut String) {
    for (key, value) in attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
