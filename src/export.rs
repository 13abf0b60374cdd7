//! Whole-book text and HTML export.

use crate::events::{Event, EventSink};
use crate::store::ContentStore;
use crate::toc::{TocNode, flatten};
use crate::util::{strip_html_tags, xml_escape, xml_unescape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// `label` on its own line, then the body with markup removed.
    Text,
    /// `<h2>label</h2>` on its own line, then the body markup.
    Html,
}

/// Concatenate every chapter of the outline in reading order.
///
/// A chapter whose body cannot be fetched contributes nothing, not even its
/// label. An empty outline gives an empty string.
pub fn export(
    toc: &[TocNode],
    store: &dyn ContentStore,
    format: ExportFormat,
    events: &mut dyn EventSink,
) -> String {
    if toc.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for node in flatten(toc) {
        events.emit(Event::ShowTip(node.label.clone()));
        let body = match store.get_chapter(&node.href) {
            Ok(chapter) => chapter.content,
            Err(e) => {
                log::warn!("skipping chapter {}: {e}", node.href);
                continue;
            }
        };
        match format {
            ExportFormat::Text => {
                out.push_str(&node.label);
                out.push('\n');
                out.push_str(&xml_unescape(&strip_html_tags(&body)));
            }
            ExportFormat::Html => {
                out.push_str(&format!("<h2>{}</h2>\n", xml_escape(&node.label)));
                out.push_str(&body);
            }
        }
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    events.emit(Event::HideTip(None));
    out
}
