use crate::util::xml_escape;
use regex::Regex;
use serde::Serialize;

/// One chapter cut out of a manuscript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterRecord {
    pub index: usize,
    pub label: String,
    pub content: String,
}

/// Split `content` into chapters at every match of `delimiter`.
///
/// Text before the first match becomes a chapter labelled `fallback_label`
/// when it is not blank. Every match starts a new chapter whose label is the
/// trimmed match text and whose body runs up to the next match. A header whose
/// body is blank is dropped when another header follows it. With
/// `label_in_body` the label is repeated at the top of the body as an `<h3>`.
///
/// Never fails: empty input or a missing delimiter yield no chapters.
pub fn segment(
    content: &str,
    fallback_label: &str,
    delimiter: Option<&Regex>,
    label_in_body: bool,
) -> Vec<ChapterRecord> {
    let Some(re) = delimiter else {
        return Vec::new();
    };
    if content.is_empty() {
        return Vec::new();
    }

    let mut records: Vec<ChapterRecord> = Vec::new();
    let mut push = |label: &str, body: &str| {
        let content = if label_in_body {
            with_heading(label, body)
        } else {
            body.to_string()
        };
        records.push(ChapterRecord {
            index: records.len(),
            label: label.to_string(),
            content,
        });
    };

    // (label, byte offset where its body starts)
    let mut open: Option<(&str, usize)> = None;
    let mut seen_match = false;
    let mut cursor = 0;

    while cursor <= content.len() {
        let Some(m) = re.find_at(content, cursor) else {
            break;
        };

        if !seen_match {
            seen_match = true;
            let prologue = content[..m.start()].trim();
            if !prologue.is_empty() {
                push(fallback_label, prologue);
            }
        }

        if let Some((label, start)) = open.take() {
            let body = clean_body(&content[start..m.start()]);
            if body.is_empty() {
                log::debug!("dropping empty chapter {label:?}");
            } else {
                push(label, body);
            }
        }
        open = Some((m.as_str().trim(), m.end()));

        cursor = if m.start() == m.end() {
            next_char_boundary(content, m.end())
        } else {
            m.end()
        };
    }

    if let Some((label, start)) = open {
        push(label, clean_body(&content[start..]));
    }

    records
}

/// Compile `pattern` and segment with it. An invalid pattern yields no chapters.
pub fn segment_with_pattern(
    content: &str,
    fallback_label: &str,
    pattern: &str,
    label_in_body: bool,
) -> Vec<ChapterRecord> {
    match Regex::new(pattern) {
        Ok(re) => segment(content, fallback_label, Some(&re), label_in_body),
        Err(e) => {
            log::warn!("invalid chapter pattern {pattern:?}: {e}");
            Vec::new()
        }
    }
}

/// Prefix `body` with `label` as an `<h3>`, separated by a blank line when
/// there is a body at all.
pub fn with_heading(label: &str, body: &str) -> String {
    let heading = format!("<h3>{}</h3>", xml_escape(label));
    if body.is_empty() {
        heading
    } else {
        format!("{heading}\n\n{body}")
    }
}

fn clean_body(raw: &str) -> &str {
    raw.strip_prefix('\n').unwrap_or(raw).trim()
}

fn next_char_boundary(s: &str, from: usize) -> usize {
    s[from..]
        .chars()
        .next()
        .map_or(from + 1, |c| from + c.len_utf8())
}
