use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Remove every `<...>` token from a string, keeping the text between them.
///
/// This is a literal delimiter pass, not a parse: entities are left alone and
/// an unterminated `<` survives. Used by the plain-text exporter and for
/// deriving labels from heading markup.
pub fn strip_html_tags(html: &str) -> String {
    TAG_RE.replace_all(html, "").into_owned()
}

pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Turn an arbitrary href into something usable as an XML `id` suffix.
pub fn xml_id(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Find the full resource key in the resources map for a given href.
///
/// Archive entries carry their full ZIP path (e.g. "OEBPS/ch1.xhtml") while
/// navigation hrefs are relative to the OPF directory (e.g. "ch1.xhtml").
/// Checks for an exact match first, then falls back to a suffix match.
pub fn find_resource_key(resources: &HashMap<String, Vec<u8>>, href: &str) -> Option<String> {
    if resources.contains_key(href) {
        return Some(href.to_string());
    }
    let mut keys: Vec<&String> = resources.keys().filter(|k| k.ends_with(href)).collect();
    keys.sort();
    keys.first().map(|k| k.to_string())
}

/// Infer media type from file extension
pub fn infer_media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("css") => "text/css",
        Some("xhtml") | Some("html") => "application/xhtml+xml",
        _ => "application/octet-stream",
    }
}

/// Image format from the leading magic bytes, as `(extension, media type)`.
/// Data that matches no known signature is taken to be JPEG.
pub fn sniff_image(data: &[u8]) -> (&'static str, &'static str) {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        ("png", "image/png")
    } else if data.starts_with(b"GIF8") {
        ("gif", "image/gif")
    } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        ("webp", "image/webp")
    } else if data.starts_with(b"BM") {
        ("bmp", "image/bmp")
    } else {
        ("jpg", "image/jpeg")
    }
}

/// Undo [`xml_escape`] and `&apos;`. Other entities are left as they are.
pub fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Resolve `href` against the archive directory `base` (empty or ending in
/// `/`), dropping any `#fragment` and folding `.` and `..` segments.
pub fn resolve_href(base: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or_default();
    let mut parts: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(href.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Directory part of an archive path, with its trailing `/`; empty at the root.
pub fn archive_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "",
    }
}

/// Returns `(year, month, day, hour, minute, second)` for the current UTC time.
fn now_components() -> (u64, u64, u64, u64, u64, u64) {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    civil_from_unix(secs)
}

fn civil_from_unix(secs: u64) -> (u64, u64, u64, u64, u64, u64) {
    // Howard Hinnant's days-to-civil, shifted so the era starts on March 1st.
    let days = secs / 86400;
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);

    let day_secs = secs % 86400;
    (
        year,
        month,
        day,
        day_secs / 3600,
        (day_secs % 3600) / 60,
        day_secs % 60,
    )
}

/// Current UTC timestamp as `YYYY-MM-DDThh:mm:ssZ`.
pub fn format_iso8601() -> String {
    let (year, month, day, hour, min, sec) = now_components();
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{min:02}:{sec:02}Z")
}
