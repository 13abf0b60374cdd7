use crate::epub::{EpubVersion, ManifestItem, NavPoint, Navigation};
use crate::error::{Result, SmithError};
use crate::util::{archive_dir, resolve_href};
use quick_xml::Reader;
use quick_xml::events::Event;

/// Read the table of contents of a source book.
///
/// Prefers the EPUB 3 navigation document and falls back to the NCX.
/// `get_content` receives hrefs relative to the package document; the
/// returned points are rebased to the same directory.
pub fn parse_navigation(
    manifest: &[ManifestItem],
    get_content: &dyn Fn(&str) -> Option<String>,
) -> Result<Navigation> {
    if let Some(nav_item) = manifest.iter().find(|item| item.has_property("nav"))
        && let Some(content) = get_content(&nav_item.href)
        && let Ok(toc) = parse_nav_xhtml(&content)
        && !toc.is_empty()
    {
        return Ok(Navigation {
            toc: rebase(toc, archive_dir(&nav_item.href)),
            epub_version: EpubVersion::V3,
        });
    }

    if let Some(ncx_item) = manifest
        .iter()
        .find(|item| item.media_type == "application/x-dtbncx+xml")
        && let Some(content) = get_content(&ncx_item.href)
    {
        let toc = parse_ncx(&content)?;
        return Ok(Navigation {
            toc: rebase(toc, archive_dir(&ncx_item.href)),
            epub_version: EpubVersion::V2,
        });
    }

    Ok(Navigation::default())
}

fn rebase(points: Vec<NavPoint>, dir: &str) -> Vec<NavPoint> {
    points
        .into_iter()
        .map(|p| {
            let href = match p.href.split_once('#') {
                Some((path, fragment)) => format!("{}#{fragment}", resolve_href(dir, path)),
                None => resolve_href(dir, &p.href),
            };
            NavPoint {
                label: p.label,
                href,
                children: rebase(p.children, dir),
            }
        })
        .collect()
}

fn parse_nav_xhtml(html: &str) -> Result<Vec<NavPoint>> {
    let mut reader = Reader::from_str(html);
    reader.config_mut().check_end_names = false;
    let mut buf = Vec::new();
    let mut in_nav_toc = false;
    // One list per open <ol>; the bottom entry collects top-level points.
    let mut stack: Vec<Vec<NavPoint>> = vec![Vec::new()];
    let mut current_href = String::new();
    let mut current_label = String::new();
    let mut in_a = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if local == "nav" {
                    in_nav_toc = e.attributes().flatten().any(|attr| {
                        attr.key.as_ref().ends_with(b"type") && attr.value.as_ref() == b"toc"
                    });
                } else if in_nav_toc {
                    if local == "ol" {
                        stack.push(Vec::new());
                    } else if local == "a" {
                        in_a = true;
                        current_label.clear();
                        current_href = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.as_ref() == b"href")
                            .map(|a| String::from_utf8_lossy(&a.value).into_owned())
                            .unwrap_or_default();
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_a && in_nav_toc {
                    current_label.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if local == "nav" && in_nav_toc {
                    in_nav_toc = false;
                } else if in_nav_toc {
                    if local == "a" {
                        in_a = false;
                        if let Some(current) = stack.last_mut() {
                            current.push(NavPoint {
                                label: current_label.trim().to_string(),
                                href: std::mem::take(&mut current_href),
                                children: Vec::new(),
                            });
                        }
                    } else if local == "ol" && stack.len() > 1 {
                        let children = stack.pop().unwrap_or_default();
                        if let Some(parent_list) = stack.last_mut() {
                            if parent_list.is_empty() {
                                parent_list.extend(children);
                            } else if let Some(parent) = parent_list.last_mut() {
                                parent.children.extend(children);
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SmithError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(stack.into_iter().next().unwrap_or_default())
}

fn parse_ncx(xml: &str) -> Result<Vec<NavPoint>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut nav_points = Vec::new();
    let mut stack: Vec<NavPoint> = Vec::new();
    let mut in_text = false;
    let mut current_label = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = e.local_name();
                if local.as_ref() == b"navPoint" {
                    stack.push(NavPoint {
                        label: String::new(),
                        href: String::new(),
                        children: Vec::new(),
                    });
                } else if local.as_ref() == b"text" {
                    in_text = true;
                    current_label.clear();
                }
            }
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"content"
                    && let Some(current) = stack.last_mut()
                    && let Some(src) = e.attributes().flatten().find(|a| a.key.as_ref() == b"src")
                {
                    current.href = String::from_utf8_lossy(&src.value).into_owned();
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_text {
                    current_label.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => {
                let local = e.local_name();
                if local.as_ref() == b"text" {
                    in_text = false;
                    if let Some(current) = stack.last_mut() {
                        current.label = current_label.trim().to_string();
                    }
                } else if local.as_ref() == b"navPoint"
                    && let Some(point) = stack.pop()
                {
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(point),
                        None => nav_points.push(point),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SmithError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(nav_points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, href: &str, media_type: &str, properties: Option<&str>) -> ManifestItem {
        ManifestItem {
            id: id.to_string(),
            href: href.to_string(),
            media_type: media_type.to_string(),
            properties: properties.map(str::to_string),
        }
    }

    const NESTED_NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
<nav epub:type="landmarks"><ol><li><a href="cover.xhtml">Cover</a></li></ol></nav>
<nav epub:type="toc">
<ol>
<li><a href="part1.xhtml">Part 1</a>
<ol>
<li><a href="ch1.xhtml#start">Chapter <b>1</b></a></li>
<li><a href="../ch2.xhtml">Chapter 2</a></li>
</ol>
</li>
<li><a href="part2.xhtml">Part 2</a></li>
</ol>
</nav>
</body>
</html>"#;

    const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
<docTitle><text>Book</text></docTitle>
<navMap>
<navPoint id="np1" playOrder="1">
  <navLabel><text>From NCX</text></navLabel>
  <content src="ch1.xhtml"/>
  <navPoint id="np2" playOrder="2">
    <navLabel><text>Nested</text></navLabel>
    <content src="ch1b.xhtml"/>
  </navPoint>
</navPoint>
</navMap>
</ncx>"#;

    #[test]
    fn nav_document_nesting_and_rebasing() {
        let manifest = vec![item(
            "nav",
            "text/nav.xhtml",
            "application/xhtml+xml",
            Some("nav"),
        )];
        let nav = parse_navigation(&manifest, &|href| {
            (href == "text/nav.xhtml").then(|| NESTED_NAV.to_string())
        })
        .unwrap();

        assert_eq!(nav.epub_version, EpubVersion::V3);
        assert_eq!(nav.toc.len(), 2);
        assert_eq!(nav.toc[0].label, "Part 1");
        assert_eq!(nav.toc[0].href, "text/part1.xhtml");
        assert_eq!(nav.toc[0].children.len(), 2);
        assert_eq!(nav.toc[0].children[0].label, "Chapter 1");
        assert_eq!(nav.toc[0].children[0].href, "text/ch1.xhtml#start");
        assert_eq!(nav.toc[0].children[1].href, "ch2.xhtml");
        assert_eq!(nav.toc[1].label, "Part 2");
    }

    #[test]
    fn ncx_nesting() {
        let manifest = vec![item("ncx", "toc.ncx", "application/x-dtbncx+xml", None)];
        let nav = parse_navigation(&manifest, &|href| {
            (href == "toc.ncx").then(|| NCX.to_string())
        })
        .unwrap();

        assert_eq!(nav.epub_version, EpubVersion::V2);
        assert_eq!(nav.toc.len(), 1);
        assert_eq!(nav.toc[0].label, "From NCX");
        assert_eq!(nav.toc[0].children[0].label, "Nested");
        assert_eq!(nav.toc[0].children[0].href, "ch1b.xhtml");
    }

    #[test]
    fn falls_back_to_ncx_when_nav_missing() {
        let manifest = vec![
            item("nav", "nav.xhtml", "application/xhtml+xml", Some("nav")),
            item("ncx", "toc.ncx", "application/x-dtbncx+xml", None),
        ];
        let nav = parse_navigation(&manifest, &|href| {
            (href == "toc.ncx").then(|| NCX.to_string())
        })
        .unwrap();
        assert_eq!(nav.toc[0].label, "From NCX");
    }

    #[test]
    fn no_navigation_at_all() {
        let manifest = vec![item("ch1", "ch1.xhtml", "application/xhtml+xml", None)];
        let nav = parse_navigation(&manifest, &|_| None).unwrap();
        assert!(nav.toc.is_empty());
    }
}
