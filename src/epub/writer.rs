use crate::epub::BookMetadata;
use crate::epub::container::{PACKAGE_PATH, generate_container_xml};
use crate::error::{Result, SmithError};
use crate::events::{Event, EventSink};
use crate::library::Library;
use crate::markup::{Element, Node, parse_document};
use crate::store::ContentStore;
use crate::toc::{TocNode, TocTree, flatten, max_depth};
use crate::util::{format_iso8601, infer_media_type, sniff_image, xml_escape, xml_id};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::path::Path;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const STYLESHEET: &str = "body {
  margin: 0 5%;
  line-height: 1.6;
}
p {
  margin: 0;
  text-indent: 2em;
}
h1, h2, h3 {
  text-align: center;
}
img {
  max-width: 100%;
}
";

/// Elements written out whole instead of being gathered into a paragraph.
const BLOCK_ELEMENTS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "p", "div", "blockquote", "pre", "table",
    "hr",
];

const EMPTY_ELEMENTS: &[&str] = &["br", "hr", "img"];

struct ImageAsset {
    id: String,
    href: String,
    media_type: &'static str,
    data: Vec<u8>,
}

struct CoverAsset {
    /// File name inside `OEBPS/`.
    file: String,
    media_type: &'static str,
    data: Vec<u8>,
}

impl CoverAsset {
    fn new(data: Vec<u8>) -> Self {
        let (ext, media_type) = sniff_image(&data);
        Self {
            file: format!("cover.{ext}"),
            media_type,
            data,
        }
    }

    fn href(&self) -> String {
        format!("OEBPS/{}", self.file)
    }
}

/// Archive name stem for every chapter, keyed by href. Hrefs that sanitise
/// to the same stem get a numeric suffix in outline order.
fn chapter_stems<'a>(chapters: &[&'a TocNode]) -> HashMap<&'a str, String> {
    let mut taken = HashSet::with_capacity(chapters.len());
    let mut stems = HashMap::with_capacity(chapters.len());
    for &node in chapters {
        let base = xml_id(&node.href);
        let mut stem = base.clone();
        let mut n = 2;
        while !taken.insert(stem.clone()) {
            stem = format!("{base}-{n}");
            n += 1;
        }
        stems.insert(node.href.as_str(), stem);
    }
    stems
}

fn stem_of(stems: &HashMap<&str, String>, href: &str) -> String {
    stems.get(href).cloned().unwrap_or_else(|| xml_id(href))
}

fn chapter_href(stem: &str) -> String {
    format!("OEBPS/chapter{stem}.html")
}

fn chapter_id(stem: &str) -> String {
    format!("chap{stem}")
}

/// Build an EPUB 2 package from an outline.
///
/// Chapter bodies come from `store`, the cover and images from `library`.
/// A chapter that cannot be fetched is written empty and an unreadable image
/// is left out; only a failure to produce the archive itself is an error.
/// The outline must not repeat an href.
pub fn assemble(
    metadata: &BookMetadata,
    toc: &[TocNode],
    store: &dyn ContentStore,
    library: &Library,
    events: &mut dyn EventSink,
) -> Result<Vec<u8>> {
    // Rejects repeated hrefs, which would collide in the archive.
    TocTree::from_nodes(toc)?;

    let chapters = flatten(toc);
    let stems = chapter_stems(&chapters);
    let total = chapters.len();
    let mut documents = Vec::with_capacity(total);
    for (i, node) in chapters.iter().enumerate() {
        events.emit(Event::ShowTip(format!(
            "{} ({}/{total})",
            node.label,
            i + 1
        )));
        let body = match store.get_chapter(&node.href) {
            Ok(chapter) => chapter.content,
            Err(e) => {
                log::warn!("chapter {} unavailable, writing it empty: {e}", node.href);
                String::new()
            }
        };
        documents.push(chapter_xhtml(&node.label, &body, &metadata.language));
    }

    let images = collect_images(library, &metadata.book_id);
    let cover = library.read_cover(&metadata.book_id).map(CoverAsset::new);
    let uid = format!("urn:uuid:{}", uuid::Uuid::new_v4());

    let opf = generate_opf(metadata, &uid, &chapters, &stems, &images, cover.as_ref());
    let ncx = generate_ncx(metadata, &uid, toc, &stems);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    // mimetype must be first and uncompressed
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    let deflate = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("META-INF/container.xml", deflate)?;
    zip.write_all(generate_container_xml().as_bytes())?;

    zip.start_file(PACKAGE_PATH, deflate)?;
    zip.write_all(opf.as_bytes())?;

    zip.start_file("toc.ncx", deflate)?;
    zip.write_all(ncx.as_bytes())?;

    zip.start_file("style.css", deflate)?;
    zip.write_all(STYLESHEET.as_bytes())?;

    if let Some(cover) = &cover {
        zip.start_file(cover.href(), stored)?;
        zip.write_all(&cover.data)?;
        zip.start_file("OEBPS/cover.html", deflate)?;
        zip.write_all(cover_xhtml(&metadata.title, &metadata.language, &cover.file).as_bytes())?;
    }

    for (node, document) in chapters.iter().zip(&documents) {
        zip.start_file(chapter_href(&stem_of(&stems, &node.href)), deflate)?;
        zip.write_all(document.as_bytes())?;
    }

    for image in &images {
        zip.start_file(image.href.as_str(), stored)?;
        zip.write_all(&image.data)?;
    }

    let bytes = zip.finish()?.into_inner();
    log::info!(
        "assembled \"{}\": {total} chapters, {} images, {} bytes",
        metadata.title,
        images.len(),
        bytes.len()
    );
    events.emit(Event::HideTip(Some("EPUB created".into())));
    Ok(bytes)
}

/// Write archive bytes to `path` through a temp file and an atomic rename.
pub fn write_epub_file(bytes: &[u8], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("epub.tmp");
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        SmithError::Io(e)
    })
}

fn collect_images(library: &Library, book_id: &str) -> Vec<ImageAsset> {
    library
        .list_images(book_id)
        .into_iter()
        .filter_map(|file| match std::fs::read(&file.path) {
            Ok(data) => Some((file, data)),
            Err(e) => {
                log::warn!("skipping unreadable image {}: {e}", file.path.display());
                None
            }
        })
        .enumerate()
        .map(|(i, (file, data))| ImageAsset {
            id: format!("img{i}"),
            href: format!("OEBPS/images/{}", file.name),
            media_type: infer_media_type(&file.path),
            data,
        })
        .collect()
}

/// Turn stored rich text into XHTML body content.
///
/// Top-level text lines become paragraphs, and inline elements stay inside
/// the paragraph they start in, with any line break inside them written as
/// `<br/>`. Block elements such as headings and lists are written on their
/// own. The text is re-parsed so the output is always balanced.
fn format_paragraphs(text: &str) -> String {
    let doc = parse_document(text);
    let mut blocks = Vec::new();
    let mut line = String::new();
    for node in &doc.children {
        match node {
            Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name.as_str()) => {
                end_paragraph(&mut line, &mut blocks);
                let mut block = String::new();
                write_element(el, false, &mut block);
                blocks.push(block);
            }
            Node::Element(el) => write_element(el, true, &mut line),
            Node::Text(t) => {
                let mut parts = t.split('\n');
                if let Some(first) = parts.next() {
                    line.push_str(&xml_escape(first));
                }
                for part in parts {
                    end_paragraph(&mut line, &mut blocks);
                    line.push_str(&xml_escape(part));
                }
            }
        }
    }
    end_paragraph(&mut line, &mut blocks);
    blocks.join("\n")
}

fn end_paragraph(line: &mut String, blocks: &mut Vec<String>) {
    let content = line.trim();
    if !content.is_empty() {
        blocks.push(format!("<p>{content}</p>"));
    }
    line.clear();
}

fn write_element(el: &Element, inline: bool, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for (key, value) in &el.attrs {
        out.push_str(&format!(" {key}=\"{}\"", xml_escape(value)));
    }
    if EMPTY_ELEMENTS.contains(&el.name.as_str()) {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &el.children {
        match child {
            Node::Element(inner) => write_element(inner, inline, out),
            Node::Text(t) if inline => out.push_str(&xml_escape(t).replace('\n', "<br/>")),
            Node::Text(t) => out.push_str(&xml_escape(t)),
        }
    }
    out.push_str(&format!("</{}>", el.name));
}

fn chapter_xhtml(label: &str, body: &str, language: &str) -> String {
    let mut html = String::new();
    html.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    html.push_str("<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\" \"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">\n");
    html.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xml:lang=\"{}\">\n",
        xml_escape(language)
    ));
    html.push_str("<head>\n");
    html.push_str(&format!("  <title>{}</title>\n", xml_escape(label)));
    html.push_str("  <link rel=\"stylesheet\" type=\"text/css\" href=\"../style.css\"/>\n");
    html.push_str("</head>\n<body>\n");
    let paragraphs = format_paragraphs(body);
    if !paragraphs.is_empty() {
        html.push_str(&paragraphs);
        html.push('\n');
    }
    html.push_str("</body>\n</html>\n");
    html
}

fn cover_xhtml(title: &str, language: &str, image: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="{}">
<head>
  <title>{}</title>
</head>
<body>
  <img src="{}" alt="cover"/>
</body>
</html>
"#,
        xml_escape(language),
        xml_escape(title),
        xml_escape(image)
    )
}

fn generate_opf(
    metadata: &BookMetadata,
    uid: &str,
    chapters: &[&TocNode],
    stems: &HashMap<&str, String>,
    images: &[ImageAsset],
    cover: Option<&CoverAsset>,
) -> String {
    let mut opf = String::new();
    opf.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    opf.push_str("<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"book-id\" version=\"2.0\">\n");

    opf.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:opf=\"http://www.idpf.org/2007/opf\">\n");
    opf.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        xml_escape(&metadata.title)
    ));
    opf.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        xml_escape(&metadata.language)
    ));
    opf.push_str(&format!(
        "    <dc:creator opf:role=\"aut\">{}</dc:creator>\n",
        xml_escape(&metadata.author)
    ));
    if !metadata.description.is_empty() {
        opf.push_str(&format!(
            "    <dc:description>{}</dc:description>\n",
            xml_escape(&metadata.description)
        ));
    }
    opf.push_str(&format!(
        "    <dc:identifier id=\"book-id\">{}</dc:identifier>\n",
        xml_escape(uid)
    ));
    opf.push_str(&format!(
        "    <dc:date opf:event=\"modification\">{}</dc:date>\n",
        format_iso8601()
    ));
    if cover.is_some() {
        opf.push_str("    <meta name=\"cover\" content=\"cover-image\"/>\n");
    }
    opf.push_str("  </metadata>\n");

    opf.push_str("  <manifest>\n");
    for node in chapters {
        let stem = stem_of(stems, &node.href);
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            chapter_id(&stem),
            xml_escape(&chapter_href(&stem))
        ));
    }
    if let Some(cover) = cover {
        opf.push_str(&format!(
            "    <item id=\"cover-image\" href=\"{}\" media-type=\"{}\"/>\n",
            xml_escape(&cover.href()),
            cover.media_type
        ));
        opf.push_str("    <item id=\"cover\" href=\"OEBPS/cover.html\" media-type=\"application/xhtml+xml\"/>\n");
    }
    for image in images {
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"/>\n",
            image.id,
            xml_escape(&image.href),
            image.media_type
        ));
    }
    opf.push_str("    <item id=\"css\" href=\"style.css\" media-type=\"text/css\"/>\n");
    opf.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
    );
    opf.push_str("  </manifest>\n");

    opf.push_str("  <spine toc=\"ncx\">\n");
    if cover.is_some() {
        opf.push_str("    <itemref idref=\"cover\" linear=\"yes\"/>\n");
    }
    for node in chapters {
        opf.push_str(&format!(
            "    <itemref idref=\"{}\"/>\n",
            chapter_id(&stem_of(stems, &node.href))
        ));
    }
    opf.push_str("  </spine>\n");
    opf.push_str("</package>\n");
    opf
}

fn generate_ncx(
    metadata: &BookMetadata,
    uid: &str,
    toc: &[TocNode],
    stems: &HashMap<&str, String>,
) -> String {
    let mut ncx = String::new();
    ncx.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    ncx.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n");
    ncx.push_str("<head>\n");
    ncx.push_str(&format!(
        "  <meta name=\"dtb:uid\" content=\"{}\"/>\n",
        xml_escape(uid)
    ));
    ncx.push_str(&format!(
        "  <meta name=\"dtb:depth\" content=\"{}\"/>\n",
        max_depth(toc).max(1)
    ));
    ncx.push_str("  <meta name=\"dtb:totalPageCount\" content=\"0\"/>\n");
    ncx.push_str("  <meta name=\"dtb:maxPageNumber\" content=\"0\"/>\n");
    ncx.push_str("</head>\n");
    ncx.push_str(&format!(
        "<docTitle><text>{}</text></docTitle>\n",
        xml_escape(&metadata.title)
    ));
    ncx.push_str(&format!(
        "<docAuthor><text>{}</text></docAuthor>\n",
        xml_escape(&metadata.author)
    ));
    ncx.push_str("<navMap>\n");
    write_ncx_points(&mut ncx, toc, stems, &mut 1, 1);
    ncx.push_str("</navMap>\n");
    ncx.push_str("</ncx>\n");
    ncx
}

/// Navigation points in pre-order; `counter` is the next play order, so the
/// numbering follows the same walk as [`flatten`].
fn write_ncx_points(
    ncx: &mut String,
    points: &[TocNode],
    stems: &HashMap<&str, String>,
    counter: &mut usize,
    depth: usize,
) {
    let indent = "  ".repeat(depth);
    for point in points {
        let order = *counter;
        *counter += 1;
        ncx.push_str(&format!(
            "{indent}<navPoint id=\"navPoint-{order}\" playOrder=\"{order}\">\n"
        ));
        ncx.push_str(&format!(
            "{indent}  <navLabel><text>{}</text></navLabel>\n",
            xml_escape(&point.label)
        ));
        ncx.push_str(&format!(
            "{indent}  <content src=\"{}\"/>\n",
            xml_escape(&chapter_href(&stem_of(stems, &point.href)))
        ));
        write_ncx_points(ncx, point.children(), stems, counter, depth + 1);
        ncx.push_str(&format!("{indent}</navPoint>\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::opf::parse_opf;
    use crate::epub::reader::read_epub_from;
    use crate::events::{NullSink, Recorder};
    use crate::store::{MemoryStore, NewChapter};
    use quick_xml::events::Event as XmlEvent;
    use regex::Regex;
    use std::io::Read;

    fn meta() -> BookMetadata {
        BookMetadata {
            book_id: "1".into(),
            title: "Tom & Jerry".into(),
            author: "Anon".into(),
            description: String::new(),
            language: "en".into(),
        }
    }

    /// Stores one chapter per label and returns the hrefs, in order.
    fn fill(store: &mut MemoryStore, labels: &[&str]) -> Vec<String> {
        labels
            .iter()
            .map(|l| {
                store
                    .add_chapter(NewChapter::new("1", *l, format!("Body of {l}\nsecond line")))
                    .unwrap()
            })
            .collect()
    }

    /// Archive path of a chapter whose href is already a valid id suffix.
    fn doc_path(href: &str) -> String {
        format!("OEBPS/chapter{href}.html")
    }

    fn assert_well_formed(doc: &str) {
        let mut reader = quick_xml::Reader::from_str(doc);
        let mut open = 0usize;
        loop {
            match reader.read_event() {
                Ok(XmlEvent::Start(_)) => open += 1,
                Ok(XmlEvent::End(_)) => open -= 1,
                Ok(XmlEvent::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("ill-formed at byte {}: {e}\n{doc}", reader.buffer_position()),
            }
        }
        assert_eq!(open, 0, "unclosed elements in\n{doc}");
    }

    fn entry(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    fn spine_hrefs(bytes: &[u8]) -> Vec<String> {
        let data = parse_opf(&entry(bytes, "content.opf")).unwrap();
        data.spine
            .iter()
            .map(|s| {
                data.manifest
                    .iter()
                    .find(|m| m.id == s.idref)
                    .unwrap()
                    .href
                    .clone()
            })
            .collect()
    }

    fn ncx_hrefs(bytes: &[u8]) -> Vec<String> {
        let re = Regex::new(r#"playOrder="(\d+)">\s*<navLabel><text>[^<]*</text></navLabel>\s*<content src="([^"]+)""#).unwrap();
        let ncx = entry(bytes, "toc.ncx");
        let mut points: Vec<(usize, String)> = re
            .captures_iter(&ncx)
            .map(|c| (c[1].parse().unwrap(), c[2].to_string()))
            .collect();
        // Document order must already be play order.
        let orders: Vec<usize> = points.iter().map(|p| p.0).collect();
        assert_eq!(orders, (1..=points.len()).collect::<Vec<_>>());
        points.drain(..).map(|p| p.1).collect()
    }

    #[test]
    fn mimetype_first_and_stored() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        let h = fill(&mut store, &["One"]);
        let toc = vec![TocNode::leaf("One", &h[0])];
        let bytes = assemble(&meta(), &toc, &store, &Library::new(tmp.path()), &mut NullSink).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(&bytes)).unwrap();
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), zip::CompressionMethod::Stored);
        drop(first);
        assert_eq!(entry(&bytes, "mimetype"), "application/epub+zip");
    }

    #[test]
    fn spine_matches_navigation_order_for_nested_tree() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        let h = fill(&mut store, &["P1", "C1", "C1a", "C2", "P2"]);
        let toc = vec![
            TocNode::with_children(
                "P1",
                &h[0],
                vec![
                    TocNode::with_children("C1", &h[1], vec![TocNode::leaf("C1a", &h[2])]),
                    TocNode::leaf("C2", &h[3]),
                ],
            ),
            TocNode::leaf("P2", &h[4]),
        ];
        let bytes = assemble(&meta(), &toc, &store, &Library::new(tmp.path()), &mut NullSink).unwrap();

        let spine = spine_hrefs(&bytes);
        assert_eq!(spine, ncx_hrefs(&bytes));
        let expected: Vec<String> = h.iter().map(|x| doc_path(x)).collect();
        assert_eq!(spine, expected);
        assert!(entry(&bytes, "toc.ncx").contains("<meta name=\"dtb:depth\" content=\"3\"/>"));
    }

    #[test]
    fn chapter_documents_wrap_lines() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        let href = store
            .add_chapter(NewChapter::new("1", "A", "<h3>A</h3>\n\n  first  \n\nsecond"))
            .unwrap();
        let toc = vec![TocNode::leaf("A <x>", &href)];
        let bytes = assemble(&meta(), &toc, &store, &Library::new(tmp.path()), &mut NullSink).unwrap();

        let doc = entry(&bytes, &doc_path(&href));
        assert!(doc.contains("<title>A &lt;x&gt;</title>"));
        assert!(doc.contains("href=\"../style.css\""));
        assert!(doc.contains("<h3>A</h3>\n<p>first</p>\n<p>second</p>"));
    }

    #[test]
    fn missing_chapter_is_written_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = MemoryStore::new();
        let toc = vec![TocNode::leaf("Ghost", "404")];
        let bytes = assemble(&meta(), &toc, &store, &Library::new(tmp.path()), &mut NullSink).unwrap();
        let doc = entry(&bytes, "OEBPS/chapter404.html");
        assert!(doc.contains("<body>\n</body>"));
    }

    #[test]
    fn cover_and_images_are_packaged() {
        let tmp = tempfile::TempDir::new().unwrap();
        let library = Library::new(tmp.path());
        library.save_cover("1", b"\xFF\xD8\xFFjpeg").unwrap();
        let stored = library.store_image("1", "png", b"png-bytes").unwrap();
        let mut store = MemoryStore::new();
        let h = fill(&mut store, &["One"]);
        let toc = vec![TocNode::leaf("One", &h[0])];

        let bytes = assemble(&meta(), &toc, &store, &library, &mut NullSink).unwrap();
        let opf = entry(&bytes, "content.opf");
        assert!(opf.contains("<meta name=\"cover\" content=\"cover-image\"/>"));
        assert!(opf.contains(&format!(
            "<item id=\"img0\" href=\"OEBPS/{stored}\" media-type=\"image/png\"/>"
        )));
        assert_eq!(spine_hrefs(&bytes)[0], "OEBPS/cover.html");
        assert!(opf.contains(
            "<item id=\"cover-image\" href=\"OEBPS/cover.jpg\" media-type=\"image/jpeg\"/>"
        ));
        let mut archive = zip::ZipArchive::new(Cursor::new(&bytes)).unwrap();
        let mut cover = Vec::new();
        archive.by_name("OEBPS/cover.jpg").unwrap().read_to_end(&mut cover).unwrap();
        assert_eq!(cover, b"\xFF\xD8\xFFjpeg");
        assert_eq!(entry(&bytes, &format!("OEBPS/{stored}")), "png-bytes");
        assert!(entry(&bytes, "OEBPS/cover.html").contains("src=\"cover.jpg\""));
    }

    #[test]
    fn png_cover_keeps_its_type() {
        let tmp = tempfile::TempDir::new().unwrap();
        let library = Library::new(tmp.path());
        library.save_cover("1", b"\x89PNG\r\n\x1a\npixels").unwrap();

        let bytes = assemble(&meta(), &[], &MemoryStore::new(), &library, &mut NullSink).unwrap();
        let opf = entry(&bytes, "content.opf");
        assert!(opf.contains(
            "<item id=\"cover-image\" href=\"OEBPS/cover.png\" media-type=\"image/png\"/>"
        ));
        assert!(!opf.contains("image/jpeg"));
        assert!(entry(&bytes, "OEBPS/cover.html").contains("src=\"cover.png\""));
        let names: Vec<String> = zip::ZipArchive::new(Cursor::new(&bytes))
            .unwrap()
            .file_names()
            .map(str::to_string)
            .collect();
        assert!(names.contains(&"OEBPS/cover.png".to_string()));
        assert!(!names.contains(&"OEBPS/cover.jpg".to_string()));
    }

    #[test]
    fn sanitised_href_collisions_get_distinct_names() {
        let tmp = tempfile::TempDir::new().unwrap();
        let toc = vec![TocNode::leaf("Slash", "a/b"), TocNode::leaf("Underscore", "a_b")];

        let bytes = assemble(&meta(), &toc, &MemoryStore::new(), &Library::new(tmp.path()), &mut NullSink).unwrap();
        let spine = spine_hrefs(&bytes);
        assert_eq!(spine, vec!["OEBPS/chaptera_b.html", "OEBPS/chaptera_b-2.html"]);
        assert_eq!(spine, ncx_hrefs(&bytes));
        assert!(entry(&bytes, &spine[0]).contains("<title>Slash</title>"));
        assert!(entry(&bytes, &spine[1]).contains("<title>Underscore</title>"));
        let opf = entry(&bytes, "content.opf");
        assert!(opf.contains("<itemref idref=\"chapa_b\"/>\n    <itemref idref=\"chapa_b-2\"/>"));
    }

    #[test]
    fn chapter_documents_are_well_formed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        let bodies = [
            "<ul><li><p>one</p></li></ul><p><em>a<br/>b</em></p>",
            "<ul><li>\none\n</li></ul>\n<em>a\nb</em>\n",
            "plain &amp; simple\n<b>bold\nacross lines</b> tail\n<h2 id=\"t\">Head</h2>after",
            "<img src=\"images/x.png\" alt=\"a &quot;b&quot;\" /> caption\n<i>open",
        ];
        let toc: Vec<TocNode> = bodies
            .iter()
            .map(|body| {
                let href = store.add_chapter(NewChapter::new("1", "C", *body)).unwrap();
                TocNode::leaf("C", &href)
            })
            .collect();

        let bytes = assemble(&meta(), &toc, &store, &Library::new(tmp.path()), &mut NullSink).unwrap();
        for href in spine_hrefs(&bytes) {
            assert_well_formed(&entry(&bytes, &href));
        }

        let second = entry(&bytes, &doc_path(&toc[1].href));
        assert!(second.contains("<ul><li>\none\n</li></ul>\n<p><em>a<br/>b</em></p>"));
        let third = entry(&bytes, &doc_path(&toc[2].href));
        assert!(third.contains(
            "<p>plain &amp; simple</p>\n<p><b>bold<br/>across lines</b> tail</p>\n<h2 id=\"t\">Head</h2>\n<p>after</p>"
        ));
        let fourth = entry(&bytes, &doc_path(&toc[3].href));
        assert!(fourth.contains(
            "<p><img src=\"images/x.png\" alt=\"a &quot;b&quot;\"/> caption</p>\n<p><i>open</i></p>"
        ));
    }

    #[test]
    fn metadata_is_escaped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let bytes = assemble(&meta(), &[], &MemoryStore::new(), &Library::new(tmp.path()), &mut NullSink).unwrap();
        let opf = entry(&bytes, "content.opf");
        assert!(opf.contains("<dc:title>Tom &amp; Jerry</dc:title>"));
        assert!(opf.contains("urn:uuid:"));
        assert!(!opf.contains("<meta name=\"cover\""));
        assert!(spine_hrefs(&bytes).is_empty());
    }

    #[test]
    fn duplicate_hrefs_are_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let toc = vec![TocNode::leaf("A", "1"), TocNode::leaf("B", "1")];
        let err = assemble(&meta(), &toc, &MemoryStore::new(), &Library::new(tmp.path()), &mut NullSink);
        assert!(matches!(err, Err(SmithError::InvalidToc(_))));
    }

    #[test]
    fn progress_is_reported_per_chapter() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        let h = fill(&mut store, &["One", "Two"]);
        let toc = vec![TocNode::leaf("One", &h[0]), TocNode::leaf("Two", &h[1])];
        let mut rec = Recorder::new();
        assemble(&meta(), &toc, &store, &Library::new(tmp.path()), &mut rec).unwrap();
        assert_eq!(
            rec.events,
            vec![
                Event::ShowTip("One (1/2)".into()),
                Event::ShowTip("Two (2/2)".into()),
                Event::HideTip(Some("EPUB created".into())),
            ]
        );
    }

    #[test]
    fn assembled_book_reads_back() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        let h = fill(&mut store, &["Part", "Inner"]);
        let toc = vec![TocNode::with_children(
            "Part",
            &h[0],
            vec![TocNode::leaf("Inner", &h[1])],
        )];
        let bytes = assemble(&meta(), &toc, &store, &Library::new(tmp.path()), &mut NullSink).unwrap();

        let book = read_epub_from(Cursor::new(bytes)).unwrap();
        assert_eq!(book.title(), Some("Tom & Jerry"));
        assert_eq!(book.navigation.toc[0].label, "Part");
        assert_eq!(book.navigation.toc[0].children[0].label, "Inner");
        let doc = book.document(&book.navigation.toc[0].children[0].href).unwrap();
        assert!(doc.contains("<p>Body of Inner</p>"));
    }

    #[test]
    fn write_epub_file_replaces_atomically() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("out").join("book.epub");
        write_epub_file(b"one", &path).unwrap();
        write_epub_file(b"two", &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
        assert!(!path.with_extension("epub.tmp").exists());
    }
}
