use assert_cmd::Command;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A manuscript with a preface and three chapter headings.
#[allow(dead_code)]
pub const MANUSCRIPT: &str = "A short preface.

Chapter 1 The Start
It was a dark night.

Chapter 2 The Middle
Things & stuff happened.

Chapter 3 The End
Fin.
";

/// A throwaway library plus a scratch directory for input and output files.
pub struct TestLibrary {
    pub dir: TempDir,
}

#[allow(dead_code)]
impl TestLibrary {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("library")
    }

    /// A path in the scratch area, outside the library.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// The binary, pointed at this library.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("epubsmith").unwrap();
        cmd.env("EPUBSMITH_LIBRARY", self.root())
            .env_remove("RUST_LOG")
            .current_dir(self.dir.path());
        cmd
    }

    pub fn write(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, content).expect("write input file");
        path
    }

    /// Run a command with `--json` and parse what it printed.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let out = self
            .cmd()
            .args(args)
            .arg("--json")
            .output()
            .expect("run epubsmith");
        assert!(
            out.status.success(),
            "{args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        serde_json::from_slice(&out.stdout).expect("parse JSON output")
    }

    /// Import a file and return the new book's id.
    pub fn import(&self, file: &Path, extra: &[&str]) -> String {
        let mut args = vec!["book", "import", file.to_str().unwrap()];
        args.extend_from_slice(extra);
        let v = self.json(&args);
        v["id"].as_str().expect("book id").to_string()
    }

    /// Import [`MANUSCRIPT`] and return the book id.
    pub fn import_manuscript(&self) -> String {
        let file = self.write("novel.txt", MANUSCRIPT.as_bytes());
        self.import(&file, &[])
    }

    /// `(label, href)` pairs of the outline in reading order with their depth.
    pub fn outline(&self, book: &str) -> Vec<(usize, String, String)> {
        fn walk(nodes: &serde_json::Value, depth: usize, out: &mut Vec<(usize, String, String)>) {
            for node in nodes.as_array().into_iter().flatten() {
                out.push((
                    depth,
                    node["label"].as_str().unwrap_or_default().to_string(),
                    node["href"].as_str().unwrap_or_default().to_string(),
                ));
                walk(&node["subitems"], depth + 1, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.json(&["toc", "show", book]), 0, &mut out);
        out
    }
}

/// Write a small EPUB 3 with a nested navigation document, a cover and an
/// inline image.
#[allow(dead_code)]
pub fn write_sample_epub(path: &Path) {
    use zip::write::SimpleFileOptions;

    let file = std::fs::File::create(path).expect("create epub");
    let mut zip = zip::ZipWriter::new(file);
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let deflate = SimpleFileOptions::default();

    let mut put = |name: &str, data: &[u8], opts: SimpleFileOptions| {
        zip.start_file(name, opts).unwrap();
        zip.write_all(data).unwrap();
    };
    put("mimetype", b"application/epub+zip", stored);
    put(
        "META-INF/container.xml",
        br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OPS/package.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#,
        deflate,
    );
    put(
        "OPS/package.opf",
        br#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="id">urn:uuid:0b9d6a2e-3c1f-4d6e-9a51-6f1d2c3b4a59</dc:identifier>
    <dc:title>Sample Voyage</dc:title>
    <dc:creator>Jo Writer</dc:creator>
    <dc:language>en</dc:language>
    <dc:description>A test book.</dc:description>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="cover-img" href="img/cover.jpg" media-type="image/jpeg" properties="cover-image"/>
    <item id="map" href="img/map.png" media-type="image/png"/>
    <item id="part1" href="text/part1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="part1"/>
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#,
        deflate,
    );
    put(
        "OPS/nav.xhtml",
        br#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
<nav epub:type="toc"><ol>
  <li><a href="text/part1.xhtml">Part One</a>
    <ol>
      <li><a href="text/ch1.xhtml">Setting Sail</a></li>
      <li><a href="text/ch2.xhtml#top">Landfall</a></li>
    </ol>
  </li>
</ol></nav>
</body>
</html>"#,
        deflate,
    );
    put(
        "OPS/text/part1.xhtml",
        br#"<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Part One</title></head>
<body><h1>Part One</h1></body></html>"#,
        deflate,
    );
    put(
        "OPS/text/ch1.xhtml",
        br#"<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Setting Sail</title></head>
<body><p>The ship left <b>at dawn</b>.</p><p><img src="../img/map.png" alt="map"/></p></body></html>"#,
        deflate,
    );
    put(
        "OPS/text/ch2.xhtml",
        br#"<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Landfall</title></head>
<body><p id="top">Land &amp; sky &hearts;.</p><ul><li><p>one</p></li></ul><p><em>a<br/>b</em></p></body></html>"#,
        deflate,
    );
    put("OPS/img/cover.jpg", b"\xFF\xD8\xFFcover", stored);
    put("OPS/img/map.png", b"\x89PNGmap", stored);
    zip.finish().expect("finish epub");
}

/// Mimetype first and stored, container present.
#[allow(dead_code)]
pub fn assert_valid_epub(path: &Path) {
    let file = std::fs::File::open(path).expect("open epub");
    let mut archive = zip::ZipArchive::new(file).expect("open zip");

    let mimetype = archive.by_index(0).expect("first entry");
    assert_eq!(mimetype.name(), "mimetype");
    assert_eq!(mimetype.compression(), zip::CompressionMethod::Stored);
    drop(mimetype);

    assert_eq!(read_entry(path, "mimetype"), "application/epub+zip");
    archive
        .by_name("META-INF/container.xml")
        .expect("container.xml");
}

/// Read one archive entry as text.
#[allow(dead_code)]
pub fn read_entry(path: &Path, name: &str) -> String {
    let file = std::fs::File::open(path).expect("open epub");
    let mut archive = zip::ZipArchive::new(file).expect("open zip");
    let mut entry = archive
        .by_name(name)
        .unwrap_or_else(|_| panic!("missing entry {name}"));
    let mut content = String::new();
    entry.read_to_string(&mut content).expect("read entry");
    content
}

#[allow(dead_code)]
pub fn entry_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).expect("open epub");
    let archive = zip::ZipArchive::new(file).expect("open zip");
    archive.file_names().map(str::to_string).collect()
}
