//! EPUB packaging and the subset of EPUB reading needed for re-import.

pub mod container;
pub mod navigation;
pub mod opf;
pub mod reader;
pub mod writer;
pub mod zip_utils;

pub use writer::{assemble, write_epub_file};

use crate::store::BookRecord;
use crate::util::{find_resource_key, resolve_href};
use std::collections::HashMap;

/// Display fields of the book being packaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMetadata {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub language: String,
}

impl BookMetadata {
    pub fn from_record(record: &BookRecord, language: &str) -> Self {
        Self {
            book_id: record.id.clone(),
            title: record.title.clone(),
            author: record.author.clone(),
            description: record.description.clone(),
            language: language.to_string(),
        }
    }
}

/// An EPUB opened for import.
#[derive(Debug, Default)]
pub struct SourceBook {
    pub metadata: SourceMetadata,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    pub navigation: Navigation,
    /// Every archive entry except `mimetype` and `META-INF/*`, keyed by full path.
    pub resources: HashMap<String, Vec<u8>>,
    /// Directory of the package document, `""` or ending in `/`.
    pub opf_dir: String,
}

/// Dublin Core fields read from the package document.
#[derive(Debug, Default, Clone)]
pub struct SourceMetadata {
    pub titles: Vec<String>,
    pub creators: Vec<String>,
    pub description: Option<String>,
    /// Manifest id named by `<meta name="cover">`.
    pub cover_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl ManifestItem {
    pub fn has_property(&self, name: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|p| p.split_whitespace().any(|p| p == name))
    }
}

#[derive(Debug, Clone)]
pub struct SpineItem {
    pub idref: String,
    pub linear: bool,
}

#[derive(Debug, Default)]
pub struct Navigation {
    pub toc: Vec<NavPoint>,
    pub epub_version: EpubVersion,
}

/// One entry of a source book's table of contents. `href` is relative to the
/// package document directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavPoint {
    pub label: String,
    pub href: String,
    pub children: Vec<NavPoint>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EpubVersion {
    V2,
    #[default]
    V3,
}

impl std::fmt::Display for EpubVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EpubVersion::V2 => write!(f, "2.0"),
            EpubVersion::V3 => write!(f, "3.0"),
        }
    }
}

impl SourceBook {
    pub fn title(&self) -> Option<&str> {
        self.metadata.titles.first().map(String::as_str)
    }

    pub fn author(&self) -> Option<&str> {
        self.metadata.creators.first().map(String::as_str)
    }

    /// Archive key of a resource referenced from the package document.
    pub fn resource_key(&self, href: &str) -> Option<String> {
        let full = resolve_href(&self.opf_dir, href);
        if full.is_empty() {
            return None;
        }
        find_resource_key(&self.resources, &full)
    }

    /// Text of the document an href points at, fragment ignored.
    pub fn document(&self, href: &str) -> Option<String> {
        let key = self.resource_key(href)?;
        self.resources
            .get(&key)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// The cover image's archive key and bytes.
    ///
    /// EPUB 2 names the cover through `<meta name="cover">`; EPUB 3 marks the
    /// manifest item with `properties="cover-image"`.
    pub fn cover_image(&self) -> Option<(String, &[u8])> {
        let item = self
            .metadata
            .cover_id
            .as_deref()
            .and_then(|id| self.manifest.iter().find(|m| m.id == id))
            .or_else(|| self.manifest.iter().find(|m| m.has_property("cover-image")))?;
        let key = self.resource_key(&item.href)?;
        let data = self.resources.get(&key)?;
        Some((key, data.as_slice()))
    }
}
