//! Turning manuscripts and existing EPUBs into stored books.

use crate::config::LibraryConfig;
use crate::epub::reader::read_epub;
use crate::epub::{NavPoint, SourceBook};
use crate::error::Result;
use crate::events::{Event, EventSink};
use crate::library::{IMAGE_EXTENSIONS, Library};
use crate::markup::parse_document;
use crate::markup::rich_text::{ImageMap, extract};
use crate::segment::{segment_with_pattern, with_heading};
use crate::store::{BookRecord, ContentStore, NewBook, NewChapter};
use crate::toc::{TocTree, load_outline};
use crate::util::xml_escape;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub chapter_pattern: String,
    pub fallback_label: String,
    pub title_in_body: bool,
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    /// Append to this existing book instead of creating one.
    pub into: Option<String>,
    defaults: NewBook,
}

impl ImportOptions {
    pub fn from_config(config: &LibraryConfig) -> Self {
        Self {
            chapter_pattern: config.chapter_pattern.clone(),
            fallback_label: config.fallback_label.clone(),
            title_in_body: config.title_in_body,
            title: None,
            author: None,
            description: None,
            into: None,
            defaults: NewBook {
                title: config.default_title.clone(),
                author: config.default_author.clone(),
                description: config.default_description.clone(),
                toc: Vec::new(),
            },
        }
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from_config(&LibraryConfig::default())
    }
}

/// Outcome of an import.
#[derive(Debug, Clone)]
pub struct ImportedBook {
    pub book: BookRecord,
    /// Chapters added by this import.
    pub chapters: usize,
    pub images: usize,
    pub cover: bool,
}

/// Create the target book, or load the one named by `into`, with its outline.
fn open_target(
    opts: &ImportOptions,
    found: NewBook,
    store: &mut dyn ContentStore,
) -> Result<(BookRecord, TocTree)> {
    if let Some(id) = &opts.into {
        return load_outline(store, id);
    }
    let pick = |explicit: &Option<String>, found: String, default: &str| {
        explicit
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or(Some(found).filter(|s| !s.trim().is_empty()))
            .unwrap_or_else(|| default.to_string())
    };
    let book = store.add_book(NewBook {
        title: pick(&opts.title, found.title, &opts.defaults.title),
        author: pick(&opts.author, found.author, &opts.defaults.author),
        description: pick(
            &opts.description,
            found.description,
            &opts.defaults.description,
        ),
        toc: Vec::new(),
    })?;
    log::info!("created book {} \"{}\"", book.id, book.title);
    Ok((book, TocTree::new()))
}

fn finish(
    book: &BookRecord,
    tree: &TocTree,
    store: &mut dyn ContentStore,
    events: &mut dyn EventSink,
) -> Result<BookRecord> {
    store.update_toc(&book.id, &tree.to_nodes())?;
    events.emit(Event::HideTip(None));
    store.get_book(&book.id)
}

/// Segment a manuscript and store every chapter at the top level.
///
/// Bodies are stored escaped so they can go into XHTML as they are. Text with
/// no chapter heading at all becomes a single chapter under the fallback label.
pub fn import_text(
    text: &str,
    opts: &ImportOptions,
    store: &mut dyn ContentStore,
    events: &mut dyn EventSink,
) -> Result<ImportedBook> {
    let mut records = segment_with_pattern(text, &opts.fallback_label, &opts.chapter_pattern, false)
        .into_iter()
        .map(|r| (r.label, r.content))
        .collect::<Vec<_>>();
    if records.is_empty() && !text.trim().is_empty() {
        log::info!("no chapter headings found, importing as one chapter");
        records.push((opts.fallback_label.clone(), text.trim().to_string()));
    }

    let (book, mut tree) = open_target(opts, NewBook::default(), store)?;
    let total = records.len();
    for (i, (label, body)) in records.iter().enumerate() {
        events.emit(Event::ShowTip(format!("Importing {label} ({}/{total})", i + 1)));
        let body = xml_escape(body);
        let content = if opts.title_in_body {
            with_heading(label, &body)
        } else {
            body
        };
        tree.insert(None, NewChapter::new(&book.id, label, content), store, events)?;
    }

    let book = finish(&book, &tree, store, events)?;
    Ok(ImportedBook {
        book,
        chapters: total,
        images: 0,
        cover: false,
    })
}

/// Read a text file as UTF-8, replacing invalid sequences, and import it.
pub fn import_text_file(
    path: &Path,
    opts: &ImportOptions,
    store: &mut dyn ContentStore,
    events: &mut dyn EventSink,
) -> Result<ImportedBook> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let mut opts = opts.clone();
    if opts.title.is_none() && opts.into.is_none() {
        opts.title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned());
    }
    import_text(&text, &opts, store, events)
}

/// Import an EPUB: images, cover, and every navigation entry with its text.
pub fn import_epub(
    path: &Path,
    opts: &ImportOptions,
    store: &mut dyn ContentStore,
    library: &Library,
    events: &mut dyn EventSink,
) -> Result<ImportedBook> {
    let source = read_epub(path)?;
    import_source(&source, opts, store, library, events)
}

/// Import an already opened EPUB.
pub fn import_source(
    source: &SourceBook,
    opts: &ImportOptions,
    store: &mut dyn ContentStore,
    library: &Library,
    events: &mut dyn EventSink,
) -> Result<ImportedBook> {
    let found = NewBook {
        title: source.title().unwrap_or_default().to_string(),
        author: source.author().unwrap_or_default().to_string(),
        description: source.metadata.description.clone().unwrap_or_default(),
        toc: Vec::new(),
    };
    let (book, mut tree) = open_target(opts, found, store)?;

    let images = copy_images(source, library, &book.id)?;

    let mut cover = false;
    if opts.into.is_none()
        && let Some((key, data)) = source.cover_image()
    {
        library.save_cover(&book.id, data)?;
        log::debug!("saved cover from {key}");
        cover = true;
    }

    let points = if source.navigation.toc.is_empty() {
        log::info!("no table of contents, importing in spine order");
        spine_points(source)
    } else {
        source.navigation.toc.clone()
    };

    let mut importer = PointImporter {
        source,
        images: &images,
        book_id: &book.id,
        tree: &mut tree,
        store,
        events,
        added: 0,
    };
    let total = points.len();
    for (i, point) in points.iter().enumerate() {
        importer.events.emit(Event::ShowTip(format!(
            "Importing {} ({}/{total})",
            point.label,
            i + 1
        )));
        importer.insert(point, None)?;
    }
    let added = importer.added;

    let book = finish(&book, &tree, store, events)?;
    Ok(ImportedBook {
        book,
        chapters: added,
        images: images.len(),
        cover,
    })
}

/// Copy every non-empty image entry under a fresh name. Entries are visited
/// in path order so repeated imports rename the same way.
fn copy_images(source: &SourceBook, library: &Library, book_id: &str) -> Result<ImageMap> {
    let mut keys: Vec<&String> = source
        .resources
        .keys()
        .filter(|k| image_extension(k).is_some())
        .collect();
    keys.sort();

    let mut images = ImageMap::new();
    for key in keys {
        let data = &source.resources[key];
        if data.is_empty() {
            continue;
        }
        let Some(ext) = image_extension(key) else {
            continue;
        };
        let renamed = library.store_image(book_id, &ext, data)?;
        log::debug!("image {key} -> {renamed}");
        images.insert(key.clone(), renamed);
    }
    Ok(images)
}

fn image_extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Linear spine documents as flat entries, labelled by their `<title>` or
/// file name.
fn spine_points(source: &SourceBook) -> Vec<NavPoint> {
    source
        .spine
        .iter()
        .filter(|s| s.linear)
        .filter_map(|s| source.manifest.iter().find(|m| m.id == s.idref))
        .filter(|m| m.media_type.contains("html"))
        .map(|m| {
            let title = source
                .document(&m.href)
                .and_then(|doc| parse_document(&doc).find("title").map(|t| t.text()))
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
            let label = title.unwrap_or_else(|| {
                let name = m.href.rsplit('/').next().unwrap_or(&m.href);
                name.rsplit_once('.').map_or(name, |(stem, _)| stem).to_string()
            });
            NavPoint {
                label,
                href: m.href.clone(),
                children: Vec::new(),
            }
        })
        .collect()
}

struct PointImporter<'a> {
    source: &'a SourceBook,
    images: &'a ImageMap,
    book_id: &'a str,
    tree: &'a mut TocTree,
    store: &'a mut dyn ContentStore,
    events: &'a mut dyn EventSink,
    added: usize,
}

impl PointImporter<'_> {
    /// Store a navigation entry, then its children under the href it was given.
    fn insert(&mut self, point: &NavPoint, parent: Option<&str>) -> Result<()> {
        let content = match self.source.document(&point.href) {
            Some(doc) => extract(&parse_document(&doc), Some(self.images))
                .trim()
                .to_string(),
            None => {
                log::warn!("no document for {} ({}), importing it empty", point.label, point.href);
                String::new()
            }
        };
        let chapter =
            NewChapter::new(self.book_id, &point.label, content).with_source_href(&point.href);
        let href = self
            .tree
            .insert(parent, chapter, &mut *self.store, &mut *self.events)?;
        self.added += 1;
        for child in &point.children {
            self.insert(child, Some(&href))?;
        }
        Ok(())
    }
}
