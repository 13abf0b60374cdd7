use super::{BookRecord, ContentStore, NewBook, NewChapter, StoredChapter};
use crate::error::{Result, SmithError};
use crate::library::Library;
use crate::toc::TocNode;
use crate::util::format_iso8601;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Catalog {
    next_book_id: u64,
    next_chapter_id: u64,
    books: Vec<BookRecord>,
}

/// Store backed by JSON files inside a [`Library`] directory.
///
/// Books and id counters live in `catalog.json`; each chapter body is its own
/// file under `chapters/`. Every write goes to a temp file first and is then
/// renamed into place.
#[derive(Debug)]
pub struct LibraryStore {
    catalog_path: PathBuf,
    chapters_dir: PathBuf,
    catalog: Catalog,
}

impl LibraryStore {
    pub fn open(library: &Library) -> Result<Self> {
        library.ensure_dirs()?;
        let catalog_path = library.catalog_path();
        let catalog = if catalog_path.exists() {
            let data = std::fs::read(&catalog_path)?;
            serde_json::from_slice(&data)?
        } else {
            Catalog::default()
        };
        Ok(Self {
            catalog_path,
            chapters_dir: library.chapters_dir(),
            catalog,
        })
    }

    fn chapter_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SmithError::NotFound(format!("chapter {id}")));
        }
        Ok(self.chapters_dir.join(format!("{id}.json")))
    }

    fn save_catalog(&self) -> Result<()> {
        write_json(&self.catalog_path, &self.catalog)
    }

    fn book_mut(&mut self, id: &str) -> Result<&mut BookRecord> {
        self.catalog
            .books
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| SmithError::NotFound(format!("book {id}")))
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

impl ContentStore for LibraryStore {
    fn add_book(&mut self, book: NewBook) -> Result<BookRecord> {
        self.catalog.next_book_id += 1;
        let now = format_iso8601();
        let record = BookRecord {
            id: self.catalog.next_book_id.to_string(),
            title: book.title,
            author: book.author,
            description: book.description,
            toc: book.toc,
            deleted: false,
            created: now.clone(),
            updated: now,
        };
        self.catalog.books.push(record.clone());
        self.save_catalog()?;
        Ok(record)
    }

    fn get_book(&self, id: &str) -> Result<BookRecord> {
        self.catalog
            .books
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| SmithError::NotFound(format!("book {id}")))
    }

    fn list_books(&self) -> Result<Vec<BookRecord>> {
        Ok(self
            .catalog
            .books
            .iter()
            .filter(|b| !b.deleted)
            .cloned()
            .collect())
    }

    fn update_book(
        &mut self,
        id: &str,
        title: &str,
        author: &str,
        description: &str,
    ) -> Result<()> {
        let book = self.book_mut(id)?;
        book.title = title.to_string();
        book.author = author.to_string();
        book.description = description.to_string();
        book.updated = format_iso8601();
        self.save_catalog()
    }

    fn update_toc(&mut self, id: &str, toc: &[TocNode]) -> Result<()> {
        let book = self.book_mut(id)?;
        book.toc = toc.to_vec();
        book.updated = format_iso8601();
        self.save_catalog()
    }

    fn delete_book(&mut self, id: &str) -> Result<()> {
        let book = self.book_mut(id)?;
        book.deleted = true;
        book.updated = format_iso8601();
        self.save_catalog()
    }

    fn add_chapter(&mut self, chapter: NewChapter) -> Result<String> {
        self.catalog.next_chapter_id += 1;
        let id = self.catalog.next_chapter_id.to_string();
        let now = format_iso8601();
        let stored = StoredChapter {
            id: id.clone(),
            book_id: chapter.book_id,
            label: chapter.label,
            source_href: chapter.href,
            content: chapter.content,
            created: now.clone(),
            updated: now,
        };
        write_json(&self.chapter_path(&id)?, &stored)?;
        self.save_catalog()?;
        Ok(id)
    }

    fn get_chapter(&self, id: &str) -> Result<StoredChapter> {
        let path = self.chapter_path(id)?;
        if !path.exists() {
            return Err(SmithError::NotFound(format!("chapter {id}")));
        }
        let data = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn update_chapter(&mut self, id: &str, label: &str, content: Option<&str>) -> Result<()> {
        let mut chapter = self.get_chapter(id)?;
        chapter.label = label.to_string();
        if let Some(content) = content {
            chapter.content = content.to_string();
        }
        chapter.updated = format_iso8601();
        write_json(&self.chapter_path(id)?, &chapter)
    }
}
