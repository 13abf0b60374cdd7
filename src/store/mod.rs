//! The content store: books, their outlines, and chapter bodies.
//!
//! Chapter hrefs are handed out by the store and double as the key for the
//! chapter body, so an outline node and its text are always joined by href.

pub mod disk;
pub mod memory;

pub use disk::LibraryStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::toc::TocNode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    #[serde(default)]
    pub toc: Vec<TocNode>,
    #[serde(default)]
    pub deleted: bool,
    pub created: String,
    pub updated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: String,
    pub toc: Vec<TocNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChapter {
    pub id: String,
    pub book_id: String,
    pub label: String,
    /// Href the chapter had in its source, if any; the store's id replaces it.
    #[serde(default)]
    pub source_href: String,
    pub content: String,
    pub created: String,
    pub updated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewChapter {
    pub book_id: String,
    pub label: String,
    pub href: String,
    pub content: String,
}

impl NewChapter {
    pub fn new(
        book_id: impl Into<String>,
        label: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            book_id: book_id.into(),
            label: label.into(),
            href: String::new(),
            content: content.into(),
        }
    }

    pub fn with_source_href(mut self, href: impl Into<String>) -> Self {
        self.href = href.into();
        self
    }
}

pub trait ContentStore {
    fn add_book(&mut self, book: NewBook) -> Result<BookRecord>;

    fn get_book(&self, id: &str) -> Result<BookRecord>;

    /// Books that have not been deleted, oldest first.
    fn list_books(&self) -> Result<Vec<BookRecord>>;

    /// Update the display fields of a book.
    fn update_book(&mut self, id: &str, title: &str, author: &str, description: &str)
    -> Result<()>;

    fn update_toc(&mut self, id: &str, toc: &[TocNode]) -> Result<()>;

    /// Soft delete: the book disappears from listings but its data stays.
    fn delete_book(&mut self, id: &str) -> Result<()>;

    /// Persist a chapter body and return the href assigned to it.
    fn add_chapter(&mut self, chapter: NewChapter) -> Result<String>;

    fn get_chapter(&self, id: &str) -> Result<StoredChapter>;

    /// `content: None` changes the label only.
    fn update_chapter(&mut self, id: &str, label: &str, content: Option<&str>) -> Result<()>;
}
