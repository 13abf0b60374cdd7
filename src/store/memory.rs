use super::{BookRecord, ContentStore, NewBook, NewChapter, StoredChapter};
use crate::error::{Result, SmithError};
use crate::toc::TocNode;
use crate::util::format_iso8601;
use std::collections::BTreeMap;

/// In-process store. Ids are sequential integers rendered as strings.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    books: Vec<BookRecord>,
    chapters: BTreeMap<String, StoredChapter>,
    next_book: u64,
    next_chapter: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    fn book_mut(&mut self, id: &str) -> Result<&mut BookRecord> {
        self.books
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| SmithError::NotFound(format!("book {id}")))
    }
}

impl ContentStore for MemoryStore {
    fn add_book(&mut self, book: NewBook) -> Result<BookRecord> {
        self.next_book += 1;
        let now = format_iso8601();
        let record = BookRecord {
            id: self.next_book.to_string(),
            title: book.title,
            author: book.author,
            description: book.description,
            toc: book.toc,
            deleted: false,
            created: now.clone(),
            updated: now,
        };
        self.books.push(record.clone());
        Ok(record)
    }

    fn get_book(&self, id: &str) -> Result<BookRecord> {
        self.books
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| SmithError::NotFound(format!("book {id}")))
    }

    fn list_books(&self) -> Result<Vec<BookRecord>> {
        Ok(self.books.iter().filter(|b| !b.deleted).cloned().collect())
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
        Ok(())
    }

    fn update_toc(&mut self, id: &str, toc: &[TocNode]) -> Result<()> {
        let book = self.book_mut(id)?;
        book.toc = toc.to_vec();
        book.updated = format_iso8601();
        Ok(())
    }

    fn delete_book(&mut self, id: &str) -> Result<()> {
        let book = self.book_mut(id)?;
        book.deleted = true;
        book.updated = format_iso8601();
        Ok(())
    }

    fn add_chapter(&mut self, chapter: NewChapter) -> Result<String> {
        self.next_chapter += 1;
        let id = self.next_chapter.to_string();
        let now = format_iso8601();
        self.chapters.insert(
            id.clone(),
            StoredChapter {
                id: id.clone(),
                book_id: chapter.book_id,
                label: chapter.label,
                source_href: chapter.href,
                content: chapter.content,
                created: now.clone(),
                updated: now,
            },
        );
        Ok(id)
    }

    fn get_chapter(&self, id: &str) -> Result<StoredChapter> {
        self.chapters
            .get(id)
            .cloned()
            .ok_or_else(|| SmithError::NotFound(format!("chapter {id}")))
    }

    fn update_chapter(&mut self, id: &str, label: &str, content: Option<&str>) -> Result<()> {
        let chapter = self
            .chapters
            .get_mut(id)
            .ok_or_else(|| SmithError::NotFound(format!("chapter {id}")))?;
        chapter.label = label.to_string();
        if let Some(content) = content {
            chapter.content = content.to_string();
        }
        chapter.updated = format_iso8601();
        Ok(())
    }
}
