//! Split manuscripts into chapters, keep them in a library with an editable
//! outline, and bind any book back into an EPUB.

pub mod config;
pub mod epub;
pub mod error;
pub mod events;
pub mod export;
pub mod import;
pub mod library;
pub mod markup;
pub mod segment;
pub mod store;
pub mod toc;
pub mod util;
