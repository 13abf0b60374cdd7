pub mod book;
pub mod chapter;
pub mod library;
pub mod output;
pub mod toc;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "epubsmith",
    version,
    about = "Split manuscripts into chapters, edit the outline, and bind EPUB files"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Resource,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Library directory holding books, chapters, covers and images
    #[arg(long, global = true, env = "EPUBSMITH_LIBRARY", value_name = "DIR")]
    pub library: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Resource {
    /// Whole-book operations: import, list, info, update, delete, export, text
    Book {
        #[command(subcommand)]
        command: book::BookCommand,
    },
    /// Chapter operations: split, show, add, edit
    Chapter {
        #[command(subcommand)]
        command: chapter::ChapterCommand,
    },
    /// Outline operations: show, remove, promote, demote, up, down, move, rename
    Toc {
        #[command(subcommand)]
        command: toc::TocCommand,
    },
    /// Library maintenance: backup, restore, clear
    Library {
        #[command(subcommand)]
        command: library::LibraryCommand,
    },
}

/// Options controlling how a manuscript is cut into chapters.
/// Unset options fall back to the library config.
#[derive(Args, Debug, Clone, Default)]
pub struct SplitArgs {
    /// Regular expression matching chapter heading lines
    #[arg(long)]
    pub pattern: Option<String>,

    /// Label for text that precedes the first heading
    #[arg(long)]
    pub fallback_label: Option<String>,

    /// Repeat each chapter's label as a heading at the top of its body
    #[arg(long)]
    pub title_in_body: bool,
}
