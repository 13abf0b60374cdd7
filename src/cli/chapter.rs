use super::SplitArgs;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum ChapterCommand {
    /// Show how a manuscript would be split, without importing it
    Split {
        /// Path to the text file
        file: PathBuf,
        #[command(flatten)]
        split: SplitArgs,
    },
    /// Print a stored chapter
    Show {
        /// Chapter href
        id: String,
    },
    /// Add a chapter to a book's outline
    Add {
        /// Book ID
        book: String,
        /// Chapter label
        #[arg(long)]
        label: String,
        /// Nest under this chapter href
        #[arg(long)]
        parent: Option<String>,
        /// Text file with the chapter body
        #[arg(long)]
        content: Option<PathBuf>,
    },
    /// Change a chapter's label or body
    Edit {
        /// Book ID
        book: String,
        /// Chapter href
        href: String,
        /// New label
        #[arg(long)]
        label: Option<String>,
        /// Text file with the new body
        #[arg(long)]
        content: Option<PathBuf>,
    },
}
