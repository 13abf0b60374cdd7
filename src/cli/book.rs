use super::SplitArgs;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum BookCommand {
    /// Import a text manuscript or an EPUB into the library
    Import {
        /// Path to a .txt or .epub file
        file: PathBuf,
        #[command(flatten)]
        split: SplitArgs,
        /// Book title (defaults to the file's own title or name)
        #[arg(long)]
        title: Option<String>,
        /// Book author
        #[arg(long)]
        author: Option<String>,
        /// Book description
        #[arg(long)]
        description: Option<String>,
        /// Append the chapters to this existing book instead
        #[arg(long, value_name = "BOOK")]
        into: Option<String>,
    },
    /// List books in the library
    List,
    /// Show information about a book
    Info {
        /// Book ID
        id: String,
    },
    /// Change a book's title, author or description
    Update {
        /// Book ID
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Remove a book from the library listing
    Delete {
        /// Book ID
        id: String,
    },
    /// Assemble a book into an EPUB file
    Export {
        /// Book ID
        id: String,
        /// Output EPUB file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Export a book as one plain-text or HTML document
    Text {
        /// Book ID
        id: String,
        /// Keep chapter markup and emit HTML headings
        #[arg(long)]
        html: bool,
        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
