use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum TocCommand {
    /// Show a book's outline
    Show {
        /// Book ID
        book: String,
        /// Maximum depth to display
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Remove a chapter and everything nested under it
    Remove { book: String, href: String },
    /// Move a chapter out of its parent, right after it
    Promote { book: String, href: String },
    /// Nest a chapter under its previous sibling
    Demote { book: String, href: String },
    /// Swap a chapter with its previous sibling
    Up { book: String, href: String },
    /// Swap a chapter with its next sibling
    Down { book: String, href: String },
    /// Move a chapter (with its children) to just after another
    Move {
        book: String,
        /// Chapter href to move
        from: String,
        /// Chapter href to land after
        to: String,
    },
    /// Relabel a chapter in the outline
    Rename {
        book: String,
        href: String,
        label: String,
    },
}
