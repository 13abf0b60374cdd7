use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum LibraryCommand {
    /// Pack the whole library directory into a ZIP file
    Backup {
        /// Output ZIP file path
        file: PathBuf,
    },
    /// Unpack a backup into the library, replacing files of the same name
    Restore {
        /// Backup ZIP file
        file: PathBuf,
    },
    /// Delete every book, chapter, cover, image and the config
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}
