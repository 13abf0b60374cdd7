mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::output::OutputConfig;
use cli::{Cli, Resource, SplitArgs};
use epubsmith::config::LibraryConfig;
use epubsmith::epub::{self, BookMetadata};
use epubsmith::error::SmithError;
use epubsmith::events::LogSink;
use epubsmith::export::{ExportFormat, export};
use epubsmith::import::{self, ImportOptions};
use epubsmith::library::Library;
use epubsmith::segment::segment_with_pattern;
use epubsmith::store::{ContentStore, LibraryStore, NewChapter};
use epubsmith::toc::{self, TocNode, TocTree};
use epubsmith::util::xml_escape;
use std::path::{Path, PathBuf};

/// Format a byte count as a human-readable size string.
fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = OutputConfig::from_global(cli.json, cli.verbose, cli.quiet, cli.no_color);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(output.log_filter()))
        .format_timestamp(None)
        .init();

    let library = Library::new(cli.library.unwrap_or_else(Library::default_root));
    log::debug!("library at {}", library.root().display());

    match cli.command {
        Resource::Book { command } => handle_book(command, &library, &output)?,
        Resource::Chapter { command } => handle_chapter(command, &library, &output)?,
        Resource::Toc { command } => handle_toc(command, &library, &output)?,
        Resource::Library { command } => handle_library(command, &library, &output)?,
    }

    Ok(())
}

fn load_config(library: &Library) -> Result<LibraryConfig> {
    let path = library.config_path();
    LibraryConfig::load(&path).with_context(|| format!("failed to read {}", path.display()))
}

fn open_store(library: &Library) -> Result<LibraryStore> {
    LibraryStore::open(library)
        .with_context(|| format!("failed to open library at {}", library.root().display()))
}

/// Config values, overridden by whatever was given on the command line.
fn import_options(config: &LibraryConfig, split: &SplitArgs) -> ImportOptions {
    let mut opts = ImportOptions::from_config(config);
    if let Some(pattern) = &split.pattern {
        opts.chapter_pattern = pattern.clone();
    }
    if let Some(label) = &split.fallback_label {
        opts.fallback_label = label.clone();
    }
    opts.title_in_body |= split.title_in_body;
    opts
}

/// Read a text file, replacing invalid UTF-8.
fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn is_epub(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"))
}

fn chapter_count(toc: &[TocNode]) -> usize {
    toc::flatten(toc).len()
}

fn handle_book(
    command: cli::book::BookCommand,
    library: &Library,
    output: &OutputConfig,
) -> Result<()> {
    use cli::book::BookCommand;

    match command {
        BookCommand::Import {
            file,
            split,
            title,
            author,
            description,
            into,
        } => {
            let config = load_config(library)?;
            let mut store = open_store(library)?;
            let mut opts = import_options(&config, &split);
            opts.title = title;
            opts.author = author;
            opts.description = description;
            opts.into = into;

            let imported = if is_epub(&file) {
                import::import_epub(&file, &opts, &mut store, library, &mut LogSink)
            } else {
                import::import_text_file(&file, &opts, &mut store, &mut LogSink)
            }
            .with_context(|| format!("failed to import {}", file.display()))?;

            if output.json {
                output.print_json(&serde_json::json!({
                    "id": imported.book.id,
                    "title": imported.book.title,
                    "author": imported.book.author,
                    "chapters": imported.chapters,
                    "images": imported.images,
                    "cover": imported.cover,
                }))?;
            } else {
                output.status(&format!(
                    "Imported {} chapter(s) into book {} \"{}\"",
                    imported.chapters, imported.book.id, imported.book.title
                ));
                if imported.images > 0 || imported.cover {
                    output.detail(&format!(
                        "  {} image(s), cover: {}",
                        imported.images,
                        if imported.cover { "yes" } else { "no" }
                    ));
                }
            }
        }
        BookCommand::List => {
            let store = open_store(library)?;
            let books = store.list_books()?;

            if output.json {
                let json: Vec<serde_json::Value> = books
                    .iter()
                    .map(|b| {
                        serde_json::json!({
                            "id": b.id,
                            "title": b.title,
                            "author": b.author,
                            "chapters": chapter_count(&b.toc),
                            "updated": b.updated,
                        })
                    })
                    .collect();
                output.print_json(&json)?;
            } else if books.is_empty() {
                output.status("No books in the library");
            } else {
                let rows: Vec<Vec<String>> = books
                    .iter()
                    .map(|b| {
                        vec![
                            b.id.clone(),
                            b.title.clone(),
                            b.author.clone(),
                            chapter_count(&b.toc).to_string(),
                        ]
                    })
                    .collect();
                output.print_table(&["ID", "Title", "Author", "Chapters"], &rows);
            }
        }
        BookCommand::Info { id } => {
            let store = open_store(library)?;
            let (book, tree) =
                toc::load_outline(&store, &id).with_context(|| format!("failed to load book {id}"))?;
            let depth = toc::max_depth(&book.toc);
            let images = library.list_images(&book.id);
            let image_bytes: usize = images
                .iter()
                .filter_map(|img| std::fs::metadata(&img.path).ok())
                .map(|m| m.len() as usize)
                .sum();
            let cover = library.cover_path(&book.id).exists();

            if output.json {
                let mut info = serde_json::json!({
                    "id": book.id,
                    "title": book.title,
                    "author": book.author,
                    "description": book.description,
                    "chapters": tree.len(),
                    "depth": depth,
                    "images": images.len(),
                    "cover": cover,
                });
                if output.verbose {
                    info["created"] = serde_json::json!(book.created);
                    info["updated"] = serde_json::json!(book.updated);
                    info["image_bytes"] = serde_json::json!(image_bytes);
                }
                output.print_json(&info)?;
            } else {
                println!("ID:       {}", book.id);
                println!("Title:    {}", book.title);
                println!("Author:   {}", book.author);
                if !book.description.is_empty() {
                    println!("About:    {}", book.description);
                }
                println!("Chapters: {}", tree.len());
                println!("Depth:    {depth}");
                println!("Images:   {}", images.len());
                println!("Cover:    {}", if cover { "yes" } else { "no" });
                output.detail(&format!("Created:  {}", book.created));
                output.detail(&format!("Updated:  {}", book.updated));
                output.detail(&format!("Size:     {}", format_size(image_bytes)));
            }
        }
        BookCommand::Update {
            id,
            title,
            author,
            description,
        } => {
            if title.is_none() && author.is_none() && description.is_none() {
                bail!("nothing to update: pass --title, --author or --description");
            }
            let mut store = open_store(library)?;
            let (book, _) =
                toc::load_outline(&store, &id).with_context(|| format!("failed to load book {id}"))?;
            store
                .update_book(
                    &id,
                    title.as_deref().unwrap_or(&book.title),
                    author.as_deref().unwrap_or(&book.author),
                    description.as_deref().unwrap_or(&book.description),
                )
                .with_context(|| format!("failed to update book {id}"))?;
            output.status(&format!("Updated book {id}"));
        }
        BookCommand::Delete { id } => {
            let mut store = open_store(library)?;
            toc::load_outline(&store, &id).with_context(|| format!("failed to load book {id}"))?;
            store
                .delete_book(&id)
                .with_context(|| format!("failed to delete book {id}"))?;
            output.status(&format!("Deleted book {id}"));
        }
        BookCommand::Export {
            id,
            output: out_file,
        } => {
            let config = load_config(library)?;
            let store = open_store(library)?;
            let (book, _) =
                toc::load_outline(&store, &id).with_context(|| format!("failed to load book {id}"))?;

            let name = slug::slugify(&book.title);
            let epub_path = out_file.unwrap_or_else(|| {
                PathBuf::from(if name.is_empty() {
                    format!("book-{id}.epub")
                } else {
                    format!("{name}.epub")
                })
            });

            let metadata = BookMetadata::from_record(&book, &config.language);
            let bytes = epub::assemble(&metadata, &book.toc, &store, library, &mut LogSink)
                .with_context(|| format!("assembling book {id}"))?;
            epub::write_epub_file(&bytes, &epub_path)
                .with_context(|| format!("failed to write {}", epub_path.display()))?;

            if output.json {
                output.print_json(&serde_json::json!({
                    "id": book.id,
                    "path": epub_path,
                    "chapters": chapter_count(&book.toc),
                    "bytes": bytes.len(),
                }))?;
            } else {
                output.status(&format!("Exported {}", epub_path.display()));
                output.detail(&format!("  Size: {}", format_size(bytes.len())));
            }
        }
        BookCommand::Text {
            id,
            html,
            output: out_file,
        } => {
            let store = open_store(library)?;
            let (book, _) =
                toc::load_outline(&store, &id).with_context(|| format!("failed to load book {id}"))?;
            let format = if html {
                ExportFormat::Html
            } else {
                ExportFormat::Text
            };
            let text = export(&book.toc, &store, format, &mut LogSink);

            match out_file {
                Some(path) => {
                    if let Some(parent) = path.parent()
                        && !parent.as_os_str().is_empty()
                    {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &text)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    output.status(&format!("Wrote {}", path.display()));
                }
                None => print!("{text}"),
            }
        }
    }

    Ok(())
}

fn handle_chapter(
    command: cli::chapter::ChapterCommand,
    library: &Library,
    output: &OutputConfig,
) -> Result<()> {
    use cli::chapter::ChapterCommand;

    match command {
        ChapterCommand::Split { file, split } => {
            let config = load_config(library)?;
            let opts = import_options(&config, &split);
            let text = read_text(&file)?;
            let records = segment_with_pattern(
                &text,
                &opts.fallback_label,
                &opts.chapter_pattern,
                opts.title_in_body,
            );

            if output.json {
                output.print_json(&records)?;
            } else if records.is_empty() {
                output.status("No chapter headings found");
            } else {
                let rows: Vec<Vec<String>> = records
                    .iter()
                    .map(|r| {
                        vec![
                            (r.index + 1).to_string(),
                            r.label.clone(),
                            r.content.chars().count().to_string(),
                        ]
                    })
                    .collect();
                output.print_table(&["#", "Label", "Chars"], &rows);
            }
        }
        ChapterCommand::Show { id } => {
            let store = open_store(library)?;
            let chapter = store
                .get_chapter(&id)
                .with_context(|| format!("failed to load chapter {id}"))?;
            if output.json {
                output.print_json(&chapter)?;
            } else {
                println!("{}", chapter.label);
                println!();
                println!("{}", chapter.content);
            }
        }
        ChapterCommand::Add {
            book,
            label,
            parent,
            content,
        } => {
            let body = match &content {
                Some(path) => xml_escape(read_text(path)?.trim()),
                None => String::new(),
            };
            let mut store = open_store(library)?;
            let href = toc::modify_outline(&mut store, &book, |tree, store| {
                tree.insert(
                    parent.as_deref(),
                    NewChapter::new(&book, &label, body),
                    store,
                    &mut LogSink,
                )
            })
            .with_context(|| format!("failed to add chapter to book {book}"))?;

            if output.json {
                output.print_json(&serde_json::json!({ "book": book, "href": href }))?;
            } else {
                output.status(&format!("Added chapter {href} \"{label}\""));
            }
        }
        ChapterCommand::Edit {
            book,
            href,
            label,
            content,
        } => {
            if label.is_none() && content.is_none() {
                bail!("nothing to change: pass --label or --content");
            }
            let body = match &content {
                Some(path) => Some(xml_escape(read_text(path)?.trim())),
                None => None,
            };
            let mut store = open_store(library)?;
            toc::modify_outline(&mut store, &book, |tree, store| {
                let current = tree
                    .find(&href)
                    .map(|node| node.label().to_string())
                    .ok_or_else(|| SmithError::NotFound(format!("chapter {href}")))?;
                let label = label.clone().unwrap_or(current);
                store.update_chapter(&href, &label, body.as_deref())?;
                tree.rename(&href, &label, &mut LogSink);
                Ok(())
            })
            .with_context(|| format!("failed to edit chapter {href} of book {book}"))?;
            output.status(&format!("Updated chapter {href}"));
        }
    }

    Ok(())
}

/// Apply one structural edit and report whether it changed anything.
fn edit_outline(
    library: &Library,
    output: &OutputConfig,
    book: &str,
    hrefs: &[&str],
    done: &str,
    op: impl FnOnce(&mut TocTree) -> bool,
) -> Result<()> {
    let mut store = open_store(library)?;
    let changed = toc::modify_outline(&mut store, book, |tree, _| {
        if let Some(missing) = hrefs.iter().find(|h| !tree.contains(h)) {
            return Err(SmithError::NotFound(format!("chapter {missing}")));
        }
        Ok(op(tree))
    })
    .with_context(|| format!("failed to edit the outline of book {book}"))?;

    let href = hrefs.first().copied().unwrap_or_default();
    if output.json {
        output.print_json(&serde_json::json!({
            "book": book,
            "href": href,
            "changed": changed,
        }))?;
    } else if changed {
        output.status(&format!("{done} {href}"));
    } else {
        output.status(&format!("Outline unchanged: {href} cannot move that way"));
    }
    Ok(())
}

fn print_outline(nodes: &[TocNode], indent: usize, max_depth: Option<usize>) {
    if max_depth.is_some_and(|max| indent >= max) {
        return;
    }
    for node in nodes {
        println!("{}- {} [{}]", "  ".repeat(indent), node.label, node.href);
        print_outline(node.children(), indent + 1, max_depth);
    }
}

fn handle_toc(command: cli::toc::TocCommand, library: &Library, output: &OutputConfig) -> Result<()> {
    use cli::toc::TocCommand;

    match command {
        TocCommand::Show { book, depth } => {
            let store = open_store(library)?;
            let (record, _) = toc::load_outline(&store, &book)
                .with_context(|| format!("failed to load book {book}"))?;
            if output.json {
                output.print_json(&record.toc)?;
            } else if record.toc.is_empty() {
                output.status("Outline is empty");
            } else {
                print_outline(&record.toc, 0, depth);
            }
        }
        TocCommand::Remove { book, href } => {
            edit_outline(library, output, &book, &[href.as_str()], "Removed", |tree| {
                tree.delete(&href, &mut LogSink)
            })?;
        }
        TocCommand::Promote { book, href } => {
            edit_outline(library, output, &book, &[href.as_str()], "Promoted", |tree| {
                tree.promote(&href, &mut LogSink)
            })?;
        }
        TocCommand::Demote { book, href } => {
            edit_outline(library, output, &book, &[href.as_str()], "Demoted", |tree| {
                tree.demote(&href, &mut LogSink)
            })?;
        }
        TocCommand::Up { book, href } => {
            edit_outline(library, output, &book, &[href.as_str()], "Moved up", |tree| {
                tree.swap_earlier(&href, &mut LogSink)
            })?;
        }
        TocCommand::Down { book, href } => {
            edit_outline(library, output, &book, &[href.as_str()], "Moved down", |tree| {
                tree.swap_later(&href, &mut LogSink)
            })?;
        }
        TocCommand::Move { book, from, to } => {
            edit_outline(library, output, &book, &[from.as_str(), to.as_str()], "Moved", |tree| {
                tree.move_after(&from, &to, &mut LogSink)
            })?;
        }
        TocCommand::Rename { book, href, label } => {
            edit_outline(library, output, &book, &[href.as_str()], "Renamed", |tree| {
                tree.rename(&href, &label, &mut LogSink)
            })?;
        }
    }

    Ok(())
}

fn handle_library(
    command: cli::library::LibraryCommand,
    library: &Library,
    output: &OutputConfig,
) -> Result<()> {
    use cli::library::LibraryCommand;

    match command {
        LibraryCommand::Backup { file } => {
            let count = library
                .backup(&file)
                .with_context(|| format!("failed to back up {}", library.root().display()))?;
            if output.json {
                output.print_json(&serde_json::json!({ "path": file, "files": count }))?;
            } else {
                output.status(&format!("Backed up {count} files to {}", file.display()));
            }
        }
        LibraryCommand::Restore { file } => {
            let count = library
                .restore(&file)
                .with_context(|| format!("failed to restore {}", file.display()))?;
            if output.json {
                output.print_json(&serde_json::json!({ "path": file, "files": count }))?;
            } else {
                output.status(&format!("Restored {count} files from {}", file.display()));
            }
        }
        LibraryCommand::Clear { yes } => {
            if !yes {
                bail!(
                    "refusing to clear {} without --yes",
                    library.root().display()
                );
            }
            library
                .clear()
                .with_context(|| format!("failed to clear {}", library.root().display()))?;
            output.status(&format!("Cleared {}", library.root().display()));
        }
    }

    Ok(())
}
