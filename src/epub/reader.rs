use crate::epub::{SourceBook, container, navigation, opf, zip_utils};
use crate::error::Result;
use crate::util::archive_dir;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// Open an EPUB file for import.
pub fn read_epub(path: &Path) -> Result<SourceBook> {
    let mut archive = zip_utils::open_epub(path)?;
    read_archive(&mut archive)
}

/// Open an EPUB held in memory or any other seekable reader.
pub fn read_epub_from<R: Read + Seek>(reader: R) -> Result<SourceBook> {
    let mut archive = ZipArchive::new(reader)?;
    read_archive(&mut archive)
}

fn read_archive<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<SourceBook> {
    zip_utils::validate_mimetype(archive)?;

    let container_xml = zip_utils::read_entry_string(archive, "META-INF/container.xml")?;
    let opf_path = container::parse_container(&container_xml)?;
    let opf_dir = archive_dir(&opf_path).to_string();

    let opf_xml = zip_utils::read_entry_string(archive, &opf_path)?;
    let opf_data = opf::parse_opf(&opf_xml)?;

    let mut resources = HashMap::new();
    for entry_name in zip_utils::list_entries(archive) {
        if entry_name == "mimetype" || entry_name.starts_with("META-INF/") {
            continue;
        }
        match zip_utils::read_entry(archive, &entry_name) {
            Ok(data) => {
                resources.insert(entry_name, data);
            }
            Err(e) => log::warn!("skipping unreadable entry {entry_name}: {e}"),
        }
    }

    let mut book = SourceBook {
        metadata: opf_data.metadata,
        manifest: opf_data.manifest,
        spine: opf_data.spine,
        resources,
        opf_dir,
        ..Default::default()
    };
    let nav = navigation::parse_navigation(&book.manifest, &|href| book.document(href))?;
    book.navigation = nav;
    log::debug!(
        "read EPUB {} with {} resources, {} top-level entries",
        book.navigation.epub_version,
        book.resources.len(),
        book.navigation.toc.len()
    );
    Ok(book)
}
