use crate::error::{Result, SmithError};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

pub fn open_epub(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path)?;
    Ok(ZipArchive::new(file)?)
}

/// The first entry must be an uncompressed `mimetype` naming EPUB.
pub fn validate_mimetype<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<()> {
    let mut mimetype = archive
        .by_index(0)
        .map_err(|_| SmithError::InvalidEpub("missing mimetype entry".into()))?;

    if mimetype.name() != "mimetype" {
        return Err(SmithError::InvalidEpub(
            "first entry must be 'mimetype'".into(),
        ));
    }

    let mut content = String::new();
    mimetype.read_to_string(&mut content)?;
    if content.trim() != "application/epub+zip" {
        return Err(SmithError::InvalidEpub(format!(
            "invalid mimetype: {content}"
        )));
    }
    Ok(())
}

pub fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .map_err(|_| SmithError::InvalidEpub(format!("missing entry: {name}")))?;
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

pub fn read_entry_string<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String> {
    let bytes = read_entry(archive, name)?;
    String::from_utf8(bytes)
        .map_err(|e| SmithError::InvalidEpub(format!("invalid UTF-8 in {name}: {e}")))
}

/// Names of all file entries, in archive order.
pub fn list_entries<R: Read + Seek>(archive: &ZipArchive<R>) -> Vec<String> {
    (0..archive.len())
        .filter_map(|i| archive.name_for_index(i).map(|s| s.to_string()))
        .filter(|name| !name.ends_with('/'))
        .collect()
}
