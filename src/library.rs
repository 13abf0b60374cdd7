//! On-disk layout of the application data directory.
//!
//! ```text
//! <root>/config.yml
//! <root>/catalog.json
//! <root>/chapters/<href>.json
//! <root>/covers/<book>.jpg
//! <root>/epub/<book>/images/<name>
//! ```
//!
//! The whole directory can be packed into a ZIP backup and unpacked again.

use crate::error::{Result, SmithError};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// File extensions treated as images when importing an archive.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "svg"];

#[derive(Debug, Clone)]
pub struct Library {
    root: PathBuf,
}

/// An image stored for a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub path: PathBuf,
}

impl Library {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$HOME/.local/share/epubsmith`, or `./epubsmith-library` without a home.
    pub fn default_root() -> PathBuf {
        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("epubsmith"),
            None => PathBuf::from("epubsmith-library"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.yml")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("catalog.json")
    }

    pub fn chapters_dir(&self) -> PathBuf {
        self.root.join("chapters")
    }

    pub fn covers_dir(&self) -> PathBuf {
        self.root.join("covers")
    }

    pub fn cover_path(&self, book_id: &str) -> PathBuf {
        self.covers_dir().join(format!("{book_id}.jpg"))
    }

    pub fn images_dir(&self, book_id: &str) -> PathBuf {
        self.root.join("epub").join(book_id).join("images")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.chapters_dir())?;
        std::fs::create_dir_all(self.covers_dir())?;
        Ok(())
    }

    /// Write (or replace) the cover image of a book.
    pub fn save_cover(&self, book_id: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.cover_path(book_id);
        std::fs::create_dir_all(self.covers_dir())?;
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        std::fs::write(&path, data)?;
        Ok(path)
    }

    /// The cover bytes, or `None` when there is no cover or it cannot be read.
    pub fn read_cover(&self, book_id: &str) -> Option<Vec<u8>> {
        let path = self.cover_path(book_id);
        if !path.exists() {
            return None;
        }
        match std::fs::read(&path) {
            Ok(data) => Some(data),
            Err(e) => {
                log::warn!("skipping unreadable cover {}: {e}", path.display());
                None
            }
        }
    }

    /// Store an image under a fresh collision-free name and return its path
    /// relative to the chapter documents (`images/<name>`).
    pub fn store_image(&self, book_id: &str, ext: &str, data: &[u8]) -> Result<String> {
        let dir = self.images_dir(book_id);
        std::fs::create_dir_all(&dir)?;
        let name = format!("{}.{}", uuid::Uuid::new_v4().simple(), ext.to_ascii_lowercase());
        std::fs::write(dir.join(&name), data)?;
        Ok(format!("images/{name}"))
    }

    /// Images stored for a book, sorted by name. Unreadable directories yield
    /// an empty list.
    pub fn list_images(&self, book_id: &str) -> Vec<ImageFile> {
        let dir = self.images_dir(book_id);
        if !dir.is_dir() {
            return Vec::new();
        }
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("cannot list images in {}: {e}", dir.display());
                return Vec::new();
            }
        };
        let mut images: Vec<ImageFile> = entries
            .flatten()
            .filter(|e| e.path().is_file())
            .map(|e| ImageFile {
                name: e.file_name().to_string_lossy().into_owned(),
                path: e.path(),
            })
            .collect();
        images.sort_by(|a, b| a.name.cmp(&b.name));
        images
    }

    /// Remove the whole data directory.
    pub fn clear(&self) -> Result<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }

    /// Pack every file under the root into a ZIP at `dest`, named by its
    /// `/`-separated path relative to the root. Returns the file count.
    pub fn backup(&self, dest: &Path) -> Result<usize> {
        if !self.root.is_dir() {
            return Err(SmithError::NotFound(self.root.display().to_string()));
        }
        // Listed before `dest` is created so a backup inside the root does
        // not try to contain itself.
        let mut files = Vec::new();
        collect_files(&self.root, &mut files)?;
        files.sort();

        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut zip = ZipWriter::new(File::create(dest)?);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        let mut count = 0;
        for path in &files {
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            zip.start_file(name, options)?;
            io::copy(&mut BufReader::new(File::open(path)?), &mut zip)?;
            count += 1;
        }
        zip.finish()?;
        log::info!("backed up {count} files to {}", dest.display());
        Ok(count)
    }

    /// Unpack a backup into the root, replacing files of the same name.
    ///
    /// Every entry name is checked before anything is written: an absolute
    /// path or a `..` component rejects the whole archive.
    pub fn restore(&self, src: &Path) -> Result<usize> {
        let mut archive = ZipArchive::new(BufReader::new(File::open(src)?))?;
        let mut targets = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            let relative = contained_path(entry.name())
                .ok_or_else(|| SmithError::UnsafePath(entry.name().to_string()))?;
            targets.push((i, entry.is_dir(), relative));
        }

        std::fs::create_dir_all(&self.root)?;
        let mut count = 0;
        for (i, is_dir, relative) in targets {
            let out = self.root.join(relative);
            if is_dir {
                std::fs::create_dir_all(&out)?;
                continue;
            }
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut entry = archive.by_index(i)?;
            io::copy(&mut entry, &mut File::create(&out)?)?;
            count += 1;
        }
        log::info!("restored {count} files from {}", src.display());
        Ok(count)
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// An archive entry name as a path that stays below the directory it is
/// joined to; `None` for absolute names, `..` components and empty names.
fn contained_path(name: &str) -> Option<PathBuf> {
    if name.contains('\\') {
        return None;
    }
    let mut out = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let lib = Library::new("/data");
        assert_eq!(lib.cover_path("3"), PathBuf::from("/data/covers/3.jpg"));
        assert_eq!(lib.images_dir("3"), PathBuf::from("/data/epub/3/images"));
    }

    #[test]
    fn cover_is_replaced() {
        let tmp = tempfile::TempDir::new().unwrap();
        let lib = Library::new(tmp.path());
        assert!(lib.read_cover("1").is_none());
        lib.save_cover("1", b"old").unwrap();
        lib.save_cover("1", b"new").unwrap();
        assert_eq!(lib.read_cover("1").unwrap(), b"new");
    }

    #[test]
    fn stored_images_get_unique_names() {
        let tmp = tempfile::TempDir::new().unwrap();
        let lib = Library::new(tmp.path());
        let a = lib.store_image("1", "PNG", b"a").unwrap();
        let b = lib.store_image("1", "png", b"b").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("images/") && a.ends_with(".png"));
        let listed = lib.list_images("1");
        assert_eq!(listed.len(), 2);
        assert!(listed[0].name < listed[1].name);
        assert!(lib.list_images("2").is_empty());
    }

    #[test]
    fn backup_restores_into_an_empty_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        let lib = Library::new(tmp.path().join("lib"));
        lib.ensure_dirs().unwrap();
        std::fs::write(lib.catalog_path(), b"{}").unwrap();
        lib.save_cover("1", b"cover").unwrap();
        let image = lib.store_image("1", "png", b"png").unwrap();

        let backup = tmp.path().join("out").join("lib.zip");
        assert_eq!(lib.backup(&backup).unwrap(), 3);

        let restored = Library::new(tmp.path().join("other"));
        assert_eq!(restored.restore(&backup).unwrap(), 3);
        assert_eq!(std::fs::read(restored.catalog_path()).unwrap(), b"{}");
        assert_eq!(restored.read_cover("1").unwrap(), b"cover");
        let name = image.trim_start_matches("images/");
        assert_eq!(restored.list_images("1")[0].name, name);
    }

    #[test]
    fn backup_of_missing_root_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let lib = Library::new(tmp.path().join("absent"));
        let err = lib.backup(&tmp.path().join("b.zip")).unwrap_err();
        assert!(matches!(err, SmithError::NotFound(_)));
    }

    #[test]
    fn restore_rejects_escaping_entries() {
        use std::io::Write;

        let tmp = tempfile::TempDir::new().unwrap();
        for bad in ["../evil.txt", "chapters/../../evil.txt", "/etc/evil.txt"] {
            let path = tmp.path().join("bad.zip");
            let mut zip = ZipWriter::new(File::create(&path).unwrap());
            zip.start_file("catalog.json", SimpleFileOptions::default()).unwrap();
            zip.write_all(b"{}").unwrap();
            zip.start_file(bad, SimpleFileOptions::default()).unwrap();
            zip.write_all(b"x").unwrap();
            zip.finish().unwrap();

            let lib = Library::new(tmp.path().join("lib"));
            let err = lib.restore(&path).unwrap_err();
            assert!(matches!(err, SmithError::UnsafePath(ref n) if n == bad), "{bad}: {err}");
            assert!(!lib.catalog_path().exists());
        }
        assert!(!tmp.path().join("evil.txt").exists());
    }

    #[test]
    fn contained_paths() {
        assert_eq!(contained_path("a/./b.json"), Some(PathBuf::from("a/b.json")));
        assert_eq!(contained_path("covers/"), Some(PathBuf::from("covers")));
        assert_eq!(contained_path(".."), None);
        assert_eq!(contained_path("a\\..\\b"), None);
        assert_eq!(contained_path(""), None);
    }

    #[test]
    fn clear_removes_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        let lib = Library::new(tmp.path().join("lib"));
        lib.ensure_dirs().unwrap();
        lib.clear().unwrap();
        assert!(!lib.root().exists());
    }
}
