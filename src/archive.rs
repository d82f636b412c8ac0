//! Zip extraction and creation at the edges of an archive job.

use crate::error::{Error, Result};
use crate::scanner::slash_path;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, trace};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Extracts `archive` into `dest` and returns the number of files written.
///
/// # Errors
///
/// Returns an [`Error::Archive`] if the archive is unreadable or any entry
/// name would land outside `dest`, and an [`Error::Io`] if writing fails.
pub fn extract(archive: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| Error::archive(archive, e))?;

    fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;

    let mut extracted = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| Error::archive(archive, e))?;

        let relative = entry.enclosed_name().ok_or_else(|| {
            Error::archive(
                archive,
                format!("entry '{}' escapes the extraction directory", entry.name()),
            )
        })?;
        let target = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let mut out = File::create(&target).map_err(|e| Error::io(&target, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| Error::io(&target, e))?;

        trace!("Extracted {}", relative.display());
        extracted += 1;
    }

    debug!("Extracted {} files from {}", extracted, archive.display());
    Ok(extracted)
}

/// Compresses every regular file under `src` into a new archive at `archive`.
///
/// Entry names are paths relative to `src` joined with `/`, in sorted walk
/// order. Returns the number of files added.
///
/// # Errors
///
/// Returns an error if `src` cannot be walked or the archive cannot be written.
pub fn compress_dir(src: &Path, archive: &Path) -> Result<usize> {
    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let file = File::create(archive).map_err(|e| Error::io(archive, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut added = 0;
    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::io(src, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::archive(archive, e))?;
        let name = slash_path(relative);

        zip.start_file(name.as_str(), options)
            .map_err(|e| Error::archive(archive, e))?;
        let mut input = File::open(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
        io::copy(&mut input, &mut zip).map_err(|e| Error::io(entry.path(), e))?;

        trace!("Archived {}", name);
        added += 1;
    }

    zip.finish().map_err(|e| Error::archive(archive, e))?;

    debug!("Wrote {} files to {}", added, archive.display());
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::io::{Read, Write};

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_nested_entries() {
        let temp = assert_fs::TempDir::new().unwrap();
        let archive = temp.path().join("in.zip");
        write_zip(
            &archive,
            &[("app.js", b"console.log(1);"), ("src/lib/util.py", b"x = 1")],
        );

        let dest = temp.child("out");
        let count = extract(&archive, dest.path()).unwrap();

        assert_eq!(count, 2);
        dest.child("app.js").assert("console.log(1);");
        dest.child("src/lib/util.py").assert("x = 1");
    }

    #[test]
    fn test_extract_rejects_path_traversal() {
        let temp = assert_fs::TempDir::new().unwrap();
        let archive = temp.path().join("evil.zip");
        write_zip(&archive, &[("../escape.txt", b"boom")]);

        let err = extract(&archive, &temp.path().join("out")).unwrap_err();

        assert!(err.is_archive());
        assert!(!temp.child("escape.txt").exists());
    }

    #[test]
    fn test_extract_corrupt_archive() {
        let temp = assert_fs::TempDir::new().unwrap();
        let archive = temp.child("bad.zip");
        archive.write_str("this is not a zip file").unwrap();

        let err = extract(archive.path(), &temp.path().join("out")).unwrap_err();
        assert!(err.is_archive());
    }

    #[test]
    fn test_compress_dir_uses_relative_slash_names() {
        let temp = assert_fs::TempDir::new().unwrap();
        let src = temp.child("src");
        src.child("b.txt").write_str("b").unwrap();
        src.child("nested/a.py").write_str("a").unwrap();

        let archive = temp.path().join("dist/out.zip");
        let count = compress_dir(src.path(), &archive).unwrap();
        assert_eq!(count, 2);

        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let names: Vec<_> = zip.file_names().map(str::to_string).collect();
        assert_eq!(names, vec!["b.txt", "nested/a.py"]);

        let mut content = String::new();
        zip.by_name("nested/a.py")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "a");
    }

    #[test]
    fn test_compress_then_extract_preserves_bytes() {
        let temp = assert_fs::TempDir::new().unwrap();
        let src = temp.child("src");
        src.child("img/logo.png")
            .write_binary(&[0x89, b'P', b'N', b'G', 0, 0, 0xFF])
            .unwrap();

        let archive = temp.path().join("a.zip");
        compress_dir(src.path(), &archive).unwrap();
        extract(&archive, &temp.path().join("back")).unwrap();

        let bytes = fs::read(temp.path().join("back/img/logo.png")).unwrap();
        assert_eq!(bytes, vec![0x89, b'P', b'N', b'G', 0, 0, 0xFF]);
    }
}
