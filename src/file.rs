use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

static BINARY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "so", "dylib", "a", "o", "obj", "png", "jpg", "jpeg", "gif", "bmp", "ico",
        "webp", "mp3", "mp4", "avi", "mkv", "mov", "wav", "flac", "pdf", "doc", "docx", "xls",
        "xlsx", "ppt", "pptx", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "wasm", "pyc",
        "class",
    ]
    .into_iter()
    .collect()
});

const SNIFF_BUFFER_SIZE: usize = 8192;
const FALLBACK_READ_SIZE: usize = 1024;

/// Determines if a file is likely binary by analyzing its content.
///
/// # Algorithm
///
/// 1. Reads the first 8KB of the file
/// 2. Any null byte marks the file as binary
/// 3. Otherwise the sample must be valid UTF-8; a multi-byte character cut
///    off by the end of the sample is tolerated
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub(crate) fn is_likely_binary(path: &Path) -> Result<bool> {
    let sample = read_prefix(path, SNIFF_BUFFER_SIZE)?;

    if sample.is_empty() {
        return Ok(false);
    }

    if memchr::memchr(0, &sample).is_some() {
        return Ok(true);
    }

    Ok(!is_utf8_prefix(&sample))
}

/// Returns true if `path` should be treated as text.
///
/// Known binary extensions are rejected outright. When the content sniff
/// itself fails, a small decoded read decides instead, and a failure there
/// rejects the file.
#[must_use]
pub(crate) fn probe_text(path: &Path) -> bool {
    if has_binary_extension(path) {
        return false;
    }

    match is_likely_binary(path) {
        Ok(binary) => !binary,
        Err(e) => {
            tracing::debug!("Binary sniff failed for {}: {}", path.display(), e);
            read_prefix(path, FALLBACK_READ_SIZE).is_ok_and(|prefix| is_utf8_prefix(&prefix))
        }
    }
}

/// Reads a source file that is expected to be UTF-8 text.
///
/// # Errors
///
/// Returns [`Error::InvalidUtf8`] for undecodable content and
/// [`Error::Io`] for anything else.
pub(crate) fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidData {
            Error::invalid_utf8(path)
        } else {
            Error::io(path, e)
        }
    })
}

/// Checks if a file extension suggests a binary file.
#[must_use]
pub(crate) fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str()))
}

fn read_prefix(path: &Path, limit: usize) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::with_capacity(limit, file).take(limit as u64);
    let mut buffer = Vec::with_capacity(limit);

    reader
        .read_to_end(&mut buffer)
        .map_err(|e| Error::io(path, e))?;

    Ok(buffer)
}

fn is_utf8_prefix(sample: &[u8]) -> bool {
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        // `error_len() == None` means the input ended mid-character.
        Err(e) => e.error_len().is_none(),
    }
}
