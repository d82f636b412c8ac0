use crate::error::{Error, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Writes files into the mirrored output tree.
///
/// Every output path is the input's path relative to the scan root,
/// re-rooted under the output directory. In dry-run mode nothing touches
/// the disk and the would-be target is returned.
pub(crate) struct Writer {
    output_dir: PathBuf,
    dry_run: bool,
}

impl Writer {
    pub(crate) fn new(output_dir: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            dry_run,
        }
    }

    /// Creates the output directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub(crate) fn prepare(&self) -> Result<()> {
        if self.dry_run {
            info!("Dry run: not creating {}", self.output_dir.display());
            return Ok(());
        }

        fs::create_dir_all(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))?;
        debug!("Output directory ready: {}", self.output_dir.display());
        Ok(())
    }

    /// Mirrored output location for a root-relative path.
    pub(crate) fn target(&self, relative: &Path) -> PathBuf {
        self.output_dir.join(relative)
    }

    /// Writes cleaned text for `relative` atomically, with the permissions
    /// of `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or the file cannot be written.
    pub(crate) fn write_text(
        &self,
        source: &Path,
        relative: &Path,
        content: &str,
    ) -> Result<PathBuf> {
        let path = self.target(relative);
        if self.dry_run {
            return Ok(path);
        }

        let parent = self.ensure_parent(&path)?;
        let permissions = fs::metadata(source)
            .map_err(|e| Error::io(source, e))?
            .permissions();
        write_file_atomic(parent, &path, content.as_bytes(), permissions)?;

        debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(path)
    }

    /// Copies `source` byte for byte to the mirrored location of `relative`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or the target written.
    pub(crate) fn copy_verbatim(&self, source: &Path, relative: &Path) -> Result<PathBuf> {
        let path = self.target(relative);
        if self.dry_run {
            return Ok(path);
        }

        self.ensure_parent(&path)?;
        fs::copy(source, &path).map_err(|e| Error::io(source, e))?;

        debug!("Copied {} to {}", source.display(), path.display());
        Ok(path)
    }

    fn ensure_parent<'a>(&self, path: &'a Path) -> Result<&'a Path> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::config(format!("Invalid output path: {}", path.display())))?;
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        Ok(parent)
    }
}

/// Writes `content` to `path` through a temporary file in the same directory.
///
/// # Process
///
/// 1. Writes content to a temporary file next to the target
/// 2. Applies `permissions` (temporary files start owner-only)
/// 3. Syncs the temporary file to disk
/// 4. Renames it over the target
///
/// An interrupted write never leaves a half-written target behind.
fn write_file_atomic(
    dir: &Path,
    path: &Path,
    content: &[u8],
    permissions: fs::Permissions,
) -> Result<()> {
    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(temp_file.path(), e))?;

    temp_file
        .as_file()
        .set_permissions(permissions)
        .map_err(|e| Error::io(temp_file.path(), e))?;

    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| Error::io(temp_file.path(), e))?;

    temp_file
        .persist(path)
        .map_err(|e| Error::io(path, e.error))?;

    Ok(())
}
