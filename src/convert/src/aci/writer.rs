//! Streaming ACI archive writer.
//!
//! Wraps a [`tar::Builder`] and carries the image manifest as writer
//! metadata. The manifest is always the first archive entry and the
//! layout's own `manifest` file is never walked.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};

use oci2aci_core::error::{ConvertError, Result};
use tar::{EntryType, Header};

use super::MANIFEST_FILE;

const MANIFEST_MODE: u32 = 0o644;

/// Manifest bytes waiting to be written as the first entry.
struct PendingManifest {
    data: Vec<u8>,
    mtime: u64,
}

/// Writes an exploded ACI layout into a tar stream.
pub struct ImageWriter<W: Write> {
    builder: tar::Builder<W>,
    manifest: Option<PendingManifest>,
    /// (device, inode) -> first archived path, for hard links
    inodes: HashMap<(u64, u64), PathBuf>,
    entries: usize,
}

impl<W: Write> ImageWriter<W> {
    /// Create a writer carrying `manifest` as its image manifest.
    ///
    /// Nothing is written until the first append or [`ImageWriter::finish`].
    pub fn new(inner: W, manifest: Vec<u8>, mtime: u64) -> Self {
        let mut builder = tar::Builder::new(inner);
        builder.follow_symlinks(false);
        Self {
            builder,
            manifest: Some(PendingManifest {
                data: manifest,
                mtime,
            }),
            inodes: HashMap::new(),
            entries: 0,
        }
    }

    /// Number of entries written so far, manifest included.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Append every path under `root` in lexicographic walk order.
    ///
    /// Archive paths are relative to `root`. A top-level `manifest` file is
    /// skipped since the writer supplies its own.
    pub fn append_tree(&mut self, root: &Path) -> Result<()> {
        self.write_manifest()?;
        self.walk(root, root)
    }

    /// Write any pending manifest and finish the tar stream.
    pub fn finish(mut self) -> Result<W> {
        self.write_manifest()?;
        self.builder
            .into_inner()
            .map_err(|e| ConvertError::ArchiveError(format!("Failed to finalize archive: {}", e)))
    }

    fn write_manifest(&mut self) -> Result<()> {
        let Some(manifest) = self.manifest.take() else {
            return Ok(());
        };

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(manifest.data.len() as u64);
        header.set_mode(MANIFEST_MODE);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mtime(manifest.mtime);
        header
            .set_username("root")
            .and_then(|_| header.set_groupname("root"))
            .map_err(|e| archive_err(Path::new(MANIFEST_FILE), e))?;

        self.builder
            .append_data(&mut header, MANIFEST_FILE, manifest.data.as_slice())
            .map_err(|e| archive_err(Path::new(MANIFEST_FILE), e))?;
        self.entries += 1;
        tracing::trace!(path = MANIFEST_FILE, "Archived manifest");
        Ok(())
    }

    fn walk(&mut self, root: &Path, dir: &Path) -> Result<()> {
        let mut children = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| archive_err(dir, e))? {
            let entry = entry.map_err(|e| archive_err(dir, e))?;
            children.push(entry.path());
        }
        children.sort();

        for path in children {
            let relative = path
                .strip_prefix(root)
                .map_err(|e| archive_err(&path, e))?
                .to_path_buf();
            if relative == Path::new(MANIFEST_FILE) {
                continue;
            }

            let is_dir = self.append_entry(&path, &relative)?;
            if is_dir {
                self.walk(root, &path)?;
            }
        }
        Ok(())
    }

    /// Append a single entry. Returns true when it is a directory to descend into.
    fn append_entry(&mut self, path: &Path, relative: &Path) -> Result<bool> {
        let meta = fs::symlink_metadata(path).map_err(|e| archive_err(path, e))?;
        let file_type = meta.file_type();

        if file_type.is_socket() || file_type.is_block_device() || file_type.is_char_device() {
            tracing::warn!(path = %relative.display(), "Skipping special file");
            return Ok(false);
        }

        let mut header = Header::new_gnu();
        header.set_metadata(&meta);
        header.set_mode(meta.mode() & 0o7777);

        if file_type.is_dir() {
            header.set_size(0);
            self.builder
                .append_data(&mut header, relative, io::empty())
                .map_err(|e| archive_err(relative, e))?;
            self.record(relative, "directory");
            return Ok(true);
        }

        if file_type.is_symlink() {
            let target = fs::read_link(path).map_err(|e| archive_err(path, e))?;
            header.set_size(0);
            self.builder
                .append_link(&mut header, relative, &target)
                .map_err(|e| archive_err(relative, e))?;
            self.record(relative, "symlink");
            return Ok(false);
        }

        if file_type.is_fifo() {
            header.set_size(0);
            self.builder
                .append_data(&mut header, relative, io::empty())
                .map_err(|e| archive_err(relative, e))?;
            self.record(relative, "fifo");
            return Ok(false);
        }

        if meta.nlink() > 1 {
            let key = (meta.dev(), meta.ino());
            if let Some(first) = self.inodes.get(&key).cloned() {
                header.set_entry_type(EntryType::Link);
                header.set_size(0);
                self.builder
                    .append_link(&mut header, relative, &first)
                    .map_err(|e| archive_err(relative, e))?;
                self.record(relative, "hardlink");
                return Ok(false);
            }
            self.inodes.insert(key, relative.to_path_buf());
        }

        let file = fs::File::open(path).map_err(|e| archive_err(path, e))?;
        self.builder
            .append_data(&mut header, relative, file)
            .map_err(|e| archive_err(relative, e))?;
        self.record(relative, "file");
        Ok(false)
    }

    fn record(&mut self, relative: &Path, kind: &str) {
        self.entries += 1;
        tracing::trace!(path = %relative.display(), kind, "Archived entry");
    }
}

fn archive_err(path: &Path, err: impl std::fmt::Display) -> ConvertError {
    ConvertError::ArchiveError(format!("Failed to archive {}: {}", path.display(), err))
}
