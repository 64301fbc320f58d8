//! Filesystem helpers for staging the exploded layout.

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use oci2aci_core::error::{ConvertError, Result};

/// Counts gathered while copying a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub dirs: usize,
    pub symlinks: usize,
    pub skipped: usize,
}

/// Recursively copy the contents of `src` into `dst`.
///
/// `dst` is created if needed and takes on the permissions of `src`.
/// Regular files keep their mode, symlinks are recreated with the same
/// target, and ownership is carried over when running as root. Special
/// files are skipped.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<CopyStats> {
    let preserve_owner = unsafe { libc::geteuid() } == 0;
    let mut stats = CopyStats::default();
    copy_dir(src, dst, preserve_owner, &mut stats)?;
    tracing::debug!(
        src = %src.display(),
        dst = %dst.display(),
        files = stats.files,
        dirs = stats.dirs,
        symlinks = stats.symlinks,
        skipped = stats.skipped,
        "Copied tree"
    );
    Ok(stats)
}

fn copy_dir(src: &Path, dst: &Path, preserve_owner: bool, stats: &mut CopyStats) -> Result<()> {
    // Follows links: a symlinked rootfs takes its target's mode.
    let meta = fs::metadata(src).map_err(|e| ConvertError::fs(src, e))?;
    fs::create_dir_all(dst).map_err(|e| ConvertError::fs(dst, e))?;
    stats.dirs += 1;

    let mut entries = Vec::new();
    for entry in fs::read_dir(src).map_err(|e| ConvertError::fs(src, e))? {
        let entry = entry.map_err(|e| ConvertError::fs(src, e))?;
        entries.push(entry.file_name());
    }
    entries.sort();

    for name in entries {
        let src_path = src.join(&name);
        let dst_path = dst.join(&name);
        let entry_meta =
            fs::symlink_metadata(&src_path).map_err(|e| ConvertError::fs(&src_path, e))?;
        let file_type = entry_meta.file_type();

        if file_type.is_dir() {
            copy_dir(&src_path, &dst_path, preserve_owner, stats)?;
            continue;
        }

        if file_type.is_symlink() {
            let target = fs::read_link(&src_path).map_err(|e| ConvertError::fs(&src_path, e))?;
            if fs::symlink_metadata(&dst_path).is_ok() {
                fs::remove_file(&dst_path).map_err(|e| ConvertError::fs(&dst_path, e))?;
            }
            std::os::unix::fs::symlink(&target, &dst_path)
                .map_err(|e| ConvertError::fs(&dst_path, e))?;
            stats.symlinks += 1;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path).map_err(|e| {
                ConvertError::fs(
                    &dst_path,
                    format!("Failed to copy from {}: {}", src_path.display(), e),
                )
            })?;
            stats.files += 1;
        } else {
            tracing::warn!(path = %src_path.display(), "Skipping special file");
            stats.skipped += 1;
            continue;
        }

        if preserve_owner {
            set_owner(&dst_path, &entry_meta);
        }
    }

    // Applied after the children so read-only directories can still be filled.
    fs::set_permissions(dst, fs::Permissions::from_mode(meta.mode() & 0o7777))
        .map_err(|e| ConvertError::fs(dst, e))?;
    if preserve_owner {
        set_owner(dst, &meta);
    }

    Ok(())
}

fn set_owner(path: &Path, meta: &fs::Metadata) {
    if let Err(e) = std::os::unix::fs::lchown(path, Some(meta.uid()), Some(meta.gid())) {
        tracing::debug!(path = %path.display(), error = %e, "Failed to preserve ownership");
    }
}

/// Move a file, falling back to copy and remove across filesystems.
pub fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    fs::copy(src, dst).map_err(|e| {
        ConvertError::fs(
            dst,
            format!("Failed to move from {}: {}", src.display(), e),
        )
    })?;
    fs::remove_file(src).map_err(|e| ConvertError::fs(src, e))?;
    Ok(())
}
