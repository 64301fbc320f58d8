//! Packaging an exploded layout into an `.aci` archive.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use flate2::write::GzEncoder;
use oci2aci_core::config::Compression;
use oci2aci_core::error::{ConvertError, Result};
use sha2::{Digest, Sha512};

use super::layout::validate_layout;
use super::writer::ImageWriter;
use super::{check_extension, MANIFEST_FILE};

/// Information about a written image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Path to the `.aci` file
    pub path: PathBuf,
    /// SHA512 of the uncompressed tar stream (hex, no prefix)
    pub digest: String,
    /// Size on disk in bytes
    pub size: u64,
}

impl ImageInfo {
    /// Image ID in `sha512-<hex>` form.
    pub fn image_id(&self) -> String {
        format!("sha512-{}", self.digest)
    }
}

/// Package the layout at `layout_dir` into `target`.
///
/// The layout is verified first. An outdated manifest version is only
/// logged. The target is truncated and written with mode 0644. Every
/// writer in the chain is closed innermost first (tar, digest, compressor,
/// file) whether or not the walk succeeded; the first error is returned.
pub fn build_image(
    layout_dir: &Path,
    target: &Path,
    compression: Compression,
) -> Result<ImageInfo> {
    check_extension(target)?;

    match validate_layout(layout_dir) {
        Ok(()) => {}
        Err(ConvertError::OldVersion { found, expected }) => {
            tracing::warn!(
                found = %found,
                expected = %expected,
                "Manifest ACVersion is outdated, please update your manifest"
            );
        }
        Err(e) => return Err(e),
    }

    let manifest_path = layout_dir.join(MANIFEST_FILE);
    let manifest = std::fs::read(&manifest_path).map_err(|e| {
        ConvertError::ArchiveError(format!(
            "Failed to read manifest {}: {}",
            manifest_path.display(),
            e
        ))
    })?;
    let mtime = manifest_mtime(&manifest_path)?;

    let file = open_target(target)?;

    tracing::debug!(
        layout = %layout_dir.display(),
        target = %target.display(),
        compression = %compression,
        "Writing image"
    );

    let (digest, entries) =
        write_image(layout_dir, manifest, mtime, Sink::new(file, compression))?;

    let size = std::fs::metadata(target).map(|m| m.len()).map_err(|e| {
        ConvertError::ArchiveError(format!("Failed to stat {}: {}", target.display(), e))
    })?;

    let info = ImageInfo {
        path: target.to_path_buf(),
        digest,
        size,
    };
    tracing::info!(
        path = %info.path.display(),
        image_id = %info.image_id(),
        entries,
        size,
        "Image written"
    );
    Ok(info)
}

fn open_target(target: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(target)
        .map_err(|e| {
            ConvertError::ArchiveError(format!(
                "Unable to open target {}: {}",
                target.display(),
                e
            ))
        })
}

/// Final stage of the writer chain.
trait ImageSink: Write {
    /// Flush any trailer and make the bytes durable.
    fn close(self) -> io::Result<()>;
}

/// Stream the manifest and the layout tree into `sink`.
///
/// Returns the hex digest and the entry count. The chain is closed even
/// when the walk fails, and the walk error wins over any close error.
fn write_image<S: ImageSink>(
    layout_dir: &Path,
    manifest: Vec<u8>,
    mtime: u64,
    sink: S,
) -> Result<(String, usize)> {
    let mut writer = ImageWriter::new(HashingWriter::new(sink), manifest, mtime);
    let walked = writer.append_tree(layout_dir);
    let entries = writer.entries();
    let closed = close(writer);

    walked?;
    Ok((closed?, entries))
}

/// Close the writer chain innermost first, returning the hex digest.
///
/// A stage left behind by an earlier failure is dropped, which flushes
/// what it can.
fn close<S: ImageSink>(writer: ImageWriter<HashingWriter<S>>) -> Result<String> {
    let hashing = writer.finish()?;
    let (sink, digest) = hashing.into_parts();
    sink.close()
        .map_err(|e| ConvertError::ArchiveError(format!("Failed to close image: {}", e)))?;
    Ok(digest)
}

fn manifest_mtime(path: &Path) -> Result<u64> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| ConvertError::fs(path, e))?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0))
}

/// Output file, optionally behind a gzip encoder.
enum Sink {
    Plain(File),
    Gzip(GzEncoder<File>),
}

impl Sink {
    fn new(file: File, compression: Compression) -> Self {
        match compression {
            Compression::None => Self::Plain(file),
            Compression::Gzip => Self::Gzip(GzEncoder::new(file, flate2::Compression::default())),
        }
    }
}

impl ImageSink for Sink {
    fn close(self) -> io::Result<()> {
        let file = match self {
            Self::Plain(file) => file,
            Self::Gzip(encoder) => encoder.finish()?,
        };
        file.sync_all()
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(file) => file.write(buf),
            Self::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(file) => file.flush(),
            Self::Gzip(encoder) => encoder.flush(),
        }
    }
}

/// Hashes everything written through it.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha512,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha512::new(),
        }
    }

    fn into_parts(self) -> (W, String) {
        (self.inner, hex::encode(self.hasher.finalize()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
