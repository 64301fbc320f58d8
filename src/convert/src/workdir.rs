//! Working directory holding the exploded ACI layout.
//!
//! ```text
//! oci2aciXXXXXX/
//! ├── manifest     # translated image manifest
//! └── rootfs/      # copy of the bundle rootfs
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use oci2aci_core::error::{ConvertError, Result};

use crate::aci::{ImageManifest, MANIFEST_FILE, ROOTFS_DIR};
use crate::fs::copy_tree;
use crate::oci::OciBundle;

const WORK_DIR_PREFIX: &str = "oci2aci";

/// A staged ACI layout on disk.
///
/// The directory outlives this value; call [`WorkDir::remove`] to delete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    /// Create a fresh working directory with an empty `rootfs/` and an empty
    /// `manifest` placeholder.
    ///
    /// The directory is created under `work_root` when given, otherwise under
    /// the system temp directory.
    pub fn create(work_root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORK_DIR_PREFIX);

        let temp = match work_root {
            Some(root) => {
                fs::create_dir_all(root).map_err(|e| ConvertError::fs(root, e))?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| {
            ConvertError::fs(
                work_root.map_or_else(std::env::temp_dir, Path::to_path_buf),
                format!("Failed to create working directory: {}", e),
            )
        })?;

        // Populate before keeping so a failure here cleans up after itself.
        let rootfs = temp.path().join(ROOTFS_DIR);
        fs::create_dir(&rootfs).map_err(|e| ConvertError::fs(&rootfs, e))?;
        let manifest = temp.path().join(MANIFEST_FILE);
        fs::File::create(&manifest).map_err(|e| ConvertError::fs(&manifest, e))?;

        let path = temp.keep();
        tracing::debug!(work_dir = %path.display(), "Created working directory");
        Ok(Self { path })
    }

    /// Root of the layout.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The layout's `rootfs/` directory.
    pub fn rootfs(&self) -> PathBuf {
        self.path.join(ROOTFS_DIR)
    }

    /// The layout's `manifest` file.
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    /// Default archive target for this layout: `<workdir>.aci`.
    pub fn image_path(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(crate::aci::ACI_EXTENSION);
        PathBuf::from(path)
    }

    /// Copy the bundle rootfs into the layout and write the manifest.
    pub fn materialize(&self, bundle: &OciBundle, manifest: &ImageManifest) -> Result<()> {
        copy_tree(&bundle.rootfs(), &self.rootfs())?;
        self.write_manifest(manifest)?;
        tracing::debug!(
            work_dir = %self.path.display(),
            bundle = %bundle.root_dir().display(),
            "Materialized layout"
        );
        Ok(())
    }

    /// Serialize `manifest` into the layout, replacing the placeholder.
    pub fn write_manifest(&self, manifest: &ImageManifest) -> Result<()> {
        let data = manifest.to_pretty_json()?;
        let path = self.manifest_path();
        fs::write(&path, data).map_err(|e| ConvertError::fs(&path, e))
    }

    /// Delete the working directory and everything in it.
    pub fn remove(self) -> Result<()> {
        fs::remove_dir_all(&self.path).map_err(|e| ConvertError::fs(&self.path, e))?;
        tracing::debug!(work_dir = %self.path.display(), "Removed working directory");
        Ok(())
    }
}
