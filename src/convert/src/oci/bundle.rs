//! OCI bundle validation and loading.
//!
//! A bundle is a directory holding `config.json`, `runtime.json` and a
//! `rootfs/` tree. Validation is a shallow precondition gate; loading decodes
//! both spec files into typed values.

use std::path::{Path, PathBuf};

use oci2aci_core::error::{ConvertError, Result};
use serde::de::DeserializeOwned;

use super::spec::{OciSpec, RuntimeSpec};

/// Platform and process spec file name.
pub const CONFIG_FILE: &str = "config.json";

/// Hooks and resources spec file name.
pub const RUNTIME_FILE: &str = "runtime.json";

/// Root filesystem directory inside a bundle.
pub const BUNDLE_ROOTFS_DIR: &str = "rootfs";

/// A validated OCI bundle with its decoded spec files.
#[derive(Debug, Clone)]
pub struct OciBundle {
    /// Bundle root directory
    root_dir: PathBuf,

    /// Decoded `config.json`
    spec: OciSpec,

    /// Decoded `runtime.json`
    runtime: RuntimeSpec,
}

impl OciBundle {
    /// Load a bundle from a directory.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The directory fails [`OciBundle::validate`]
    /// - `config.json` or `runtime.json` cannot be read or decoded
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let root_dir = path.as_ref().to_path_buf();

        Self::validate(&root_dir)?;

        let spec: OciSpec = Self::load_json(&root_dir.join(CONFIG_FILE))?;
        let runtime: RuntimeSpec = Self::load_json(&root_dir.join(RUNTIME_FILE))?;

        tracing::debug!(
            bundle = %root_dir.display(),
            version = %spec.version,
            "Loaded OCI bundle specs"
        );

        Ok(Self {
            root_dir,
            spec,
            runtime,
        })
    }

    /// Check that `path` is a directory with `config.json` and `rootfs/`.
    pub fn validate(path: &Path) -> Result<()> {
        if !path.is_dir() {
            return Err(ConvertError::InvalidBundle(format!(
                "{} is not a directory",
                path.display()
            )));
        }

        if !path.join(CONFIG_FILE).is_file() {
            return Err(ConvertError::InvalidBundle(format!(
                "missing {} in {}",
                CONFIG_FILE,
                path.display()
            )));
        }

        if !path.join(BUNDLE_ROOTFS_DIR).is_dir() {
            return Err(ConvertError::InvalidBundle(format!(
                "missing {} directory in {}",
                BUNDLE_ROOTFS_DIR,
                path.display()
            )));
        }

        Ok(())
    }

    /// Boolean form of [`OciBundle::validate`]; logs the reason on rejection.
    pub fn is_valid(path: &Path) -> bool {
        match Self::validate(path) {
            Ok(()) => true,
            Err(e) => {
                tracing::info!(bundle = %path.display(), error = %e, "Bundle rejected");
                false
            }
        }
    }

    /// Bundle root directory.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Path to the bundle's root filesystem.
    pub fn rootfs(&self) -> PathBuf {
        self.root_dir.join(BUNDLE_ROOTFS_DIR)
    }

    /// Decoded `config.json`.
    pub fn spec(&self) -> &OciSpec {
        &self.spec
    }

    /// Decoded `runtime.json`.
    pub fn runtime(&self) -> &RuntimeSpec {
        &self.runtime
    }

    fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let content = std::fs::read(path).map_err(|source| ConvertError::SpecRead {
            file: path.to_path_buf(),
            source,
        })?;

        serde_json::from_slice(&content).map_err(|source| ConvertError::SpecParse {
            file: path.to_path_buf(),
            source,
        })
    }
}
