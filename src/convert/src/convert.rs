//! Conversion pipeline driver.
//!
//! Stages run strictly in order: validate, load, translate, materialize,
//! archive. Everything up to translation touches nothing on disk, so
//! validation and parse failures leave no working directory behind.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use oci2aci_core::config::ConvertConfig;
use oci2aci_core::error::{ConvertError, Result};
use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::aci::{self, build_image, check_extension, translate, AcIdentifier, ImageInfo};
use crate::fs::move_file;
use crate::oci::OciBundle;
use crate::workdir::WorkDir;

/// A materialized layout that has not been archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedLayout {
    /// The working directory holding `manifest` and `rootfs/`
    pub work_dir: WorkDir,
    /// Path to the written manifest
    pub manifest_path: PathBuf,
}

/// Result of a full conversion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// Where the manifest ended up
    pub manifest_path: PathBuf,
    /// The written image
    pub image: ImageInfo,
    /// Working directory left on disk, if it was kept
    pub work_dir: Option<PathBuf>,
}

/// Converts OCI bundles into ACI images.
///
/// Each converter logs through its own subscriber, filtered by the
/// configured level, for the duration of every call.
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConvertConfig,
    dispatch: Dispatch,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConvertConfig::default())
    }
}

impl Converter {
    /// Create a converter with the given configuration, logging to stderr.
    pub fn new(config: ConvertConfig) -> Self {
        Self::with_writer(config, std::io::stderr)
    }

    /// Create a converter whose log output goes to `writer`.
    pub fn with_writer<W>(config: ConvertConfig, writer: W) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let dispatch = log_dispatch(&config, writer);
        Self { config, dispatch }
    }

    /// The active configuration.
    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Translate a bundle into an exploded ACI layout in a fresh working
    /// directory.
    pub fn convert_manifest(&self, bundle: &Path) -> Result<ConvertedLayout> {
        self.scoped(|| {
            let name = self.manifest_name()?;
            self.stage_layout(bundle, &name)
        })
    }

    /// Translate a bundle and package it as `<workdir>.aci`.
    ///
    /// The working directory is left in place.
    pub fn convert_image(&self, bundle: &Path) -> Result<ImageInfo> {
        self.scoped(|| {
            let name = self.manifest_name()?;
            let layout = self.stage_layout(bundle, &name)?;
            let target = layout.work_dir.image_path();
            self.archive(&layout.work_dir, &target)
        })
    }

    /// Run the full pipeline.
    ///
    /// With a `destination`, the image is written there, the manifest is
    /// moved next to it and the working directory is removed. Otherwise the
    /// image is written to `<absolute bundle path>.aci` and the working
    /// directory, still holding the manifest, is kept.
    pub fn run(&self, bundle: &Path, destination: Option<&Path>) -> Result<Conversion> {
        self.scoped(|| self.run_pipeline(bundle, destination))
    }

    fn run_pipeline(&self, bundle: &Path, destination: Option<&Path>) -> Result<Conversion> {
        if let Some(dest) = destination {
            check_extension(dest)?;
        }
        let name = self.manifest_name()?;
        let target = match destination {
            Some(dest) => dest.to_path_buf(),
            None => default_image_path(bundle)?,
        };

        let layout = self.stage_layout(bundle, &name)?;
        let image = self.archive(&layout.work_dir, &target)?;

        let Some(dest) = destination else {
            tracing::info!(
                manifest = %layout.manifest_path.display(),
                work_dir = %layout.work_dir.path().display(),
                "Working directory kept"
            );
            return Ok(Conversion {
                manifest_path: layout.manifest_path,
                image,
                work_dir: Some(layout.work_dir.path().to_path_buf()),
            });
        };

        let manifest_path = sibling_manifest_path(dest);
        move_file(&layout.manifest_path, &manifest_path)?;
        layout.work_dir.remove()?;

        tracing::info!(
            manifest = %manifest_path.display(),
            image = %image.path.display(),
            "Moved conversion output to destination"
        );
        Ok(Conversion {
            manifest_path,
            image,
            work_dir: None,
        })
    }

    fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    fn manifest_name(&self) -> Result<AcIdentifier> {
        AcIdentifier::new(self.config.name.as_str())
    }

    fn stage_layout(&self, bundle: &Path, name: &AcIdentifier) -> Result<ConvertedLayout> {
        tracing::debug!(bundle = %bundle.display(), "Validating bundle");
        OciBundle::validate(bundle)?;

        let bundle = OciBundle::load(bundle)?;

        tracing::debug!(name = %name, "Translating specs");
        let manifest = translate(name, bundle.spec(), bundle.runtime())?;

        let work_dir = WorkDir::create(self.config.work_root.as_deref())?;
        if let Err(e) = work_dir.materialize(&bundle, &manifest) {
            tracing::warn!(
                work_dir = %work_dir.path().display(),
                "Materialization failed, working directory left for inspection"
            );
            return Err(e);
        }

        let manifest_path = work_dir.manifest_path();
        tracing::info!(
            bundle = %bundle.root_dir().display(),
            manifest = %manifest_path.display(),
            "Manifest generated"
        );
        Ok(ConvertedLayout {
            work_dir,
            manifest_path,
        })
    }

    fn archive(&self, work_dir: &WorkDir, target: &Path) -> Result<ImageInfo> {
        build_image(work_dir.path(), target, self.config.compression).inspect_err(|_| {
            tracing::warn!(
                work_dir = %work_dir.path().display(),
                target = %target.display(),
                "Archiving failed, partial output left for inspection"
            );
        })
    }
}

/// Subscriber for one converter. Explicit filter directives win over the
/// level; unparseable directives fall back to it.
fn log_dispatch<W>(config: &ConvertConfig, writer: W) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = config
        .log_filter
        .as_deref()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(config.log_level.as_directive()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(writer)
        .finish();
    Dispatch::new(subscriber)
}

/// `<absolute bundle path>.aci`, ignoring any trailing separator.
fn default_image_path(bundle: &Path) -> Result<PathBuf> {
    let absolute: PathBuf = std::path::absolute(bundle)
        .map_err(|e| ConvertError::fs(bundle, format!("Failed to resolve absolute path: {}", e)))?
        .components()
        .collect();
    let mut path: OsString = absolute.into_os_string();
    path.push(aci::ACI_EXTENSION);
    Ok(PathBuf::from(path))
}

fn sibling_manifest_path(dest: &Path) -> PathBuf {
    match dest.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(aci::MANIFEST_FILE),
        _ => PathBuf::from(aci::MANIFEST_FILE),
    }
}
