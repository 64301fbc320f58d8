//! oci2aci Convert - OCI bundle to App Container Image conversion.
//!
//! This crate reads an OCI runtime bundle (`config.json`, `runtime.json`
//! and `rootfs/`), translates its specs into an ACI image manifest, stages
//! an exploded ACI layout in a working directory and packages it into an
//! `.aci` archive.

#![allow(clippy::result_large_err)]

pub mod aci;
pub mod convert;
pub mod fs;
pub mod oci;
pub mod workdir;

// Re-export common types
pub use aci::{build_image, translate, validate_layout, ImageInfo, ImageManifest, ImageWriter};
pub use convert::{Conversion, ConvertedLayout, Converter};
pub use oci::{OciBundle, OciSpec, RuntimeSpec};
pub use workdir::WorkDir;

/// oci2aci Convert version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
