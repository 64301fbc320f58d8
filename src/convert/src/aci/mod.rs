//! App Container Image (ACI) support.
//!
//! Translates OCI bundle specs into ACI image manifests and packs an
//! exploded ACI layout into a single image file.
//!
//! # Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  work-dir/                (exploded layout)  │
//! │  ├── manifest             (ImageManifest)    │
//! │  └── rootfs/              (app filesystem)   │
//! └──────────────────────────────────────────────┘
//!                     │  build_image
//!                     ▼
//!        <name>.aci  (tar, optionally gzip)
//!        ├── manifest        (first entry)
//!        ├── rootfs
//!        └── rootfs/...      (lexicographic order)
//! ```

mod build;
mod layout;
mod manifest;
mod translate;
mod types;
mod writer;

pub use build::{build_image, ImageInfo};
pub use layout::validate_layout;
pub use manifest::{
    App, EnvironmentVariable, EventHandler, EventName, ImageManifest, Isolator, MountPoint, Port,
};
pub use translate::{translate, NOOP_EXEC};
pub use types::{AcIdentifier, AcName, Label};
pub use writer::ImageWriter;

/// App Container schema version written into manifests.
pub const AC_VERSION: &str = "0.8.11";

/// Required extension of image files.
pub const ACI_EXTENSION: &str = ".aci";

/// Manifest file name at the layout root.
pub const MANIFEST_FILE: &str = "manifest";

/// Application filesystem directory at the layout root.
pub const ROOTFS_DIR: &str = "rootfs";

/// `acKind` of an image manifest.
pub const IMAGE_MANIFEST_KIND: &str = "ImageManifest";

/// CPU limit isolator.
pub const ISOLATOR_CPU: &str = "resource/cpu";

/// Memory limit isolator.
pub const ISOLATOR_MEMORY: &str = "resource/memory";

/// Linux capability retain-set isolator.
pub const ISOLATOR_CAPABILITIES_RETAIN: &str = "os/linux/capabilities-retain-set";

/// Check that `path` ends with [`ACI_EXTENSION`].
pub fn check_extension(path: &std::path::Path) -> oci2aci_core::Result<()> {
    let given = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    if given != ACI_EXTENSION {
        return Err(oci2aci_core::ConvertError::InvalidExtension {
            expected: ACI_EXTENSION.to_string(),
            given,
        });
    }
    Ok(())
}
