//! Exploded ACI layout verification.

use std::path::Path;

use oci2aci_core::error::{ConvertError, Result};

use super::manifest::ImageManifest;
use super::{MANIFEST_FILE, ROOTFS_DIR};

/// Verify that `dir` is a valid exploded ACI layout.
///
/// The layout root may only hold a regular `manifest` file and a `rootfs/`
/// directory. The manifest must decode into a valid [`ImageManifest`].
///
/// # Errors
///
/// - [`ConvertError::LayoutError`] for structural problems
/// - [`ConvertError::InvalidManifest`] if the manifest fails validation
/// - [`ConvertError::OldVersion`] if the layout is otherwise valid but the
///   manifest targets a superseded schema version
pub fn validate_layout(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(ConvertError::LayoutError(format!(
            "given path {} is not a directory",
            dir.display()
        )));
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| {
        ConvertError::LayoutError(format!("unable to read {}: {}", dir.display(), e))
    })? {
        let entry =
            entry.map_err(|e| ConvertError::LayoutError(format!("unable to read entry: {}", e)))?;
        names.push(entry.file_name());
    }
    names.sort();

    let mut manifest_found = false;
    let mut rootfs_found = false;
    for name in &names {
        let path = dir.join(name);
        match name.to_str() {
            Some(MANIFEST_FILE) => {
                if !path.is_file() {
                    return Err(ConvertError::LayoutError(
                        "manifest is not a regular file".to_string(),
                    ));
                }
                manifest_found = true;
            }
            Some(ROOTFS_DIR) => {
                if !path.is_dir() {
                    return Err(ConvertError::LayoutError(
                        "rootfs is not a directory".to_string(),
                    ));
                }
                rootfs_found = true;
            }
            _ => {
                return Err(ConvertError::LayoutError(format!(
                    "unrecognized file path in layout: {:?}",
                    name
                )));
            }
        }
    }

    if !manifest_found {
        return Err(ConvertError::LayoutError(
            "no image manifest found".to_string(),
        ));
    }
    if !rootfs_found {
        return Err(ConvertError::LayoutError("no rootfs found".to_string()));
    }

    let manifest = ImageManifest::from_file(&dir.join(MANIFEST_FILE))?;
    manifest.check_version()?;

    tracing::debug!(layout = %dir.display(), name = %manifest.name, "Layout validated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aci::{AcIdentifier, App, Label, AC_VERSION, IMAGE_MANIFEST_KIND};
    use std::fs;
    use tempfile::TempDir;

    fn manifest(version: &str) -> ImageManifest {
        ImageManifest {
            ac_kind: IMAGE_MANIFEST_KIND.to_string(),
            ac_version: version.to_string(),
            name: AcIdentifier::new("example").unwrap(),
            labels: vec![Label::new(AcIdentifier::new("os").unwrap(), "linux")],
            app: Some(App {
                exec: vec!["/bin/sh".to_string()],
                user: "0".to_string(),
                group: "0".to_string(),
                ..App::default()
            }),
        }
    }

    fn create_layout(dir: &Path, version: &str) {
        fs::create_dir_all(dir.join(ROOTFS_DIR)).unwrap();
        fs::write(
            dir.join(MANIFEST_FILE),
            manifest(version).to_pretty_json().unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_valid_layout() {
        let tmp = TempDir::new().unwrap();
        create_layout(tmp.path(), AC_VERSION);
        fs::write(tmp.path().join("rootfs/hello.txt"), "hi").unwrap();
        assert!(validate_layout(tmp.path()).is_ok());
    }

    #[test]
    fn test_not_a_directory() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file");
        fs::write(&file, "").unwrap();
        assert!(matches!(
            validate_layout(&file),
            Err(ConvertError::LayoutError(_))
        ));
    }

    #[test]
    fn test_missing_manifest() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join(ROOTFS_DIR)).unwrap();
        let err = validate_layout(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("no image manifest"));
    }

    #[test]
    fn test_missing_rootfs() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(MANIFEST_FILE),
            manifest(AC_VERSION).to_pretty_json().unwrap(),
        )
        .unwrap();
        let err = validate_layout(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("no rootfs"));
    }

    #[test]
    fn test_rootfs_must_be_directory() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(ROOTFS_DIR), "").unwrap();
        fs::write(tmp.path().join(MANIFEST_FILE), "{}").unwrap();
        let err = validate_layout(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("rootfs is not a directory"));
    }

    #[test]
    fn test_unrecognized_entry() {
        let tmp = TempDir::new().unwrap();
        create_layout(tmp.path(), AC_VERSION);
        fs::write(tmp.path().join("extra"), "").unwrap();
        let err = validate_layout(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("unrecognized file path"));
    }

    #[test]
    fn test_empty_manifest_is_invalid() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join(ROOTFS_DIR)).unwrap();
        fs::write(tmp.path().join(MANIFEST_FILE), "").unwrap();
        assert!(matches!(
            validate_layout(tmp.path()),
            Err(ConvertError::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_old_version_reported_separately() {
        let tmp = TempDir::new().unwrap();
        create_layout(tmp.path(), "0.6.1");
        assert!(matches!(
            validate_layout(tmp.path()),
            Err(ConvertError::OldVersion { .. })
        ));
    }
}
