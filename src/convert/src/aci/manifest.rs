//! ACI image manifest schema.
//!
//! Covers the fields produced by translation: kind, version, name, labels
//! and the app section. Decoding validates identifier syntax; [`ImageManifest::validate`]
//! applies the remaining structural rules.

use std::collections::HashSet;
use std::path::Path;

use oci2aci_core::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};

use super::types::{validate_labels, AcIdentifier, AcName, Label};
use super::{AC_VERSION, IMAGE_MANIFEST_KIND};

/// An ACI image manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    /// Always "ImageManifest"
    pub ac_kind: String,

    /// Schema version (semver)
    pub ac_version: String,

    /// Image name
    pub name: AcIdentifier,

    /// Image labels
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,

    /// Application to run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
}

/// The app section of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exec: Vec<String>,

    pub user: String,

    pub group: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_handlers: Vec<EventHandler>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub working_directory: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<EnvironmentVariable>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mount_points: Vec<MountPoint>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub isolators: Vec<Isolator>,
}

/// Lifecycle phase an event handler runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "pre-start")]
    PreStart,
    #[serde(rename = "post-stop")]
    PostStop,
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreStart => write!(f, "pre-start"),
            Self::PostStop => write!(f, "post-stop"),
        }
    }
}

/// A command run at a lifecycle phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHandler {
    pub name: EventName,
    pub exec: Vec<String>,
}

/// An environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

/// A mount point the app expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountPoint {
    pub name: AcName,
    pub path: String,
    #[serde(default)]
    pub read_only: bool,
}

/// A port the app listens on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub name: AcName,
    pub protocol: String,
    pub port: u16,
    #[serde(default = "default_port_count")]
    pub count: u32,
    #[serde(default)]
    pub socket_activated: bool,
}

fn default_port_count() -> u32 {
    1
}

/// A named resource or security constraint with an opaque value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Isolator {
    pub name: AcIdentifier,
    #[serde(rename = "value")]
    pub value_raw: serde_json::Value,
}

impl ImageManifest {
    /// Decode and validate a manifest.
    ///
    /// Syntax errors and schema violations both surface as
    /// [`ConvertError::InvalidManifest`].
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let manifest: ImageManifest = serde_json::from_slice(data)
            .map_err(|e| ConvertError::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read, decode and validate a manifest file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            ConvertError::InvalidManifest(format!(
                "unable to read {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_slice(&data)
    }

    /// Check the manifest against the schema rules.
    pub fn validate(&self) -> Result<()> {
        if self.ac_kind != IMAGE_MANIFEST_KIND {
            return Err(ConvertError::InvalidManifest(format!(
                "missing or bad ACKind (must be {:?})",
                IMAGE_MANIFEST_KIND
            )));
        }

        self.parsed_version()?;

        validate_labels(&self.labels).map_err(ConvertError::InvalidManifest)?;

        if let Some(app) = &self.app {
            app.validate().map_err(ConvertError::InvalidManifest)?;
        }

        Ok(())
    }

    /// Fail with [`ConvertError::OldVersion`] when `acVersion` predates the
    /// supported schema release line.
    pub fn check_version(&self) -> Result<()> {
        let found = self.parsed_version()?;
        let current = current_version()?;
        if (found.major, found.minor) < (current.major, current.minor) {
            return Err(ConvertError::OldVersion {
                found: found.to_string(),
                expected: current.to_string(),
            });
        }
        Ok(())
    }

    /// Serialize with tab indentation.
    pub fn to_pretty_json(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(buf)
    }

    /// Look up a label value.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| l.name.as_str() == name)
            .map(|l| l.value.as_str())
    }

    fn parsed_version(&self) -> Result<semver::Version> {
        semver::Version::parse(&self.ac_version).map_err(|e| {
            ConvertError::InvalidManifest(format!(
                "invalid acVersion {:?}: {}",
                self.ac_version, e
            ))
        })
    }
}

fn current_version() -> Result<semver::Version> {
    semver::Version::parse(AC_VERSION)
        .map_err(|e| ConvertError::InvalidManifest(format!("invalid schema version: {}", e)))
}

impl App {
    /// Look up an isolator by name.
    pub fn isolator(&self, name: &str) -> Option<&Isolator> {
        self.isolators.iter().find(|i| i.name.as_str() == name)
    }

    /// Look up an event handler by phase.
    pub fn event_handler(&self, name: EventName) -> Option<&EventHandler> {
        self.event_handlers.iter().find(|h| h.name == name)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        validate_exec(&self.exec)?;

        if self.user.is_empty() {
            return Err("user is required".to_string());
        }
        if self.group.is_empty() {
            return Err("group is required".to_string());
        }

        let mut phases = HashSet::new();
        for handler in &self.event_handlers {
            if !phases.insert(handler.name) {
                return Err(format!(
                    "only one {} event handler may be defined",
                    handler.name
                ));
            }
            validate_exec(&handler.exec)
                .map_err(|e| format!("{} event handler: {}", handler.name, e))?;
        }

        let mut env_names = HashSet::new();
        for var in &self.environment {
            if var.name.is_empty() {
                return Err("environment variable name must not be empty".to_string());
            }
            if !env_names.insert(var.name.as_str()) {
                return Err(format!(
                    "duplicate environment variable of name {:?}",
                    var.name
                ));
            }
        }

        Ok(())
    }
}

fn validate_exec(exec: &[String]) -> std::result::Result<(), String> {
    let Some(first) = exec.first() else {
        return Err("exec cannot be empty".to_string());
    };
    if !Path::new(first).is_absolute() {
        return Err(format!("exec[0] must be an absolute path (got {:?})", first));
    }
    Ok(())
}
