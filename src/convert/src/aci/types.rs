//! ACI identifier types and labels.
//!
//! # Syntax
//!
//! - AC identifier: `[a-z0-9]+([-._~/][a-z0-9]+)*` (image names, label and
//!   isolator names)
//! - AC name: `[a-z0-9]+(-[a-z0-9]+)*` (mount point and port names)

use std::collections::HashMap;

use oci2aci_core::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};

const IDENTIFIER_SEPARATORS: &[char] = &['-', '.', '_', '~', '/'];
const NAME_SEPARATORS: &[char] = &['-'];

/// Operating systems a manifest `os` label may name, with their architectures.
const VALID_OS_ARCH: &[(&str, &[&str])] = &[
    (
        "linux",
        &[
            "amd64",
            "i386",
            "aarch64",
            "aarch64_be",
            "armv6l",
            "armv7l",
            "armv7b",
            "ppc64",
            "ppc64le",
            "s390x",
        ],
    ),
    ("freebsd", &["amd64", "i386", "arm"]),
    ("darwin", &["x86_64", "i386"]),
];

/// A validated AC identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AcIdentifier(String);

impl AcIdentifier {
    /// Validate and wrap an identifier.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        check_syntax(&value, IDENTIFIER_SEPARATORS).map_err(|reason| {
            ConvertError::InvalidName {
                name: value.clone(),
                reason,
            }
        })?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AcIdentifier {
    type Error = ConvertError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AcIdentifier> for String {
    fn from(id: AcIdentifier) -> Self {
        id.0
    }
}

impl std::fmt::Display for AcIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated AC name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AcName(String);

impl AcName {
    /// Validate and wrap a name.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        check_syntax(&value, NAME_SEPARATORS).map_err(|reason| ConvertError::InvalidName {
            name: value.clone(),
            reason,
        })?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AcName {
    type Error = ConvertError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AcName> for String {
    fn from(name: AcName) -> Self {
        name.0
    }
}

impl std::fmt::Display for AcName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn check_syntax(value: &str, separators: &[char]) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Err("must not be empty".to_string());
    }

    // Start as if a separator was just seen so a leading separator is rejected.
    let mut after_separator = true;
    for (i, c) in value.chars().enumerate() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            after_separator = false;
        } else if separators.contains(&c) {
            if after_separator {
                return Err(format!("unexpected '{}' at position {}", c, i));
            }
            after_separator = true;
        } else {
            return Err(format!("invalid character '{}' at position {}", c, i));
        }
    }

    if after_separator {
        return Err("must end with a lowercase letter or digit".to_string());
    }
    Ok(())
}

/// A manifest label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: AcIdentifier,
    pub value: String,
}

impl Label {
    pub fn new(name: AcIdentifier, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Check label names and the `os`/`arch` pair.
pub fn validate_labels(labels: &[Label]) -> std::result::Result<(), String> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for label in labels {
        if label.name.as_str() == "name" {
            return Err(r#"invalid label name: "name""#.to_string());
        }
        if seen.insert(label.name.as_str(), label.value.as_str()).is_some() {
            return Err(format!("duplicate labels of name {:?}", label.name.as_str()));
        }
    }

    let Some(os) = seen.get("os") else {
        return Ok(());
    };

    let Some((_, archs)) = VALID_OS_ARCH.iter().find(|(name, _)| name == os) else {
        let valid: Vec<&str> = VALID_OS_ARCH.iter().map(|(name, _)| *name).collect();
        return Err(format!(
            "bad os {:?} (must be one of: {})",
            os,
            valid.join(", ")
        ));
    };

    // arch only makes sense once os is known
    if let Some(arch) = seen.get("arch") {
        if !archs.contains(arch) {
            return Err(format!(
                "bad arch {:?} for {} (must be one of: {})",
                arch,
                os,
                archs.join(", ")
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(name: &str, value: &str) -> Label {
        Label::new(AcIdentifier::new(name).unwrap(), value)
    }

    #[test]
    fn test_identifier_accepts_valid() {
        for id in ["oci", "example.com/app", "a-b_c~d.e/f", "v1", "0"] {
            assert!(AcIdentifier::new(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn test_identifier_rejects_invalid() {
        for id in ["", "App", "-app", "app-", "a--b", "a b", "a/", "/a", "a:b"] {
            let err = AcIdentifier::new(id).unwrap_err();
            assert!(
                matches!(err, ConvertError::InvalidName { .. }),
                "{id} should be rejected"
            );
        }
    }

    #[test]
    fn test_identifier_error_reason() {
        let err = AcIdentifier::new("Bad").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid name \"Bad\": invalid character 'B' at position 0"
        );
    }

    #[test]
    fn test_name_only_allows_dashes() {
        assert!(AcName::new("proc").is_ok());
        assert!(AcName::new("data-volume-1").is_ok());
        assert!(AcName::new("data.volume").is_err());
        assert!(AcName::new("data/volume").is_err());
        assert!(AcName::new("data_volume").is_err());
    }

    #[test]
    fn test_identifier_serde_validates() {
        let id: AcIdentifier = serde_json::from_str("\"example.com/app\"").unwrap();
        assert_eq!(id.as_str(), "example.com/app");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"example.com/app\"");
        assert!(serde_json::from_str::<AcIdentifier>("\"Not Valid\"").is_err());
    }

    #[test]
    fn test_validate_labels_accepts_known_platform() {
        let labels = vec![
            label("version", "0.2.0"),
            label("os", "linux"),
            label("arch", "amd64"),
        ];
        assert!(validate_labels(&labels).is_ok());
    }

    #[test]
    fn test_validate_labels_without_os_skips_arch() {
        let labels = vec![label("arch", "anything")];
        assert!(validate_labels(&labels).is_ok());
    }

    #[test]
    fn test_validate_labels_rejects_unknown_os() {
        let labels = vec![label("os", "plan9")];
        let err = validate_labels(&labels).unwrap_err();
        assert!(err.contains("bad os"));
    }

    #[test]
    fn test_validate_labels_rejects_empty_os() {
        let labels = vec![label("os", ""), label("arch", "")];
        assert!(validate_labels(&labels).is_err());
    }

    #[test]
    fn test_validate_labels_rejects_bad_arch() {
        let labels = vec![label("os", "darwin"), label("arch", "amd64")];
        let err = validate_labels(&labels).unwrap_err();
        assert!(err.contains("bad arch"));
    }

    #[test]
    fn test_validate_labels_rejects_duplicates_and_name() {
        let dup = vec![label("os", "linux"), label("os", "linux")];
        assert!(validate_labels(&dup).unwrap_err().contains("duplicate"));

        let reserved = vec![label("name", "x")];
        assert!(validate_labels(&reserved).is_err());
    }
}
