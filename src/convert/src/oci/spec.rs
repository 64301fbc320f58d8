//! OCI bundle specification types.
//!
//! Only the subset of `config.json` and `runtime.json` that feeds the ACI
//! manifest is modelled. Absent fields and explicit `null`s decode to their
//! defaults; values of the wrong type are rejected.

use serde::{Deserialize, Deserializer, Serialize};

/// Platform and process specification (`config.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OciSpec {
    /// Spec version (e.g., "0.2.0")
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,

    /// Target platform
    #[serde(deserialize_with = "null_as_default")]
    pub platform: Platform,

    /// Container process
    #[serde(deserialize_with = "null_as_default")]
    pub process: Process,

    /// Mount points, in declaration order
    #[serde(deserialize_with = "null_as_default")]
    pub mounts: Vec<MountPoint>,

    /// Linux-specific settings
    #[serde(deserialize_with = "null_as_default")]
    pub linux: Linux,
}

/// Operating system and architecture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Platform {
    #[serde(deserialize_with = "null_as_default")]
    pub os: String,
    #[serde(deserialize_with = "null_as_default")]
    pub arch: String,
}

/// Process configuration for the container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Process {
    /// Command line arguments
    #[serde(deserialize_with = "null_as_default")]
    pub args: Vec<String>,

    /// Working directory
    #[serde(deserialize_with = "null_as_default")]
    pub cwd: String,

    /// User and group IDs
    #[serde(deserialize_with = "null_as_default")]
    pub user: User,

    /// Environment variables in `KEY=VALUE` form
    #[serde(deserialize_with = "null_as_default")]
    pub env: Vec<String>,
}

/// User and group IDs for the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    #[serde(deserialize_with = "null_as_default")]
    pub uid: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub gid: u32,
}

/// A named mount point inside the container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountPoint {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub path: String,
}

/// Linux-specific platform settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Linux {
    /// Capabilities retained by the process, in declaration order
    #[serde(deserialize_with = "null_as_default")]
    pub capabilities: Vec<String>,
}

/// Hooks and resources specification (`runtime.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSpec {
    #[serde(deserialize_with = "null_as_default")]
    pub hooks: Hooks,
    #[serde(deserialize_with = "null_as_default")]
    pub linux: LinuxRuntime,
}

/// Lifecycle hooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hooks {
    #[serde(deserialize_with = "null_as_default")]
    pub prestart: Vec<Hook>,
    #[serde(deserialize_with = "null_as_default")]
    pub poststop: Vec<Hook>,
}

/// A single hook command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hook {
    #[serde(deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(deserialize_with = "null_as_default")]
    pub args: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub env: Vec<String>,
}

/// Linux runtime settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinuxRuntime {
    pub resources: Option<Resources>,
}

/// Cgroup resource limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    #[serde(deserialize_with = "null_as_default")]
    pub cpu: Cpu,
    #[serde(deserialize_with = "null_as_default")]
    pub memory: Memory,
}

/// CPU limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cpu {
    /// Microseconds of CPU time per period (0 = unset)
    #[serde(deserialize_with = "null_as_default")]
    pub quota: i64,
}

/// Memory limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Memory {
    /// Limit in bytes (0 = unset)
    #[serde(deserialize_with = "null_as_default")]
    pub limit: i64,
}

impl RuntimeSpec {
    /// CPU quota, or 0 when no resources are declared.
    pub fn cpu_quota(&self) -> i64 {
        self.linux.resources.map(|r| r.cpu.quota).unwrap_or(0)
    }

    /// Memory limit in bytes, or 0 when no resources are declared.
    pub fn memory_limit(&self) -> i64 {
        self.linux.resources.map(|r| r.memory.limit).unwrap_or(0)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
