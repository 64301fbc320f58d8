//! OCI bundle support.
//!
//! # Bundle layout
//!
//! ```text
//! bundle/
//! ├── config.json      (platform + process spec)
//! ├── runtime.json     (hooks + resources spec)
//! └── rootfs/          (root filesystem)
//! ```

mod bundle;
mod spec;

pub use bundle::{OciBundle, BUNDLE_ROOTFS_DIR, CONFIG_FILE, RUNTIME_FILE};
pub use spec::{
    Cpu, Hook, Hooks, Linux, LinuxRuntime, Memory, MountPoint, OciSpec, Platform, Process,
    Resources, RuntimeSpec, User,
};
