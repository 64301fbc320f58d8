//! oci2aci Core - Foundational Types
//!
//! Error taxonomy and configuration shared by the conversion engine and
//! the command-line front end.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{Compression, ConvertConfig, LogLevel, DEFAULT_MANIFEST_NAME};
pub use error::{ConvertError, Result, Stage};

/// oci2aci version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
