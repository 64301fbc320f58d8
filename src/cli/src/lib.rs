//! oci2aci CLI - convert an OCI bundle into an App Container Image.

pub mod output;

use std::path::PathBuf;

use clap::Parser;
use oci2aci_convert::Converter;
use oci2aci_core::{Compression, ConvertConfig, LogLevel, DEFAULT_MANIFEST_NAME};

/// oci2aci - convert an OCI bundle into an App Container Image.
#[derive(Parser, Debug)]
#[command(name = "oci2aci", version, about)]
pub struct Cli {
    /// OCI bundle directory (config.json, runtime.json, rootfs/)
    pub bundle: PathBuf,

    /// Output image path; must end in ".aci"
    pub output: Option<PathBuf>,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Log level (trace, debug, info, warn, error); overrides --debug
    #[arg(long)]
    pub log_level: Option<LogLevel>,

    /// Name written to the image manifest
    #[arg(long, default_value = DEFAULT_MANIFEST_NAME)]
    pub name: String,

    /// Archive compression (none, gzip)
    #[arg(long, default_value_t = Compression::None)]
    pub compress: Compression,

    /// Directory to create working directories in
    #[arg(long)]
    pub work_root: Option<PathBuf>,
}

impl Cli {
    /// Conversion configuration selected by the flags.
    pub fn config(&self) -> ConvertConfig {
        let mut config = ConvertConfig::default()
            .with_name(self.name.as_str())
            .with_debug(self.debug)
            .with_compression(self.compress);
        if let Some(level) = self.log_level {
            config = config.with_log_level(level);
        }
        if let Some(root) = &self.work_root {
            config = config.with_work_root(root);
        }
        config
    }
}

/// Run a conversion and print where the results went.
pub fn execute(cli: &Cli, config: ConvertConfig) -> Result<(), Box<dyn std::error::Error>> {
    let converter = Converter::new(config);
    let conversion = converter.run(&cli.bundle, cli.output.as_deref())?;
    print!("{}", output::format_conversion(&conversion));
    Ok(())
}
