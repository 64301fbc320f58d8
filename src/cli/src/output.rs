//! Formatting helpers for CLI output.

use oci2aci_convert::Conversion;

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Summary lines for a finished conversion.
pub fn format_conversion(conversion: &Conversion) -> String {
    let mut out = format!(
        "Manifest: {}\nImage:    {} ({})\nImage ID: {}\n",
        conversion.manifest_path.display(),
        conversion.image.path.display(),
        format_bytes(conversion.image.size),
        conversion.image.image_id(),
    );
    if let Some(work_dir) = &conversion.work_dir {
        out.push_str(&format!("Work dir: {}\n", work_dir.display()));
    }
    out
}
