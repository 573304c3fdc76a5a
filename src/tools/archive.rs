//! Zip bundles for tools that produce several files

use super::error::{ToolError, ToolResult};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Pack `(name, bytes)` entries into a zip archive. Names must be unique.
pub fn zip_files(entries: &[(String, Vec<u8>)]) -> ToolResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (name, bytes) in entries {
        if name.is_empty() || name.contains("..") || name.starts_with('/') {
            return Err(ToolError::processing(format!("Invalid archive entry name '{}'", name)));
        }
        writer.start_file(name.as_str(), options)?;
        writer.write_all(bytes)?;
    }

    Ok(writer.finish()?.into_inner())
}
