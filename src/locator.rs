use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{InstallError, Result};
use crate::tool::ToolSpec;

/// Find the tool binary inside `working_dir`.
///
/// Checks `working_dir/<binary>` first, then `working_dir/<entry>/<binary>`
/// for each subdirectory whose name starts with the tool name (archives such
/// as `wash-v1.0.0/wash`). The search never goes deeper than one level.
pub fn locate(working_dir: &Path, tool: &ToolSpec, is_windows: bool) -> Result<PathBuf> {
    let binary_name = tool.binary_name(is_windows);

    let direct = working_dir.join(&binary_name);
    if direct.is_file() {
        debug!(path = %direct.display(), "Found binary at working directory root");
        return Ok(direct);
    }

    let entries = fs::read_dir(working_dir).map_err(|e| InstallError::io("read", working_dir, e))?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(tool.name.as_str()))
        .map(|entry| entry.path())
        .collect();
    candidates.sort();

    for dir in candidates {
        let nested = dir.join(&binary_name);
        debug!(path = %nested.display(), "Checking nested binary path");
        if nested.is_file() {
            return Ok(nested);
        }
    }

    Err(InstallError::BinaryNotFound {
        tool: tool.name.clone(),
        dir: working_dir.to_path_buf(),
    })
}
