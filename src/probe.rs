//! Learning a binary's real version by running it.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::tool::ToolSpec;

/// Run `<binary> <version flag>` and parse the reported version.
///
/// Returns `None` if the binary fails to start, exits non-zero, or prints
/// something that does not look like `<tool> v?X.Y.Z`.
pub async fn probe(binary: &Path, tool: &ToolSpec) -> Option<String> {
    debug!(binary = %binary.display(), "Getting version from binary");

    let output = match Command::new(binary).arg(&tool.version_flag).output().await {
        Ok(output) => output,
        Err(e) => {
            warn!("Error getting {} version: {e}", tool.name);
            return None;
        }
    };

    if !output.status.success() {
        warn!(
            "Error getting {} version: {} exited with {}",
            tool.name,
            binary.display(),
            output.status
        );
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = parse_version_output(&tool.name, &stdout);
    match &version {
        Some(v) => debug!(version = %v, "Detected version"),
        None => debug!("Could not determine version from binary output"),
    }
    version
}

/// Extract `X.Y.Z` from output such as `wash 0.15.0` or `wash v1.0.0`.
pub fn parse_version_output(tool_name: &str, output: &str) -> Option<String> {
    let pattern = format!(r"{}\s+v?(\d+\.\d+\.\d+)", regex::escape(tool_name));
    let re = Regex::new(&pattern).ok()?;
    re.captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Cache key used when a `latest` download could not be probed.
pub fn timestamp_version() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("latest-{millis}")
}
