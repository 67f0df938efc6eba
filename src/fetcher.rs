use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::archive::{self, Extraction};
use crate::downloader::AssetDownloader;
use crate::error::{InstallError, Result};
use crate::platform::PlatformDescriptor;
use crate::tool::ToolSpec;
use crate::version::ResolvedVersion;

/// How the downloaded asset was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    Archive,
    RawBinary,
}

/// Extracted (or copied) asset for one pipeline run.
///
/// The staging directory is removed when this value is dropped.
#[derive(Debug)]
pub struct WorkingArtifact {
    staging: TempDir,
    /// Directory holding the extracted tree.
    pub dir: PathBuf,
    /// Expected binary location, `dir/<tool>[.exe]`. May not exist when the
    /// archive nests the binary in a subdirectory.
    pub binary_path: PathBuf,
    pub format: AssetFormat,
}

impl WorkingArtifact {
    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }
}

/// Downloads the release asset and stages it as a working directory.
pub struct Fetcher {
    tool: ToolSpec,
    downloader: Arc<dyn AssetDownloader>,
    temp_root: PathBuf,
}

impl Fetcher {
    pub fn new(
        tool: ToolSpec,
        downloader: Arc<dyn AssetDownloader>,
        temp_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tool,
            downloader,
            temp_root: temp_root.into(),
        }
    }

    pub async fn fetch(
        &self,
        version: &ResolvedVersion,
        platform: &PlatformDescriptor,
    ) -> Result<WorkingArtifact> {
        let url = self.tool.download_url(version.as_str(), &platform.asset_name);
        info!("Downloading {} from {url}", self.tool.name);

        fs::create_dir_all(&self.temp_root)
            .map_err(|e| InstallError::io("create", &self.temp_root, e))?;
        let staging = tempfile::Builder::new()
            .prefix(&format!("{}-", self.tool.name))
            .tempdir_in(&self.temp_root)
            .map_err(|e| InstallError::io("create", &self.temp_root, e))?;

        let download_path = staging.path().join(&platform.asset_name);
        self.downloader.download(&url, &download_path).await?;
        debug!(path = %download_path.display(), "Downloaded to");

        let extract_dir = staging.path().join("extract");
        let binary_name = self.tool.binary_name(platform.is_windows);

        let (dir, format) = match archive::extract(&download_path, &extract_dir)? {
            Extraction::Extracted(dir) => {
                debug!("Successfully extracted archive");
                (dir, AssetFormat::Archive)
            }
            Extraction::NotAnArchive => {
                debug!("Not an archive, using direct download");
                install_raw_binary(&download_path, &extract_dir, &binary_name, platform.is_windows)?;
                (extract_dir, AssetFormat::RawBinary)
            }
        };

        Ok(WorkingArtifact {
            staging,
            binary_path: dir.join(&binary_name),
            dir,
            format,
        })
    }
}

/// Copy a raw downloaded binary to `dir/<binary_name>`, executable on non-Windows.
fn install_raw_binary(
    download: &Path,
    dir: &Path,
    binary_name: &str,
    is_windows: bool,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| InstallError::io("create", dir, e))?;
    let target = dir.join(binary_name);
    fs::copy(download, &target).map_err(|e| InstallError::io("copy", &target, e))?;

    if !is_windows {
        make_executable(&target)?;
    }
    Ok(target)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|e| InstallError::io("chmod", path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
