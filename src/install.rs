use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::error::{InstallError, Result};
use crate::fetcher::Fetcher;
use crate::locator;
use crate::platform::PlatformDescriptor;
use crate::probe::{self, timestamp_version};
use crate::tool::ToolSpec;
use crate::version::{ResolvedVersion, VersionResolver, VersionSpec};

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallResult {
    /// Absolute path to the installed executable.
    pub bin_path: PathBuf,
    /// Concrete version the install is cached under.
    pub version: String,
    /// Whether the install was served from the cache.
    pub cache_hit: bool,
}

impl InstallResult {
    /// Directory containing the executable, suitable for `PATH`.
    pub fn bin_dir(&self) -> &Path {
        self.bin_path.parent().unwrap_or(&self.bin_path)
    }
}

/// Resolve, fetch, locate and cache one tool.
pub struct InstallPipeline {
    pub tool: ToolSpec,
    pub platform: PlatformDescriptor,
    pub resolver: VersionResolver,
    pub cache: CacheStore,
    pub fetcher: Fetcher,
}

impl InstallPipeline {
    /// Run the pipeline for a raw version specifier (`latest`, `1.2.3`, `^1.2`).
    ///
    /// Fatal component errors are returned unchanged.
    pub async fn install(&self, spec: &str) -> Result<InstallResult> {
        let spec = VersionSpec::parse(spec)?;
        debug!(
            %spec,
            asset = %self.platform.asset_name,
            is_windows = self.platform.is_windows,
            "Starting installer"
        );

        let version = self.resolver.resolve(&spec).await;
        let binary_name = self.tool.binary_name(self.platform.is_windows);

        if let ResolvedVersion::Exact(v) = &version {
            if let Some(dir) = self.cache.lookup(&self.tool.name, v) {
                info!("Found cached version at: {}", dir.display());
                return Ok(InstallResult {
                    bin_path: dir.join(&binary_name),
                    version: v.clone(),
                    cache_hit: true,
                });
            }
        }

        info!("Tool not found in cache, downloading...");
        let artifact = self.fetcher.fetch(&version, &self.platform).await?;

        let binary_path = if artifact.binary_path.is_file() {
            artifact.binary_path.clone()
        } else {
            locator::locate(&artifact.dir, &self.tool, self.platform.is_windows)?
        };
        let binary_dir = binary_path
            .parent()
            .ok_or_else(|| InstallError::BinaryNotFound {
                tool: self.tool.name.clone(),
                dir: artifact.dir.clone(),
            })?
            .to_path_buf();
        debug!(binary = %binary_path.display(), "Located binary");

        let cache_version = match &version {
            ResolvedVersion::Exact(v) => {
                info!("Caching with specified version: {v}");
                v.clone()
            }
            ResolvedVersion::Latest => match probe::probe(&binary_path, &self.tool).await {
                Some(actual) => {
                    info!("Caching with actual version: {actual}");
                    actual
                }
                None => {
                    let stamp = timestamp_version();
                    warn!("Could not determine version, caching with timestamp: {stamp}");
                    stamp
                }
            },
        };

        let cached_dir = self.cache.store(&binary_dir, &self.tool.name, &cache_version)?;
        let bin_path = cached_dir.join(&binary_name);
        info!("{} installed to {}", self.tool.name, bin_path.display());

        Ok(InstallResult {
            bin_path,
            version: cache_version,
            cache_hit: false,
        })
    }
}
