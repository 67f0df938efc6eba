use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::cache::CacheStore;
use crate::downloader::{AssetDownloader, GitHubClient, ProgressFn};
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::install::{InstallPipeline, InstallResult};
use crate::platform::PlatformDescriptor;
use crate::probe;
use crate::progress::default_progress_fn;
use crate::tool::ToolSpec;
use crate::version::{ReleaseIndex, VersionResolver};

// ──────────────────────────────────────────────────────────────────────────────
// Api
// ──────────────────────────────────────────────────────────────────────────────

/// Top-level entry-point with a chainable builder API.
///
/// # Example
/// ```rust,no_run
/// use setup_wash::Api;
///
/// #[tokio::main]
/// async fn main() {
///     let installed = Api::new()
///         .cache_dir("./tool-cache")
///         .install("^1.0.0")
///         .await
///         .unwrap();
///     println!("{}", installed.result.bin_path.display());
/// }
/// ```
pub struct Api {
    tool: ToolSpec,
    cache_dir: PathBuf,
    temp_dir: PathBuf,
    retry_count: u32,
    retry_delay: Duration,
    proxy: Option<String>,
    token: Option<String>,
    progress: Option<ProgressFn>,
    platform: Option<PlatformDescriptor>,
    index: Option<Arc<dyn ReleaseIndex>>,
    downloader: Option<Arc<dyn AssetDownloader>>,
}

/// Pipeline result plus the version the installed binary reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    pub result: InstallResult,
    pub reported_version: Option<String>,
}

impl Installed {
    /// Version to report to the caller: what the binary says, else the cache key.
    pub fn version(&self) -> &str {
        self.reported_version.as_deref().unwrap_or(&self.result.version)
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// `RUNNER_TOOL_CACHE`, else the user cache directory, else the system temp dir.
pub fn default_cache_dir() -> PathBuf {
    env_non_empty("RUNNER_TOOL_CACHE")
        .map(PathBuf::from)
        .or_else(|| dirs::cache_dir().map(|d| d.join("setup-wash")))
        .unwrap_or_else(|| std::env::temp_dir().join("setup-wash-cache"))
}

/// `RUNNER_TEMP`, else the system temp dir.
pub fn default_temp_dir() -> PathBuf {
    env_non_empty("RUNNER_TEMP")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

impl Api {
    /// Create a new `Api` for `wash` with defaults taken from the environment.
    ///
    /// Proxy is read from `HTTP_PROXY` / `HTTPS_PROXY`, the API token from
    /// `GITHUB_TOKEN` / `GH_TOKEN`.
    pub fn new() -> Self {
        Self {
            tool: ToolSpec::wash(),
            cache_dir: default_cache_dir(),
            temp_dir: default_temp_dir(),
            retry_count: 3,
            retry_delay: Duration::from_secs(3),
            proxy: env_non_empty("HTTP_PROXY").or_else(|| env_non_empty("HTTPS_PROXY")),
            token: env_non_empty("GITHUB_TOKEN").or_else(|| env_non_empty("GH_TOKEN")),
            progress: Some(default_progress_fn()),
            platform: None,
            index: None,
            downloader: None,
        }
    }

    /// Manage a different tool (builder).
    pub fn tool(mut self, tool: ToolSpec) -> Self {
        self.tool = tool;
        self
    }

    /// Set the tool cache root (builder).
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set the staging root for downloads (builder).
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Override the progress callback (builder).
    pub fn set_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Disable progress output (builder).
    pub fn no_progress(mut self) -> Self {
        self.progress = None;
        self
    }

    /// Set the number of attempts per network request (builder).
    pub fn set_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    /// Set the retry delay in seconds (builder).
    pub fn set_retry_delay_secs(mut self, secs: u64) -> Self {
        self.retry_delay = Duration::from_secs(secs);
        self
    }

    /// Set an explicit HTTP/HTTPS proxy URL (builder).
    pub fn set_proxy(mut self, proxy: &str) -> Self {
        self.proxy = Some(proxy.to_owned());
        self
    }

    /// Set the GitHub API token (builder).
    pub fn set_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_owned());
        self
    }

    /// Skip host introspection and install for `platform` (builder).
    pub fn platform(mut self, platform: PlatformDescriptor) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Replace the GitHub release index (builder).
    pub fn release_index(mut self, index: Arc<dyn ReleaseIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Replace the GitHub asset downloader (builder).
    pub fn downloader(mut self, downloader: Arc<dyn AssetDownloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Assemble the pipeline, resolving the host platform if none was set.
    pub fn pipeline(self) -> Result<InstallPipeline> {
        let platform = match self.platform {
            Some(platform) => platform,
            None => PlatformDescriptor::detect(&self.tool)?,
        };

        let github = Arc::new(GitHubClient::with_config(
            &self.tool,
            self.retry_count,
            self.retry_delay,
            self.proxy,
            self.token,
            self.progress,
        ));
        let index = self
            .index
            .unwrap_or_else(|| github.clone() as Arc<dyn ReleaseIndex>);
        let downloader = self
            .downloader
            .unwrap_or_else(|| github as Arc<dyn AssetDownloader>);

        Ok(InstallPipeline {
            resolver: VersionResolver::new(self.tool.clone(), index),
            cache: CacheStore::new(self.cache_dir, platform.arch),
            fetcher: Fetcher::new(self.tool.clone(), downloader, self.temp_dir),
            platform,
            tool: self.tool,
        })
    }

    /// Install the tool for `version` (`latest`, an exact version, or a `^`/`~` range)
    /// and verify the result by running its version flag.
    pub async fn install(self, version: &str) -> Result<Installed> {
        let pipeline = self.pipeline()?;
        let result = pipeline.install(version).await?;

        let reported_version = probe::probe(&result.bin_path, &pipeline.tool).await;
        if reported_version.is_none() {
            warn!(
                "Could not verify {} at {}",
                pipeline.tool.name,
                result.bin_path.display()
            );
        }

        Ok(Installed {
            result,
            reported_version,
        })
    }
}

impl Default for Api {
    fn default() -> Self {
        Self::new()
    }
}
