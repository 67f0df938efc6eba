use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Proxy};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{InstallError, Result};
use crate::progress::mib_per_sec;
use crate::tool::ToolSpec;
use crate::version::ReleaseIndex;

/// Callback type for reporting download progress.
/// Arguments: source URL, bytes downloaded, total bytes, MiB/s, is_complete
pub type ProgressFn = Arc<dyn Fn(&str, u64, u64, f64, bool) + Send + Sync>;

/// Fetches a release asset from `url` into the file at `dest`.
#[async_trait]
pub trait AssetDownloader: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

const PER_PAGE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct ReleaseEntry {
    tag_name: String,
    #[serde(default)]
    draft: bool,
}

/// GitHub-backed release index and asset downloader.
pub struct GitHubClient {
    /// Number of attempts for each request.
    pub retry_count: u32,
    /// Delay between retries.
    pub retry_delay: Duration,
    /// GitHub API URL listing the repository's releases.
    pub api_url: String,
    /// Optional HTTP proxy URL.
    pub proxy: Option<String>,
    /// Optional API token.
    pub token: Option<String>,
    /// Optional progress callback.
    pub progress: Option<ProgressFn>,
    /// Total time allowed for one release-index API request.
    pub request_timeout: Duration,
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// Longest gap between two reads of an asset body. Asset downloads have
    /// no total limit, so a slow but steady transfer completes.
    pub read_timeout: Duration,
}

impl GitHubClient {
    /// Create a client with default settings.
    pub fn new(tool: &ToolSpec) -> Self {
        Self::with_config(tool, 3, Duration::from_secs(3), None, None, None)
    }

    /// Create a client with explicit configuration.
    pub fn with_config(
        tool: &ToolSpec,
        retry_count: u32,
        retry_delay: Duration,
        proxy: Option<String>,
        token: Option<String>,
        progress: Option<ProgressFn>,
    ) -> Self {
        Self {
            retry_count: retry_count.max(1),
            retry_delay,
            api_url: format!("https://api.github.com/repos/{}/releases", tool.slug()),
            proxy,
            token,
            progress,
            request_timeout: REQUEST_TIMEOUT,
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
        }
    }

    /// Build an HTTP client, optionally with proxy support.
    ///
    /// `total` caps each whole request; asset downloads pass `None` and rely
    /// on the connect and read timeouts.
    fn build_client(
        &self,
        total: Option<Duration>,
    ) -> std::result::Result<Client, reqwest::Error> {
        let mut builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .user_agent(concat!("setup-wash/", env!("CARGO_PKG_VERSION")));
        if let Some(total) = total {
            builder = builder.timeout(total);
        }
        if let Some(proxy_url) = &self.proxy {
            builder = builder.proxy(Proxy::all(proxy_url)?);
        }
        builder.build()
    }

    async fn list_page(
        &self,
        client: &Client,
        page: usize,
    ) -> std::result::Result<Vec<ReleaseEntry>, String> {
        let url = format!("{}?per_page={PER_PAGE}&page={page}", self.api_url);
        let mut request = client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("GitHub API returned {status}: {body}"));
        }

        resp.json().await.map_err(|e| e.to_string())
    }

    async fn list_tags(&self) -> std::result::Result<Vec<String>, String> {
        let client = self
            .build_client(Some(self.request_timeout))
            .map_err(|e| e.to_string())?;
        let mut tags = Vec::new();
        for page in 1.. {
            let releases = self.list_page(&client, page).await?;
            let last_page = releases.len() < PER_PAGE;
            tags.extend(releases.into_iter().filter(|r| !r.draft).map(|r| r.tag_name));
            if last_page {
                break;
            }
        }
        Ok(tags)
    }

    /// Stream `url` into `dest`, reporting progress.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> std::result::Result<(), String> {
        let client = self.build_client(None).map_err(|e| e.to_string())?;
        let resp = client.get(url).send().await.map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("download failed with status {}", resp.status()));
        }

        let total = resp.content_length().unwrap_or(0);
        let mut downloaded: u64 = 0;
        let mut stream = resp.bytes_stream();
        let mut file = tokio::fs::File::create(dest).await.map_err(|e| e.to_string())?;
        let start = std::time::Instant::now();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| e.to_string())?;
            downloaded += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(|e| e.to_string())?;

            if let Some(progress) = &self.progress {
                let rate = mib_per_sec(downloaded, start.elapsed().as_secs_f64());
                progress(url, downloaded, total, rate, false);
            }
        }
        file.flush().await.map_err(|e| e.to_string())?;

        if let Some(progress) = &self.progress {
            let rate = mib_per_sec(downloaded, start.elapsed().as_secs_f64());
            progress(url, downloaded, total, rate, true);
        }

        Ok(())
    }
}

#[async_trait]
impl ReleaseIndex for GitHubClient {
    async fn release_tags(&self) -> Result<Vec<String>> {
        let mut last_err = String::new();
        for attempt in 1..=self.retry_count {
            match self.list_tags().await {
                Ok(tags) => return Ok(tags),
                Err(e) => {
                    warn!(attempt, error = %e, "Listing releases failed");
                    last_err = e;
                    if attempt < self.retry_count {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(InstallError::release_index(last_err))
    }
}

#[async_trait]
impl AssetDownloader for GitHubClient {
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut last_err = String::new();
        for attempt in 1..=self.retry_count {
            match self.fetch_to_file(url, dest).await {
                Ok(()) => {
                    debug!(%url, dest = %dest.display(), "Downloaded asset");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, %url, error = %e, "Download failed");
                    last_err = e;
                    if attempt < self.retry_count {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(InstallError::download(url, last_err))
    }
}
