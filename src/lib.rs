//! # setup-wash
//!
//! Resolves a requested `wash` version to a platform-specific GitHub release
//! asset, downloads and unpacks it, caches it by (tool, version) and returns the
//! path of the installed executable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use setup_wash::Api;
//!
//! #[tokio::main]
//! async fn main() {
//!     let installed = Api::new().install("latest").await.unwrap();
//!     println!("wash {} at {}", installed.version(), installed.result.bin_path.display());
//! }
//! ```

pub mod api;
pub mod archive;
pub mod cache;
pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod install;
pub mod locator;
pub mod logging;
pub mod platform;
pub mod probe;
pub mod progress;
pub mod tool;
pub mod version;

pub use api::{Api, Installed};
pub use cache::CacheStore;
pub use downloader::{AssetDownloader, GitHubClient, ProgressFn};
pub use error::{InstallError, Result};
pub use fetcher::{Fetcher, WorkingArtifact};
pub use install::{InstallPipeline, InstallResult};
pub use platform::PlatformDescriptor;
pub use tool::ToolSpec;
pub use version::{ReleaseIndex, ResolvedVersion, VersionResolver, VersionSpec};
