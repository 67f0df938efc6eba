//! Version specifier classification and range resolution.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use semver::{Version, VersionReq};
use tracing::{debug, info, warn};

use crate::error::{InstallError, Result};
use crate::tool::ToolSpec;

pub const LATEST: &str = "latest";

/// Source of published release tags.
#[async_trait]
pub trait ReleaseIndex: Send + Sync {
    /// Every published (non-draft) release tag, in any order.
    async fn release_tags(&self) -> Result<Vec<String>>;
}

/// Caller-supplied version request, classified lexically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    Latest,
    Exact(String),
    /// A `^` or `~` prefixed semver range.
    Range(String),
}

impl VersionSpec {
    /// Classify `raw`. An exact version must be a semver version, optionally
    /// prefixed with `v`, and is stored without the prefix.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == LATEST {
            return Ok(Self::Latest);
        }
        if raw.starts_with('^') || raw.starts_with('~') {
            return Ok(Self::Range(raw.to_owned()));
        }

        let bare = raw.strip_prefix('v').unwrap_or(raw);
        match Version::parse(bare) {
            Ok(_) => Ok(Self::Exact(bare.to_owned())),
            Err(e) => {
                debug!(version = %raw, error = %e, "Rejected version specifier");
                Err(InstallError::InvalidVersion {
                    version: raw.to_owned(),
                })
            }
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Latest => f.write_str(LATEST),
            VersionSpec::Exact(v) | VersionSpec::Range(v) => f.write_str(v),
        }
    }
}

/// Outcome of version resolution. `Latest` stays floating until the
/// downloaded binary is probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedVersion {
    Latest,
    Exact(String),
}

impl ResolvedVersion {
    pub fn as_str(&self) -> &str {
        match self {
            ResolvedVersion::Latest => LATEST,
            ResolvedVersion::Exact(v) => v,
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, ResolvedVersion::Latest)
    }
}

impl fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns a [`VersionSpec`] into a [`ResolvedVersion`], consulting the
/// release index only for ranges.
pub struct VersionResolver {
    tool: ToolSpec,
    index: Arc<dyn ReleaseIndex>,
}

impl VersionResolver {
    pub fn new(tool: ToolSpec, index: Arc<dyn ReleaseIndex>) -> Self {
        Self { tool, index }
    }

    /// Never fails: an unsatisfiable or unparseable range, or an unreachable
    /// index, degrades to [`ResolvedVersion::Latest`] with a warning.
    pub async fn resolve(&self, spec: &VersionSpec) -> ResolvedVersion {
        match spec {
            VersionSpec::Latest => ResolvedVersion::Latest,
            VersionSpec::Exact(v) => ResolvedVersion::Exact(v.clone()),
            VersionSpec::Range(range) => {
                info!(%range, "Resolving semver range");
                match self.max_satisfying(range).await {
                    Some(version) => {
                        info!(%range, %version, "Resolved semver range");
                        ResolvedVersion::Exact(version.to_string())
                    }
                    None => {
                        warn!("Could not resolve semver {range}, falling back to latest");
                        ResolvedVersion::Latest
                    }
                }
            }
        }
    }

    async fn max_satisfying(&self, range: &str) -> Option<Version> {
        let req = match VersionReq::parse(range) {
            Ok(req) => req,
            Err(e) => {
                warn!(%range, error = %e, "Invalid semver range");
                return None;
            }
        };

        let tags = match self.index.release_tags().await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(error = %e, "Error resolving version");
                return None;
            }
        };
        debug!(count = tags.len(), "Fetched release tags");

        max_satisfying(&self.tool, &tags, &req)
    }
}

/// Highest non-prerelease version among `tags` matching `req`.
pub fn max_satisfying(tool: &ToolSpec, tags: &[String], req: &VersionReq) -> Option<Version> {
    tags.iter()
        .filter_map(|tag| tool.parse_tag(tag))
        .filter(|v| v.pre.is_empty() && req.matches(v))
        .max()
}
