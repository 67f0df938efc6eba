use semver::Version;

/// Identity of the single tool managed by a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// Binary and asset name prefix (e.g. `wash`).
    pub name: String,
    /// GitHub organisation owning the releases.
    pub org: String,
    /// Repository publishing the releases.
    pub repo: String,
    /// Download host.
    pub host: String,
    /// Flag that makes the binary print its version.
    pub version_flag: String,
}

impl ToolSpec {
    pub fn new(name: &str, org: &str, repo: &str) -> Self {
        Self {
            name: name.to_owned(),
            org: org.to_owned(),
            repo: repo.to_owned(),
            host: "github.com".to_owned(),
            version_flag: "--version".to_owned(),
        }
    }

    /// The wasmCloud shell published by `cosmonic-labs/wash`.
    pub fn wash() -> Self {
        Self::new("wash", "cosmonic-labs", "wash")
    }

    /// `owner/repo` form.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.org, self.repo)
    }

    pub fn binary_name(&self, is_windows: bool) -> String {
        if is_windows {
            format!("{}.exe", self.name)
        } else {
            self.name.clone()
        }
    }

    /// Download URL for `asset_name`. `latest` targets the latest-release
    /// endpoint, anything else the `v<version>` tag.
    pub fn download_url(&self, version: &str, asset_name: &str) -> String {
        if version == "latest" {
            format!(
                "https://{}/{}/{}/releases/latest/download/{}",
                self.host, self.org, self.repo, asset_name
            )
        } else {
            format!(
                "https://{}/{}/{}/releases/download/v{}/{}",
                self.host, self.org, self.repo, version, asset_name
            )
        }
    }

    /// Parse a release tag such as `wash-v0.39.0`, `v1.0.0` or `1.0.0`.
    pub fn parse_tag(&self, tag: &str) -> Option<Version> {
        let tag = tag.trim();
        let tag = tag
            .strip_prefix(self.name.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .unwrap_or(tag);
        let tag = tag.strip_prefix('v').unwrap_or(tag);
        Version::parse(tag).ok()
    }
}

impl Default for ToolSpec {
    fn default() -> Self {
        Self::wash()
    }
}
