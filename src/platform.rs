//! Host OS/architecture to release-asset mapping.

use std::fmt;

use crate::error::{InstallError, Result};
use crate::tool::ToolSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Darwin,
    Linux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Amd64,
    Arm64,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::Amd64 => f.write_str("x64"),
            Arch::Arm64 => f.write_str("arm64"),
        }
    }
}

/// Release asset selection for one host, computed once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDescriptor {
    pub os_family: OsFamily,
    pub arch: Arch,
    /// Target triple used in asset names (e.g. `x86_64-unknown-linux-musl`).
    pub platform_tag: &'static str,
    pub asset_name: String,
    pub is_windows: bool,
}

impl PlatformDescriptor {
    /// Resolve for the running host.
    pub fn detect(tool: &ToolSpec) -> Result<Self> {
        Self::resolve(tool, std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Resolve for an explicit OS/arch pair as reported by `std::env::consts`
    /// (Node-style `win32`, `arm64` and `x64` spellings are accepted too).
    pub fn resolve(tool: &ToolSpec, os: &str, arch: &str) -> Result<Self> {
        let arch_kind = match arch {
            "aarch64" | "arm64" => Arch::Arm64,
            _ => Arch::Amd64,
        };

        let (os_family, platform_tag, ext) = match os {
            "windows" | "win32" => (OsFamily::Windows, "x86_64-pc-windows-msvc", ".exe"),
            "macos" | "darwin" => match arch_kind {
                Arch::Arm64 => (OsFamily::Darwin, "aarch64-apple-darwin", ""),
                Arch::Amd64 => (OsFamily::Darwin, "x86_64-apple-darwin", ""),
            },
            "linux" => match arch_kind {
                Arch::Arm64 => (OsFamily::Linux, "aarch64-unknown-linux-musl", ""),
                Arch::Amd64 => (OsFamily::Linux, "x86_64-unknown-linux-musl", ""),
            },
            _ => {
                return Err(InstallError::UnsupportedPlatform {
                    os: os.to_owned(),
                    arch: arch.to_owned(),
                })
            }
        };

        Ok(Self {
            os_family,
            arch: arch_kind,
            platform_tag,
            asset_name: format!("{}-{platform_tag}{ext}", tool.name),
            is_windows: os_family == OsFamily::Windows,
        })
    }
}
