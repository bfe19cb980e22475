//! Host facts exposed to templates as `platform`.
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Detected operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Os {
    /// Linux.
    Linux,
    /// macOS.
    Darwin,
    /// Windows.
    Windows,
    /// Any other target.
    Other,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "Linux"),
            Self::Darwin => write!(f, "Darwin"),
            Self::Windows => write!(f, "Windows"),
            Self::Other => write!(f, "{}", std::env::consts::OS),
        }
    }
}

/// Facts about the local host.
///
/// Release fields come from `/etc/os-release` and are empty strings when
/// that file is unavailable.
#[derive(Debug, Clone, Serialize)]
pub struct Platform {
    /// Operating system name, e.g. `Linux`.
    pub system: String,
    /// CPU architecture, e.g. `x86_64`.
    pub arch: String,
    /// Number of logical CPUs.
    pub cpu_count: usize,
    /// Host name.
    pub fqdn: String,
    /// `ID` from os-release, e.g. `debian`.
    pub release_id: String,
    /// `NAME` from os-release.
    pub release_name: String,
    /// `VERSION_ID` from os-release.
    pub release_version: String,
    /// `VERSION_CODENAME` from os-release.
    pub release_codename: String,
    /// `ID_LIKE` from os-release, split on whitespace.
    pub release_like: Vec<String>,
}

impl Platform {
    /// Detect facts for the current host.
    #[must_use]
    pub fn detect() -> Self {
        let os_release = std::fs::read_to_string("/etc/os-release")
            .map(|s| parse_os_release(&s))
            .unwrap_or_default();
        let field = |key: &str| os_release.get(key).cloned().unwrap_or_default();
        Self {
            system: Self::detect_os().to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_count: std::thread::available_parallelism().map_or(1, usize::from),
            fqdn: detect_hostname(),
            release_id: field("ID"),
            release_name: field("NAME"),
            release_version: field("VERSION_ID"),
            release_codename: field("VERSION_CODENAME"),
            release_like: field("ID_LIKE")
                .split_whitespace()
                .map(String::from)
                .collect(),
        }
    }

    fn detect_os() -> Os {
        if cfg!(target_os = "linux") {
            Os::Linux
        } else if cfg!(target_os = "macos") {
            Os::Darwin
        } else if cfg!(target_os = "windows") {
            Os::Windows
        } else {
            Os::Other
        }
    }

    /// Convert to a template value.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn detect_hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .or_else(|_| std::fs::read_to_string("/etc/hostname"))
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Parse `KEY=value` lines, stripping optional quotes.
fn parse_os_release(contents: &str) -> BTreeMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}
