//! Publishing platforms and the platform → URL-pattern reference table.
//!
//! Patterns are matched case-insensitively against the *host* of a link, so a
//! Douyin domain buried in a query string of some other site does not pass.

use std::collections::HashMap;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, CoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Douyin,
    Bilibili,
    Xiaohongshu,
    WeixinChannels,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Douyin,
        Platform::Bilibili,
        Platform::Xiaohongshu,
        Platform::WeixinChannels,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Douyin => "douyin",
            Platform::Bilibili => "bilibili",
            Platform::Xiaohongshu => "xiaohongshu",
            Platform::WeixinChannels => "weixin_channels",
        }
    }

    /// Human-readable name used in validation messages.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Douyin => "Douyin",
            Platform::Bilibili => "Bilibili",
            Platform::Xiaohongshu => "Xiaohongshu",
            Platform::WeixinChannels => "WeChat Channels",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "douyin" => Ok(Platform::Douyin),
            "bilibili" => Ok(Platform::Bilibili),
            "xiaohongshu" => Ok(Platform::Xiaohongshu),
            "weixin_channels" => Ok(Platform::WeixinChannels),
            other => Err(CoreError::UnknownPlatform(other.to_string())),
        }
    }
}

const DEFAULT_PATTERNS: &[(Platform, &[&str])] = &[
    (
        Platform::Douyin,
        &[r"^(?:.+\.)?douyin\.com$", r"^(?:.+\.)?iesdouyin\.com$"],
    ),
    (
        Platform::WeixinChannels,
        &[r"^(?:.+\.)?weixin\.qq\.com$", r"^finder\.video\.qq\.com$"],
    ),
    (
        Platform::Xiaohongshu,
        &[
            r"^(?:.+\.)?xiaohongshu\.com$",
            r"^(?:.+\.)?xhslink\.com$",
            r"^(?:.+\.)?xhs\.cn$",
        ],
    ),
    (
        Platform::Bilibili,
        &[
            r"^(?:.+\.)?bilibili\.com$",
            r"^(?:.+\.)?b23\.tv$",
            r"^(?:.+\.)?bili\.com$",
        ],
    ),
];

/// On-disk shape of a platforms override file.
#[derive(Debug, Deserialize)]
pub struct PlatformsFile {
    pub platforms: HashMap<Platform, Vec<String>>,
}

/// Compiled platform → host-pattern table.
#[derive(Debug, Clone)]
pub struct PlatformPatterns {
    patterns: HashMap<Platform, Vec<Regex>>,
}

impl Default for PlatformPatterns {
    /// The built-in table. Its patterns are constants exercised by tests, so
    /// a pattern that fails to compile is skipped rather than surfaced.
    fn default() -> Self {
        let patterns = DEFAULT_PATTERNS
            .iter()
            .map(|(platform, raw)| {
                let compiled = raw
                    .iter()
                    .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
                    .collect();
                (*platform, compiled)
            })
            .collect();
        Self { patterns }
    }
}

impl PlatformPatterns {
    /// Compile and validate a parsed platforms file.
    ///
    /// Every known platform must carry at least one pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a platform has no patterns or a
    /// pattern is not a valid regex.
    pub fn compile(file: &PlatformsFile) -> Result<Self, ConfigError> {
        let mut patterns = HashMap::new();
        for platform in Platform::ALL {
            let raw = file.platforms.get(&platform).map_or(&[][..], Vec::as_slice);
            if raw.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "platform '{platform}' has no URL patterns"
                )));
            }
            let compiled = raw
                .iter()
                .map(|p| {
                    RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| {
                            ConfigError::Validation(format!(
                                "invalid pattern '{p}' for platform '{platform}': {e}"
                            ))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            patterns.insert(platform, compiled);
        }
        Ok(Self { patterns })
    }

    /// Whether `url` is a link to `platform`.
    #[must_use]
    pub fn matches(&self, platform: Platform, url: &str) -> bool {
        let Some(host) = url_host(url) else {
            return false;
        };
        self.patterns
            .get(&platform)
            .is_some_and(|patterns| patterns.iter().any(|re| re.is_match(&host)))
    }
}

/// Load the platforms table from a YAML override file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_platform_patterns(path: &Path) -> Result<PlatformPatterns, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::PlatformsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    let file: PlatformsFile = serde_yaml::from_str(&content)?;
    PlatformPatterns::compile(&file)
}

/// Host of an http(s) link. A missing scheme is tolerated because share
/// links are often pasted as `v.douyin.com/abc`.
fn url_host(url: &str) -> Option<String> {
    let trimmed = url.trim();
    let parsed = Url::parse(trimmed)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| {
            if trimmed.contains("://") {
                None
            } else {
                Url::parse(&format!("https://{trimmed}")).ok()
            }
        })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.host_str().map(str::to_owned)
}

#[cfg(test)]
#[path = "platforms_test.rs"]
mod tests;
