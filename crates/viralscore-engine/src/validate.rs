//! Intake completeness checks.
//!
//! Every violated rule is collected so the creator sees all problems at once.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use viralscore_core::{Platform, PlatformLink, PlatformPatterns, VideoSubmission};

/// Longest accepted title, in characters.
pub const MAX_TITLE_CHARS: usize = 255;

/// What a creator sends when submitting a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionInput {
    pub user_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub video_url: String,
    pub duration_seconds: f64,
    #[serde(default)]
    pub platform_links: Vec<PlatformLink>,
    #[serde(default)]
    pub screenshot_urls: Vec<String>,
    #[serde(default)]
    pub license_agreed: bool,
}

impl From<&VideoSubmission> for SubmissionInput {
    fn from(s: &VideoSubmission) -> Self {
        Self {
            user_id: s.user_id,
            title: s.title.clone(),
            description: s.description.clone(),
            video_url: s.video_url.clone(),
            duration_seconds: s.duration_seconds,
            platform_links: s.platform_links.clone(),
            screenshot_urls: s.screenshot_urls.clone(),
            license_agreed: s.license_agreed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationIssue {
    #[error("the platform license agreement must be accepted before submitting")]
    LicenseNotAgreed,

    #[error("add at least one platform link where the video is published")]
    NoPlatformLinks,

    #[error("add at least one screenshot of the platform's analytics page")]
    NoScreenshots,

    #[error("link #{} is not a valid {} link: {url}", .index + 1, .platform.display_name())]
    InvalidPlatformLink {
        index: usize,
        platform: Platform,
        url: String,
    },

    #[error("the title must not be empty")]
    BlankTitle,

    #[error("the title is {length} characters long; the limit is {max}", max = MAX_TITLE_CHARS)]
    TitleTooLong { length: usize },
}

impl ValidationIssue {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            ValidationIssue::LicenseNotAgreed => "license_not_agreed",
            ValidationIssue::NoPlatformLinks => "no_platform_links",
            ValidationIssue::NoScreenshots => "no_screenshots",
            ValidationIssue::InvalidPlatformLink { .. } => "invalid_platform_link",
            ValidationIssue::BlankTitle => "blank_title",
            ValidationIssue::TitleTooLong { .. } => "title_too_long",
        }
    }
}

/// Check a submission against every intake rule.
///
/// Returns an empty list when the submission is acceptable.
#[must_use]
pub fn validate_submission(
    input: &SubmissionInput,
    patterns: &PlatformPatterns,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let title_len = input.title.trim().chars().count();
    if title_len == 0 {
        issues.push(ValidationIssue::BlankTitle);
    } else if title_len > MAX_TITLE_CHARS {
        issues.push(ValidationIssue::TitleTooLong { length: title_len });
    }

    if !input.license_agreed {
        issues.push(ValidationIssue::LicenseNotAgreed);
    }

    if input.platform_links.is_empty() {
        issues.push(ValidationIssue::NoPlatformLinks);
    }

    if input.screenshot_urls.iter().all(|u| u.trim().is_empty()) {
        issues.push(ValidationIssue::NoScreenshots);
    }

    for (index, link) in input.platform_links.iter().enumerate() {
        if !patterns.matches(link.platform, &link.url) {
            issues.push(ValidationIssue::InvalidPlatformLink {
                index,
                platform: link.platform,
                url: link.url.clone(),
            });
        }
    }

    issues
}
