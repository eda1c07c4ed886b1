//! Shared domain types and configuration for the viralscore workspace.

mod app_config;
mod config;
pub mod platforms;
pub mod submission;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use platforms::{load_platform_patterns, Platform, PlatformPatterns};
pub use submission::{
    DurationCategory, FrameAnalysis, PlatformLink, SamplingStrategy, SubScores, SubmissionStatus,
    VideoSubmission, MAX_SCORE,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read platforms file {path}: {source}")]
    PlatformsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse platforms file: {0}")]
    PlatformsFileParse(#[from] serde_yaml::Error),

    #[error("platforms config invalid: {0}")]
    Validation(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("unknown submission status: {0}")]
    UnknownStatus(String),

    #[error("unknown duration category: {0}")]
    UnknownDurationCategory(String),
}
