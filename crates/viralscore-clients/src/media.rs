//! HTTP client for the media service: duration probe and frame extraction.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use viralscore_engine::{CollaboratorError, DurationProbe, ExtractedFrame, FrameExtractor};

use crate::error::ClientError;
use crate::http::{build_client, endpoint, parse_base_url, send_json};

const SERVICE: &str = "media";

#[derive(Debug, Deserialize)]
struct ProbeResponse {
    duration_seconds: f64,
}

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    video_url: &'a str,
    timestamps: &'a [f64],
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    frames: Vec<ExtractedFrame>,
}

/// Client for the media service.
///
/// `GET v1/probe?video_url=...` returns `{"duration_seconds": f64}`.
/// `POST v1/frames` with `{"video_url", "timestamps"}` returns
/// `{"frames": [{"frame_index", "timestamp", "image_ref"}]}`.
pub struct MediaClient {
    client: Client,
    base_url: Url,
}

impl MediaClient {
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`ClientError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Actual duration of the video asset, in seconds.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Http`] on network failure.
    /// - [`ClientError::Status`] on a non-2xx answer.
    /// - [`ClientError::Deserialize`] if the body is not the expected shape.
    pub async fn probe_duration(&self, video_url: &str) -> Result<f64, ClientError> {
        let url = endpoint(&self.base_url, "v1/probe")?;
        let request = self.client.get(url).query(&[("video_url", video_url)]);
        let response: ProbeResponse = send_json(SERVICE, "probe", request).await?;
        Ok(response.duration_seconds)
    }

    /// One frame per timestamp.
    ///
    /// # Errors
    ///
    /// Same as [`MediaClient::probe_duration`].
    pub async fn extract_frames(
        &self,
        video_url: &str,
        timestamps: &[f64],
    ) -> Result<Vec<ExtractedFrame>, ClientError> {
        let url = endpoint(&self.base_url, "v1/frames")?;
        let request = self.client.post(url).json(&ExtractRequest {
            video_url,
            timestamps,
        });
        let response: ExtractResponse = send_json(SERVICE, "extract frames", request).await?;
        tracing::debug!(
            requested = timestamps.len(),
            returned = response.frames.len(),
            "frames extracted"
        );
        Ok(response.frames)
    }
}

#[async_trait]
impl DurationProbe for MediaClient {
    async fn probe(&self, video_url: &str) -> Result<f64, CollaboratorError> {
        self.probe_duration(video_url)
            .await
            .map_err(|e| e.into_collaborator(SERVICE))
    }
}

#[async_trait]
impl FrameExtractor for MediaClient {
    async fn extract(
        &self,
        video_url: &str,
        timestamps: &[f64],
    ) -> Result<Vec<ExtractedFrame>, CollaboratorError> {
        self.extract_frames(video_url, timestamps)
            .await
            .map_err(|e| e.into_collaborator(SERVICE))
    }
}
