//! Request and response shapes of the generation service.

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Synchronous text-to-image generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub aspect_ratio: String,
    pub resolution: String,
    pub width: u32,
    pub height: u32,
    /// Character reference images for visual consistency.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reference_images: Vec<String>,
}

/// Image-to-video generation, usually answered with a job id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoRequest {
    pub image_url: String,
    pub prompt: String,
    pub duration_secs: i32,
    pub resolution: String,
    pub aspect_ratio: String,
}

/// What the service returned for a video submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSubmission {
    /// The clip was produced inline.
    Ready(String),
    /// The clip is being produced by an asynchronous job.
    Pending(String),
}

/// Status of an asynchronous video job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Processing,
    Complete(String),
    Error(String),
}

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct ImageResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoSubmitResponse {
    pub url: Option<String>,
    pub job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobStatusResponse {
    pub status: String,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl TryFrom<VideoSubmitResponse> for VideoSubmission {
    type Error = GatewayError;

    fn try_from(resp: VideoSubmitResponse) -> Result<Self, Self::Error> {
        match (resp.url, resp.job_id) {
            (Some(url), _) if !url.is_empty() => Ok(Self::Ready(url)),
            (_, Some(job_id)) if !job_id.is_empty() => Ok(Self::Pending(job_id)),
            _ => Err(GatewayError::Malformed(
                "video submission returned neither url nor job_id".into(),
            )),
        }
    }
}

impl TryFrom<JobStatusResponse> for JobStatus {
    type Error = GatewayError;

    fn try_from(resp: JobStatusResponse) -> Result<Self, GatewayError> {
        match resp.status.as_str() {
            "processing" | "queued" | "pending" => Ok(Self::Processing),
            "complete" | "completed" => match resp.url {
                Some(url) if !url.is_empty() => Ok(Self::Complete(url)),
                _ => Err(GatewayError::Malformed("completed job has no url".into())),
            },
            "error" | "failed" => Ok(Self::Error(
                resp.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
            other => Err(GatewayError::Malformed(format!("unknown job status '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn job(json: serde_json::Value) -> Result<JobStatus, GatewayError> {
        JobStatus::try_from(serde_json::from_value::<JobStatusResponse>(json).unwrap())
    }

    #[test]
    fn inline_url_wins_over_job_id() {
        let resp = VideoSubmitResponse {
            url: Some("https://cdn/v.mp4".into()),
            job_id: Some("j1".into()),
        };
        assert_eq!(
            VideoSubmission::try_from(resp).unwrap(),
            VideoSubmission::Ready("https://cdn/v.mp4".into())
        );
    }

    #[test]
    fn job_id_means_pending() {
        let resp = VideoSubmitResponse {
            url: None,
            job_id: Some("j1".into()),
        };
        assert_eq!(
            VideoSubmission::try_from(resp).unwrap(),
            VideoSubmission::Pending("j1".into())
        );
    }

    #[test]
    fn empty_submission_is_malformed() {
        let resp = VideoSubmitResponse {
            url: None,
            job_id: None,
        };
        assert_matches!(VideoSubmission::try_from(resp), Err(GatewayError::Malformed(_)));
    }

    #[test]
    fn job_statuses_parse() {
        assert_eq!(job(serde_json::json!({"status": "processing"})).unwrap(), JobStatus::Processing);
        assert_eq!(
            job(serde_json::json!({"status": "complete", "url": "https://cdn/v.mp4"})).unwrap(),
            JobStatus::Complete("https://cdn/v.mp4".into())
        );
        assert_eq!(
            job(serde_json::json!({"status": "error", "error": "gpu oom"})).unwrap(),
            JobStatus::Error("gpu oom".into())
        );
        assert_matches!(
            job(serde_json::json!({"status": "complete"})),
            Err(GatewayError::Malformed(_))
        );
    }

    #[test]
    fn image_request_omits_empty_references() {
        let req = ImageRequest {
            prompt: "a castle".into(),
            aspect_ratio: "16:9".into(),
            resolution: "2k".into(),
            width: 1664,
            height: 928,
            reference_images: Vec::new(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("reference_images").is_none());
    }
}
