//! REST client for the generation service.
//!
//! Endpoints:
//! - `POST /images/generations` returns `{ "url" }`.
//! - `POST /videos/generations` returns `{ "url" }` or `{ "job_id" }`.
//! - `GET /videos/jobs/{job_id}` returns `{ "status", "url"?, "error"? }`.

use async_trait::async_trait;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::types::{
    ImageRequest, ImageResponse, JobStatus, JobStatusResponse, VideoRequest, VideoSubmission,
    VideoSubmitResponse,
};

/// The operations the workflow needs from a generation provider.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Produce an image synchronously and return its public URL.
    async fn generate_image(&self, request: &ImageRequest) -> Result<String, GatewayError>;

    /// Start a video generation.
    async fn submit_video(&self, request: &VideoRequest) -> Result<VideoSubmission, GatewayError>;

    /// Check an asynchronous video job once.
    async fn poll_video(&self, job_id: &str) -> Result<JobStatus, GatewayError>;
}

/// HTTP client for the generation service.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, config: &GatewayConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, or capture the status
    /// and body text in a [`GatewayError::Api`].
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl GenerationGateway for HttpGateway {
    async fn generate_image(&self, request: &ImageRequest) -> Result<String, GatewayError> {
        tracing::debug!(
            width = request.width,
            height = request.height,
            references = request.reference_images.len(),
            "Submitting image generation",
        );
        let response = self
            .authorize(self.client.post(self.url("/images/generations")))
            .json(request)
            .send()
            .await?;
        let body: ImageResponse = Self::parse_response(response).await?;
        if body.url.is_empty() {
            return Err(GatewayError::Malformed("image response has empty url".into()));
        }
        Ok(body.url)
    }

    async fn submit_video(&self, request: &VideoRequest) -> Result<VideoSubmission, GatewayError> {
        tracing::debug!(duration_secs = request.duration_secs, "Submitting video generation");
        let response = self
            .authorize(self.client.post(self.url("/videos/generations")))
            .json(request)
            .send()
            .await?;
        let body: VideoSubmitResponse = Self::parse_response(response).await?;
        VideoSubmission::try_from(body)
    }

    async fn poll_video(&self, job_id: &str) -> Result<JobStatus, GatewayError> {
        let response = self
            .authorize(self.client.get(self.url(&format!("/videos/jobs/{job_id}"))))
            .send()
            .await?;
        let body: JobStatusResponse = Self::parse_response(response).await?;
        JobStatus::try_from(body)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn urls_join_base_and_path() {
        let gateway = HttpGateway::with_client(
            reqwest::Client::new(),
            &GatewayConfig {
                base_url: "https://gen.example.com".into(),
                api_key: None,
                request_timeout: Duration::from_secs(5),
            },
        );
        assert_eq!(
            gateway.url("/videos/jobs/abc"),
            "https://gen.example.com/videos/jobs/abc"
        );
    }
}
