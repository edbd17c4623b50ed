use std::time::Duration;

/// Generation service connection settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the generation service, without trailing slash.
    pub base_url: String,
    /// Bearer token sent with every call, if set.
    pub api_key: Option<String>,
    /// Per-call HTTP timeout. Image generation is synchronous and slow.
    pub request_timeout: Duration,
}

impl GatewayConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                 |
    /// |----------------------------------|-------------------------|
    /// | `GENERATION_API_URL`             | `http://localhost:8000` |
    /// | `GENERATION_API_KEY`             | unset                   |
    /// | `GENERATION_REQUEST_TIMEOUT_SECS`| `600`                   |
    pub fn from_env() -> Self {
        let base_url = std::env::var("GENERATION_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000".into())
            .trim_end_matches('/')
            .to_string();

        let api_key = std::env::var("GENERATION_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        let timeout_secs: u64 = std::env::var("GENERATION_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("GENERATION_REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            base_url,
            api_key,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }
}
