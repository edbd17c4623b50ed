/// S3-compatible storage settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2).
    pub endpoint_url: Option<String>,
    /// Public base URL objects are served from; keys are derived by
    /// stripping it from candidate URLs.
    pub public_base_url: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
}

impl StorageConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                                   |
    /// |-------------------------|-------------------------------------------|
    /// | `S3_BUCKET`             | `filmgen-media`                           |
    /// | `S3_REGION`             | `us-east-1`                               |
    /// | `S3_ENDPOINT_URL`       | unset                                     |
    /// | `S3_PUBLIC_BASE_URL`    | `https://{bucket}.s3.{region}.amazonaws.com` |
    /// | `S3_ACCESS_KEY_ID`      | unset (default credential chain)          |
    /// | `S3_SECRET_ACCESS_KEY`  | unset                                     |
    /// | `S3_FORCE_PATH_STYLE`   | `false`                                   |
    pub fn from_env() -> Self {
        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "filmgen-media".into());
        let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into());
        let endpoint_url = non_empty_var("S3_ENDPOINT_URL");
        let public_base_url = non_empty_var("S3_PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("https://{bucket}.s3.{region}.amazonaws.com"))
            .trim_end_matches('/')
            .to_string();
        let force_path_style = std::env::var("S3_FORCE_PATH_STYLE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Self {
            bucket,
            region,
            endpoint_url,
            public_base_url,
            access_key_id: non_empty_var("S3_ACCESS_KEY_ID"),
            secret_access_key: non_empty_var("S3_SECRET_ACCESS_KEY"),
            force_path_style,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
