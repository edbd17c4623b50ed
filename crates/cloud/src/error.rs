#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The URL does not point into the configured bucket.
    #[error("URL is not managed by this storage: {0}")]
    ForeignUrl(String),

    /// The storage backend rejected or failed the call.
    #[error("Storage backend error: {0}")]
    Backend(String),
}
