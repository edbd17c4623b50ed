use async_trait::async_trait;

use crate::error::StorageError;

/// Deletes stored media by its public URL.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn delete_by_url(&self, url: &str) -> Result<(), StorageError>;
}

/// Derive the object key of `url` under `public_base_url`.
///
/// Query strings and fragments are ignored.
pub fn key_for_url(public_base_url: &str, url: &str) -> Result<String, StorageError> {
    let base = public_base_url.trim_end_matches('/');
    let path = url
        .strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))?;
    let key = path.split(['?', '#']).next().unwrap_or_default();
    if key.is_empty() {
        return Err(StorageError::ForeignUrl(url.to_string()));
    }
    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const BASE: &str = "https://media.example.com";

    #[test]
    fn strips_base_and_query() {
        assert_eq!(
            key_for_url(BASE, "https://media.example.com/projects/4/scene-9.png?v=2").unwrap(),
            "projects/4/scene-9.png"
        );
    }

    #[test]
    fn trailing_slash_on_base_is_ignored() {
        assert_eq!(
            key_for_url("https://media.example.com/", "https://media.example.com/a.mp4").unwrap(),
            "a.mp4"
        );
    }

    #[test]
    fn other_hosts_are_foreign() {
        assert_matches!(
            key_for_url(BASE, "https://elsewhere.com/a.png"),
            Err(StorageError::ForeignUrl(_))
        );
        assert_matches!(
            key_for_url(BASE, "https://media.example.com.evil.io/a.png"),
            Err(StorageError::ForeignUrl(_))
        );
    }

    #[test]
    fn bare_base_has_no_key() {
        assert_matches!(key_for_url(BASE, "https://media.example.com/"), Err(_));
    }
}
