//! Best-effort deletion of candidate media.

use filmgen_cloud::StorageProvider;
use filmgen_core::regeneration::LogEntry;
use filmgen_core::types::DbId;
use futures::future::join_all;

/// Delete `urls` concurrently and describe what happened as log entries.
///
/// Failures are reported, never propagated; one failed delete does not stop
/// the others.
pub async fn delete_candidates(
    storage: &dyn StorageProvider,
    request_id: DbId,
    urls: &[String],
) -> Vec<LogEntry> {
    if urls.is_empty() {
        return Vec::new();
    }

    let results = join_all(urls.iter().map(|url| storage.delete_by_url(url))).await;

    let mut logs = Vec::new();
    let mut deleted = 0usize;
    for (url, result) in urls.iter().zip(results) {
        match result {
            Ok(()) => deleted += 1,
            Err(e) => {
                tracing::warn!(request_id, url = %url, error = %e, "Failed to delete candidate");
                logs.push(
                    LogEntry::error(format!("Failed to delete candidate: {e}"))
                        .with_details(serde_json::json!({ "url": url })),
                );
            }
        }
    }
    if deleted > 0 {
        logs.push(LogEntry::info(format!(
            "Deleted {deleted} unused candidate(s)"
        )));
    }
    logs
}
