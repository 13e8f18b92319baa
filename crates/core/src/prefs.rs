//! JSON-backed prefs file holding the persisted alias cache.
//!
//! Layout: one JSON object keyed by navigation URL string, each value a
//! 2-element array of `[prefetch_url, rfc3339 timestamp]`. Loads are
//! shape-validated per entry; saves are fire-and-forget so a write never
//! blocks the caller. Some loss here (after a crash, say) is well
//! tolerated: the cache only buys latency, never correctness.

use std::path::PathBuf;

use serde_json::Value;

use crate::Error;
use crate::alias::PersistedAliasMap;

/// Handle to the on-disk prefs file.
#[derive(Debug, Clone)]
pub struct PrefsFile {
    path: PathBuf,
}

impl PrefsFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load the persisted alias map, dropping entries whose shape is
    /// wrong. Returns the map and the number of malformed entries.
    ///
    /// A missing or wholly unreadable file yields an empty map: a corrupt
    /// prefs file must degrade to "no persisted cache", never to a
    /// startup failure.
    pub async fn load(&self) -> (PersistedAliasMap, usize) {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return (PersistedAliasMap::new(), 0),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read prefs file");
                return (PersistedAliasMap::new(), 0);
            }
        };

        let root: Value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "prefs file is not valid JSON");
                return (PersistedAliasMap::new(), 0);
            }
        };

        let Some(object) = root.as_object() else {
            tracing::warn!(path = %self.path.display(), "prefs root is not an object");
            return (PersistedAliasMap::new(), 0);
        };

        let mut map = PersistedAliasMap::new();
        let mut malformed = 0usize;
        for (key, value) in object {
            match value.as_array().map(Vec::as_slice) {
                Some([Value::String(prefetch_url), Value::String(timestamp)]) => {
                    map.insert(key.clone(), (prefetch_url.clone(), timestamp.clone()));
                }
                _ => malformed += 1,
            }
        }

        if malformed > 0 {
            tracing::warn!(count = malformed, "dropped malformed prefs entries");
        }
        (map, malformed)
    }

    /// Persist `map` durably, for shutdown and tests.
    pub async fn save(&self, map: &PersistedAliasMap) -> Result<(), Error> {
        let bytes = serde_json::to_vec_pretty(map)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }

    /// Hand `map` off to a background write. Failures are logged and
    /// otherwise ignored; the caller never waits.
    pub fn save_in_background(&self, map: PersistedAliasMap) {
        let path = self.path.clone();
        tokio::spawn(async move {
            let bytes = match serde_json::to_vec_pretty(&map) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to serialize prefs");
                    return;
                }
            };
            if let Err(e) = tokio::fs::write(&path, bytes).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to write prefs file");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs_in(dir: &tempfile::TempDir) -> PrefsFile {
        PrefsFile::new(dir.path().join("prefs.json"))
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (map, malformed) = prefs_in(&dir).load().await;
        assert!(map.is_empty());
        assert_eq!(malformed, 0);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = prefs_in(&dir);

        let mut map = PersistedAliasMap::new();
        map.insert(
            "https://se.com/search?q=a".to_string(),
            ("https://se.com/search?q=a&pf=cs".to_string(), "2026-01-02T03:04:05+00:00".to_string()),
        );
        prefs.save(&map).await.unwrap();

        let (loaded, malformed) = prefs.load().await;
        assert_eq!(loaded, map);
        assert_eq!(malformed, 0);
    }

    #[tokio::test]
    async fn test_load_drops_malformed_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = prefs_in(&dir);
        tokio::fs::write(
            prefs.path(),
            r#"{
                "https://se.com/search?q=ok": ["https://se.com/search?q=ok&pf=cs", "2026-01-02T03:04:05+00:00"],
                "https://se.com/search?q=short": ["only-one-element"],
                "https://se.com/search?q=wrong": 42
            }"#,
        )
        .await
        .unwrap();

        let (map, malformed) = prefs.load().await;
        assert_eq!(map.len(), 1);
        assert_eq!(malformed, 2);
        assert!(map.contains_key("https://se.com/search?q=ok"));
    }

    #[tokio::test]
    async fn test_load_tolerates_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = prefs_in(&dir);
        tokio::fs::write(prefs.path(), b"not json at all").await.unwrap();

        let (map, malformed) = prefs.load().await;
        assert!(map.is_empty());
        assert_eq!(malformed, 0);
    }

    #[tokio::test]
    async fn test_background_save_lands_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = prefs_in(&dir);

        let mut map = PersistedAliasMap::new();
        map.insert(
            "https://se.com/search?q=bg".to_string(),
            ("https://se.com/search?q=bg&pf=cs".to_string(), "2026-01-02T03:04:05+00:00".to_string()),
        );
        prefs.save_in_background(map.clone());

        // The write is fire-and-forget; poll briefly for it to land.
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            let (loaded, _) = prefs.load().await;
            if loaded == map {
                return;
            }
        }
        panic!("background save never landed");
    }
}
