use std::path::{Path, PathBuf};

/// Local result store: generated images land on disk keyed by job id, and
/// get a web-relative URL when the results directory is under the
/// static-serving root.
pub struct ResultStore {
    results_dir: PathBuf,
    static_root: PathBuf,
}

impl ResultStore {
    pub fn new(results_dir: impl Into<PathBuf>, static_root: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
            static_root: static_root.into(),
        }
    }

    /// Write result bytes as `<results_dir>/<job_id>.<ext>`.
    ///
    /// Creates the directory if absent. A colliding job id overwrites
    /// silently: ids are vendor-issued and unique, so a collision is an
    /// idempotent re-save.
    pub async fn save(&self, job_id: &str, bytes: &[u8], ext: &str) -> Result<PathBuf, StoreError> {
        tokio::fs::create_dir_all(&self.results_dir).await?;
        let path = self.results_dir.join(format!("{job_id}.{ext}"));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Web-relative URL for a stored result, or `None` when the path is
    /// outside the static root (caller falls back to base64 only).
    pub fn url_for(&self, stored: &Path) -> Option<String> {
        let rel = stored.strip_prefix(&self.static_root).ok()?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Some(format!("/static/{rel}"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to write result image: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_store() -> (ResultStore, PathBuf) {
        let root = std::env::temp_dir().join(format!("tryon-store-{}", Uuid::new_v4()));
        let store = ResultStore::new(root.join("tryon_results"), root.clone());
        (store, root)
    }

    #[tokio::test]
    async fn test_save_creates_directory_and_file() {
        let (store, root) = temp_store();
        let path = store.save("job-1", b"png bytes", "png").await.unwrap();
        assert_eq!(path.file_name().unwrap(), "job-1.png");
        assert_eq!(std::fs::read(&path).unwrap(), b"png bytes");
        std::fs::remove_dir_all(root).ok();
    }

    #[tokio::test]
    async fn test_distinct_job_ids_do_not_interfere() {
        let (store, root) = temp_store();
        let (a, b) = tokio::join!(
            store.save("job-a", b"aaaa", "png"),
            store.save("job-b", b"bbbb", "png"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a, b);
        assert_eq!(std::fs::read(&a).unwrap(), b"aaaa");
        assert_eq!(std::fs::read(&b).unwrap(), b"bbbb");
        std::fs::remove_dir_all(root).ok();
    }

    #[tokio::test]
    async fn test_resave_same_job_id_overwrites() {
        let (store, root) = temp_store();
        store.save("job-1", b"first", "png").await.unwrap();
        let path = store.save("job-1", b"second", "png").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        std::fs::remove_dir_all(root).ok();
    }

    #[tokio::test]
    async fn test_url_for_under_static_root() {
        let (store, root) = temp_store();
        let path = store.save("job-7", b"x", "png").await.unwrap();
        assert_eq!(
            store.url_for(&path).as_deref(),
            Some("/static/tryon_results/job-7.png")
        );
        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_url_for_outside_static_root_is_none() {
        let store = ResultStore::new("/var/results", "/srv/static");
        assert!(store.url_for(Path::new("/var/results/job-1.png")).is_none());
    }
}
