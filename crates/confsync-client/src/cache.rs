//! Local snapshot of the last successful full pull.
//!
//! Written after every successful pull, read only when no server answers.
//! Both directions are best-effort: failures are logged and never reach the
//! pull path.

use std::path::{Path, PathBuf};

use crate::error::ClientResult;

const CACHE_SUFFIX: &str = "configs.cache";
const CACHE_SUBDIR: &str = "confsync";

/// File-backed cache keyed by application id.
#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
}

impl LocalCache {
    /// Cache in `cache_dir`, or in the first writable fallback directory when unset.
    pub fn new(cache_dir: Option<&Path>, app_id: &str) -> Self {
        let dir = match cache_dir {
            Some(dir) => dir.to_path_buf(),
            None => probe_cache_dir(),
        };
        Self { path: dir.join(file_name(app_id)) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the raw payload, replacing any previous one.
    pub async fn write(&self, payload: &str) {
        if payload.is_empty() {
            return;
        }
        match self.try_write(payload).await {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Cached configuration snapshot"),
            Err(e) => tracing::error!(
                path = %self.path.display(),
                "Failed to cache configuration snapshot: {}",
                e
            ),
        }
    }

    /// Last persisted payload, if any.
    pub async fn read(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.is_empty() => None,
            Ok(content) => {
                tracing::debug!(path = %self.path.display(), "Read cached configuration snapshot");
                Some(content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    "Failed to read cached configuration snapshot: {}",
                    e
                );
                None
            }
        }
    }

    async fn try_write(&self, payload: &str) -> ClientResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp_path = self.path.with_extension("cache.tmp");
        tokio::fs::write(&temp_path, payload).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

fn file_name(app_id: &str) -> String {
    let safe: String = app_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    format!("{}.{}", safe, CACHE_SUFFIX)
}

/// First writable of: platform cache dir, system temp dir, current dir.
fn probe_cache_dir() -> PathBuf {
    let candidates = [
        dirs::cache_dir().map(|d| d.join(CACHE_SUBDIR)),
        Some(std::env::temp_dir().join(CACHE_SUBDIR)),
    ];

    for dir in candidates.into_iter().flatten() {
        match check_writable(&dir) {
            Ok(()) => return dir,
            Err(e) => tracing::debug!(dir = %dir.display(), "Cache dir not usable: {}", e),
        }
    }
    PathBuf::from(".")
}

fn check_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let probe = dir.join(format!(".probe-{}", uuid::Uuid::new_v4()));
    std::fs::write(&probe, b"probe")?;
    std::fs::remove_file(&probe)
}
