//! Full configuration pull with server failover and cache fallback.

use confsync_types::ConfigItem;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::LocalCache;
use crate::endpoints::{self, APP_ID_HEADER};
use crate::error::{ClientError, ClientResult};
use crate::servers::ServerList;
use crate::store::ConfigStore;

/// Where the data of a full pull came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// A server answered; the store holds its payload
    Remote { server: String },
    /// Every server failed; the store holds the cached snapshot
    LocalFallback,
    /// Every server failed and no usable snapshot exists; the store is untouched
    Unavailable,
}

impl PullOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PullOutcome::Remote { .. })
    }
}

pub struct Puller {
    http: Client,
    servers: ServerList,
    app_id: String,
    env: String,
    authorization: String,
    store: Arc<ConfigStore>,
    cache: LocalCache,
    pulls: AtomicU64,
    failures: AtomicU64,
}

impl Puller {
    pub fn new(
        servers: ServerList,
        app_id: &str,
        env: &str,
        authorization: String,
        timeout: Duration,
        store: Arc<ConfigStore>,
        cache: LocalCache,
    ) -> ClientResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            servers,
            app_id: app_id.to_string(),
            env: env.to_string(),
            authorization,
            store,
            cache,
            pulls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    /// Load the whole configuration set from the first server that answers.
    pub async fn pull(&self) -> PullOutcome {
        self.pulls.fetch_add(1, Ordering::SeqCst);

        for server in self.servers.cursor() {
            match self.fetch(&server).await {
                Ok((items, body)) => {
                    self.store.replace_all(items);
                    let count = self.store.len();
                    self.store.set_loaded_from_local(false);
                    self.cache.write(&body).await;
                    tracing::info!(server = %server, app_id = %self.app_id, count, "Configuration loaded");
                    return PullOutcome::Remote { server };
                }
                Err(e) => {
                    self.failures.fetch_add(1, Ordering::SeqCst);
                    tracing::warn!(server = %server, "Full pull failed: {}", e);
                }
            }
        }

        self.load_from_cache().await
    }

    /// Number of `pull()` calls so far.
    pub fn pull_count(&self) -> u64 {
        self.pulls.load(Ordering::SeqCst)
    }

    /// Number of per-server pull failures so far.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    async fn fetch(&self, server: &str) -> ClientResult<(Vec<ConfigItem>, String)> {
        let url = endpoints::pull_url(server, &self.app_id, &self.env)?;
        tracing::debug!(url = %url, "Pulling configuration");

        let response = self
            .http
            .get(url)
            .header(APP_ID_HEADER, &self.app_id)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ClientError::Status { server: server.to_string(), status: status.as_u16() });
        }

        let body = response.text().await?;
        let items: Vec<ConfigItem> = serde_json::from_str(&body)?;
        Ok((items, body))
    }

    async fn load_from_cache(&self) -> PullOutcome {
        let Some(body) = self.cache.read().await else {
            tracing::warn!(
                app_id = %self.app_id,
                servers = self.servers.len(),
                "No server answered and no cached snapshot exists"
            );
            return PullOutcome::Unavailable;
        };

        match serde_json::from_str::<Vec<ConfigItem>>(&body) {
            Ok(items) => {
                let count = items.len();
                self.store.replace_all(items);
                self.store.set_loaded_from_local(true);
                tracing::warn!(
                    app_id = %self.app_id,
                    path = %self.cache.path().display(),
                    count,
                    "No server answered, loaded cached snapshot"
                );
                PullOutcome::LocalFallback
            }
            Err(e) => {
                tracing::error!(path = %self.cache.path().display(), "Cached snapshot is unreadable: {}", e);
                PullOutcome::Unavailable
            }
        }
    }
}

impl std::fmt::Debug for Puller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Puller")
            .field("servers", &self.servers)
            .field("app_id", &self.app_id)
            .field("env", &self.env)
            .field("pulls", &self.pull_count())
            .field("failures", &self.failure_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::FingerprintAlgorithm;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAYLOAD: &str =
        r#"[{"group":"db","key":"host","value":"10.0.0.1"},{"group":null,"key":"mode","value":null}]"#;

    fn puller(nodes: &str, dir: &std::path::Path) -> (Puller, Arc<ConfigStore>) {
        let store = Arc::new(ConfigStore::new(FingerprintAlgorithm::Md5));
        let puller = Puller::new(
            ServerList::parse(nodes).unwrap(),
            "app",
            "DEV",
            endpoints::basic_authorization("app", "secret"),
            Duration::from_secs(5),
            Arc::clone(&store),
            LocalCache::new(Some(dir), "app"),
        )
        .unwrap();
        (puller, store)
    }

    #[tokio::test]
    async fn test_pull_success_replaces_store_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/config/app/app"))
            .and(query_param("env", "DEV"))
            .and(header("appid", "app"))
            .and(header("authorization", "Basic YXBwOnNlY3JldA=="))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAYLOAD))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (puller, store) = puller(&server.uri(), dir.path());

        let outcome = puller.pull().await;
        assert_eq!(outcome, PullOutcome::Remote { server: server.uri() });
        assert_eq!(store.get("DB:HOST").as_deref(), Some("10.0.0.1"));
        assert_eq!(store.get("mode").as_deref(), Some(""));
        assert!(!store.is_loaded_from_local());
        assert_eq!(puller.pull_count(), 1);

        let cached = LocalCache::new(Some(dir.path()), "app").read().await;
        assert_eq!(cached.as_deref(), Some(PAYLOAD));
    }

    #[tokio::test]
    async fn test_pull_fails_over_to_next_server() {
        let broken = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&broken)
            .await;
        let healthy = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAYLOAD))
            .mount(&healthy)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let nodes = format!("{},{}", broken.uri(), healthy.uri());
        let (puller, store) = puller(&nodes, dir.path());

        for _ in 0..4 {
            assert_eq!(puller.pull().await, PullOutcome::Remote { server: healthy.uri() });
        }
        assert_eq!(store.len(), 2);
        assert!(puller.failure_count() <= 4);
    }

    #[tokio::test]
    async fn test_unparseable_body_counts_as_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (puller, store) = puller(&server.uri(), dir.path());

        assert_eq!(puller.pull().await, PullOutcome::Unavailable);
        assert_eq!(puller.failure_count(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_all_servers_failed_falls_back_to_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        LocalCache::new(Some(dir.path()), "app")
            .write(r#"[{"group":"g1","key":"k1","value":"v1"}]"#)
            .await;
        let (puller, store) = puller(&server.uri(), dir.path());

        assert_eq!(puller.pull().await, PullOutcome::LocalFallback);
        assert!(!PullOutcome::LocalFallback.is_success());
        assert_eq!(store.get("g1:k1").as_deref(), Some("v1"));
        assert!(store.is_loaded_from_local());
    }

    #[tokio::test]
    async fn test_remote_success_clears_local_flag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAYLOAD))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        LocalCache::new(Some(dir.path()), "app").write("[]").await;
        let (puller, store) = puller(&server.uri(), dir.path());

        assert_eq!(puller.pull().await, PullOutcome::LocalFallback);
        assert!(store.is_loaded_from_local());
        assert!(puller.pull().await.is_success());
        assert!(!store.is_loaded_from_local());
    }

    #[tokio::test]
    async fn test_unreadable_cache_leaves_store_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        LocalCache::new(Some(dir.path()), "app").write("not json").await;
        let (puller, store) = puller(&server.uri(), dir.path());
        store.upsert(&ConfigItem::new(None, "keep", "me"));

        assert_eq!(puller.pull().await, PullOutcome::Unavailable);
        assert_eq!(store.get("keep").as_deref(), Some("me"));
    }
}
