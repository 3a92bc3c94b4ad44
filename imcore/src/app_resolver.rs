use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use imcore_types::Application;
use tokio::sync::RwLock;

use crate::error::CoreError;

/// Loads an `Application` by its opaque `client-id`, keyed through a
/// read-through TTL cache so a hot client-id doesn't round-trip to the
/// store on every request. Grounded on the TTL-map pattern used for
/// session/credential caching elsewhere in the corpus.
#[async_trait::async_trait]
pub trait AppStore: Send + Sync {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Application>, CoreError>;

    /// Backs `SearchApps`; `client_id` is an optional exact-match filter.
    async fn search(&self, client_id: Option<&str>) -> Result<Vec<Application>, CoreError>;

    /// Backs `CreateApp`.
    async fn insert(&self, app: Application) -> Result<Application, CoreError>;
}

struct CacheEntry {
    app: Arc<Application>,
    expires_at: Instant,
}

pub struct AppResolver<S: AppStore> {
    store: S,
    ttl: Duration,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl<S: AppStore> AppResolver<S> {
    pub fn new(store: S, ttl: Duration) -> Self {
        AppResolver {
            store,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, client_id: &str) -> Result<Arc<Application>, CoreError> {
        if let Some(app) = self.cached(client_id).await {
            return Ok(app);
        }
        let app = self
            .store
            .find_by_client_id(client_id)
            .await?
            .ok_or_else(|| CoreError::unauthorized_client("messaging: unknown client"))?;
        let app = Arc::new(app);
        self.cache.write().await.insert(
            client_id.to_string(),
            CacheEntry {
                app: app.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(app)
    }

    /// `client-id` absence is legal when the endpoint doesn't require app
    /// authorization; callers decide whether to call `resolve` at all.
    pub async fn require(&self, client_id: &str) -> Result<Arc<Application>, CoreError> {
        if client_id.is_empty() {
            return Err(CoreError::unauthorized_client("messaging: client required"));
        }
        self.resolve(client_id).await
    }

    async fn cached(&self, client_id: &str) -> Option<Arc<Application>> {
        let cache = self.cache.read().await;
        cache.get(client_id).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.app.clone())
            } else {
                None
            }
        })
    }

    /// Invalidates a single cached entry; called from the cache-invalidation
    /// bus handler in a full deployment (best-effort secondary signal —
    /// correctness still relies on the TTL, per the redesign hint).
    pub async fn invalidate(&self, client_id: &str) {
        self.cache.write().await.remove(client_id);
    }

    /// Admin operations bypass the cache entirely: `SearchApps` always
    /// reads through, and `CreateApp` populates the cache with its result
    /// so a subsequent `resolve` of the new client-id doesn't round-trip.
    pub async fn search(&self, client_id: Option<&str>) -> Result<Vec<Application>, CoreError> {
        self.store.search(client_id).await
    }

    pub async fn create(&self, app: Application) -> Result<Application, CoreError> {
        let created = self.store.insert(app).await?;
        let created = Arc::new(created);
        self.cache.write().await.insert(
            created.client_id.clone(),
            CacheEntry {
                app: created.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok((*created).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;
    use uuid::Uuid;

    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AppStore for CountingStore {
        async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Application>, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Application {
                dc: 7,
                id: Uuid::new_v4(),
                client_id: client_id.to_string(),
                name: "App".into(),
                about: None,
                constraints: Default::default(),
                created_at: OffsetDateTime::now_utc(),
            }))
        }

        async fn search(&self, _client_id: Option<&str>) -> Result<Vec<Application>, CoreError> {
            Ok(Vec::new())
        }

        async fn insert(&self, app: Application) -> Result<Application, CoreError> {
            Ok(app)
        }
    }

    #[tokio::test]
    async fn resolve_caches_within_ttl() {
        let resolver = AppResolver::new(
            CountingStore {
                calls: AtomicUsize::new(0),
            },
            Duration::from_secs(60),
        );
        let first = resolver.resolve("A1").await.unwrap();
        let second = resolver.resolve("A1").await.unwrap();
        assert_eq!(first.client_id, second.client_id);
        assert_eq!(resolver.store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn require_rejects_empty_client_id() {
        let resolver = AppResolver::new(
            CountingStore {
                calls: AtomicUsize::new(0),
            },
            Duration::from_secs(60),
        );
        let err = resolver.require("").await.unwrap_err();
        assert_eq!(err.kind, crate::error::CoreErrorKind::UnauthorizedClient);
    }
}

#[cfg(feature = "sqlx-store")]
pub struct PostgresAppStore {
    pool: sqlx::PgPool,
}

#[cfg(feature = "sqlx-store")]
impl PostgresAppStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        PostgresAppStore { pool }
    }
}

#[cfg(feature = "sqlx-store")]
#[async_trait::async_trait]
impl AppStore for PostgresAppStore {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Application>, CoreError> {
        let row = sqlx::query_as::<_, Application>(
            "SELECT dc, id, client_id, name, about, config AS constraints, created_at \
             FROM app WHERE client_id = $1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::from)?;
        Ok(row)
    }

    async fn search(&self, client_id: Option<&str>) -> Result<Vec<Application>, CoreError> {
        let rows = match client_id {
            Some(client_id) => {
                sqlx::query_as::<_, Application>(
                    "SELECT dc, id, client_id, name, about, config AS constraints, created_at \
                     FROM app WHERE client_id = $1 ORDER BY name ASC",
                )
                .bind(client_id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Application>(
                    "SELECT dc, id, client_id, name, about, config AS constraints, created_at \
                     FROM app ORDER BY name ASC",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(CoreError::from)?;
        Ok(rows)
    }

    async fn insert(&self, app: Application) -> Result<Application, CoreError> {
        let constraints_json = serde_json::to_value(&app.constraints)
            .map_err(|e| CoreError::internal(format!("app: serialize constraints: {e}")))?;
        let row = sqlx::query_as::<_, Application>(
            "INSERT INTO app (dc, id, client_id, name, about, config, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, now()) \
             RETURNING dc, id, client_id, name, about, config AS constraints, created_at",
        )
        .bind(app.dc)
        .bind(app.id)
        .bind(&app.client_id)
        .bind(&app.name)
        .bind(&app.about)
        .bind(constraints_json)
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::from)?;
        Ok(row)
    }
}
