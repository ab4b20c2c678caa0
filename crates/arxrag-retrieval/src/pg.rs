//! Postgres + pgvector implementation of [`VectorStore`].
//!
//! [`PgVectorStore`] owns the process's connection pool. The pool has an
//! explicit lifecycle: [`init`](PgVectorStore::init) creates it exactly once
//! (concurrent callers serialize on a lock and only the first one connects),
//! [`close`](PgVectorStore::close) releases it, and every operation outside
//! that window fails with [`RagError::NotInitialized`].
//!
//! Every pool operation runs under the store's [`RetryPolicy`], which only
//! retries errors classified as transient by [`is_transient`].

use crate::retry::RetryPolicy;
use crate::store::VectorStore;
use arxrag_core::{RagError, RagResult, SearchResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow, PgSslMode};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Acquire timeout used by [`PgVectorStore::ping`].
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL. When set, the individual connection fields are ignored.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Document table holding `title`, `abstract`, `category`, `embedding`.
    #[serde(default = "default_table")]
    pub table: String,
    /// Evaluation metrics table `(query, output, metrics jsonb)`.
    #[serde(default = "default_metrics_table")]
    pub metrics_table: String,
    /// Create the pool without opening a connection up front.
    #[serde(default)]
    pub lazy_connect: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    5432
}
fn default_database() -> String {
    "postgres".to_string()
}
fn default_user() -> String {
    "postgres".to_string()
}
fn default_ssl_mode() -> String {
    "require".to_string()
}
fn default_min_connections() -> u32 {
    1
}
fn default_max_connections() -> u32 {
    10
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_table() -> String {
    "arxiv".to_string()
}
fn default_metrics_table() -> String {
    "metrics".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_host(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password: String::new(),
            ssl_mode: default_ssl_mode(),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            table: default_table(),
            metrics_table: default_metrics_table(),
            lazy_connect: false,
        }
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> RagResult<()> {
        if self.max_connections == 0 {
            return Err(RagError::Config("max_connections must be at least 1".into()));
        }
        if self.min_connections > self.max_connections {
            return Err(RagError::Config(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        validate_identifier(&self.table)?;
        validate_identifier(&self.metrics_table)?;
        PgSslMode::from_str(&self.ssl_mode)
            .map_err(|e| RagError::Config(format!("invalid ssl_mode '{}': {e}", self.ssl_mode)))?;
        Ok(())
    }

    fn connect_options(&self) -> RagResult<PgConnectOptions> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url)
                .map_err(|e| RagError::Config(format!("invalid database url: {e}")));
        }

        let ssl_mode = PgSslMode::from_str(&self.ssl_mode)
            .map_err(|e| RagError::Config(format!("invalid ssl_mode '{}': {e}", self.ssl_mode)))?;

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
            .ssl_mode(ssl_mode))
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .min_connections(self.min_connections)
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
    }
}

/// Table names are interpolated into SQL, so only plain identifiers
/// (optionally schema-qualified) are accepted.
pub fn validate_identifier(name: &str) -> RagResult<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() <= 2 && parts.iter().all(|p| valid_part(p)) {
        Ok(())
    } else {
        Err(RagError::Config(format!("invalid SQL identifier '{name}'")))
    }
}

/// A bind parameter for the generic query helpers.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Float(f64),
    Json(serde_json::Value),
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Text(v) => query.bind(v.clone()),
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::Float(v) => query.bind(*v),
            SqlParam::Json(v) => query.bind(sqlx::types::Json(v.clone())),
        };
    }
    query
}

/// Whether a database error is worth retrying.
///
/// Transport failures, pool acquire timeouts and the SQLSTATEs listed in
/// [`is_transient_sqlstate`] are transient. Query errors (syntax,
/// constraints, decoding) and a closed pool are not.
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db.code().is_some_and(|code| is_transient_sqlstate(&code)),
        _ => false,
    }
}

/// Connection exceptions (class 08), resource exhaustion, server shutdown,
/// serialization failures and deadlocks.
pub fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08")
        || matches!(
            code,
            "53300" | "57P01" | "57P02" | "57P03" | "40001" | "40P01"
        )
}

fn to_rag_error(err: sqlx::Error) -> RagError {
    match err {
        sqlx::Error::PoolClosed => {
            RagError::NotInitialized("database pool is closed".to_string())
        }
        other => RagError::Database(other.to_string()),
    }
}

/// Formats a vector as a pgvector literal: `[0.1,0.2,0.3]`.
pub fn vector_literal(vector: &[f32]) -> String {
    let parts: Vec<String> = vector.iter().map(f32::to_string).collect();
    format!("[{}]", parts.join(","))
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    title: Option<String>,
    #[sqlx(rename = "abstract")]
    abstract_text: Option<String>,
    category: Option<String>,
}

impl From<DocumentRow> for SearchResult {
    fn from(row: DocumentRow) -> Self {
        Self {
            title: row.title.unwrap_or_default(),
            category: row.category.unwrap_or_default(),
            abstract_text: row.abstract_text.unwrap_or_default(),
        }
    }
}

/// Connection-pooled handle to a pgvector-enabled Postgres database.
pub struct PgVectorStore {
    config: DatabaseConfig,
    retry: RetryPolicy,
    search_sql: String,
    pool: RwLock<Option<PgPool>>,
    pools_created: AtomicUsize,
}

impl PgVectorStore {
    /// Validates the config. Does not connect; call [`init`](Self::init).
    pub fn new(config: DatabaseConfig, retry: RetryPolicy) -> RagResult<Self> {
        config.validate()?;
        let search_sql = format!(
            "SELECT title, abstract, category FROM {} \
             WHERE embedding IS NOT NULL \
             ORDER BY embedding <=> $1::text::vector \
             LIMIT $2",
            config.table
        );
        Ok(Self {
            config,
            retry,
            search_sql,
            pool: RwLock::new(None),
            pools_created: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Creates the pool. A no-op when already initialized; concurrent
    /// callers create exactly one pool.
    pub async fn init(&self) -> RagResult<()> {
        let mut slot = self.pool.write().await;
        if slot.is_some() {
            debug!("Database pool already initialized");
            return Ok(());
        }

        info!(
            table = %self.config.table,
            min = self.config.min_connections,
            max = self.config.max_connections,
            "Initializing database connection pool"
        );

        let options = self.config.connect_options()?;
        let pool_options = self.config.pool_options();
        let pool = if self.config.lazy_connect {
            pool_options.connect_lazy_with(options)
        } else {
            pool_options.connect_with(options).await.map_err(|e| {
                warn!(error = %e, "Failed to initialize database pool");
                RagError::Database(format!("failed to create pool: {e}"))
            })?
        };

        self.pools_created.fetch_add(1, Ordering::SeqCst);
        *slot = Some(pool);
        info!("Database pool initialized");
        Ok(())
    }

    /// Releases the pool. Idempotent.
    pub async fn close(&self) {
        let pool = self.pool.write().await.take();
        match pool {
            Some(pool) => {
                pool.close().await;
                info!("Database pool closed");
            }
            None => debug!("Database pool already closed or never initialized"),
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.pool
            .read()
            .await
            .as_ref()
            .is_some_and(|p| !p.is_closed())
    }

    /// Number of pools this store has created over its lifetime.
    pub fn pools_created(&self) -> usize {
        self.pools_created.load(Ordering::SeqCst)
    }

    async fn current_pool(&self) -> RagResult<PgPool> {
        match self.pool.read().await.as_ref() {
            Some(pool) if !pool.is_closed() => Ok(pool.clone()),
            _ => Err(RagError::NotInitialized(
                "database pool is not initialized or is closed".to_string(),
            )),
        }
    }

    /// Runs `op` against the current pool under the retry policy.
    async fn with_pool<T, F, Fut>(&self, name: &str, op: F) -> RagResult<T>
    where
        F: Fn(PgPool) -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let pool = self.current_pool().await?;
        self.retry
            .run(name, is_transient, || op(pool.clone()))
            .await
            .map_err(to_rag_error)
    }

    /// Runs a query and returns every row.
    pub async fn fetch(&self, sql: &str, params: &[SqlParam]) -> RagResult<Vec<PgRow>> {
        self.with_pool("fetch", |pool| async move {
            bind_params(sqlx::query(sql), params).fetch_all(&pool).await
        })
        .await
    }

    /// Runs a query and returns the first row, if any.
    pub async fn fetch_optional(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> RagResult<Option<PgRow>> {
        self.with_pool("fetch_optional", |pool| async move {
            bind_params(sqlx::query(sql), params)
                .fetch_optional(&pool)
                .await
        })
        .await
    }

    /// Runs a statement and returns the number of affected rows.
    pub async fn execute(&self, sql: &str, params: &[SqlParam]) -> RagResult<u64> {
        self.with_pool("execute", |pool| async move {
            bind_params(sqlx::query(sql), params)
                .execute(&pool)
                .await
                .map(|done| done.rows_affected())
        })
        .await
    }

    /// Best-effort liveness probe. Never fails; `false` on any problem,
    /// including an uninitialized pool.
    pub async fn ping(&self) -> bool {
        let Ok(pool) = self.current_pool().await else {
            return false;
        };

        let probe = async {
            let mut conn = pool.acquire().await?;
            sqlx::query("SELECT 1").execute(&mut *conn).await
        };

        match tokio::time::timeout(PING_TIMEOUT, probe).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(error = %e, "Database ping failed");
                false
            }
            Err(_) => {
                debug!("Database ping timed out");
                false
            }
        }
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn search_one(&self, vector: &[f32], limit: usize) -> RagResult<Vec<SearchResult>> {
        let literal = vector_literal(vector);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = self.search_sql.as_str();

        let rows: Vec<DocumentRow> = self
            .with_pool("search_one", |pool| {
                let literal = literal.clone();
                async move {
                    // The connection returns to the pool when `conn` drops,
                    // on success and on error alike.
                    let mut conn = pool.acquire().await?;
                    sqlx::query_as::<_, DocumentRow>(sql)
                        .bind(literal)
                        .bind(limit)
                        .fetch_all(&mut *conn)
                        .await
                }
            })
            .await?;

        Ok(rows.into_iter().map(SearchResult::from).collect())
    }
}
