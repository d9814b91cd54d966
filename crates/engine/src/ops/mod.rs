use std::{sync::Arc, time::Duration};

use sea_orm::DatabaseConnection;
use unicode_normalization::UnicodeNormalization;

use crate::{
    EngineError, ResultEngine,
    cache::{CacheStore, MemoryCache},
    report_cache::{DEFAULT_REPORT_TTL, ReportCache},
};

mod categories;
mod currencies;
mod ledger;
mod reports;
mod state;

pub use currencies::CurrencyRate;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Ledger facade shared by the chat router, the report consumer and the
/// reset scheduler. Cheap to clone: the pool and the cache store are shared.
#[derive(Clone, Debug)]
pub struct Engine {
    database: DatabaseConnection,
    reports: ReportCache,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The pool the engine was built with.
    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }
}

/// Canonical form of a category name used for uniqueness (`NFKC`, lowercase,
/// collapsed whitespace).
fn normalize_category_name(value: &str) -> ResultEngine<(String, String)> {
    let display = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if display.is_empty() {
        return Err(EngineError::Validation(
            "category name must not be empty".to_string(),
        ));
    }
    let norm = display.nfkc().collect::<String>().to_lowercase();
    Ok((display, norm))
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    cache: Option<Arc<dyn CacheStore>>,
    cache_ttl: Option<Duration>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Store used by the report cache. Defaults to a process-local [`MemoryCache`].
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> EngineBuilder {
        self.cache = Some(cache);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> EngineBuilder {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let store = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCache::new()) as Arc<dyn CacheStore>);
        Ok(Engine {
            database: self.database,
            reports: ReportCache::new(store, self.cache_ttl.unwrap_or(DEFAULT_REPORT_TTL)),
        })
    }
}
