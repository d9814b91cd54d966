//! Cache-aside layer in front of the report aggregator.
//!
//! All cached ranges live under one key as a JSON list of
//! `{start, end, data}` entries, `data` holding canonical sums as decimal
//! strings. Any ledger write deletes the whole key.
//!
//! A miss only stores its list if no invalidation happened since the list was
//! read, so sums computed from a pre-write ledger are never cached after the
//! write commits. Two concurrent misses for different ranges still race on
//! the list itself: the last writer's list wins.

use std::{collections::BTreeMap, future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Money, ResultEngine,
    cache::{CacheError, CacheStore},
};

pub const REPORT_CACHE_KEY: &str = "report";
pub const DEFAULT_REPORT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CachedReport {
    pub(crate) start: DateTime<Utc>,
    pub(crate) end: DateTime<Utc>,
    pub(crate) data: BTreeMap<String, String>,
}

impl CachedReport {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>, sums: &BTreeMap<String, Money>) -> Self {
        Self {
            start,
            end,
            data: sums
                .iter()
                .map(|(name, amount)| (name.clone(), amount.to_string()))
                .collect(),
        }
    }

    /// Calendar-day equality on both bounds; time of day is ignored.
    fn covers(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        same_day(self.start, start) && same_day(self.end, end)
    }

    fn sums(&self) -> ResultEngine<BTreeMap<String, Money>> {
        self.data
            .iter()
            .map(|(name, raw)| Ok((name.clone(), raw.parse::<Money>()?)))
            .collect()
    }
}

fn same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

#[derive(Clone)]
pub struct ReportCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl std::fmt::Debug for ReportCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportCache").field("ttl", &self.ttl).finish()
    }
}

impl ReportCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Returns cached canonical sums for the range, or computes, appends and
    /// re-stores the whole list.
    ///
    /// A failed or unreadable cache read falls back to recomputing; a failed
    /// write is returned to the caller. A list read before an invalidation is
    /// never written back.
    pub async fn get_or_compute<F, Fut>(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        compute: F,
    ) -> ResultEngine<BTreeMap<String, Money>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ResultEngine<BTreeMap<String, Money>>>,
    {
        let generation = match self.store.generation(REPORT_CACHE_KEY).await {
            Ok(generation) => generation,
            Err(err) => {
                tracing::warn!(error = %err, "report cache unavailable; computing uncached");
                return compute().await;
            }
        };

        let mut entries = match self.load().await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, "report cache read failed; recomputing");
                Vec::new()
            }
        };

        if let Some(hit) = entries.iter().find(|entry| entry.covers(start, end)) {
            tracing::debug!(%start, %end, "report cache hit");
            return hit.sums();
        }

        let sums = compute().await?;
        entries.push(CachedReport::new(start, end, &sums));
        let payload = serde_json::to_string(&entries).map_err(CacheError::from)?;
        let stored = self
            .store
            .set_if_generation(REPORT_CACHE_KEY, payload, self.ttl, generation)
            .await?;
        if !stored {
            tracing::debug!(%start, %end, "ledger changed during the report; not cached");
        }
        Ok(sums)
    }

    /// Drops every cached range and fences off lists read before this call.
    pub async fn invalidate(&self) -> Result<(), CacheError> {
        self.store.invalidate(REPORT_CACHE_KEY).await
    }

    async fn load(&self) -> Result<Vec<CachedReport>, CacheError> {
        match self.store.get(REPORT_CACHE_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }
}
