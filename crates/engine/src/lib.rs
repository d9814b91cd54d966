//! Budget ledger core.
//!
//! - spend ledger: atomic debit of the singleton state plus the spend row
//! - report aggregator behind a cache-aside [`ReportCache`]
//! - monthly [`BudgetResetScheduler`]
//! - currency rate snapshot and category registry

pub use cache::{CacheError, CacheStore, MemoryCache};
#[cfg(feature = "redis")]
pub use cache::RedisCache;
pub use categories::Category;
pub use currency::Currency;
pub use error::EngineError;
pub use money::{Money, Rate};
pub use ops::{CurrencyRate, Engine, EngineBuilder};
pub use report_cache::{DEFAULT_REPORT_TTL, REPORT_CACHE_KEY, ReportCache};
pub use scheduler::{BudgetResetScheduler, next_expiry};
pub use state::BudgetState;

pub mod cache;
mod categories;
mod currencies;
mod currency;
mod error;
mod money;
mod ops;
mod report_cache;
mod scheduler;
mod spendings;
mod state;

type ResultEngine<T> = Result<T, EngineError>;
