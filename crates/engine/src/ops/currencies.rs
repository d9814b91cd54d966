use sea_orm::{
    ActiveValue, ConnectionTrait, QueryOrder, Statement, TransactionTrait, prelude::*,
    sea_query::OnConflict,
};
use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, Rate, ResultEngine, currencies, state::STATE_ID};

use super::{Engine, with_tx};

/// One row of the supplied rate snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyRate {
    pub currency: Currency,
    pub rate: Rate,
}

impl Engine {
    pub(super) async fn require_rate<C: ConnectionTrait>(
        db: &C,
        currency: Currency,
    ) -> ResultEngine<Rate> {
        let model = currencies::Entity::find_by_id(currency.code().to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::Conversion(format!("no rate for {currency}")))?;
        let rate = Rate::new(model.ratio);
        if !rate.is_positive() {
            return Err(EngineError::Conversion(format!(
                "invalid rate for {currency}: {rate}"
            )));
        }
        Ok(rate)
    }

    /// Ratio of `currency` in the current snapshot.
    pub async fn rate(&self, currency: Currency) -> ResultEngine<Rate> {
        Self::require_rate(&self.database, currency).await
    }

    /// The current rate snapshot, ordered by code.
    pub async fn currencies(&self) -> ResultEngine<Vec<CurrencyRate>> {
        let models = currencies::Entity::find()
            .order_by_asc(currencies::Column::Code)
            .all(&self.database)
            .await?;
        models
            .into_iter()
            .map(|model| {
                Ok(CurrencyRate {
                    currency: Currency::try_from(model.code.as_str())?,
                    rate: Rate::new(model.ratio),
                })
            })
            .collect()
    }

    /// Upsert a rate snapshot. The canonical currency is pinned to ratio 1.
    pub async fn set_rates(&self, rates: &[CurrencyRate]) -> ResultEngine<()> {
        for entry in rates {
            if !entry.rate.is_positive() {
                return Err(EngineError::Validation(format!(
                    "rate for {} must be > 0",
                    entry.currency
                )));
            }
            if entry.currency.is_canonical() && entry.rate != Rate::ONE {
                return Err(EngineError::Validation(format!(
                    "{} is canonical, its rate is always 1",
                    entry.currency
                )));
            }
        }

        with_tx!(self, |db_tx| {
            for entry in rates {
                currencies::Entity::insert(currencies::ActiveModel {
                    code: ActiveValue::Set(entry.currency.code().to_string()),
                    ratio: ActiveValue::Set(entry.rate.micros()),
                })
                .on_conflict(
                    OnConflict::column(currencies::Column::Code)
                        .update_column(currencies::Column::Ratio)
                        .to_owned(),
                )
                .exec(&db_tx)
                .await?;
            }
            tracing::info!(count = rates.len(), "rate snapshot updated");
            Ok(())
        })
    }

    /// Switch the display currency. Cached report sums are canonical, so the
    /// report cache stays valid.
    pub async fn change_display_currency(&self, currency: Currency) -> ResultEngine<()> {
        Self::require_rate(&self.database, currency).await?;
        let result = self
            .database
            .execute(Statement::from_sql_and_values(
                self.database.get_database_backend(),
                "UPDATE budget_state SET display_currency = ? WHERE id = ?",
                vec![currency.code().into(), STATE_ID.into()],
            ))
            .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::NotProvisioned);
        }
        tracing::info!(%currency, "display currency changed");
        Ok(())
    }
}
