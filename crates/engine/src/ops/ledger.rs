use chrono::NaiveDate;
use sea_orm::{ActiveValue, TransactionTrait, prelude::*};

use crate::{EngineError, Money, ResultEngine, categories, spendings};

use super::{Engine, with_tx};

impl Engine {
    /// Record a spend expressed in the display currency.
    ///
    /// Converts the amount to canonical, then in one DB transaction debits the
    /// balance and appends the spend row. Returns the balance after the debit,
    /// in canonical currency.
    pub async fn record_spend(
        &self,
        amount: Money,
        category_id: i32,
        date: NaiveDate,
    ) -> ResultEngine<Money> {
        if !amount.is_positive() {
            return Err(EngineError::Validation("amount must be > 0".to_string()));
        }
        if category_id <= 0 {
            return Err(EngineError::Validation(format!(
                "invalid category id: {category_id}"
            )));
        }

        let state = self.budget_state().await?;
        let rate = self.rate(state.display_currency).await?;
        let canonical = amount.to_canonical(rate)?;
        if !canonical.is_positive() {
            return Err(EngineError::Validation(format!(
                "amount {amount} {} is below the smallest unit",
                state.display_currency
            )));
        }

        let balance = with_tx!(self, |db_tx| {
            if categories::Entity::find_by_id(category_id)
                .one(&db_tx)
                .await?
                .is_none()
            {
                return Err(EngineError::KeyNotFound(format!("category {category_id}")));
            }
            let balance = Self::debit_balance(&db_tx, canonical).await?;
            spendings::ActiveModel {
                amount: ActiveValue::Set(canonical.micros()),
                category_id: ActiveValue::Set(category_id),
                date: ActiveValue::Set(date),
                ..Default::default()
            }
            .insert(&db_tx)
            .await?;
            // A failed invalidation aborts the write.
            self.reports.invalidate().await?;
            Ok::<Money, EngineError>(balance)
        })?;

        // Fences off reports that read the ledger before the commit.
        if let Err(err) = self.reports.invalidate().await {
            tracing::warn!(error = %err, "post-commit report cache invalidation failed");
        }

        tracing::debug!(%amount, %canonical, %balance, category_id, %date, "spend recorded");
        Ok(balance)
    }
}
