use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseTransaction, Statement, TransactionTrait, prelude::*,
};

use crate::{
    Currency, EngineError, Money, ResultEngine,
    state::{self, BudgetState, STATE_ID},
};

use super::{Engine, with_tx};

impl Engine {
    /// Create the singleton ledger state. Fails with `ExistingKey` if it is
    /// already there.
    pub async fn provision_state(
        &self,
        budget_value: Money,
        display_currency: Currency,
        expires_at: DateTime<Utc>,
    ) -> ResultEngine<BudgetState> {
        if budget_value.micros() < 0 {
            return Err(EngineError::Validation(
                "budget value must be >= 0".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            if state::Entity::find_by_id(STATE_ID).one(&db_tx).await?.is_some() {
                return Err(EngineError::ExistingKey("budget_state".to_string()));
            }
            // The FK on display_currency needs a rate row.
            Self::require_rate(&db_tx, display_currency).await?;

            let model = state::ActiveModel {
                id: ActiveValue::Set(STATE_ID),
                display_currency: ActiveValue::Set(display_currency.code().to_string()),
                budget_value: ActiveValue::Set(budget_value.micros()),
                balance: ActiveValue::Set(budget_value.micros()),
                expires_at: ActiveValue::Set(expires_at),
            }
            .insert(&db_tx)
            .await?;
            tracing::info!(%budget_value, %display_currency, %expires_at, "budget state provisioned");
            BudgetState::try_from(model)
        })
    }

    pub async fn budget_state(&self) -> ResultEngine<BudgetState> {
        state::Entity::find_by_id(STATE_ID)
            .one(&self.database)
            .await?
            .ok_or(EngineError::NotProvisioned)
            .and_then(BudgetState::try_from)
    }

    /// Current balance in canonical currency and the selected display currency.
    pub async fn balance(&self) -> ResultEngine<(Money, Currency)> {
        let state = self.budget_state().await?;
        Ok((state.balance, state.display_currency))
    }

    /// Restore `balance = budget_value` and move the expiry to `next_expiry`.
    pub async fn reset_budget(&self, next_expiry: DateTime<Utc>) -> ResultEngine<Money> {
        let row = self
            .database
            .query_one(Statement::from_sql_and_values(
                self.database.get_database_backend(),
                "UPDATE budget_state SET balance = budget_value, expires_at = ? \
                 WHERE id = ? RETURNING balance",
                vec![next_expiry.into(), STATE_ID.into()],
            ))
            .await?
            .ok_or(EngineError::NotProvisioned)?;
        let balance: i64 = row.try_get("", "balance")?;
        Ok(Money::new(balance))
    }

    /// Subtract-and-return on the singleton row. Never reads the balance
    /// separately from writing it.
    pub(super) async fn debit_balance(
        db_tx: &DatabaseTransaction,
        amount: Money,
    ) -> ResultEngine<Money> {
        let row = db_tx
            .query_one(Statement::from_sql_and_values(
                db_tx.get_database_backend(),
                "UPDATE budget_state SET balance = balance - ? WHERE id = ? RETURNING balance",
                vec![amount.micros().into(), STATE_ID.into()],
            ))
            .await?
            .ok_or(EngineError::NotProvisioned)?;
        let balance: i64 = row.try_get("", "balance")?;
        Ok(Money::new(balance))
    }
}
