//! Singleton ledger state (the row with `id = 1`).

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use crate::{Currency, EngineError, Money, ResultEngine};

/// Primary key of the only live `budget_state` row.
pub const STATE_ID: i32 = 1;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budget_state")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub display_currency: String,
    pub budget_value: i64,
    pub balance: i64,
    pub expires_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::currencies::Entity",
        from = "Column::DisplayCurrency",
        to = "super::currencies::Column::Code"
    )]
    Currency,
}

impl Related<super::currencies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Currency.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Read-only view of the ledger state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BudgetState {
    pub display_currency: Currency,
    pub budget_value: Money,
    pub balance: Money,
    pub expires_at: DateTime<Utc>,
}

impl TryFrom<Model> for BudgetState {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            display_currency: Currency::try_from(model.display_currency.as_str())?,
            budget_value: Money::new(model.budget_value),
            balance: Money::new(model.balance),
            expires_at: model.expires_at,
        })
    }
}
