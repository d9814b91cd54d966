//! Initial schema for the budget ledger.
//!
//! - `budget_state`: singleton ledger state (the row with `id = 1`)
//! - `categories`: spend categories
//! - `currencies`: supplied exchange-rate snapshot
//! - `spendings`: append-only spend log
//!
//! Money and ratios are stored as `i64` micro-units (6 fractional digits).

use sea_orm::{ConnectionTrait, Statement};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Canonical currency of the ledger. Its ratio is always 1.
const CANONICAL_CURRENCY: &str = "RUB";
const MICROS: i64 = 1_000_000;
const DEFAULT_CATEGORIES: [&str; 2] = ["food", "other"];

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum BudgetState {
    Table,
    Id,
    DisplayCurrency,
    BudgetValue,
    Balance,
    ExpiresAt,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    Name,
    NameNorm,
}

#[derive(Iden)]
enum Currencies {
    Table,
    Code,
    Ratio,
}

#[derive(Iden)]
enum Spendings {
    Table,
    Id,
    Amount,
    CategoryId,
    Date,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Currencies
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Currencies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Currencies::Code)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Currencies::Ratio).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Budget state (singleton)
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BudgetState::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BudgetState::Id)
                            .integer()
                            .not_null()
                            .primary_key()
                            .check(Expr::col(BudgetState::Id).eq(1)),
                    )
                    .col(
                        ColumnDef::new(BudgetState::DisplayCurrency)
                            .string()
                            .not_null()
                            .default(CANONICAL_CURRENCY),
                    )
                    .col(
                        ColumnDef::new(BudgetState::BudgetValue)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BudgetState::Balance).big_integer().not_null())
                    .col(ColumnDef::new(BudgetState::ExpiresAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budget_state-display_currency")
                            .from(BudgetState::Table, BudgetState::DisplayCurrency)
                            .to(Currencies::Table, Currencies::Code),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Categories
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(ColumnDef::new(Categories::NameNorm).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-categories-name_norm-unique")
                    .table(Categories::Table)
                    .col(Categories::NameNorm)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Spendings
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Spendings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Spendings::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Spendings::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Spendings::CategoryId).integer().not_null())
                    .col(ColumnDef::new(Spendings::Date).date().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-spendings-category_id")
                            .from(Spendings::Table, Spendings::CategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-spendings-date")
                    .table(Spendings::Table)
                    .col(Spendings::Date)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Seed rows
        // ───────────────────────────────────────────────────────────────────
        let db = manager.get_connection();
        let backend = manager.get_database_backend();
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO currencies (code, ratio) VALUES (?, ?)",
            vec![CANONICAL_CURRENCY.into(), MICROS.into()],
        ))
        .await?;
        for name in DEFAULT_CATEGORIES {
            db.execute(Statement::from_sql_and_values(
                backend,
                "INSERT INTO categories (name, name_norm) VALUES (?, ?)",
                vec![name.into(), name.into()],
            ))
            .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Spendings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BudgetState::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Currencies::Table).to_owned())
            .await?;
        Ok(())
    }
}
