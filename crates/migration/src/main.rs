use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use sea_orm_migration::prelude::*;

const DEFAULT_DATABASE_URL: &str = "sqlite:./budget.db?mode=rwc";

enum Command {
    Up,
    Down,
    Fresh,
    Status,
}

impl Command {
    fn parse(raw: Option<String>) -> Option<Self> {
        match raw.as_deref().unwrap_or("up") {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "fresh" => Some(Self::Fresh),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

/// Warn when the schema exists but nobody ran `budget_admin state init` yet.
async fn report_provisioning(db: &DatabaseConnection) -> Result<(), DbErr> {
    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            "SELECT COUNT(*) AS total FROM budget_state",
        ))
        .await?;
    let rows: i64 = row.and_then(|r| r.try_get("", "total").ok()).unwrap_or(0);
    if rows == 0 {
        eprintln!("budget state is not provisioned yet; run `budget_admin state init`");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(cmd) = Command::parse(std::env::args().nth(1)) else {
        eprintln!("Usage: cargo run -p migration -- [up|down|fresh|status]");
        std::process::exit(2);
    };

    let db_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let db = Database::connect(&db_url).await?;

    match cmd {
        Command::Up => {
            migration::Migrator::up(&db, None).await?;
            report_provisioning(&db).await?;
        }
        Command::Down => migration::Migrator::down(&db, None).await?,
        Command::Fresh => {
            migration::Migrator::fresh(&db).await?;
            report_provisioning(&db).await?;
        }
        Command::Status => migration::Migrator::status(&db).await?,
    }

    Ok(())
}
