use std::error::Error;

use chrono::{TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use engine::{Currency, CurrencyRate, Engine, Money, Rate, next_expiry};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "budget_admin")]
#[command(about = "Admin utilities for the budget bot (state, categories, rates)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./budget.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    State(State),
    Category(Category),
    Rate(RateCmd),
}

#[derive(Args, Debug)]
struct State {
    #[command(subcommand)]
    command: StateCommand,
}

#[derive(Subcommand, Debug)]
enum StateCommand {
    /// Create the budget state row. Fails if it already exists.
    Init(StateInitArgs),
    Show,
}

#[derive(Args, Debug)]
struct StateInitArgs {
    /// Monthly budget in canonical currency, e.g. `50000` or `499.90`.
    #[arg(long)]
    budget: Money,
    #[arg(long, default_value = "RUB")]
    currency: String,
    /// First reset day (`DD-MM-YYYY`). Defaults to one month from today.
    #[arg(long)]
    expires: Option<String>,
}

#[derive(Args, Debug)]
struct Category {
    #[command(subcommand)]
    command: CategoryCommand,
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    Add {
        #[arg(long)]
        name: String,
    },
    List,
}

#[derive(Args, Debug)]
struct RateCmd {
    #[command(subcommand)]
    command: RateCommand,
}

#[derive(Subcommand, Debug)]
enum RateCommand {
    /// Units of `code` per one canonical unit.
    Set {
        #[arg(long)]
        code: String,
        #[arg(long)]
        ratio: Rate,
    },
    /// Load a JSON snapshot: `[{"currency": "USD", "rate": "0.011"}, ...]`.
    Import {
        #[arg(long)]
        file: std::path::PathBuf,
    },
    List,
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::State(State {
            command: StateCommand::Init(args),
        }) => {
            let currency = Currency::try_from(args.currency.as_str())?;
            let expires_at = match args.expires {
                Some(raw) => {
                    let day = api_types::date::parse_date(&raw)?;
                    Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN))
                }
                None => next_expiry(Utc::now()),
            };
            engine
                .provision_state(args.budget, currency, expires_at)
                .await?;
            println!(
                "budget state created: {} {}, resets on {}",
                args.budget,
                Currency::CANONICAL,
                api_types::date::format_date(expires_at.date_naive())
            );
        }
        Command::State(State {
            command: StateCommand::Show,
        }) => {
            let state = engine.budget_state().await?;
            println!(
                "balance: {} / {} {}",
                state.balance,
                state.budget_value,
                Currency::CANONICAL
            );
            println!("display currency: {}", state.display_currency);
            println!(
                "next reset: {}",
                api_types::date::format_date(state.expires_at.date_naive())
            );
        }
        Command::Category(Category {
            command: CategoryCommand::Add { name },
        }) => {
            let category = engine.create_category(&name).await?;
            println!("created category: {} - {}", category.id, category.name);
        }
        Command::Category(Category {
            command: CategoryCommand::List,
        }) => {
            for category in engine.categories().await? {
                println!("{} - {}", category.id, category.name);
            }
        }
        Command::Rate(RateCmd {
            command: RateCommand::Set { code, ratio },
        }) => {
            let currency = Currency::try_from(code.as_str())?;
            engine
                .set_rates(&[CurrencyRate {
                    currency,
                    rate: ratio,
                }])
                .await?;
            println!("rate set: 1 {} = {ratio} {currency}", Currency::CANONICAL);
        }
        Command::Rate(RateCmd {
            command: RateCommand::Import { file },
        }) => {
            let raw = std::fs::read_to_string(&file)?;
            let rates: Vec<CurrencyRate> = serde_json::from_str(&raw)?;
            engine.set_rates(&rates).await?;
            println!("imported {} rates", rates.len());
        }
        Command::Rate(RateCmd {
            command: RateCommand::List,
        }) => {
            for entry in engine.currencies().await? {
                println!("{} {}", entry.currency, entry.rate);
            }
        }
    }

    Ok(())
}
