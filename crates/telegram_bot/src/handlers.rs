use std::fmt::Write as _;

use chrono::Utc;
use engine::{Currency, EngineError};
use teloxide::{prelude::*, types::User};

use crate::{
    ConfigParameters, observability,
    parsing::{Command, parse_command},
};

const HELP: &str = "/help - call this help
/categories - show all categories
/currencies - show all currencies
/add [category] [sum] [DD-MM-YYYY] - add spending
/report [type] - show report. type: w - week, m - month, y - year
/currency [code] - change currency
/balance - show the current balance";

pub(crate) async fn handle_message(
    bot: Bot,
    msg: Message,
    cfg: ConfigParameters,
) -> ResponseResult<()> {
    if !is_allowed(&cfg, msg.from.as_ref()) {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let reply = answer(&cfg, msg.chat.id.0, text).await;
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

fn is_allowed(cfg: &ConfigParameters, from: Option<&User>) -> bool {
    let Some(from) = from else {
        return false;
    };
    match &cfg.allowed_users {
        None => true,
        Some(ids) => ids.contains(&from.id),
    }
}

/// Reply text for one chat message. Report results arrive later through the
/// notifier; this only acknowledges the request.
pub(crate) async fn answer(cfg: &ConfigParameters, user_id: i64, text: &str) -> String {
    match observability::observe_request(reply(cfg, user_id, text)).await {
        Ok(text) | Err(text) => text,
    }
}

/// `Err` holds the reply for a failed command.
async fn reply(cfg: &ConfigParameters, user_id: i64, text: &str) -> Result<String, String> {
    let cmd = parse_command(text).map_err(|err| err.to_string())?;

    match cmd {
        Command::Start => Ok("hello".to_string()),
        Command::Help => Ok(HELP.to_string()),
        Command::Add {
            category_id,
            amount,
            date,
        } => {
            let balance = cfg
                .engine
                .record_spend(amount, category_id, date)
                .await
                .map_err(user_message_for_engine_error)?;
            Ok(format!("added, current balance: {balance}"))
        }
        Command::Categories => {
            let categories = cfg
                .engine
                .categories()
                .await
                .map_err(user_message_for_engine_error)?;
            Ok(categories.iter().fold(String::new(), |mut out, c| {
                let _ = writeln!(out, "{} - {}", c.id, c.name);
                out
            }))
        }
        Command::Currencies => {
            let rates = cfg
                .engine
                .currencies()
                .await
                .map_err(user_message_for_engine_error)?;
            Ok(rates.iter().fold(String::new(), |mut out, r| {
                let _ = writeln!(out, "{}", r.currency.code());
                out
            }))
        }
        Command::Currency { code } => {
            let currency =
                Currency::try_from(code.as_str()).map_err(user_message_for_engine_error)?;
            cfg.engine
                .change_display_currency(currency)
                .await
                .map_err(user_message_for_engine_error)?;
            Ok("successfully changed".to_string())
        }
        Command::Balance => {
            let (balance, _) = cfg
                .engine
                .balance()
                .await
                .map_err(user_message_for_engine_error)?;
            Ok(format!("{balance} {}", Currency::CANONICAL.code()))
        }
        Command::Report(period) => {
            let (start, end) = period
                .window(Utc::now().date_naive())
                .map_err(|err| err.to_string())?;
            match cfg.producer.enqueue(user_id, start, end).await {
                Ok(()) => Ok("calculating report...".to_string()),
                Err(err) => {
                    tracing::error!(user_id, error = %err, "report request not enqueued");
                    Err("failed to request the report, try again".to_string())
                }
            }
        }
    }
}

fn user_message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Validation(_)
        | EngineError::Conversion(_)
        | EngineError::NotProvisioned
        | EngineError::KeyNotFound(_)
        | EngineError::ExistingKey(_) => err.to_string(),
        EngineError::Cache(_) | EngineError::Database(_) => {
            tracing::error!(error = %err, "command failed");
            "something went wrong, try again later".to_string()
        }
    }
}
