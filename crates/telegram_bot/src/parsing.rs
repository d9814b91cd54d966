use chrono::{Duration, Months, NaiveDate};
use engine::Money;

use api_types::date::parse_date;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReportPeriod {
    Week,
    Month,
    Year,
}

impl ReportPeriod {
    /// `[today - period, today]`, both calendar days.
    pub(crate) fn window(self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), ParseError> {
        let start = match self {
            ReportPeriod::Week => today.checked_sub_signed(Duration::days(7)),
            ReportPeriod::Month => today.checked_sub_months(Months::new(1)),
            ReportPeriod::Year => today.checked_sub_months(Months::new(12)),
        };
        start
            .map(|start| (start, today))
            .ok_or(ParseError::WrongFormat)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Start,
    Help,
    Add {
        category_id: i32,
        amount: Money,
        date: NaiveDate,
    },
    Categories,
    Currencies,
    Currency {
        code: String,
    },
    Balance,
    Report(ReportPeriod),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ParseError {
    #[error("wrong format")]
    WrongFormat,
    #[error("category must be a number")]
    Category,
    #[error("sum must be a positive number")]
    Sum,
    #[error("wrong date format")]
    Date,
    #[error("unknown command")]
    Unknown,
}

fn expect_args(args: &[&str], count: usize) -> Result<(), ParseError> {
    if args.len() == count {
        Ok(())
    } else {
        Err(ParseError::WrongFormat)
    }
}

/// Parses a chat message into a command.
///
/// Tokens are separated by whitespace and every command takes an exact
/// number of arguments. `/cmd@bot_name` is accepted.
pub(crate) fn parse_command(text: &str) -> Result<Command, ParseError> {
    let mut tokens = text.split_whitespace();
    let Some(head) = tokens.next() else {
        return Err(ParseError::Unknown);
    };
    let name = head.split('@').next().unwrap_or(head);
    let args: Vec<&str> = tokens.collect();

    match name {
        "/start" => Ok(Command::Start),
        "/help" => Ok(Command::Help),
        "/categories" => Ok(Command::Categories),
        "/currencies" => Ok(Command::Currencies),
        "/balance" => Ok(Command::Balance),
        "/add" => {
            expect_args(&args, 3)?;
            let category_id = args[0].parse::<i32>().map_err(|_| ParseError::Category)?;
            let amount = args[1].parse::<Money>().map_err(|_| ParseError::Sum)?;
            if !amount.is_positive() {
                return Err(ParseError::Sum);
            }
            let date = parse_date(args[2]).map_err(|_| ParseError::Date)?;
            Ok(Command::Add {
                category_id,
                amount,
                date,
            })
        }
        "/currency" => {
            expect_args(&args, 1)?;
            Ok(Command::Currency {
                code: args[0].to_ascii_uppercase(),
            })
        }
        "/report" => {
            expect_args(&args, 1)?;
            let period = match args[0] {
                "w" => ReportPeriod::Week,
                "m" => ReportPeriod::Month,
                "y" => ReportPeriod::Year,
                _ => return Err(ParseError::WrongFormat),
            };
            Ok(Command::Report(period))
        }
        _ => Err(ParseError::Unknown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn add_takes_category_sum_and_date() {
        let cmd = parse_command("/add 1 12.50 05-01-2024").unwrap();
        assert_eq!(
            cmd,
            Command::Add {
                category_id: 1,
                amount: Money::new(12_500_000),
                date: day(2024, 1, 5),
            }
        );
    }

    #[test]
    fn add_reports_the_first_bad_argument() {
        assert_eq!(
            parse_command("/add food 12 05-01-2024"),
            Err(ParseError::Category)
        );
        assert_eq!(parse_command("/add 1 abc 05-01-2024"), Err(ParseError::Sum));
        assert_eq!(parse_command("/add 1 -3 05-01-2024"), Err(ParseError::Sum));
        assert_eq!(parse_command("/add 1 0 05-01-2024"), Err(ParseError::Sum));
        assert_eq!(parse_command("/add 1 12 2024-01-05"), Err(ParseError::Date));
    }

    #[test]
    fn argument_count_is_exact() {
        assert_eq!(parse_command("/add 1 12"), Err(ParseError::WrongFormat));
        assert_eq!(
            parse_command("/add 1 12 05-01-2024 extra"),
            Err(ParseError::WrongFormat)
        );
        assert_eq!(parse_command("/report"), Err(ParseError::WrongFormat));
        assert_eq!(parse_command("/currency"), Err(ParseError::WrongFormat));
    }

    #[test]
    fn report_period_letters() {
        assert_eq!(
            parse_command("/report w"),
            Ok(Command::Report(ReportPeriod::Week))
        );
        assert_eq!(
            parse_command("/report m"),
            Ok(Command::Report(ReportPeriod::Month))
        );
        assert_eq!(
            parse_command("/report y"),
            Ok(Command::Report(ReportPeriod::Year))
        );
        assert_eq!(parse_command("/report d"), Err(ParseError::WrongFormat));
    }

    #[test]
    fn bot_suffix_and_case_of_currency_code() {
        assert_eq!(parse_command("/balance@budget_bot"), Ok(Command::Balance));
        assert_eq!(
            parse_command("/currency usd"),
            Ok(Command::Currency {
                code: "USD".to_string()
            })
        );
    }

    #[test]
    fn unknown_input() {
        assert_eq!(parse_command("/nope"), Err(ParseError::Unknown));
        assert_eq!(parse_command("hello"), Err(ParseError::Unknown));
        assert_eq!(parse_command("   "), Err(ParseError::Unknown));
    }

    #[test]
    fn report_windows_end_today() {
        let today = day(2024, 3, 31);
        assert_eq!(
            ReportPeriod::Week.window(today).unwrap(),
            (day(2024, 3, 24), today)
        );
        assert_eq!(
            ReportPeriod::Month.window(today).unwrap(),
            (day(2024, 2, 29), today)
        );
        assert_eq!(
            ReportPeriod::Year.window(today).unwrap(),
            (day(2023, 3, 31), today)
        );
    }
}
