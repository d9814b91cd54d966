use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Currency codes understood by the ledger.
///
/// Amounts are stored in the canonical currency ([`Currency::Rub`]); every
/// other code is reached through the supplied rate snapshot, where the ratio
/// reads as "display units per one canonical unit".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Cny,
    Eur,
    #[default]
    Rub,
}

impl Currency {
    pub const CANONICAL: Currency = Currency::Rub;
    pub const ALL: [Currency; 4] = [Currency::Usd, Currency::Cny, Currency::Eur, Currency::Rub];

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Cny => "CNY",
            Currency::Eur => "EUR",
            Currency::Rub => "RUB",
        }
    }

    #[must_use]
    pub const fn is_canonical(self) -> bool {
        matches!(self, Currency::Rub)
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "CNY" => Ok(Currency::Cny),
            "EUR" => Ok(Currency::Eur),
            "RUB" => Ok(Currency::Rub),
            other => Err(EngineError::Validation(format!(
                "unsupported currency: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_case_insensitively() {
        assert_eq!(Currency::try_from("usd").unwrap(), Currency::Usd);
        assert_eq!(Currency::try_from(" EUR ").unwrap(), Currency::Eur);
        assert!(Currency::try_from("GBP").is_err());
    }

    #[test]
    fn canonical_is_rub() {
        assert_eq!(Currency::CANONICAL.code(), "RUB");
        assert!(Currency::default().is_canonical());
    }
}
