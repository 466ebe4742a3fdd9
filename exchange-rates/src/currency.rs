use std::fmt;

/// Currencies a price can be displayed in.
///
/// Toman is the store's local unit; every persisted amount is in Toman.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Toman,
    Dollar,
    Euro,
}

/// Returned when a currency name cannot be recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown currency: {0}")]
pub struct ParseCurrencyError(pub String);

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Toman, Currency::Dollar, Currency::Euro];

    /// Position of the currency in rate tables.
    pub(crate) const fn index(self) -> usize {
        match self {
            Currency::Toman => 0,
            Currency::Dollar => 1,
            Currency::Euro => 2,
        }
    }

    /// ISO-style code used by payment gateways.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Toman => "IRT",
            Currency::Dollar => "USD",
            Currency::Euro => "EUR",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Toman => "تومان",
            Currency::Dollar => "$",
            Currency::Euro => "€",
        }
    }

    /// BCP 47 locale used when formatting amounts in this currency.
    pub fn locale(&self) -> &'static str {
        match self {
            Currency::Toman => "fa-IR",
            Currency::Dollar | Currency::Euro => "en-US",
        }
    }

    pub fn all() -> &'static [Currency] {
        &Self::ALL
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Currency::Toman => "toman",
            Currency::Dollar => "dollar",
            Currency::Euro => "euro",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Currency {
    type Err = ParseCurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "toman" | "تومان" | "irt" => Ok(Currency::Toman),
            "dollar" | "usd" | "$" => Ok(Currency::Dollar),
            "euro" | "eur" | "€" => Ok(Currency::Euro),
            _ => Err(ParseCurrencyError(trimmed.to_string())),
        }
    }
}
