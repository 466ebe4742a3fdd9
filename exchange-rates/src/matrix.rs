//! Directed exchange-rate table.

use std::collections::BTreeMap;

use crate::Currency;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration keys
// ─────────────────────────────────────────────────────────────────────────────

/// One configurable directed rate and the variable it is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateVar {
    pub key: &'static str,
    pub from: Currency,
    pub to: Currency,
}

/// Every directed pair the store can configure.
pub const RATE_VARS: [RateVar; 6] = [
    RateVar {
        key: "RATE_DOLLAR_TO_TOMAN",
        from: Currency::Dollar,
        to: Currency::Toman,
    },
    RateVar {
        key: "RATE_TOMAN_TO_DOLLAR",
        from: Currency::Toman,
        to: Currency::Dollar,
    },
    RateVar {
        key: "RATE_EURO_TO_TOMAN",
        from: Currency::Euro,
        to: Currency::Toman,
    },
    RateVar {
        key: "RATE_TOMAN_TO_EURO",
        from: Currency::Toman,
        to: Currency::Euro,
    },
    RateVar {
        key: "RATE_DOLLAR_TO_EURO",
        from: Currency::Dollar,
        to: Currency::Euro,
    },
    RateVar {
        key: "RATE_EURO_TO_DOLLAR",
        from: Currency::Euro,
        to: Currency::Dollar,
    },
];

/// Rejected rate values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateError {
    #[error("Rate for {from} -> {to} must be a positive number, got {value}")]
    NonPositive {
        from: Currency,
        to: Currency,
        value: f64,
    },

    #[error("Rate for {0} -> {0} is fixed at 1")]
    Identity(Currency),

    #[error("Rate `{key}` is not a number: {raw:?}")]
    NotANumber { key: &'static str, raw: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Matrix
// ─────────────────────────────────────────────────────────────────────────────

/// Multipliers from one currency to another.
///
/// The table is total over [`Currency`]; only the values can be unset. The
/// diagonal is always 1. Rates are independent: `rate(a, b) * rate(b, a)`
/// need not equal 1, so converting there and back may not return the input.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExchangeRateMatrix {
    rates: [[Option<f64>; 3]; 3],
}

impl ExchangeRateMatrix {
    /// A matrix with no off-diagonal rates.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a copy with `from -> to` set to `rate`.
    pub fn with_rate(mut self, from: Currency, to: Currency, rate: f64) -> Result<Self, RateError> {
        if from == to {
            return Err(RateError::Identity(from));
        }
        if !rate.is_finite() || rate <= 0.0 {
            return Err(RateError::NonPositive {
                from,
                to,
                value: rate,
            });
        }
        self.rates[from.index()][to.index()] = Some(rate);
        Ok(self)
    }

    /// Builds the matrix from the [`RATE_VARS`] keys.
    ///
    /// Missing keys leave the pair unset. Unparsable or non-positive values
    /// are logged and skipped. A pair whose reverse is valid but which has no
    /// value of its own falls back to the reciprocal of the reverse.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut matrix = Self::empty();

        for var in RATE_VARS {
            let Some(raw) = lookup(var.key) else {
                continue;
            };
            let parsed = parse_rate(var.key, &raw)
                .and_then(|rate| matrix.with_rate(var.from, var.to, rate));
            match parsed {
                Ok(updated) => matrix = updated,
                Err(e) => tracing::warn!(key = var.key, "Ignoring exchange rate: {}", e),
            }
        }

        for var in RATE_VARS {
            if matrix.configured(var.from, var.to).is_some() {
                continue;
            }
            if let Some(reverse) = matrix.configured(var.to, var.from) {
                tracing::debug!(
                    key = var.key,
                    "Deriving {} -> {} from the reverse rate",
                    var.from,
                    var.to
                );
                matrix.rates[var.from.index()][var.to.index()] = Some(1.0 / reverse);
            }
        }

        matrix
    }

    fn configured(&self, from: Currency, to: Currency) -> Option<f64> {
        self.rates[from.index()][to.index()]
    }

    /// Multiplier from `from` to `to`, if one is available.
    pub fn rate(&self, from: Currency, to: Currency) -> Option<f64> {
        if from == to {
            return Some(1.0);
        }
        self.configured(from, to)
    }

    /// Converts `amount` for display.
    ///
    /// Fails open: when no rate is configured the amount comes back unchanged
    /// and a warning is logged, so callers cannot assume conversion happened.
    pub fn convert(&self, amount: f64, from: Currency, to: Currency) -> f64 {
        if from == to {
            return amount;
        }
        match self.configured(from, to) {
            Some(rate) => amount * rate,
            None => {
                tracing::warn!(%from, %to, "No exchange rate configured, passing amount through");
                amount
            }
        }
    }

    /// Directed pairs with no rate.
    pub fn missing_pairs(&self) -> Vec<(Currency, Currency)> {
        let mut missing = Vec::new();
        for from in Currency::ALL {
            for to in Currency::ALL {
                if from != to && self.configured(from, to).is_none() {
                    missing.push((from, to));
                }
            }
        }
        missing
    }

    /// All available rates out of `base`, including `base -> base`.
    pub fn rates_from(&self, base: Currency) -> BTreeMap<String, f64> {
        Currency::ALL
            .iter()
            .filter_map(|&to| self.rate(base, to).map(|r| (to.to_string(), r)))
            .collect()
    }
}

fn parse_rate(key: &'static str, raw: &str) -> Result<f64, RateError> {
    raw.trim().parse::<f64>().map_err(|_| RateError::NotANumber {
        key,
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn sample() -> ExchangeRateMatrix {
        ExchangeRateMatrix::from_vars(vars(&[
            ("RATE_DOLLAR_TO_TOMAN", "60000"),
            ("RATE_TOMAN_TO_DOLLAR", "0.0000165"),
            ("RATE_EURO_TO_TOMAN", "65000"),
            ("RATE_TOMAN_TO_EURO", "0.0000152"),
            ("RATE_DOLLAR_TO_EURO", "0.92"),
            ("RATE_EURO_TO_DOLLAR", "1.08"),
        ]))
    }

    #[test]
    fn test_identity_conversion() {
        let matrix = sample();
        for currency in Currency::all() {
            for amount in [0.0, 1.0, 12.5, 1_234_567.0] {
                assert_eq!(matrix.convert(amount, *currency, *currency), amount);
            }
        }
    }

    #[test]
    fn test_identity_without_any_rates() {
        let matrix = ExchangeRateMatrix::empty();
        assert_eq!(matrix.convert(42.0, Currency::Euro, Currency::Euro), 42.0);
        assert_eq!(matrix.rate(Currency::Toman, Currency::Toman), Some(1.0));
    }

    #[test]
    fn test_zero_converts_to_zero() {
        let matrix = sample();
        for from in Currency::all() {
            for to in Currency::all() {
                assert_eq!(matrix.convert(0.0, *from, *to), 0.0);
            }
        }
    }

    #[test]
    fn test_convert_multiplies_by_rate() {
        let matrix = sample();
        let expected = 12.5 * 60000.0;
        assert_eq!(
            matrix.convert(12.5, Currency::Dollar, Currency::Toman),
            expected
        );
        assert_eq!(
            matrix.convert(100.0, Currency::Dollar, Currency::Euro),
            100.0 * 0.92
        );
    }

    #[test]
    fn test_missing_rate_passes_amount_through() {
        let matrix = ExchangeRateMatrix::empty()
            .with_rate(Currency::Dollar, Currency::Toman, 60000.0)
            .unwrap();
        assert_eq!(matrix.convert(99.0, Currency::Euro, Currency::Dollar), 99.0);
        assert!(matrix.rate(Currency::Euro, Currency::Dollar).is_none());
    }

    #[test]
    fn test_round_trip_is_lossy() {
        // Independently configured rates do not invert each other.
        let matrix = sample();
        let there = matrix.convert(100.0, Currency::Dollar, Currency::Euro);
        let back = matrix.convert(there, Currency::Euro, Currency::Dollar);
        assert_ne!(back, 100.0);
    }

    #[test]
    fn test_invalid_values_are_skipped() {
        let matrix = ExchangeRateMatrix::from_vars(vars(&[
            ("RATE_DOLLAR_TO_TOMAN", "-5"),
            ("RATE_EURO_TO_TOMAN", "abc"),
            ("RATE_DOLLAR_TO_EURO", "0"),
        ]));
        assert_eq!(matrix.missing_pairs().len(), 6);
    }

    #[test]
    fn test_reverse_defaults_to_reciprocal() {
        let matrix = ExchangeRateMatrix::from_vars(vars(&[("RATE_DOLLAR_TO_TOMAN", "50000")]));
        assert_eq!(
            matrix.rate(Currency::Toman, Currency::Dollar),
            Some(1.0 / 50000.0)
        );
        assert_eq!(matrix.missing_pairs().len(), 4);
    }

    #[test]
    fn test_explicit_reverse_wins() {
        let matrix = ExchangeRateMatrix::from_vars(vars(&[
            ("RATE_DOLLAR_TO_EURO", "0.9"),
            ("RATE_EURO_TO_DOLLAR", "1.2"),
        ]));
        assert_eq!(matrix.rate(Currency::Euro, Currency::Dollar), Some(1.2));
    }

    #[test]
    fn test_with_rate_rejects_bad_values() {
        let matrix = ExchangeRateMatrix::empty();
        assert!(matches!(
            matrix.with_rate(Currency::Dollar, Currency::Euro, 0.0),
            Err(RateError::NonPositive { .. })
        ));
        assert!(matches!(
            matrix.with_rate(Currency::Dollar, Currency::Euro, f64::NAN),
            Err(RateError::NonPositive { .. })
        ));
        assert_eq!(
            matrix.with_rate(Currency::Euro, Currency::Euro, 2.0),
            Err(RateError::Identity(Currency::Euro))
        );
    }

    #[test]
    fn test_rates_from_base() {
        let rates = sample().rates_from(Currency::Dollar);
        assert_eq!(rates.get("dollar"), Some(&1.0));
        assert_eq!(rates.get("toman"), Some(&60000.0));
        assert_eq!(rates.len(), 3);
    }
}
