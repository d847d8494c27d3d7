//! Locale-aware rendering of monetary amounts.
//!
//! Conventions mirror the POSIX `localeconv()` monetary fields. All
//! arithmetic stays in fixed-point decimals.

mod locales;

use std::borrow::Cow;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::CurrencyError;

/// Largest scale a `Decimal` can carry.
const MAX_SCALE: u32 = 28;

pub use locales::{
    preset, DE_DE, EN_AU, EN_CA, EN_IN, EN_US, FA_IR, FR_CA, FR_CH, FR_FR, IT_IT, LOCALE_NAMES,
    PL_PL, PT_BR,
};

/// Where the positive/negative sign goes relative to the value and symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum SignPosition {
    /// Wrap value and symbol in parentheses; the sign string is not used.
    Parentheses,
    PrecedeValueSymbol,
    FollowValueSymbol,
    PrecedeValue,
    FollowValue,
}

impl SignPosition {
    pub fn code(&self) -> i64 {
        match self {
            SignPosition::Parentheses => 0,
            SignPosition::PrecedeValueSymbol => 1,
            SignPosition::FollowValueSymbol => 2,
            SignPosition::PrecedeValue => 3,
            SignPosition::FollowValue => 4,
        }
    }
}

impl From<i64> for SignPosition {
    /// Unknown codes behave like `1`.
    fn from(code: i64) -> Self {
        match code {
            0 => SignPosition::Parentheses,
            2 => SignPosition::FollowValueSymbol,
            3 => SignPosition::PrecedeValue,
            4 => SignPosition::FollowValue,
            _ => SignPosition::PrecedeValueSymbol,
        }
    }
}

impl From<SignPosition> for i64 {
    fn from(position: SignPosition) -> Self {
        position.code()
    }
}

/// key: currency-conventions -> localeconv monetary fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConventions {
    pub currency_symbol: Cow<'static, str>,
    pub int_curr_symbol: Cow<'static, str>,
    pub p_cs_precedes: bool,
    pub n_cs_precedes: bool,
    pub p_sep_by_space: bool,
    pub n_sep_by_space: bool,
    pub mon_decimal_point: Cow<'static, str>,
    pub mon_thousands_sep: Cow<'static, str>,
    /// Digits per group; `0` disables grouping.
    pub mon_grouping: usize,
    pub frac_digits: u32,
    pub int_frac_digits: u32,
    pub positive_sign: Cow<'static, str>,
    pub negative_sign: Cow<'static, str>,
    pub p_sign_posn: SignPosition,
    pub n_sign_posn: SignPosition,
}

impl Default for CurrencyConventions {
    fn default() -> Self {
        Self {
            currency_symbol: Cow::Borrowed(""),
            int_curr_symbol: Cow::Borrowed(""),
            p_cs_precedes: true,
            n_cs_precedes: true,
            p_sep_by_space: false,
            n_sep_by_space: false,
            mon_decimal_point: Cow::Borrowed("."),
            mon_thousands_sep: Cow::Borrowed(""),
            mon_grouping: 3,
            frac_digits: 2,
            int_frac_digits: 2,
            positive_sign: Cow::Borrowed(""),
            negative_sign: Cow::Borrowed(""),
            p_sign_posn: SignPosition::PrecedeValueSymbol,
            n_sign_posn: SignPosition::PrecedeValueSymbol,
        }
    }
}

struct SymbolDetails<'a> {
    symbol: &'a str,
    precedes: bool,
    separated: &'static str,
    sign: &'a str,
    position: SignPosition,
}

impl CurrencyConventions {
    pub fn frac_digits_for(&self, international: bool) -> u32 {
        if international {
            self.int_frac_digits
        } else {
            self.frac_digits
        }
    }

    pub fn format(&self, amount: Decimal, international: bool) -> String {
        let negative = amount.is_sign_negative() && !amount.is_zero();
        let (whole, frac) = self.split_value(amount, international);
        let grouped = self.group_whole(&whole);
        let value = self.join_value(&grouped, &frac, international);
        self.add_symbols(&value, negative, international)
    }

    /// Rounds the absolute value half away from zero and splits it on the decimal point.
    fn split_value(&self, amount: Decimal, international: bool) -> (String, String) {
        let digits = self.frac_digits_for(international).min(MAX_SCALE);
        let mut rounded = amount
            .abs()
            .round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(digits);

        let rendered = rounded.to_string();
        match rendered.split_once('.') {
            Some((whole, frac)) => (whole.to_string(), frac.to_string()),
            None => (rendered, String::new()),
        }
    }

    fn group_whole(&self, whole: &str) -> String {
        let size = self.mon_grouping;
        if size == 0 || whole.len() <= size {
            return whole.to_string();
        }

        let digits = whole.chars().collect::<Vec<_>>();
        let mut groups = Vec::new();
        let mut end = digits.len();
        while end > 0 {
            let start = end.saturating_sub(size);
            groups.push(digits[start..end].iter().collect::<String>());
            end = start;
        }
        groups.reverse();
        groups.join(self.mon_thousands_sep.as_ref())
    }

    fn join_value(&self, whole: &str, frac: &str, international: bool) -> String {
        let separator = if self.frac_digits_for(international) > 0 {
            self.mon_decimal_point.as_ref()
        } else {
            ""
        };
        format!("{whole}{separator}{frac}")
    }

    fn symbol_details(&self, negative: bool, international: bool) -> SymbolDetails<'_> {
        let symbol = if international {
            self.int_curr_symbol.as_ref()
        } else {
            self.currency_symbol.as_ref()
        };

        if negative {
            SymbolDetails {
                symbol,
                precedes: self.n_cs_precedes,
                separated: if self.n_sep_by_space { " " } else { "" },
                sign: &self.negative_sign,
                position: self.n_sign_posn,
            }
        } else {
            SymbolDetails {
                symbol,
                precedes: self.p_cs_precedes,
                separated: if self.p_sep_by_space { " " } else { "" },
                sign: &self.positive_sign,
                position: self.p_sign_posn,
            }
        }
    }

    fn add_symbols(&self, value: &str, negative: bool, international: bool) -> String {
        let details = self.symbol_details(negative, international);

        let (before, after) = if details.precedes {
            (format!("{}{}", details.symbol, details.separated), String::new())
        } else {
            (String::new(), format!("{}{}", details.separated, details.symbol))
        };
        let sign = details.sign;

        match details.position {
            SignPosition::Parentheses => format!("({before}{value}{after})"),
            SignPosition::PrecedeValueSymbol => format!("{sign}{before}{value}{after}"),
            SignPosition::FollowValueSymbol => format!("{before}{value}{after}{sign}"),
            SignPosition::PrecedeValue => format!("{before}{sign}{value}{after}"),
            SignPosition::FollowValue => format!("{before}{value}{sign}{after}"),
        }
    }
}

/// Formats `amount` under `conventions`.
pub fn format_currency(amount: Decimal, conventions: &CurrencyConventions, international: bool) -> String {
    conventions.format(amount, international)
}

/// Parses a textual amount such as `"1234.5"` or `"1e3"` into a fixed-point decimal.
pub fn parse_amount(raw: &str) -> Result<Decimal, CurrencyError> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| CurrencyError::InvalidAmount(raw.to_string()))
}

/// key: currency-formatter -> locale preset or custom conventions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    locale: String,
    conventions: CurrencyConventions,
}

impl Currency {
    pub fn for_locale(locale: &str) -> Result<Self, CurrencyError> {
        let locale = locale.trim().to_ascii_lowercase();
        let conventions =
            preset(&locale).ok_or_else(|| CurrencyError::UnknownLocale(locale.clone()))?;
        Ok(Self {
            locale,
            conventions,
        })
    }

    pub fn custom(conventions: CurrencyConventions) -> Self {
        Self {
            locale: "custom".to_string(),
            conventions,
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn conventions(&self) -> &CurrencyConventions {
        &self.conventions
    }

    /// ISO code handed to the payment gateway.
    pub fn code(&self) -> &str {
        self.conventions.int_curr_symbol.trim()
    }

    pub fn format(&self, amount: impl Into<Decimal>, international: bool) -> String {
        self.conventions.format(amount.into(), international)
    }

    pub fn format_str(&self, amount: &str, international: bool) -> Result<String, CurrencyError> {
        Ok(self.conventions.format(parse_amount(amount)?, international))
    }
}
