use std::borrow::Cow;

use super::{CurrencyConventions, SignPosition};

pub const LOCALE_NAMES: [&str; 12] = [
    "de_de", "en_au", "en_ca", "en_us", "fa_ir", "fr_ca",
    "pl_pl", "fr_fr", "fr_ch", "it_it", "pt_br", "en_in",
];

pub const DE_DE: CurrencyConventions = CurrencyConventions {
    currency_symbol: Cow::Borrowed("€"),
    int_curr_symbol: Cow::Borrowed("EUR"),
    p_cs_precedes: false,
    n_cs_precedes: false,
    p_sep_by_space: true,
    n_sep_by_space: true,
    mon_decimal_point: Cow::Borrowed(","),
    mon_thousands_sep: Cow::Borrowed("."),
    mon_grouping: 3,
    frac_digits: 2,
    int_frac_digits: 2,
    positive_sign: Cow::Borrowed(""),
    negative_sign: Cow::Borrowed("-"),
    p_sign_posn: SignPosition::PrecedeValueSymbol,
    n_sign_posn: SignPosition::Parentheses,
};

pub const EN_AU: CurrencyConventions = CurrencyConventions {
    currency_symbol: Cow::Borrowed("$"),
    int_curr_symbol: Cow::Borrowed("AUD"),
    p_cs_precedes: true,
    n_cs_precedes: true,
    p_sep_by_space: false,
    n_sep_by_space: false,
    mon_decimal_point: Cow::Borrowed("."),
    mon_thousands_sep: Cow::Borrowed(","),
    mon_grouping: 3,
    frac_digits: 2,
    int_frac_digits: 2,
    positive_sign: Cow::Borrowed(""),
    negative_sign: Cow::Borrowed("-"),
    p_sign_posn: SignPosition::PrecedeValue,
    n_sign_posn: SignPosition::PrecedeValueSymbol,
};

pub const EN_CA: CurrencyConventions = CurrencyConventions {
    currency_symbol: Cow::Borrowed("$"),
    int_curr_symbol: Cow::Borrowed("CAD"),
    p_cs_precedes: true,
    n_cs_precedes: true,
    p_sep_by_space: false,
    n_sep_by_space: false,
    mon_decimal_point: Cow::Borrowed("."),
    mon_thousands_sep: Cow::Borrowed(","),
    mon_grouping: 3,
    frac_digits: 2,
    int_frac_digits: 2,
    positive_sign: Cow::Borrowed(""),
    negative_sign: Cow::Borrowed("-"),
    p_sign_posn: SignPosition::PrecedeValue,
    n_sign_posn: SignPosition::PrecedeValue,
};

pub const EN_US: CurrencyConventions = CurrencyConventions {
    currency_symbol: Cow::Borrowed("$"),
    int_curr_symbol: Cow::Borrowed("USD"),
    p_cs_precedes: true,
    n_cs_precedes: true,
    p_sep_by_space: false,
    n_sep_by_space: false,
    mon_decimal_point: Cow::Borrowed("."),
    mon_thousands_sep: Cow::Borrowed(","),
    mon_grouping: 3,
    frac_digits: 2,
    int_frac_digits: 2,
    positive_sign: Cow::Borrowed(""),
    negative_sign: Cow::Borrowed("-"),
    p_sign_posn: SignPosition::PrecedeValue,
    n_sign_posn: SignPosition::Parentheses,
};

pub const FA_IR: CurrencyConventions = CurrencyConventions {
    currency_symbol: Cow::Borrowed("\u{fdfc}"),
    int_curr_symbol: Cow::Borrowed("IRR"),
    p_cs_precedes: false,
    n_cs_precedes: false,
    p_sep_by_space: true,
    n_sep_by_space: true,
    mon_decimal_point: Cow::Borrowed("."),
    mon_thousands_sep: Cow::Borrowed(","),
    mon_grouping: 3,
    frac_digits: 0,
    int_frac_digits: 0,
    positive_sign: Cow::Borrowed(""),
    negative_sign: Cow::Borrowed("-"),
    p_sign_posn: SignPosition::PrecedeValueSymbol,
    n_sign_posn: SignPosition::PrecedeValueSymbol,
};

pub const FR_CA: CurrencyConventions = CurrencyConventions {
    currency_symbol: Cow::Borrowed("$"),
    int_curr_symbol: Cow::Borrowed("CAD"),
    p_cs_precedes: false,
    n_cs_precedes: false,
    p_sep_by_space: true,
    n_sep_by_space: true,
    mon_decimal_point: Cow::Borrowed(","),
    mon_thousands_sep: Cow::Borrowed("\u{a0}"),
    mon_grouping: 3,
    frac_digits: 2,
    int_frac_digits: 2,
    positive_sign: Cow::Borrowed(""),
    negative_sign: Cow::Borrowed("-"),
    p_sign_posn: SignPosition::PrecedeValueSymbol,
    n_sign_posn: SignPosition::Parentheses,
};

pub const PL_PL: CurrencyConventions = CurrencyConventions {
    currency_symbol: Cow::Borrowed("zł"),
    int_curr_symbol: Cow::Borrowed("PLN"),
    p_cs_precedes: false,
    n_cs_precedes: false,
    p_sep_by_space: true,
    n_sep_by_space: true,
    mon_decimal_point: Cow::Borrowed(","),
    mon_thousands_sep: Cow::Borrowed("."),
    mon_grouping: 3,
    frac_digits: 2,
    int_frac_digits: 2,
    positive_sign: Cow::Borrowed(""),
    negative_sign: Cow::Borrowed("-"),
    p_sign_posn: SignPosition::PrecedeValueSymbol,
    n_sign_posn: SignPosition::Parentheses,
};

pub const FR_FR: CurrencyConventions = CurrencyConventions {
    currency_symbol: Cow::Borrowed("€"),
    int_curr_symbol: Cow::Borrowed("EUR"),
    p_cs_precedes: false,
    n_cs_precedes: false,
    p_sep_by_space: true,
    n_sep_by_space: true,
    mon_decimal_point: Cow::Borrowed(","),
    mon_thousands_sep: Cow::Borrowed("."),
    mon_grouping: 3,
    frac_digits: 2,
    int_frac_digits: 2,
    positive_sign: Cow::Borrowed(""),
    negative_sign: Cow::Borrowed("-"),
    p_sign_posn: SignPosition::PrecedeValue,
    n_sign_posn: SignPosition::PrecedeValue,
};

pub const FR_CH: CurrencyConventions = CurrencyConventions {
    currency_symbol: Cow::Borrowed("CHF"),
    int_curr_symbol: Cow::Borrowed("CHF"),
    p_cs_precedes: false,
    n_cs_precedes: false,
    p_sep_by_space: true,
    n_sep_by_space: true,
    mon_decimal_point: Cow::Borrowed("."),
    mon_thousands_sep: Cow::Borrowed("'"),
    mon_grouping: 3,
    frac_digits: 2,
    int_frac_digits: 2,
    positive_sign: Cow::Borrowed(""),
    negative_sign: Cow::Borrowed("-"),
    p_sign_posn: SignPosition::PrecedeValue,
    n_sign_posn: SignPosition::PrecedeValue,
};

pub const IT_IT: CurrencyConventions = CurrencyConventions {
    currency_symbol: Cow::Borrowed("€"),
    int_curr_symbol: Cow::Borrowed("EUR"),
    p_cs_precedes: false,
    n_cs_precedes: false,
    p_sep_by_space: true,
    n_sep_by_space: true,
    mon_decimal_point: Cow::Borrowed(","),
    mon_thousands_sep: Cow::Borrowed("."),
    mon_grouping: 3,
    frac_digits: 2,
    int_frac_digits: 2,
    positive_sign: Cow::Borrowed(""),
    negative_sign: Cow::Borrowed("-"),
    p_sign_posn: SignPosition::PrecedeValue,
    n_sign_posn: SignPosition::PrecedeValue,
};

pub const PT_BR: CurrencyConventions = CurrencyConventions {
    currency_symbol: Cow::Borrowed("R$"),
    int_curr_symbol: Cow::Borrowed("BRL"),
    p_cs_precedes: false,
    n_cs_precedes: false,
    p_sep_by_space: true,
    n_sep_by_space: true,
    mon_decimal_point: Cow::Borrowed(","),
    mon_thousands_sep: Cow::Borrowed("."),
    mon_grouping: 3,
    frac_digits: 2,
    int_frac_digits: 2,
    positive_sign: Cow::Borrowed(""),
    negative_sign: Cow::Borrowed("-"),
    p_sign_posn: SignPosition::PrecedeValue,
    n_sign_posn: SignPosition::PrecedeValue,
};

pub const EN_IN: CurrencyConventions = CurrencyConventions {
    currency_symbol: Cow::Borrowed("₹"),
    int_curr_symbol: Cow::Borrowed("INR"),
    p_cs_precedes: true,
    n_cs_precedes: true,
    p_sep_by_space: false,
    n_sep_by_space: false,
    mon_decimal_point: Cow::Borrowed("."),
    mon_thousands_sep: Cow::Borrowed(","),
    mon_grouping: 3,
    frac_digits: 2,
    int_frac_digits: 2,
    positive_sign: Cow::Borrowed(""),
    negative_sign: Cow::Borrowed("-"),
    p_sign_posn: SignPosition::PrecedeValue,
    n_sign_posn: SignPosition::Parentheses,
};

/// Looks up a preset by lower-case locale name such as `en_us`.
pub fn preset(locale: &str) -> Option<CurrencyConventions> {
    let conventions = match locale {
        "de_de" => DE_DE,
        "en_au" => EN_AU,
        "en_ca" => EN_CA,
        "en_us" => EN_US,
        "fa_ir" => FA_IR,
        "fr_ca" => FR_CA,
        "pl_pl" => PL_PL,
        "fr_fr" => FR_FR,
        "fr_ch" => FR_CH,
        "it_it" => IT_IT,
        "pt_br" => PT_BR,
        "en_in" => EN_IN,
        _ => return None,
    };
    Some(conventions)
}
