//! Display formatting for prices.

use crate::Currency;

const PERSIAN_DIGITS: [char; 10] = ['۰', '۱', '۲', '۳', '۴', '۵', '۶', '۷', '۸', '۹'];

struct Locale {
    group: char,
    decimal: char,
    persian_digits: bool,
}

const FA_IR: Locale = Locale {
    group: '٬',
    decimal: '٫',
    persian_digits: true,
};

const EN_US: Locale = Locale {
    group: ',',
    decimal: '.',
    persian_digits: false,
};

/// Formats `amount` for display in `currency`.
///
/// Toman uses the Persian locale and a trailing symbol (`۱٬۲۳۴ تومان`);
/// Dollar and Euro use the English locale with a leading symbol (`$12.5`),
/// the way en-US prices are written, rather than after the number.
/// At most two fraction digits are shown, with trailing zeros dropped.
pub fn format(amount: f64, currency: Currency) -> String {
    let locale = match currency {
        Currency::Toman => &FA_IR,
        Currency::Dollar | Currency::Euro => &EN_US,
    };
    let number = format_number(amount, locale);

    match currency {
        Currency::Toman => format!("{} {}", number, currency.symbol()),
        Currency::Dollar | Currency::Euro => {
            if let Some(unsigned) = number.strip_prefix('-') {
                format!("-{}{}", currency.symbol(), unsigned)
            } else {
                format!("{}{}", currency.symbol(), number)
            }
        }
    }
}

fn format_number(amount: f64, locale: &Locale) -> String {
    if !amount.is_finite() {
        return localize_digits("0", locale);
    }

    // f64::round rounds half away from zero.
    let hundredths = (amount.abs() * 100.0).round() as u128;
    let whole = hundredths / 100;
    let cents = (hundredths % 100) as u8;

    let mut out = String::new();
    if amount < 0.0 && hundredths > 0 {
        out.push('-');
    }
    out.push_str(&group_thousands(&whole.to_string(), locale.group));

    match cents {
        0 => {}
        c if c % 10 == 0 => {
            out.push(locale.decimal);
            out.push_str(&(c / 10).to_string());
        }
        c => {
            out.push(locale.decimal);
            out.push_str(&format!("{:02}", c));
        }
    }

    localize_digits(&out, locale)
}

fn group_thousands(digits: &str, separator: char) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(ch);
    }
    grouped
}

fn localize_digits(text: &str, locale: &Locale) -> String {
    if !locale.persian_digits {
        return text.to_string();
    }
    text.chars()
        .map(|c| match c.to_digit(10) {
            Some(d) => PERSIAN_DIGITS[d as usize],
            None => c,
        })
        .collect()
}
