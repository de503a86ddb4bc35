//! Display helpers shared by the commands

use rust_decimal::{Decimal, RoundingStrategy};

/// Whole currency units with thousands separators, e.g. "-$1,234"
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded < Decimal::ZERO { "-" } else { "" };
    format!("{}${}", sign, group_thousands(&rounded.abs().trunc().to_string()))
}

/// Like [`format_currency`] but always shows the sign, e.g. "+$100"
pub fn format_currency_signed(amount: Decimal) -> String {
    let formatted = format_currency(amount);
    if formatted.starts_with('-') {
        formatted
    } else {
        format!("+{}", formatted)
    }
}

/// Percent value with one decimal place, e.g. "22.5%"
pub fn format_percent(percent: Decimal) -> String {
    format!("{:.1}%", percent)
}

/// Ratio as a percentage, e.g. 0.225 -> "22.5%"
pub fn format_ratio(ratio: Decimal) -> String {
    format_percent(ratio * Decimal::ONE_HUNDRED)
}

/// Signed percentage change, "-" when there is nothing to compare against
pub fn format_change(change: Option<Decimal>) -> String {
    match change {
        Some(change) if change < Decimal::ZERO => format!("{:.1}%", change),
        Some(change) => format!("+{:.1}%", change),
        None => "-".to_string(),
    }
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}
