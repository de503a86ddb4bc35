//! Income-tested tax offsets.
//!
//! Offsets reduce tax payable after the liability has been computed. They
//! are returned as positive amounts; callers subtract them.

use super::au::FiscalYear;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Low income tax offset (2021-22 onwards)
pub fn low_income_offset(taxable_income: Decimal) -> Decimal {
    if taxable_income <= dec!(37500) {
        dec!(700)
    } else if taxable_income <= dec!(45000) {
        dec!(700) - (taxable_income - dec!(37500)) * dec!(0.05)
    } else if taxable_income <= dec!(66667) {
        (dec!(325) - (taxable_income - dec!(45000)) * dec!(0.015)).max(Decimal::ZERO)
    } else {
        Decimal::ZERO
    }
}

/// Low and middle income tax offset, which ended after 2021-22
pub fn low_middle_income_offset(taxable_income: Decimal, year: FiscalYear) -> Decimal {
    if year.0 >= 2023 {
        return Decimal::ZERO;
    }

    if taxable_income <= dec!(37000) {
        dec!(675)
    } else if taxable_income <= dec!(48000) {
        dec!(675) + (taxable_income - dec!(37000)) * dec!(0.075)
    } else if taxable_income <= dec!(90000) {
        dec!(1500)
    } else if taxable_income <= dec!(126000) {
        dec!(1500) - (taxable_income - dec!(90000)) * dec!(0.03)
    } else {
        Decimal::ZERO
    }
}

/// Combined offsets for the year
pub fn income_offsets(taxable_income: Decimal, year: FiscalYear) -> Decimal {
    low_income_offset(taxable_income) + low_middle_income_offset(taxable_income, year)
}
