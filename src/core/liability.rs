use super::rules::{RuleSetError, TaxRuleSet};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum LiabilityError {
    #[error("taxable income cannot be negative: {0}")]
    NegativeIncome(Decimal),
    #[error(transparent)]
    Rules(#[from] RuleSetError),
}

/// Household circumstances that change the surcharge and repayment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LiabilityContext {
    /// Holds qualifying private cover, exempting the surcharge
    pub has_qualifying_cover: bool,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub outstanding_loan_balance: Option<Decimal>,
    #[serde(default)]
    pub is_family: bool,
    #[serde(default)]
    pub dependents: u32,
}

/// Liability before offsets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaxLiability {
    #[schemars(with = "f64")]
    pub gross_tax: Decimal,
    #[schemars(with = "f64")]
    pub levy: Decimal,
    #[schemars(with = "f64")]
    pub surcharge: Decimal,
    #[schemars(with = "f64")]
    pub repayment: Decimal,
    #[schemars(with = "f64")]
    pub total_before_offsets: Decimal,
    /// Equal to `total_before_offsets`; offsets are applied by the caller
    #[schemars(with = "f64")]
    pub tax_payable: Decimal,
    #[schemars(with = "f64")]
    pub marginal_rate: Decimal,
    /// Ratio of total to income, absent for zero income
    #[schemars(with = "Option<f64>")]
    pub effective_rate: Option<Decimal>,
}

/// Tax attributable to one bracket of the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BracketShare {
    pub from: Decimal,
    /// Upper edge of the bracket, `None` for the top bracket
    pub to: Option<Decimal>,
    pub rate: Decimal,
    pub amount_in_bracket: Decimal,
    pub tax: Decimal,
}

/// Compute the liability on `taxable_income` under `rules`.
pub fn compute_liability(
    taxable_income: Decimal,
    rules: &TaxRuleSet,
    context: &LiabilityContext,
) -> Result<TaxLiability, LiabilityError> {
    rules.validate()?;
    if taxable_income < Decimal::ZERO {
        return Err(LiabilityError::NegativeIncome(taxable_income));
    }

    let gross_tax = income_tax(taxable_income, rules);
    let levy = levy(taxable_income, rules);
    let surcharge = surcharge(taxable_income, rules, context);
    let repayment = repayment(taxable_income, rules, context.outstanding_loan_balance);

    let total_before_offsets = gross_tax + levy + surcharge + repayment;
    let effective_rate = if taxable_income.is_zero() {
        None
    } else {
        Some(total_before_offsets / taxable_income)
    };

    log::debug!(
        "Liability on {}: tax={}, levy={}, surcharge={}, repayment={}, total={}",
        taxable_income,
        gross_tax,
        levy,
        surcharge,
        repayment,
        total_before_offsets
    );

    Ok(TaxLiability {
        gross_tax,
        levy,
        surcharge,
        repayment,
        total_before_offsets,
        tax_payable: total_before_offsets,
        marginal_rate: marginal_rate(taxable_income, rules),
        effective_rate,
    })
}

/// Progressive income tax from the bracket table
pub fn income_tax(taxable_income: Decimal, rules: &TaxRuleSet) -> Decimal {
    match rules.bracket_for(taxable_income) {
        Some(bracket) => bracket.base + (taxable_income - bracket.threshold) * bracket.rate,
        // Below the floor
        None => Decimal::ZERO,
    }
}

pub fn marginal_rate(taxable_income: Decimal, rules: &TaxRuleSet) -> Decimal {
    rules
        .bracket_for(taxable_income)
        .map_or(Decimal::ZERO, |b| b.rate)
}

/// Flat levy, linearly phased in across the levy band
pub fn levy(taxable_income: Decimal, rules: &TaxRuleSet) -> Decimal {
    let band = &rules.levy;
    if taxable_income <= band.lower {
        return Decimal::ZERO;
    }

    let full = taxable_income * band.rate;
    if taxable_income <= band.upper {
        let reduction = (band.upper - taxable_income) / (band.upper - band.lower);
        full * (Decimal::ONE - reduction)
    } else {
        full
    }
}

/// Surcharge for taxpayers without qualifying cover
pub fn surcharge(
    taxable_income: Decimal,
    rules: &TaxRuleSet,
    context: &LiabilityContext,
) -> Decimal {
    if context.has_qualifying_cover {
        return Decimal::ZERO;
    }

    let schedule = &rules.surcharge;
    let threshold = schedule.threshold(context.is_family, context.dependents);
    if taxable_income <= threshold {
        return Decimal::ZERO;
    }

    taxable_income * schedule.tier_rate(taxable_income, threshold)
}

/// Income-contingent repayment, never more than the outstanding balance
pub fn repayment(taxable_income: Decimal, rules: &TaxRuleSet, balance: Option<Decimal>) -> Decimal {
    let Some(balance) = balance.filter(|b| *b > Decimal::ZERO) else {
        return Decimal::ZERO;
    };

    (taxable_income * rules.repayment_rate(taxable_income)).min(balance)
}

/// Split `taxable_income` across the bracket table.
///
/// Brackets the income does not reach are omitted.
pub fn bracket_breakdown(taxable_income: Decimal, rules: &TaxRuleSet) -> Vec<BracketShare> {
    let uppers = rules
        .brackets
        .iter()
        .skip(1)
        .map(|b| Some(b.threshold))
        .chain(std::iter::once(None));

    rules
        .brackets
        .iter()
        .zip(uppers)
        .take_while(|(bracket, _)| taxable_income > bracket.threshold)
        .map(|(bracket, to)| {
            let top = to.map_or(taxable_income, |to| taxable_income.min(to));
            let amount_in_bracket = top - bracket.threshold;
            BracketShare {
                from: bracket.threshold,
                to,
                rate: bracket.rate,
                amount_in_bracket,
                tax: amount_in_bracket * bracket.rate,
            }
        })
        .collect()
}
