use super::rules::{
    Bracket, LevyBand, RepaymentThreshold, SurchargeSchedule, SurchargeTier, TaxRuleSet,
};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Australian fiscal year (runs 1 July to 30 June)
/// The year value represents the end year (e.g., 2024 = 2023-24 fiscal year)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct FiscalYear(pub i32);

impl FiscalYear {
    /// Fiscal year containing `date`
    pub fn from_date(date: NaiveDate) -> Self {
        // On or after 1 July belongs to the fiscal year ending next June
        if date.month() >= 7 {
            FiscalYear(date.year() + 1)
        } else {
            FiscalYear(date.year())
        }
    }

    /// Display as "2023-24" format
    pub fn display(&self) -> String {
        format!("{}-{:02}", self.0 - 1, self.0.rem_euclid(100))
    }
}

impl std::fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

pub fn builtin_rule_sets() -> Vec<TaxRuleSet> {
    vec![pre_2024(), stage_three_2024()]
}

pub fn stage_three_2024() -> TaxRuleSet {
    TaxRuleSet {
        effective_year: 2024,
        brackets: vec![
            Bracket::new(dec!(0), dec!(0), dec!(0)),
            Bracket::new(dec!(18200), dec!(0.16), dec!(0)),
            Bracket::new(dec!(45000), dec!(0.30), dec!(4288)),
            Bracket::new(dec!(135000), dec!(0.37), dec!(31288)),
            Bracket::new(dec!(190000), dec!(0.45), dec!(51638)),
        ],
        levy: medicare_levy(),
        surcharge: medicare_levy_surcharge(),
        repayment: help_repayment(),
    }
}

pub fn pre_2024() -> TaxRuleSet {
    TaxRuleSet {
        effective_year: 2023,
        brackets: vec![
            Bracket::new(dec!(0), dec!(0), dec!(0)),
            Bracket::new(dec!(18200), dec!(0.19), dec!(0)),
            Bracket::new(dec!(45000), dec!(0.325), dec!(5092)),
            Bracket::new(dec!(120000), dec!(0.37), dec!(29467)),
            Bracket::new(dec!(180000), dec!(0.45), dec!(51667)),
        ],
        levy: medicare_levy(),
        surcharge: medicare_levy_surcharge(),
        repayment: help_repayment(),
    }
}

fn medicare_levy() -> LevyBand {
    LevyBand {
        rate: dec!(0.02),
        lower: dec!(24276),
        upper: dec!(30345),
    }
}

fn medicare_levy_surcharge() -> SurchargeSchedule {
    SurchargeSchedule {
        single_threshold: dec!(93000),
        family_threshold: dec!(186000),
        per_dependent: dec!(1500),
        tiers: vec![
            SurchargeTier {
                up_to: Some(dec!(1000)),
                rate: dec!(0.01),
            },
            SurchargeTier {
                up_to: Some(dec!(2000)),
                rate: dec!(0.0125),
            },
            SurchargeTier {
                up_to: None,
                rate: dec!(0.015),
            },
        ],
    }
}

fn help_repayment() -> Vec<RepaymentThreshold> {
    const TABLE: [(Decimal, Decimal); 19] = [
        (dec!(0), dec!(0)),
        (dec!(51550), dec!(0.01)),
        (dec!(59596), dec!(0.02)),
        (dec!(63089), dec!(0.025)),
        (dec!(66877), dec!(0.03)),
        (dec!(70890), dec!(0.035)),
        (dec!(75140), dec!(0.04)),
        (dec!(79649), dec!(0.045)),
        (dec!(84429), dec!(0.05)),
        (dec!(89494), dec!(0.055)),
        (dec!(94865), dec!(0.06)),
        (dec!(100559), dec!(0.065)),
        (dec!(106596), dec!(0.07)),
        (dec!(112985), dec!(0.075)),
        (dec!(119764), dec!(0.08)),
        (dec!(126950), dec!(0.085)),
        (dec!(134568), dec!(0.09)),
        (dec!(142642), dec!(0.095)),
        (dec!(151203), dec!(0.1)),
    ];

    TABLE
        .iter()
        .map(|&(threshold, rate)| RepaymentThreshold { threshold, rate })
        .collect()
}
