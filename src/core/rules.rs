use super::au::{self, FiscalYear};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum RuleSetError {
    #[error("rule set {year}: bracket table is empty")]
    EmptyBrackets { year: i32 },
    #[error("rule set {year}: bracket thresholds must start at or above zero")]
    NegativeFloor { year: i32 },
    #[error("rule set {year}: bracket {index} is not above the previous threshold")]
    BracketsNotAscending { year: i32, index: usize },
    #[error("rule set {year}: bracket {index} has a base tax below the previous bracket")]
    BaseDecreasing { year: i32, index: usize },
    #[error("rule set {year}: negative rate in {table}")]
    NegativeRate { year: i32, table: &'static str },
    #[error("rule set {year}: levy phase-in band {lower}..{upper} is empty")]
    InvalidLevyBand {
        year: i32,
        lower: Decimal,
        upper: Decimal,
    },
    #[error("rule set {year}: surcharge schedule has no tiers")]
    EmptySurchargeTiers { year: i32 },
    #[error("rule set {year}: surcharge tier {index} is not above the previous tier")]
    SurchargeTiersNotAscending { year: i32, index: usize },
    #[error("rule set {year}: surcharge tier {index} is open-ended but is not the top tier")]
    OpenSurchargeTier { year: i32, index: usize },
    #[error("rule set {year}: surcharge schedule has no open-ended top tier")]
    MissingTopSurchargeTier { year: i32 },
    #[error("rule set {year}: repayment table is empty")]
    EmptyRepaymentTable { year: i32 },
    #[error("rule set {year}: repayment threshold {index} is not above the previous threshold")]
    RepaymentNotAscending { year: i32, index: usize },
    #[error("duplicate rule set for fiscal year {0}")]
    DuplicateYear(i32),
    #[error("no rule sets defined")]
    EmptyRegistry,
    #[error("invalid rule set file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One row of a progressive bracket table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Bracket {
    /// Income at which this bracket starts
    #[schemars(with = "f64")]
    pub threshold: Decimal,
    /// Marginal rate applied to income above `threshold`
    #[schemars(with = "f64")]
    pub rate: Decimal,
    /// Tax payable on all income below `threshold`
    #[schemars(with = "f64")]
    pub base: Decimal,
}

impl Bracket {
    pub fn new(threshold: Decimal, rate: Decimal, base: Decimal) -> Self {
        Bracket {
            threshold,
            rate,
            base,
        }
    }
}

/// Flat levy, linearly phased in between `lower` and `upper`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LevyBand {
    #[schemars(with = "f64")]
    pub rate: Decimal,
    #[schemars(with = "f64")]
    pub lower: Decimal,
    #[schemars(with = "f64")]
    pub upper: Decimal,
}

/// A surcharge rate applying up to `up_to` above the applicable threshold.
/// `None` marks the open-ended top tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SurchargeTier {
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub up_to: Option<Decimal>,
    #[schemars(with = "f64")]
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SurchargeSchedule {
    #[schemars(with = "f64")]
    pub single_threshold: Decimal,
    #[schemars(with = "f64")]
    pub family_threshold: Decimal,
    /// Added to the family threshold for each dependent
    #[schemars(with = "f64")]
    pub per_dependent: Decimal,
    pub tiers: Vec<SurchargeTier>,
}

impl SurchargeSchedule {
    /// Income above which the surcharge applies for the given household.
    pub fn threshold(&self, is_family: bool, dependents: u32) -> Decimal {
        if is_family {
            self.family_threshold + Decimal::from(dependents) * self.per_dependent
        } else {
            self.single_threshold
        }
    }

    /// Rate for an income above `threshold`.
    pub fn tier_rate(&self, income: Decimal, threshold: Decimal) -> Decimal {
        let excess = income - threshold;
        self.tiers
            .iter()
            .find(|t| t.up_to.is_none_or(|up_to| excess <= up_to))
            .map_or(Decimal::ZERO, |t| t.rate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RepaymentThreshold {
    #[schemars(with = "f64")]
    pub threshold: Decimal,
    #[schemars(with = "f64")]
    pub rate: Decimal,
}

/// Thresholds and rates for one fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaxRuleSet {
    /// First fiscal year these rules apply to
    pub effective_year: i32,
    pub brackets: Vec<Bracket>,
    pub levy: LevyBand,
    pub surcharge: SurchargeSchedule,
    pub repayment: Vec<RepaymentThreshold>,
}

impl TaxRuleSet {
    pub fn validate(&self) -> Result<(), RuleSetError> {
        let year = self.effective_year;

        let first = self
            .brackets
            .first()
            .ok_or(RuleSetError::EmptyBrackets { year })?;
        if first.threshold < Decimal::ZERO {
            return Err(RuleSetError::NegativeFloor { year });
        }
        for (index, pair) in self.brackets.windows(2).enumerate() {
            if pair[1].threshold <= pair[0].threshold {
                return Err(RuleSetError::BracketsNotAscending {
                    year,
                    index: index + 1,
                });
            }
            if pair[1].base < pair[0].base {
                return Err(RuleSetError::BaseDecreasing {
                    year,
                    index: index + 1,
                });
            }
        }
        if self.brackets.iter().any(|b| b.rate < Decimal::ZERO) {
            return Err(RuleSetError::NegativeRate {
                year,
                table: "brackets",
            });
        }

        if self.levy.lower >= self.levy.upper {
            return Err(RuleSetError::InvalidLevyBand {
                year,
                lower: self.levy.lower,
                upper: self.levy.upper,
            });
        }
        if self.levy.rate < Decimal::ZERO {
            return Err(RuleSetError::NegativeRate {
                year,
                table: "levy",
            });
        }

        self.validate_surcharge()?;

        if self.repayment.is_empty() {
            return Err(RuleSetError::EmptyRepaymentTable { year });
        }
        for (index, pair) in self.repayment.windows(2).enumerate() {
            if pair[1].threshold <= pair[0].threshold {
                return Err(RuleSetError::RepaymentNotAscending {
                    year,
                    index: index + 1,
                });
            }
        }
        if self.repayment.iter().any(|r| r.rate < Decimal::ZERO) {
            return Err(RuleSetError::NegativeRate {
                year,
                table: "repayment",
            });
        }

        Ok(())
    }

    fn validate_surcharge(&self) -> Result<(), RuleSetError> {
        let year = self.effective_year;
        let tiers = &self.surcharge.tiers;

        let (top, bounded) = tiers
            .split_last()
            .ok_or(RuleSetError::EmptySurchargeTiers { year })?;
        if top.up_to.is_some() {
            return Err(RuleSetError::MissingTopSurchargeTier { year });
        }

        let mut previous = Decimal::ZERO;
        for (index, tier) in bounded.iter().enumerate() {
            match tier.up_to {
                None => return Err(RuleSetError::OpenSurchargeTier { year, index }),
                Some(up_to) if up_to <= previous => {
                    return Err(RuleSetError::SurchargeTiersNotAscending { year, index })
                }
                Some(up_to) => previous = up_to,
            }
        }
        if tiers.iter().any(|t| t.rate < Decimal::ZERO) {
            return Err(RuleSetError::NegativeRate {
                year,
                table: "surcharge",
            });
        }
        Ok(())
    }

    /// Highest bracket whose threshold is at or below `income`.
    pub fn bracket_for(&self, income: Decimal) -> Option<&Bracket> {
        self.brackets.iter().rev().find(|b| income >= b.threshold)
    }

    /// Repayment rate for `income`, zero below the first threshold.
    pub fn repayment_rate(&self, income: Decimal) -> Decimal {
        self.repayment
            .iter()
            .rev()
            .find(|r| income >= r.threshold)
            .map_or(Decimal::ZERO, |r| r.rate)
    }
}

/// Rule sets keyed by the first fiscal year they apply to.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    rule_sets: BTreeMap<i32, TaxRuleSet>,
}

/// On-disk layout for a rule set override file
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RuleSetFile {
    pub rule_sets: Vec<TaxRuleSet>,
}

impl RuleRegistry {
    pub fn new(rule_sets: Vec<TaxRuleSet>) -> Result<Self, RuleSetError> {
        if rule_sets.is_empty() {
            return Err(RuleSetError::EmptyRegistry);
        }

        let mut map = BTreeMap::new();
        for rules in rule_sets {
            rules.validate()?;
            let year = rules.effective_year;
            if map.insert(year, rules).is_some() {
                return Err(RuleSetError::DuplicateYear(year));
            }
        }
        log::debug!("Loaded {} rule set(s)", map.len());
        Ok(RuleRegistry { rule_sets: map })
    }

    /// Registry holding the rule sets compiled into the binary.
    pub fn builtin() -> Self {
        let rule_sets = au::builtin_rule_sets()
            .into_iter()
            .map(|r| (r.effective_year, r))
            .collect();
        RuleRegistry { rule_sets }
    }

    pub fn from_json<R: Read>(reader: R) -> Result<Self, RuleSetError> {
        let file: RuleSetFile = serde_json::from_reader(reader)?;
        Self::new(file.rule_sets)
    }

    /// Select the rule set for `year`.
    ///
    /// An exact match wins; otherwise the latest rule set effective before
    /// `year` applies. Years before the earliest rule set fall back to it.
    pub fn resolve(&self, year: FiscalYear) -> Result<&TaxRuleSet, RuleSetError> {
        let rules = self
            .rule_sets
            .range(..=year.0)
            .next_back()
            .or_else(|| self.rule_sets.iter().next())
            .map(|(_, rules)| rules)
            .ok_or(RuleSetError::EmptyRegistry)?;

        if rules.effective_year != year.0 {
            log::debug!(
                "No rule set for {}, using rules effective from {}",
                year,
                FiscalYear(rules.effective_year)
            );
        }
        Ok(rules)
    }

    pub fn years(&self) -> impl Iterator<Item = FiscalYear> + '_ {
        self.rule_sets.keys().copied().map(FiscalYear)
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
