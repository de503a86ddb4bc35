use super::record::{LabeledAmount, LevyRate, RatePair, YearRecord};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Standard working year: 40 hours x 52 weeks
pub const WORK_HOURS_PER_YEAR: u32 = 2080;
pub const WORK_HOURS_PER_DAY: u32 = 8;
pub const MONTHS_PER_YEAR: u32 = 12;

/// Rates averaged across the years that reported them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AverageRates {
    pub primary: RatePair,
    /// Averaged over the years reporting a levy rate
    pub levy: Option<LevyRate>,
}

/// Average take-home pay across the summarised years
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TakeHome {
    pub gross_monthly: Decimal,
    pub net_monthly: Decimal,
    pub hourly: Decimal,
    pub daily: Decimal,
    pub per_minute: Decimal,
    pub per_second: Decimal,
}

impl TakeHome {
    fn new(total_income: Decimal, total_tax_payable: Decimal, year_count: Decimal) -> Self {
        let months = Decimal::from(MONTHS_PER_YEAR);
        let net = total_income - total_tax_payable;
        let hourly = net / year_count / Decimal::from(WORK_HOURS_PER_YEAR);

        TakeHome {
            gross_monthly: round_whole(total_income / months / year_count),
            net_monthly: round_whole(net / months / year_count),
            hourly,
            daily: hourly * Decimal::from(WORK_HOURS_PER_DAY),
            per_minute: hourly / Decimal::from(60),
            per_second: hourly / Decimal::from(3600),
        }
    }
}

/// Years a return was lodged in one jurisdiction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JurisdictionYears {
    pub jurisdiction: String,
    pub years: Vec<i32>,
}

/// Totals and averages across every available year
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedSummary {
    pub years: Vec<i32>,
    pub year_count: usize,
    pub income_items: Vec<LabeledAmount>,
    pub total_income: Decimal,
    pub avg_income: Decimal,
    pub avg_taxable_income: Decimal,
    pub deductions: Vec<LabeledAmount>,
    pub total_deductions: Decimal,
    pub total_gross_tax: Decimal,
    pub total_levy: Decimal,
    pub total_surcharge: Decimal,
    pub total_repayment: Decimal,
    pub total_offsets: Decimal,
    pub total_tax_payable: Decimal,
    pub total_withheld: Decimal,
    pub total_refund: Decimal,
    /// Zero or negative
    pub total_owing: Decimal,
    pub net_position: Decimal,
    pub rates: Option<AverageRates>,
    pub take_home: TakeHome,
    pub jurisdictions: Vec<JurisdictionYears>,
}

impl AggregatedSummary {
    /// "2022–2024" for several years, "2024" for one
    pub fn year_range(&self) -> String {
        match (self.years.first(), self.years.last()) {
            (Some(first), Some(last)) if first != last => format!("{first}\u{2013}{last}"),
            (Some(only), _) => only.to_string(),
            _ => String::new(),
        }
    }

    pub fn net_income(&self) -> Decimal {
        self.total_income - self.total_tax_payable
    }
}

/// Merge all available years into one summary.
///
/// Returns `None` when there are no records.
pub fn aggregate(records: &BTreeMap<i32, YearRecord>) -> Option<AggregatedSummary> {
    if records.is_empty() {
        return None;
    }

    // BTreeMap iterates in ascending year order
    let years: Vec<i32> = records.keys().copied().collect();
    let all: Vec<&YearRecord> = records.values().collect();
    let count = Decimal::from(all.len());

    let income_items = merge_by_label(all.iter().flat_map(|r| &r.income.items));
    let deductions = merge_by_label(all.iter().flat_map(|r| &r.deductions.items));

    let total_income = sum(&all, |r| r.income.total);
    let total_tax_payable = sum(&all, |r| r.tax.tax_payable);

    let total_refund = sum(&all, |r| r.result.max(Decimal::ZERO));
    let total_owing = sum(&all, |r| r.result.min(Decimal::ZERO));

    let summary = AggregatedSummary {
        years,
        year_count: all.len(),
        income_items,
        total_income,
        avg_income: total_income / count,
        avg_taxable_income: sum(&all, |r| r.taxable_income) / count,
        deductions,
        total_deductions: sum(&all, |r| r.deductions.total),
        total_gross_tax: sum(&all, |r| r.tax.gross_tax),
        total_levy: sum(&all, |r| r.tax.levy),
        total_surcharge: sum(&all, |r| r.tax.surcharge.unwrap_or_default()),
        total_repayment: sum(&all, |r| r.tax.repayment.unwrap_or_default()),
        total_offsets: sum(&all, |r| r.tax.offsets.total),
        total_tax_payable,
        total_withheld: sum(&all, |r| r.withheld.total),
        total_refund,
        total_owing,
        net_position: total_refund + total_owing,
        rates: average_rates(&all),
        take_home: TakeHome::new(total_income, total_tax_payable, count),
        jurisdictions: jurisdictions(&all),
    };

    log::info!(
        "Aggregated {} year(s) {}: income={}, tax={}, net position={}",
        summary.year_count,
        summary.year_range(),
        summary.total_income,
        summary.total_tax_payable,
        summary.net_position
    );
    Some(summary)
}

fn sum(records: &[&YearRecord], field: impl Fn(&YearRecord) -> Decimal) -> Decimal {
    records.iter().map(|r| field(r)).sum()
}

/// Sum amounts sharing a label, keeping first-seen label order
fn merge_by_label<'a>(items: impl Iterator<Item = &'a LabeledAmount>) -> Vec<LabeledAmount> {
    let mut merged: Vec<LabeledAmount> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for item in items {
        match index.get(item.label.as_str()) {
            Some(&i) => merged[i].amount += item.amount,
            None => {
                index.insert(&item.label, merged.len());
                merged.push(item.clone());
            }
        }
    }
    merged
}

fn average_rates(records: &[&YearRecord]) -> Option<AverageRates> {
    let with_rates: Vec<_> = records.iter().filter_map(|r| r.rates.as_ref()).collect();
    if with_rates.is_empty() {
        return None;
    }

    let count = Decimal::from(with_rates.len());
    let primary = RatePair {
        marginal: with_rates.iter().map(|r| r.primary.marginal).sum::<Decimal>() / count,
        effective: with_rates.iter().map(|r| r.primary.effective).sum::<Decimal>() / count,
    };

    let levies: Vec<&LevyRate> = with_rates.iter().filter_map(|r| r.levy.as_ref()).collect();
    let levy = (!levies.is_empty()).then(|| {
        let count = Decimal::from(levies.len());
        LevyRate {
            rate: levies.iter().map(|l| l.rate).sum::<Decimal>() / count,
            amount: levies.iter().map(|l| l.amount).sum::<Decimal>() / count,
        }
    });

    Some(AverageRates { primary, levy })
}

fn jurisdictions(records: &[&YearRecord]) -> Vec<JurisdictionYears> {
    let mut by_jurisdiction: BTreeMap<&str, BTreeSet<i32>> = BTreeMap::new();
    for record in records {
        if let Some(jurisdiction) = &record.jurisdiction {
            by_jurisdiction
                .entry(jurisdiction)
                .or_default()
                .insert(record.year);
        }
    }

    by_jurisdiction
        .into_iter()
        .map(|(jurisdiction, years)| JurisdictionYears {
            jurisdiction: jurisdiction.to_string(),
            years: years.into_iter().collect(),
        })
        .collect()
}

fn round_whole(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// One year's headline figures with the change from the previous year
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearTrend {
    pub year: i32,
    pub income: Decimal,
    pub tax_payable: Decimal,
    pub net_income: Decimal,
    pub gross_monthly: Decimal,
    pub net_monthly: Decimal,
    pub daily_take_home: Decimal,
    /// Percentage change in income from the previous year
    pub income_change: Option<Decimal>,
    pub tax_change: Option<Decimal>,
    pub net_change: Option<Decimal>,
}

/// Per-year rows in ascending year order
pub fn year_trends(records: &BTreeMap<i32, YearRecord>) -> Vec<YearTrend> {
    let months = Decimal::from(MONTHS_PER_YEAR);
    let mut trends: Vec<YearTrend> = Vec::with_capacity(records.len());

    for record in records.values() {
        let net_income = record.net_income();
        let hourly = net_income / Decimal::from(WORK_HOURS_PER_YEAR);
        let previous = trends.last();

        let trend = YearTrend {
            year: record.year,
            income: record.income.total,
            tax_payable: record.tax.tax_payable,
            net_income,
            gross_monthly: round_whole(record.income.total / months),
            net_monthly: round_whole(net_income / months),
            daily_take_home: (hourly * Decimal::from(WORK_HOURS_PER_DAY)).round_dp(2),
            income_change: previous.and_then(|p| percent_change(record.income.total, p.income)),
            tax_change: previous
                .and_then(|p| percent_change(record.tax.tax_payable, p.tax_payable)),
            net_change: previous.and_then(|p| percent_change(net_income, p.net_income)),
        };
        trends.push(trend);
    }
    trends
}

/// Change from `previous` to `current` in percent, relative to `|previous|`
pub fn percent_change(current: Decimal, previous: Decimal) -> Option<Decimal> {
    if previous.is_zero() {
        None
    } else {
        Some((current - previous) / previous.abs() * Decimal::ONE_HUNDRED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{LineItems, RateBlock, TaxSection};
    use rust_decimal_macros::dec;

    fn record(year: i32, income: Decimal, tax_payable: Decimal, result: Decimal) -> YearRecord {
        YearRecord {
            year,
            name: Some("Test User".to_string()),
            jurisdiction: Some("NSW".to_string()),
            income: LineItems::summed(vec![LabeledAmount::new("Wages", income)]),
            deductions: LineItems::summed(vec![LabeledAmount::new(
                "Standard deduction",
                dec!(-14600),
            )]),
            taxable_income: income - dec!(14600),
            tax: TaxSection {
                gross_tax: tax_payable,
                levy: Decimal::ZERO,
                surcharge: None,
                repayment: None,
                total_before_offsets: tax_payable,
                offsets: LineItems::default(),
                tax_payable,
            },
            withheld: LineItems::summed(vec![LabeledAmount::new(
                "Withheld",
                -(tax_payable + result),
            )]),
            result,
            rates: Some(RateBlock {
                primary: RatePair {
                    marginal: dec!(22),
                    effective: dec!(14),
                },
                levy: None,
            }),
        }
    }

    fn returns(records: Vec<YearRecord>) -> BTreeMap<i32, YearRecord> {
        records.into_iter().map(|r| (r.year, r)).collect()
    }

    #[test]
    fn empty_returns_none() {
        assert!(aggregate(&BTreeMap::new()).is_none());
    }

    #[test]
    fn single_year_reproduces_record() {
        let r = record(2024, dec!(100000), dec!(19000), dec!(1000));
        let summary = aggregate(&returns(vec![r.clone()])).unwrap();

        assert_eq!(summary.years, vec![2024]);
        assert_eq!(summary.year_count, 1);
        assert_eq!(summary.total_income, r.income.total);
        assert_eq!(summary.total_tax_payable, r.tax.tax_payable);
        assert_eq!(summary.net_position, r.result);
        assert_eq!(summary.net_income(), dec!(81000));
        assert_eq!(summary.income_items, r.income.items);
        assert_eq!(summary.avg_taxable_income, r.taxable_income);
    }

    #[test]
    fn multiple_years_summed() {
        let summary = aggregate(&returns(vec![
            record(2023, dec!(90000), dec!(16000), dec!(500)),
            record(2024, dec!(100000), dec!(19000), dec!(1000)),
        ]))
        .unwrap();

        assert_eq!(summary.years, vec![2023, 2024]);
        assert_eq!(summary.year_count, 2);
        assert_eq!(summary.total_income, dec!(190000));
        assert_eq!(summary.total_tax_payable, dec!(35000));
        assert_eq!(summary.total_gross_tax, dec!(35000));
        assert_eq!(summary.total_deductions, dec!(-29200));
        assert_eq!(summary.net_income(), dec!(155000));
        assert_eq!(summary.total_withheld, dec!(-36500));
    }

    #[test]
    fn same_label_merged_and_averaged() {
        let summary = aggregate(&returns(vec![
            record(2023, dec!(80000), dec!(10000), Decimal::ZERO),
            record(2024, dec!(100000), dec!(14000), Decimal::ZERO),
        ]))
        .unwrap();

        assert_eq!(summary.income_items, vec![LabeledAmount::new("Wages", dec!(180000))]);
        assert_eq!(summary.avg_income, dec!(90000));
    }

    #[test]
    fn labels_unioned_across_years() {
        let mut first = record(2023, dec!(90000), dec!(12000), Decimal::ZERO);
        first.income = LineItems::summed(vec![
            LabeledAmount::new("Wages", dec!(85000)),
            LabeledAmount::new("Interest", dec!(5000)),
        ]);
        let mut second = record(2024, dec!(100000), dec!(14000), Decimal::ZERO);
        second.income = LineItems::summed(vec![
            LabeledAmount::new("Wages", dec!(95000)),
            LabeledAmount::new("Interest", dec!(3000)),
            LabeledAmount::new("Dividends", dec!(2000)),
        ]);

        let summary = aggregate(&returns(vec![first, second])).unwrap();

        assert_eq!(
            summary.income_items,
            vec![
                LabeledAmount::new("Wages", dec!(180000)),
                LabeledAmount::new("Interest", dec!(8000)),
                LabeledAmount::new("Dividends", dec!(2000)),
            ]
        );
    }

    #[test]
    fn years_sorted_ascending() {
        let summary = aggregate(&returns(vec![
            record(2024, dec!(100000), dec!(14000), Decimal::ZERO),
            record(2022, dec!(80000), dec!(10000), Decimal::ZERO),
            record(2023, dec!(90000), dec!(12000), Decimal::ZERO),
        ]))
        .unwrap();

        assert_eq!(summary.years, vec![2022, 2023, 2024]);
        assert_eq!(summary.year_range(), "2022\u{2013}2024");
    }

    #[test]
    fn single_year_range() {
        let summary = aggregate(&returns(vec![record(2024, dec!(1), dec!(0), dec!(0))])).unwrap();
        assert_eq!(summary.year_range(), "2024");
    }

    #[test]
    fn refund_and_owing_partitioned_by_sign() {
        let summary = aggregate(&returns(vec![
            record(2022, dec!(80000), dec!(10000), dec!(1200)),
            record(2023, dec!(90000), dec!(12000), dec!(-700)),
            record(2024, dec!(100000), dec!(14000), Decimal::ZERO),
        ]))
        .unwrap();

        assert_eq!(summary.total_refund, dec!(1200));
        assert_eq!(summary.total_owing, dec!(-700));
        assert_eq!(summary.net_position, dec!(500));
    }

    #[test]
    fn optional_tax_fields_count_as_zero() {
        let mut first = record(2023, dec!(150000), dec!(40000), Decimal::ZERO);
        first.tax.surcharge = Some(dec!(2250));
        first.tax.repayment = Some(dec!(9000));
        let second = record(2024, dec!(100000), dec!(14000), Decimal::ZERO);

        let summary = aggregate(&returns(vec![first, second])).unwrap();
        assert_eq!(summary.total_surcharge, dec!(2250));
        assert_eq!(summary.total_repayment, dec!(9000));
    }

    #[test]
    fn rates_none_without_rate_blocks() {
        let mut r = record(2024, dec!(100000), dec!(19000), Decimal::ZERO);
        r.rates = None;
        let summary = aggregate(&returns(vec![r])).unwrap();
        assert!(summary.rates.is_none());
    }

    #[test]
    fn rates_averaged_over_reporting_years() {
        let mut first = record(2023, dec!(90000), dec!(12000), Decimal::ZERO);
        first.rates = Some(RateBlock {
            primary: RatePair {
                marginal: dec!(22),
                effective: dec!(13),
            },
            levy: Some(LevyRate {
                rate: dec!(2),
                amount: dec!(1800),
            }),
        });
        let mut second = record(2024, dec!(100000), dec!(14000), Decimal::ZERO);
        second.rates = Some(RateBlock {
            primary: RatePair {
                marginal: dec!(22),
                effective: dec!(14),
            },
            levy: None,
        });
        let mut third = record(2025, dec!(110000), dec!(16000), Decimal::ZERO);
        third.rates = None;

        let summary = aggregate(&returns(vec![first, second, third])).unwrap();
        let rates = summary.rates.unwrap();

        assert_eq!(rates.primary.effective, dec!(13.5));
        assert_eq!(rates.primary.marginal, dec!(22));
        // Only 2023 reported a levy rate
        assert_eq!(
            rates.levy,
            Some(LevyRate {
                rate: dec!(2),
                amount: dec!(1800)
            })
        );
    }

    #[test]
    fn hourly_rate_uses_standard_year() {
        let records = returns(vec![record(2024, dec!(104000), dec!(20000), Decimal::ZERO)]);
        let summary = aggregate(&records).unwrap();

        // 84000 / 2080
        assert_eq!(summary.take_home.hourly.round_dp(2), dec!(40.38));
        assert_eq!(summary.take_home.daily.round_dp(2), dec!(323.08));
        assert_eq!(summary.take_home.gross_monthly, dec!(8667));
        assert_eq!(summary.take_home.net_monthly, dec!(7000));
    }

    #[test]
    fn monthly_figures_averaged_per_year() {
        let summary = aggregate(&returns(vec![
            record(2023, dec!(60000), dec!(12000), Decimal::ZERO),
            record(2024, dec!(60000), dec!(12000), Decimal::ZERO),
        ]))
        .unwrap();

        assert_eq!(summary.take_home.gross_monthly, dec!(5000));
        assert_eq!(summary.take_home.net_monthly, dec!(4000));
    }

    #[test]
    fn jurisdictions_grouped_and_sorted() {
        let mut a = record(2022, dec!(1), dec!(0), dec!(0));
        a.jurisdiction = Some("VIC".to_string());
        let b = record(2023, dec!(1), dec!(0), dec!(0));
        let mut c = record(2024, dec!(1), dec!(0), dec!(0));
        c.jurisdiction = Some("VIC".to_string());
        let mut d = record(2025, dec!(1), dec!(0), dec!(0));
        d.jurisdiction = None;

        let summary = aggregate(&returns(vec![a, b, c, d])).unwrap();

        assert_eq!(
            summary.jurisdictions,
            vec![
                JurisdictionYears {
                    jurisdiction: "NSW".to_string(),
                    years: vec![2023],
                },
                JurisdictionYears {
                    jurisdiction: "VIC".to_string(),
                    years: vec![2022, 2024],
                },
            ]
        );
    }

    #[test]
    fn trends_report_change_from_previous_year() {
        let trends = year_trends(&returns(vec![
            record(2023, dec!(100000), dec!(20000), Decimal::ZERO),
            record(2024, dec!(110000), dec!(20000), Decimal::ZERO),
        ]));

        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].income_change, None);
        assert_eq!(trends[1].income_change, Some(dec!(10)));
        assert_eq!(trends[1].tax_change, Some(Decimal::ZERO));
        assert_eq!(trends[1].net_change, Some(dec!(12.5)));
        assert_eq!(trends[1].net_monthly, dec!(7500));
        // 80000 / 2080 * 8
        assert_eq!(trends[0].daily_take_home, dec!(307.69));
    }

    #[test]
    fn percent_change_relative_to_magnitude() {
        assert_eq!(percent_change(dec!(110), dec!(100)), Some(dec!(10)));
        assert_eq!(percent_change(dec!(50), dec!(100)), Some(dec!(-50)));
        assert_eq!(percent_change(dec!(-50), dec!(-100)), Some(dec!(50)));
        assert_eq!(percent_change(dec!(-150), dec!(-100)), Some(dec!(-50)));
        assert_eq!(percent_change(dec!(5), Decimal::ZERO), None);
    }
}
