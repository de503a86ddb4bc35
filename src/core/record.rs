use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("unrecognised return document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LabeledAmount {
    pub label: String,
    #[schemars(with = "f64")]
    pub amount: Decimal,
}

impl LabeledAmount {
    pub fn new(label: impl Into<String>, amount: Decimal) -> Self {
        LabeledAmount {
            label: label.into(),
            amount,
        }
    }
}

/// Labeled items with the total reported on the return
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LineItems {
    pub items: Vec<LabeledAmount>,
    #[schemars(with = "f64")]
    pub total: Decimal,
}

impl LineItems {
    /// Items whose total is their sum
    pub fn summed(items: Vec<LabeledAmount>) -> Self {
        let total = items.iter().map(|i| i.amount).sum();
        LineItems { items, total }
    }

    pub fn get(&self, label: &str) -> Option<Decimal> {
        self.items
            .iter()
            .find(|i| i.label == label)
            .map(|i| i.amount)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaxSection {
    #[schemars(with = "f64")]
    pub gross_tax: Decimal,
    #[schemars(with = "f64")]
    pub levy: Decimal,
    #[schemars(with = "Option<f64>")]
    pub surcharge: Option<Decimal>,
    #[schemars(with = "Option<f64>")]
    pub repayment: Option<Decimal>,
    #[schemars(with = "f64")]
    pub total_before_offsets: Decimal,
    /// Non-positive offset amounts
    pub offsets: LineItems,
    #[schemars(with = "f64")]
    pub tax_payable: Decimal,
}

/// Marginal and effective rates, in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RatePair {
    #[schemars(with = "f64")]
    pub marginal: Decimal,
    #[schemars(with = "f64")]
    pub effective: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LevyRate {
    #[schemars(with = "f64")]
    pub rate: Decimal,
    #[schemars(with = "f64")]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RateBlock {
    pub primary: RatePair,
    pub levy: Option<LevyRate>,
}

/// One fiscal year's return, in the shape every engine works with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct YearRecord {
    pub year: i32,
    pub name: Option<String>,
    /// State or region the return was lodged in
    pub jurisdiction: Option<String>,
    /// Positive amounts
    pub income: LineItems,
    /// Negative amounts
    pub deductions: LineItems,
    #[schemars(with = "f64")]
    pub taxable_income: Decimal,
    pub tax: TaxSection,
    /// Non-positive amounts already paid
    pub withheld: LineItems,
    /// Positive for a refund, negative when owing
    #[schemars(with = "f64")]
    pub result: Decimal,
    pub rates: Option<RateBlock>,
}

impl YearRecord {
    pub fn total_tax(&self) -> Decimal {
        self.tax.tax_payable
    }

    pub fn net_income(&self) -> Decimal {
        self.income.total - self.tax.tax_payable
    }

    /// Effective rate as a ratio, preferring the rate reported on the return
    pub fn effective_rate(&self) -> Option<Decimal> {
        // A reported rate of zero means the extractor found none
        if let Some(rates) = self.rates.as_ref().filter(|r| !r.primary.effective.is_zero()) {
            return Some(rates.primary.effective / Decimal::ONE_HUNDRED);
        }
        if self.income.total.is_zero() {
            None
        } else {
            Some(self.tax.tax_payable / self.income.total)
        }
    }

    pub fn is_refund(&self) -> bool {
        self.result > Decimal::ZERO
    }
}

/// A return as produced by the extractor, in one of the known layouts
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ReturnDocument {
    Australian(AustralianReturn),
    UnitedStates(UsReturn),
}

impl ReturnDocument {
    pub fn year(&self) -> i32 {
        match self {
            ReturnDocument::Australian(r) => r.year,
            ReturnDocument::UnitedStates(r) => r.year,
        }
    }
}

impl From<ReturnDocument> for YearRecord {
    fn from(document: ReturnDocument) -> Self {
        match document {
            ReturnDocument::Australian(r) => r.into(),
            ReturnDocument::UnitedStates(r) => r.into(),
        }
    }
}

/// Read a single extracted return and resolve it to a [`YearRecord`]
pub fn read_return_json<R: Read>(reader: R) -> Result<YearRecord, RecordError> {
    let document: ReturnDocument = serde_json::from_reader(reader)?;
    let layout = match &document {
        ReturnDocument::Australian(_) => "australian",
        ReturnDocument::UnitedStates(_) => "us",
    };
    log::debug!("Read {} return for {}", layout, document.year());
    Ok(document.into())
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct Location {
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub suburb: Option<String>,
    pub state: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AustralianTax {
    #[schemars(with = "f64")]
    pub gross_tax: Decimal,
    #[schemars(with = "f64")]
    pub medicare_levy: Decimal,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub medicare_levy_surcharge: Option<Decimal>,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub help_repayment: Option<Decimal>,
    #[schemars(with = "f64")]
    pub total_tax_before_offsets: Decimal,
    #[serde(default)]
    pub offsets: Vec<LabeledAmount>,
    #[schemars(with = "f64")]
    pub total_offsets: Decimal,
    #[schemars(with = "f64")]
    pub tax_payable: Decimal,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundOrOwing {
    #[schemars(with = "f64")]
    pub refund_or_owing: Decimal,
    pub is_refund: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AustralianRates {
    pub federal: RatePair,
    #[serde(default)]
    pub medicare: Option<LevyRate>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AustralianReturn {
    pub year: i32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    pub income: LineItems,
    pub deductions: LineItems,
    #[schemars(with = "f64")]
    pub taxable_income: Decimal,
    pub tax: AustralianTax,
    pub payg_withholding: LineItems,
    pub result: RefundOrOwing,
    #[serde(default)]
    pub rates: Option<AustralianRates>,
}

impl From<AustralianReturn> for YearRecord {
    fn from(r: AustralianReturn) -> Self {
        let amount = r.result.refund_or_owing.abs();
        let result = if r.result.is_refund { amount } else { -amount };

        YearRecord {
            year: r.year,
            name: r.name,
            jurisdiction: r.location.map(|l| l.state),
            income: r.income,
            deductions: r.deductions,
            taxable_income: r.taxable_income,
            tax: TaxSection {
                gross_tax: r.tax.gross_tax,
                levy: r.tax.medicare_levy,
                surcharge: r.tax.medicare_levy_surcharge,
                repayment: r.tax.help_repayment,
                total_before_offsets: r.tax.total_tax_before_offsets,
                offsets: LineItems {
                    items: r.tax.offsets,
                    total: r.tax.total_offsets,
                },
                tax_payable: r.tax.tax_payable,
            },
            withheld: r.payg_withholding,
            result,
            rates: r.rates.map(|rates| RateBlock {
                primary: rates.federal,
                levy: rates.medicare,
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsFederal {
    #[schemars(with = "f64")]
    pub agi: Decimal,
    #[serde(default)]
    pub deductions: Vec<LabeledAmount>,
    #[schemars(with = "f64")]
    pub taxable_income: Decimal,
    #[schemars(with = "f64")]
    pub tax: Decimal,
    #[serde(default)]
    pub credits: Vec<LabeledAmount>,
    #[serde(default)]
    pub payments: Vec<LabeledAmount>,
    #[schemars(with = "f64")]
    pub refund_or_owed: Decimal,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsState {
    pub name: String,
    #[schemars(with = "f64")]
    pub tax: Decimal,
    #[serde(default)]
    pub payments: Vec<LabeledAmount>,
    #[schemars(with = "f64")]
    pub refund_or_owed: Decimal,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsSummary {
    #[schemars(with = "f64")]
    pub net_position: Decimal,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UsRates {
    pub federal: RatePair,
    #[serde(default)]
    pub state: Option<RatePair>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsReturn {
    pub year: i32,
    #[serde(default)]
    pub name: Option<String>,
    pub income: LineItems,
    pub federal: UsFederal,
    #[serde(default)]
    pub states: Vec<UsState>,
    #[serde(default)]
    pub summary: Option<UsSummary>,
    #[serde(default)]
    pub rates: Option<UsRates>,
}

impl From<UsReturn> for YearRecord {
    fn from(r: UsReturn) -> Self {
        let state_tax: Decimal = r.states.iter().map(|s| s.tax).sum();
        let total_before_offsets = r.federal.tax + state_tax;
        let offsets = LineItems::summed(r.federal.credits);
        let tax_payable = total_before_offsets + offsets.total;

        let mut withheld = r.federal.payments;
        withheld.extend(r.states.iter().flat_map(|s| s.payments.iter().cloned()));

        let result = match &r.summary {
            Some(summary) => summary.net_position,
            None => {
                let states: Decimal = r.states.iter().map(|s| s.refund_or_owed).sum();
                r.federal.refund_or_owed + states
            }
        };

        // State tax is carried as the secondary levy
        let rates = r.rates.map(|rates| RateBlock {
            primary: rates.federal,
            levy: rates.state.map(|state| LevyRate {
                rate: state.effective,
                amount: state_tax,
            }),
        });

        YearRecord {
            year: r.year,
            name: r.name,
            jurisdiction: r.states.first().map(|s| s.name.clone()),
            income: r.income,
            deductions: LineItems::summed(r.federal.deductions),
            taxable_income: r.federal.taxable_income,
            tax: TaxSection {
                gross_tax: r.federal.tax,
                levy: state_tax,
                surcharge: None,
                repayment: None,
                total_before_offsets,
                offsets,
                tax_payable,
            },
            withheld: LineItems::summed(withheld),
            result,
            rates,
        }
    }
}

/// Returns keyed by fiscal year
#[derive(Debug, Clone, Default)]
pub struct ReturnSet {
    records: BTreeMap<i32, YearRecord>,
}

impl ReturnSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, replacing any earlier record for the same year
    pub fn insert(&mut self, record: YearRecord) -> Option<YearRecord> {
        let replaced = self.records.insert(record.year, record);
        if let Some(previous) = &replaced {
            log::warn!("Replacing existing return for {}", previous.year);
        }
        replaced
    }

    pub fn get(&self, year: i32) -> Option<&YearRecord> {
        self.records.get(&year)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &BTreeMap<i32, YearRecord> {
        &self.records
    }
}

impl FromIterator<YearRecord> for ReturnSet {
    fn from_iter<I: IntoIterator<Item = YearRecord>>(iter: I) -> Self {
        let mut set = ReturnSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}
