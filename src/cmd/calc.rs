//! Calc command - liability on a single taxable income

use crate::cmd::format::{format_currency, format_ratio};
use anyhow::Context;
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};
use taxlens::core::{
    bracket_breakdown, compute_liability, income_offsets, FiscalYear, LiabilityContext,
    RuleRegistry, TaxLiability,
};

#[derive(Args, Debug)]
pub struct CalcCommand {
    /// Taxable income
    #[arg(short, long)]
    income: Decimal,

    /// Fiscal year (e.g., 2024 for 2023-24)
    #[arg(short, long, conflicts_with = "date")]
    year: Option<i32>,

    /// Any date within the fiscal year (YYYY-MM-DD), defaults to today
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// Holds qualifying private hospital cover
    #[arg(long)]
    cover: bool,

    /// Outstanding study loan balance
    #[arg(long)]
    loan: Option<Decimal>,

    /// Assess the surcharge against the family threshold
    #[arg(long)]
    family: bool,

    /// Dependent children, raising the family threshold
    #[arg(long, default_value_t = 0)]
    dependents: u32,

    /// JSON file of rule sets replacing the built-in tables
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Show tax per bracket
    #[arg(short, long)]
    breakdown: bool,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// Liability plus offsets, for JSON output
#[derive(Debug, Serialize)]
struct CalcOutput {
    fiscal_year: String,
    taxable_income: Decimal,
    #[serde(flatten)]
    liability: TaxLiability,
    offsets: Decimal,
    tax_after_offsets: Decimal,
}

#[derive(Tabled)]
struct BracketRow {
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Rate")]
    rate: String,
    #[tabled(rename = "Income")]
    income: String,
    #[tabled(rename = "Tax")]
    tax: String,
}

impl CalcCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let year = self.fiscal_year();
        let registry = self.registry()?;
        let rules = registry.resolve(year)?;
        log::info!(
            "Using rule set effective {} for {}",
            FiscalYear(rules.effective_year).display(),
            year.display()
        );

        let context = LiabilityContext {
            has_qualifying_cover: self.cover,
            outstanding_loan_balance: self.loan,
            is_family: self.family,
            dependents: self.dependents,
        };
        let liability = compute_liability(self.income, rules, &context)?;

        // Offsets cannot take income tax below zero
        let offsets = income_offsets(self.income, year).min(liability.gross_tax);
        let output = CalcOutput {
            fiscal_year: year.display(),
            taxable_income: self.income,
            tax_after_offsets: liability.tax_payable - offsets,
            liability,
            offsets,
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        print_liability(&output);
        if self.breakdown {
            let rows: Vec<_> = bracket_breakdown(self.income, rules)
                .into_iter()
                .map(|share| BracketRow {
                    from: format_currency(share.from),
                    to: share.to.map_or("-".to_string(), format_currency),
                    rate: format_ratio(share.rate),
                    income: format_currency(share.amount_in_bracket),
                    tax: format_currency(share.tax),
                })
                .collect();
            let table = Table::new(rows)
                .with(Style::rounded())
                .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
                .to_string();
            println!("{}", table);
        }
        Ok(())
    }

    fn fiscal_year(&self) -> FiscalYear {
        match (self.year, self.date) {
            (Some(year), _) => FiscalYear(year),
            (None, Some(date)) => FiscalYear::from_date(date),
            (None, None) => FiscalYear::from_date(chrono::Local::now().date_naive()),
        }
    }

    fn registry(&self) -> anyhow::Result<RuleRegistry> {
        match &self.rules {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Failed to open rules file {}", path.display()))?;
                let registry = RuleRegistry::from_json(BufReader::new(file))
                    .with_context(|| format!("Invalid rules file {}", path.display()))?;
                Ok(registry)
            }
            None => Ok(RuleRegistry::builtin()),
        }
    }
}

fn print_liability(output: &CalcOutput) {
    let liability = &output.liability;

    println!();
    println!(
        "TAX LIABILITY ({}) on {}",
        output.fiscal_year,
        format_currency(output.taxable_income)
    );
    println!();
    println!("  Income tax:         {}", format_currency(liability.gross_tax));
    println!("  Medicare levy:      {}", format_currency(liability.levy));
    if !liability.surcharge.is_zero() {
        println!("  Levy surcharge:     {}", format_currency(liability.surcharge));
    }
    if !liability.repayment.is_zero() {
        println!("  Loan repayment:     {}", format_currency(liability.repayment));
    }
    println!(
        "  Total:              {}",
        format_currency(liability.total_before_offsets)
    );
    if !output.offsets.is_zero() {
        println!("  Offsets:            -{}", format_currency(output.offsets));
        println!(
            "  After offsets:      {}",
            format_currency(output.tax_after_offsets)
        );
    }
    println!();
    println!("  Marginal rate:      {}", format_ratio(liability.marginal_rate));
    match liability.effective_rate {
        Some(rate) => println!("  Effective rate:     {}", format_ratio(rate)),
        None => println!("  Effective rate:     n/a"),
    }
    println!();
}
