//! Summary command - totals and averages across extracted returns

use crate::cmd::format::{format_change, format_currency, format_currency_signed, format_percent};
use crate::cmd::read_returns;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};
use taxlens::core::record::LabeledAmount;
use taxlens::core::{aggregate, year_trends, AggregatedSummary, YearTrend};

#[derive(Args, Debug)]
pub struct SummaryCommand {
    /// Extracted return JSON files, one per year
    #[arg(short, long, num_args = 1.., required = true)]
    returns: Vec<PathBuf>,

    /// Show year-over-year trends
    #[arg(short, long)]
    trends: bool,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct SummaryOutput<'a> {
    year_range: String,
    #[serde(flatten)]
    summary: &'a AggregatedSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    trends: Option<Vec<YearTrend>>,
}

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "Item")]
    label: String,
    #[tabled(rename = "Amount")]
    amount: String,
}

#[derive(Tabled)]
struct TrendRow {
    #[tabled(rename = "Year")]
    year: String,
    #[tabled(rename = "Income")]
    income: String,
    #[tabled(rename = "Change")]
    income_change: String,
    #[tabled(rename = "Tax")]
    tax: String,
    #[tabled(rename = "Change")]
    tax_change: String,
    #[tabled(rename = "Net")]
    net: String,
    #[tabled(rename = "Change")]
    net_change: String,
    #[tabled(rename = "Net/Month")]
    net_monthly: String,
    #[tabled(rename = "Daily")]
    daily: String,
}

impl From<&YearTrend> for TrendRow {
    fn from(trend: &YearTrend) -> Self {
        TrendRow {
            year: trend.year.to_string(),
            income: format_currency(trend.income),
            income_change: format_change(trend.income_change),
            tax: format_currency(trend.tax_payable),
            tax_change: format_change(trend.tax_change),
            net: format_currency(trend.net_income),
            net_change: format_change(trend.net_change),
            net_monthly: format_currency(trend.net_monthly),
            daily: format!("${:.2}", trend.daily_take_home),
        }
    }
}

impl SummaryCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let returns = read_returns(self.returns.as_slice())?;
        let Some(summary) = aggregate(returns.records()) else {
            anyhow::bail!("No returns to summarise");
        };
        let trends = self.trends.then(|| year_trends(returns.records()));

        if self.json {
            let output = SummaryOutput {
                year_range: summary.year_range(),
                summary: &summary,
                trends,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        print_summary(&summary);
        if let Some(trends) = trends {
            print_trends(&trends);
        }
        Ok(())
    }
}

fn print_summary(summary: &AggregatedSummary) {
    println!();
    println!(
        "TAX SUMMARY ({}, {} year(s))",
        summary.year_range(),
        summary.year_count
    );
    println!();

    println!("INCOME");
    print_items(&summary.income_items);
    println!(
        "  Total: {} | Average: {} | Average taxable: {}",
        format_currency(summary.total_income),
        format_currency(summary.avg_income),
        format_currency(summary.avg_taxable_income)
    );
    println!();

    if !summary.deductions.is_empty() {
        println!("DEDUCTIONS");
        print_items(&summary.deductions);
        println!("  Total: {}", format_currency(summary.total_deductions));
        println!();
    }

    println!("TAX");
    println!(
        "  Income tax: {} | Levy: {}",
        format_currency(summary.total_gross_tax),
        format_currency(summary.total_levy)
    );
    if !summary.total_surcharge.is_zero() || !summary.total_repayment.is_zero() {
        println!(
            "  Surcharge: {} | Loan repayment: {}",
            format_currency(summary.total_surcharge),
            format_currency(summary.total_repayment)
        );
    }
    println!(
        "  Offsets: {} | Payable: {} | Withheld: {}",
        format_currency(summary.total_offsets),
        format_currency(summary.total_tax_payable),
        format_currency(summary.total_withheld)
    );
    println!(
        "  Refunds: {} | Owing: {} | Net position: {}",
        format_currency(summary.total_refund),
        format_currency(summary.total_owing),
        format_currency_signed(summary.net_position)
    );
    println!();

    if let Some(rates) = &summary.rates {
        println!("AVERAGE RATES");
        println!(
            "  Marginal: {} | Effective: {}",
            format_percent(rates.primary.marginal),
            format_percent(rates.primary.effective)
        );
        if let Some(levy) = &rates.levy {
            println!(
                "  Levy: {} ({})",
                format_percent(levy.rate),
                format_currency(levy.amount)
            );
        }
        println!();
    }

    let take_home = &summary.take_home;
    println!("TAKE HOME (average per year)");
    println!(
        "  Monthly: {} gross, {} net",
        format_currency(take_home.gross_monthly),
        format_currency(take_home.net_monthly)
    );
    println!(
        "  Hourly: ${:.2} | Daily: ${:.2} | Per minute: ${:.2} | Per second: ${:.4}",
        take_home.hourly, take_home.daily, take_home.per_minute, take_home.per_second
    );
    println!();

    if !summary.jurisdictions.is_empty() {
        println!("JURISDICTIONS");
        for jurisdiction in &summary.jurisdictions {
            let years: Vec<String> = jurisdiction.years.iter().map(|y| y.to_string()).collect();
            println!("  {}: {}", jurisdiction.jurisdiction, years.join(", "));
        }
        println!();
    }
}

fn print_items(items: &[LabeledAmount]) {
    let rows: Vec<ItemRow> = items
        .iter()
        .map(|item| ItemRow {
            label: item.label.clone(),
            amount: format_currency(item.amount),
        })
        .collect();
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}

fn print_trends(trends: &[YearTrend]) {
    println!("TRENDS");
    let rows: Vec<TrendRow> = trends.iter().map(TrendRow::from).collect();
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
    println!();
}
