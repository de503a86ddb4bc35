//! Triage command - choose pages to forward for extraction

use crate::cmd::read_pages;
use clap::Args;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};
use taxlens::core::triage::CLASSIFICATION_MIN_PAGES;
use taxlens::core::{
    needs_classification, select_pages, unclassified, PageClassification, PageSelection, TierMap,
    DEFAULT_PAGE_BUDGET,
};

#[derive(Args, Debug)]
pub struct TriageCommand {
    /// CSV (page_number,form_type) or JSON classifier output, "-" for stdin
    #[arg(short, long, required_unless_present = "total")]
    pages: Option<PathBuf>,

    /// Total pages in the document; short documents are forwarded whole
    #[arg(short, long)]
    total: Option<u32>,

    /// Maximum number of pages to forward
    #[arg(short, long, default_value_t = DEFAULT_PAGE_BUDGET)]
    budget: usize,

    /// Output as JSON instead of formatted table
    #[arg(long, conflicts_with = "csv")]
    json: bool,

    /// Output as CSV instead of formatted table
    #[arg(long)]
    csv: bool,
}

#[derive(Debug, Tabled, Serialize)]
struct PageRow {
    #[tabled(rename = "Page")]
    page: u32,
    #[tabled(rename = "Selected")]
    selected: bool,
    #[tabled(rename = "Reason")]
    reason: String,
}

impl TriageCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let selection = self.selection()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&selection)?);
            return Ok(());
        }

        let rows = page_rows(&selection);
        if self.csv {
            let mut wtr = csv::Writer::from_writer(io::stdout());
            for row in &rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
        } else {
            self.print_table(&selection, rows);
        }
        Ok(())
    }

    fn selection(&self) -> anyhow::Result<PageSelection> {
        if let Some(total) = self.total.filter(|&total| !needs_classification(total)) {
            log::info!("{} page document forwarded without classification", total);
            return Ok(whole_document(&unclassified(total)));
        }

        let Some(path) = &self.pages else {
            anyhow::bail!(
                "Documents over {} pages need classified pages (--pages)",
                CLASSIFICATION_MIN_PAGES
            );
        };
        let pages = read_pages(path)?;
        if let Some(total) = self.total {
            if let Some(page) = pages.iter().find(|p| p.page_number > total) {
                log::warn!("Page {} is beyond the document's {} pages", page.page_number, total);
            }
        }
        Ok(select_pages(&pages, self.budget, &TierMap::default())?)
    }

    fn print_table(&self, selection: &PageSelection, rows: Vec<PageRow>) {
        if rows.is_empty() {
            println!("No pages to triage");
            return;
        }

        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
        println!(
            "Selected {} page(s), skipped {} (budget {})",
            selection.selected_pages.len(),
            selection.skipped_pages.len(),
            self.budget
        );
    }
}

/// Every page selected, in page order
fn whole_document(pages: &[PageClassification]) -> PageSelection {
    PageSelection {
        selected_pages: pages.iter().map(|p| p.page_number).collect(),
        skipped_pages: Vec::new(),
        reason: pages
            .iter()
            .map(|p| (p.page_number, "short document".to_string()))
            .collect(),
    }
}

fn page_rows(selection: &PageSelection) -> Vec<PageRow> {
    let selected = selection.selected_pages.iter().map(|&page| (page, true));
    let skipped = selection.skipped_pages.iter().map(|&page| (page, false));

    let mut rows: Vec<PageRow> = selected
        .chain(skipped)
        .map(|(page, selected)| PageRow {
            page,
            selected,
            reason: selection.reason.get(&page).cloned().unwrap_or_default(),
        })
        .collect();
    rows.sort_by_key(|row| row.page);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxlens::core::FormType;

    #[test]
    fn short_document_selected_whole() {
        let selection = whole_document(&unclassified(3));
        assert_eq!(selection.selected_pages, vec![1, 2, 3]);
        assert!(selection.skipped_pages.is_empty());
        assert_eq!(selection.reason[&2], "short document");
    }

    #[test]
    fn rows_in_page_order() {
        let pages = vec![
            PageClassification::new(1, FormType::Worksheet),
            PageClassification::new(2, FormType::Form1040Main),
            PageClassification::new(3, FormType::ScheduleB),
        ];
        let selection = select_pages(&pages, 1, &TierMap::default()).unwrap();
        let rows = page_rows(&selection);

        assert_eq!(rows.iter().map(|r| r.page).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(
            rows.iter().map(|r| r.selected).collect::<Vec<_>>(),
            vec![false, true, false]
        );
        assert_eq!(rows[0].reason, "skip: worksheet");
    }
}
