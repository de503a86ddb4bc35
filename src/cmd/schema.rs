//! Schema command - print expected input formats

use clap::Args;
use schemars::schema_for;
use taxlens::core::{FormType, ReturnDocument, RuleSetFile};

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Which input to describe
    #[arg(value_enum, default_value = "return")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for an extracted return
    Return,
    /// JSON Schema for a rules file
    Rules,
    /// CSV header and categories for classified pages
    PagesCsv,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::Return => {
                let schema = schema_for!(ReturnDocument);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::Rules => {
                let schema = schema_for!(RuleSetFile);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::PagesCsv => self.print_pages_csv(),
        }
        Ok(())
    }

    fn print_pages_csv(&self) {
        println!("{}", PAGE_COLUMNS.join(","));
        println!();
        println!("form_type is one of:");
        for form_type in FormType::ALL {
            println!("  {}", form_type);
        }
    }
}

const PAGE_COLUMNS: &[&str] = &["page_number", "form_type"];
