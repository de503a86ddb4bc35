pub mod calc;
pub mod format;
pub mod schema;
pub mod summary;
pub mod triage;

use anyhow::Context;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use taxlens::core::{read_return_json, year_from_filename, PageClassification, ReturnSet};

/// Read extracted return documents, one JSON file per year
pub fn read_returns(paths: &[impl AsRef<Path>]) -> anyhow::Result<ReturnSet> {
    let mut returns = ReturnSet::new();
    for path in paths {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let record = read_return_json(BufReader::new(file))
            .with_context(|| format!("Failed to read return from {}", path.display()))?;

        let hinted = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(year_from_filename);
        if let Some(hinted) = hinted.filter(|&year| year != record.year) {
            log::warn!(
                "{} is named for {} but contains the {} return",
                path.display(),
                hinted,
                record.year
            );
        }

        returns.insert(record);
    }
    Ok(returns)
}

/// Read page classifications from a CSV or JSON file (or stdin with "-").
///
/// JSON input may be the classifier's raw reply with prose around the list.
pub fn read_pages(path: &Path) -> anyhow::Result<Vec<PageClassification>> {
    if path.as_os_str() == "-" {
        let text = read_stdin()?;
        return parse_pages(&text, looks_like_csv(&text));
    }

    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let mut text = String::new();
    File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .read_to_string(&mut text)?;
    parse_pages(&text, is_csv)
}

fn parse_pages(text: &str, is_csv: bool) -> anyhow::Result<Vec<PageClassification>> {
    if is_csv {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let pages = rdr
            .deserialize()
            .collect::<Result<Vec<PageClassification>, _>>()?;
        Ok(pages)
    } else {
        Ok(taxlens::core::parse_classifications(text)?)
    }
}

/// True when the first line is the `page_number,form_type` header
fn looks_like_csv(text: &str) -> bool {
    text.trim_start()
        .lines()
        .next()
        .is_some_and(|header| header.starts_with("page_number,"))
}

fn read_stdin() -> anyhow::Result<String> {
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());

    let mut buffer = String::new();
    reader.read_to_string(&mut buffer)?;

    if buffer.trim().is_empty() {
        anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
    }
    Ok(buffer)
}
