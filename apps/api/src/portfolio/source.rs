//! Tabular portfolio source: a CSV file with `Techstack` and `Links` columns.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use super::PortfolioEntry;

#[derive(Debug, Deserialize)]
struct PortfolioRow {
    #[serde(rename = "Techstack", alias = "techstack", alias = "tech_stack")]
    tech_stack: String,
    #[serde(rename = "Links", alias = "links", alias = "link")]
    link: String,
}

/// Reads portfolio entries from a CSV file. Called once at process start.
pub fn read_portfolio_csv(path: &Path) -> Result<Vec<PortfolioEntry>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Cannot open portfolio file '{}'", path.display()))?;
    let entries = parse_portfolio_csv(file)
        .with_context(|| format!("Cannot read portfolio file '{}'", path.display()))?;
    info!(
        "Read {} portfolio entries from {}",
        entries.len(),
        path.display()
    );
    Ok(entries)
}

/// Parses portfolio rows; rows with a blank tech stack or link are skipped.
pub fn parse_portfolio_csv<R: Read>(reader: R) -> Result<Vec<PortfolioEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut entries = Vec::new();
    for (line, record) in csv_reader.deserialize::<PortfolioRow>().enumerate() {
        let row = record.with_context(|| format!("Malformed portfolio row {}", line + 1))?;
        if row.tech_stack.is_empty() || row.link.is_empty() {
            warn!("Skipping portfolio row {}: empty tech stack or link", line + 1);
            continue;
        }
        entries.push(PortfolioEntry::new(row.tech_stack, row.link));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PORTFOLIO_CSV: &str = "\
\"Techstack\",\"Links\"
\"React, Node.js, MongoDB\",\"https://example.com/react-portfolio\"
\"Python, AWS, Docker\",\"https://example.com/proj1\"
\"\",\"https://example.com/empty\"
";

    #[test]
    fn parses_rows_and_skips_blank_ones() {
        let entries = parse_portfolio_csv(PORTFOLIO_CSV.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].tech_stack, "Python, AWS, Docker");
        assert_eq!(entries[1].link, "https://example.com/proj1");
        assert_ne!(entries[0].id, entries[1].id);
    }

    #[test]
    fn accepts_lowercase_headers() {
        let csv = "techstack,link\nRust,https://example.com/rust\n";
        let entries = parse_portfolio_csv(csv.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://example.com/rust");
    }

    #[test]
    fn missing_column_is_an_error() {
        let csv = "Techstack\nRust\n";
        assert!(parse_portfolio_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PORTFOLIO_CSV.as_bytes()).unwrap();

        let entries = read_portfolio_csv(file.path()).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = read_portfolio_csv(Path::new("/nonexistent/portfolio.csv")).unwrap_err();
        assert!(err.to_string().contains("Cannot open portfolio file"));
    }
}
