//! Converts semicolon-delimited upload text into typed `AccountRecord`s.
//!
//! Column layout: code; name; Enero; ...; Diciembre. Rows with malformed
//! codes are dropped and reported, never fatal: the caller always gets the
//! best-effort record set plus row-level warnings.

use crate::error::Result;
use crate::numbers::normalize_number;
use crate::schema::{AccountRecord, MONTHS};
use csv::ReaderBuilder;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowWarning {
    /// 1-based line number in the upload.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseReport {
    pub skipped_rows: usize,
    pub warnings: Vec<RowWarning>,
}

#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub records: Vec<AccountRecord>,
    pub report: ParseReport,
}

pub fn parse_ledger(input: &str) -> Result<ParseOutcome> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(input.as_bytes());

    let mut records = Vec::new();
    let mut report = ParseReport::default();

    for (i, row) in reader.records().enumerate() {
        let line = i + 1;
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                report.skipped_rows += 1;
                report.warnings.push(RowWarning {
                    row: line,
                    reason: format!("Unreadable row: {}", e),
                });
                continue;
            }
        };

        let code = row.get(0).unwrap_or("").trim().to_string();

        // A header row repeats the month names instead of carrying a code.
        if line == 1 && !looks_like_code(&code) {
            debug!("Skipping header row: {:?}", code);
            continue;
        }

        if !looks_like_code(&code) {
            report.skipped_rows += 1;
            report.warnings.push(RowWarning {
                row: line,
                reason: format!("Malformed account code '{}'", code),
            });
            continue;
        }

        let name = row.get(1).unwrap_or("").trim().to_string();

        let mut values = BTreeMap::new();
        for (m, month) in MONTHS.iter().enumerate() {
            let raw = row.get(2 + m).unwrap_or("").trim();
            if raw.is_empty() {
                continue;
            }
            match normalize_number(raw) {
                Some(v) => {
                    values.insert(*month, v);
                }
                None => {
                    // Missing data counts as zero; only note it.
                    report.warnings.push(RowWarning {
                        row: line,
                        reason: format!(
                            "Unparseable value '{}' for {} treated as 0",
                            raw,
                            month.name()
                        ),
                    });
                }
            }
        }

        records.push(AccountRecord { code, name, values });
    }

    if report.skipped_rows > 0 {
        warn!(
            "Ingestion skipped {} of {} rows",
            report.skipped_rows,
            report.skipped_rows + records.len()
        );
    }
    debug!("Ingested {} account records", records.len());

    Ok(ParseOutcome { records, report })
}

/// Codes are digits separated by single dots: "4", "5.1.1.6".
fn looks_like_code(code: &str) -> bool {
    !code.is_empty()
        && code
            .split('.')
            .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_digit()))
}
