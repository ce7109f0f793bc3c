//! CSV and XLSX downloads of an analysis report.
//!
//! Social and video sources export `text, clean, label`; news exports
//! `title, url, label`. One header row, then one row per analyzed item.

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook};

use crate::ingest::types::Source;
use crate::pipeline::{AnalysisReport, AnalysisResult};

pub const CSV_FILE_NAME: &str = "analiz.csv";
pub const XLSX_FILE_NAME: &str = "analiz.xlsx";
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub fn columns(source: Source) -> [&'static str; 3] {
    match source {
        Source::News => ["title", "url", "label"],
        Source::Twitter | Source::Youtube => ["text", "clean", "label"],
    }
}

pub fn row(source: Source, r: &AnalysisResult) -> [String; 3] {
    let label = r.label.as_str().to_string();
    match source {
        Source::News => [
            r.title.clone().unwrap_or_else(|| r.text.clone()),
            r.url.clone().unwrap_or_default(),
            label,
        ],
        Source::Twitter | Source::Youtube => [r.text.clone(), r.clean.clone(), label],
    }
}

pub fn to_csv(report: &AnalysisReport) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(columns(report.source))?;
    for r in &report.results {
        wtr.write_record(row(report.source, r))?;
    }
    wtr.flush()?;
    wtr.into_inner()
        .map_err(|e| anyhow::anyhow!("finishing csv: {}", e.error()))
}

pub fn to_xlsx(report: &AnalysisReport) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("analiz").context("naming worksheet")?;

    for (col, name) in columns(report.source).iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &bold)?;
    }
    for (i, r) in report.results.iter().enumerate() {
        let row_idx = u32::try_from(i + 1).context("too many rows for xlsx")?;
        for (col, value) in row(report.source, r).iter().enumerate() {
            sheet.write_string(row_idx, col as u16, value.as_str())?;
        }
    }

    workbook.save_to_buffer().context("writing xlsx")
}
