//! Report records and CSV loading using Polars

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

pub const COL_REPORT_ID: &str = "ReportId";
pub const COL_CREATION_DATE: &str = "CreationDate";
pub const COL_COMPLETION_DATE: &str = "CompletionDate";
pub const COL_REPORT_START_DATE: &str = "ReportStartDate";
pub const COL_REPORT_END_DATE: &str = "ReportEndDate";
pub const COL_ACCOUNTS: &str = "Accounts";
pub const COL_ACCOUNT_MEMBERS: &str = "AccountMembers";

/// Naive layouts tried after RFC 3339, interpreted as UTC
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// A single report submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub report_id: String,
    pub creation_date: DateTime<Utc>,
    /// Expected to be >= `creation_date`, but not enforced
    pub completion_date: DateTime<Utc>,
    pub report_start_date: DateTime<Utc>,
    pub report_end_date: DateTime<Utc>,
    /// Free-text accounts list. Carried for display, never grouped on.
    pub accounts: String,
    /// Account membership identifier; the grouping key for analysis
    pub account_members: String,
}

impl ReportRecord {
    /// Hours between creation and completion. Negative if completion predates creation.
    pub fn completion_hours(&self) -> f64 {
        (self.completion_date - self.creation_date).num_milliseconds() as f64 / 3_600_000.0
    }
}

/// Parse a timestamp cell in any of the supported layouts
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Load report records from a CSV file
///
/// # Arguments
/// * `file_path` - Path to a CSV file with a header row
///
/// # Returns
/// * Records in file order. A header-only file yields an empty vector.
pub fn load_reports(file_path: &str) -> crate::Result<Vec<ReportRecord>> {
    // Read every column as text; timestamp parsing is done per cell below
    let df = CsvReader::from_path(file_path)?
        .has_header(true)
        .infer_schema(Some(0))
        .finish()?;

    records_from_frame(&df)
}

/// Convert a string-typed DataFrame into report records
pub fn records_from_frame(df: &DataFrame) -> crate::Result<Vec<ReportRecord>> {
    let report_ids = string_column(df, COL_REPORT_ID)?;
    let creation = string_column(df, COL_CREATION_DATE)?;
    let completion = string_column(df, COL_COMPLETION_DATE)?;
    let period_start = string_column(df, COL_REPORT_START_DATE)?;
    let period_end = string_column(df, COL_REPORT_END_DATE)?;
    let accounts = string_column(df, COL_ACCOUNTS)?;
    let members = string_column(df, COL_ACCOUNT_MEMBERS)?;

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let row = i + 1;
        records.push(ReportRecord {
            report_id: report_ids[i].clone().unwrap_or_default(),
            creation_date: timestamp_cell(&creation[i], row, COL_CREATION_DATE)?,
            completion_date: timestamp_cell(&completion[i], row, COL_COMPLETION_DATE)?,
            report_start_date: timestamp_cell(&period_start[i], row, COL_REPORT_START_DATE)?,
            report_end_date: timestamp_cell(&period_end[i], row, COL_REPORT_END_DATE)?,
            accounts: accounts[i].clone().unwrap_or_default(),
            account_members: members[i].clone().unwrap_or_default(),
        });
    }

    Ok(records)
}

fn string_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<String>>> {
    let series = df
        .column(name)
        .map_err(|_| AnalysisError::MissingColumn(name.to_string()))?
        .cast(&DataType::Utf8)?;

    Ok(series
        .utf8()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

fn timestamp_cell(value: &Option<String>, row: usize, column: &str) -> crate::Result<DateTime<Utc>> {
    let raw = value.as_deref().unwrap_or("");
    parse_timestamp(raw).ok_or_else(|| AnalysisError::MalformedTimestamp {
        row,
        column: column.to_string(),
        value: raw.to_string(),
    })
}

/// Narrows the report set before analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportFilter {
    /// Keep reports created at or after this instant
    pub start_date: Option<DateTime<Utc>>,
    /// Keep reports created at or before this instant
    pub end_date: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the report identifier
    pub report_id: Option<String>,
}

impl ReportFilter {
    pub fn validate(&self) -> crate::Result<()> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(AnalysisError::InvalidFilter(
                    "end date cannot be earlier than start date".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn matches(&self, record: &ReportRecord) -> bool {
        if self.start_date.is_some_and(|start| record.creation_date < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| record.creation_date > end) {
            return false;
        }
        match self.report_id.as_deref() {
            Some(needle) if !needle.is_empty() => record
                .report_id
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => true,
        }
    }

    /// Validate the filter, then keep only matching records
    pub fn apply(&self, records: Vec<ReportRecord>) -> crate::Result<Vec<ReportRecord>> {
        self.validate()?;
        Ok(records.into_iter().filter(|r| self.matches(r)).collect())
    }
}
