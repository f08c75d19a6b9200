//! Per-account feature extraction and fixed-ceiling normalization

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data::ReportRecord;
use crate::error::AnalysisError;

/// Added to numerator and denominator so a zero feature never normalizes to exactly 0
pub const NORMALIZATION_EPSILON: f64 = 1e-10;

/// Assumed upper bound of every raw feature dimension
pub const DEFAULT_NORMALIZATION_CEILING: f64 = 100.0;

/// Number of feature dimensions: completion time, report count, frequency
pub const N_FEATURES: usize = 3;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Usage summary for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountFeatures {
    pub account_id: String,
    /// Mean of (completion - creation) in hours
    pub average_completion_hours: f64,
    /// Always >= 1
    pub reports_count: usize,
    /// Reports per day over the account's creation-date span (+1 day)
    pub report_frequency: f64,
}

impl AccountFeatures {
    /// Raw feature vector in clustering order
    pub fn as_array(&self) -> [f64; N_FEATURES] {
        [
            self.average_completion_hours,
            self.reports_count as f64,
            self.report_frequency,
        ]
    }
}

/// Running aggregate for one account group
struct Accumulator {
    account_id: String,
    completion_hours_sum: f64,
    count: usize,
    first_created: DateTime<Utc>,
    last_created: DateTime<Utc>,
}

impl Accumulator {
    fn new(record: &ReportRecord) -> Self {
        Self {
            account_id: record.account_members.clone(),
            completion_hours_sum: 0.0,
            count: 0,
            first_created: record.creation_date,
            last_created: record.creation_date,
        }
    }

    fn push(&mut self, record: &ReportRecord) {
        self.completion_hours_sum += record.completion_hours();
        self.count += 1;
        self.first_created = self.first_created.min(record.creation_date);
        self.last_created = self.last_created.max(record.creation_date);
    }

    fn finish(self) -> crate::Result<AccountFeatures> {
        // count is never zero for a group created from a record, but keep the
        // empty-group average defined rather than dividing by zero
        let average_completion_hours = if self.count == 0 {
            0.0
        } else {
            self.completion_hours_sum / self.count as f64
        };

        let span_days =
            (self.last_created - self.first_created).num_milliseconds() as f64 / MILLIS_PER_DAY;
        let report_frequency = self.count as f64 / (span_days + 1.0);

        if !average_completion_hours.is_finite() || !report_frequency.is_finite() {
            return Err(AnalysisError::Extraction {
                account: self.account_id,
                reason: "non-finite feature value".to_string(),
            });
        }

        Ok(AccountFeatures {
            account_id: self.account_id,
            average_completion_hours,
            reports_count: self.count,
            report_frequency,
        })
    }
}

/// Group records by account membership and compute one feature vector per account
///
/// Accounts are returned in order of first appearance in `records`.
///
/// # Errors
/// * `EmptyInput` when `records` is empty
pub fn extract_features(records: &[ReportRecord]) -> crate::Result<Vec<AccountFeatures>> {
    if records.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }

    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Accumulator> = Vec::new();

    for record in records {
        let slot = *index
            .entry(record.account_members.as_str())
            .or_insert_with(|| {
                groups.push(Accumulator::new(record));
                groups.len() - 1
            });
        groups[slot].push(record);
    }

    groups.into_iter().map(Accumulator::finish).collect()
}

/// Scale a raw value against a fixed ceiling: `(value + eps) / (ceiling + eps)`.
///
/// Values above the ceiling or below zero are not clamped.
pub fn normalize_value(value: f64, ceiling: f64) -> f64 {
    (value + NORMALIZATION_EPSILON) / (ceiling + NORMALIZATION_EPSILON)
}

/// Build the normalized (n_accounts, 3) matrix fed to the cluster engine
pub fn normalize_features(features: &[AccountFeatures], ceiling: f64) -> crate::Result<Array2<f64>> {
    let data: Vec<f64> = features
        .iter()
        .flat_map(|f| f.as_array())
        .map(|value| normalize_value(value, ceiling))
        .collect();

    Ok(Array2::from_shape_vec((features.len(), N_FEATURES), data)?)
}
