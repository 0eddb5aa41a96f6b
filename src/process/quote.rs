use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{DatasetLabel, DatasetTable};
use crate::error::DatasetError;

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.?\d*").expect("number pattern should compile"));

/// Nearest-expiry row of one contract, with its prices as numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopMonthQuote {
    pub data_set: DatasetLabel,
    pub report_id: String,
    pub report_date: NaiveDate,
    /// Contract month as printed, e.g. `JAN25`.
    pub month: String,
    pub settlement_price: Option<f64>,
    pub last_price: Option<f64>,
}

impl TopMonthQuote {
    pub fn from_table(
        table: &DatasetTable,
        report_id: &str,
        report_date: NaiveDate,
    ) -> Result<Self, DatasetError> {
        let month = table
            .value(0, "MTH_STRIKE")
            .ok_or(DatasetError::EmptySection(table.label()))?;

        Ok(Self {
            data_set: table.label(),
            report_id: report_id.to_string(),
            report_date,
            month: month.to_string(),
            settlement_price: table.value(0, "SETT").and_then(clean_price),
            last_price: table.value(0, "DAILY_LAST").and_then(clean_price),
        })
    }
}

/// Pull a price out of a report cell. Reports print `.805` for `0.805` and
/// tag some settlements with a trailing letter (`68.72A`); cells with no
/// digits at all (`----`, blank) mean no price.
pub fn clean_price(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let padded;
    let s = if raw.starts_with('.') {
        padded = format!("0{}", raw);
        padded.as_str()
    } else {
        raw
    };
    NUMBER.find(s)?.as_str().parse().ok()
}
