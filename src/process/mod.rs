// src/process/mod.rs
//! Turning a downloaded settlement report into per-contract tables.
//!
//! A report is plain text. Each contract section opens with a heading line
//! naming the contract and closes with a `TOTAL` line; the rows between are
//! whitespace separated and frequently short a few columns. [`section`] finds
//! the block, [`reconcile`] pads each row back to [`CANONICAL_WIDTH`] and
//! [`table`] builds the typed table.

pub mod quote;
pub mod reconcile;
pub mod section;
pub mod table;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::DatasetError;

pub use quote::{clean_price, TopMonthQuote};
pub use reconcile::{reconcile, reconcile_rows, GapPolicy, Insertion, NormalizedRow, RepairRules};
pub use section::{locate, Section};
pub use table::{assemble, DatasetTable};

/// Column names of every normalized row, in report order.
pub const COLUMNS: [&str; CANONICAL_WIDTH] = [
    "MTH_STRIKE",
    "DAILY_OPEN",
    "DAILY_HIGH",
    "DAILY_LOW",
    "DAILY_LAST",
    "SETT",
    "PNT_CHGE",
    "ACT_EST_VOL",
    "PREV_DAY_SETT",
    "PREV_DAY_VOL",
    "PREV_DAY_INT",
];

pub const CANONICAL_WIDTH: usize = 11;

/// Columns MTH_STRIKE through SETT; the rest need per-contract handling.
pub const USABLE_WIDTH: usize = 6;

/// Marker on the line closing every contract section.
pub const SECTION_END: &str = "TOTAL";

/// The contracts we know how to pull out of a settlement report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DatasetLabel {
    /// WTI
    CrudeOilLastDay,
    MontBelvieuPropane,
    BrentLastDay,
    MontBelvieuEthane,
    CadUsd,
    EurUsd,
    HenryHubNaturalGas,
}

impl DatasetLabel {
    pub const ALL: [DatasetLabel; 7] = [
        DatasetLabel::CrudeOilLastDay,
        DatasetLabel::MontBelvieuPropane,
        DatasetLabel::BrentLastDay,
        DatasetLabel::MontBelvieuEthane,
        DatasetLabel::CadUsd,
        DatasetLabel::EurUsd,
        DatasetLabel::HenryHubNaturalGas,
    ];

    /// Section heading as printed in the report.
    pub fn heading(&self) -> &'static str {
        match self {
            DatasetLabel::CrudeOilLastDay => "26 Crude Oil Last Day Financial Futures",
            DatasetLabel::MontBelvieuPropane => "B0 Mont Belvieu LDH Propane (OPIS) Futures",
            DatasetLabel::BrentLastDay => "BZ Brent Crude Oil Last Day Financial Futures",
            DatasetLabel::MontBelvieuEthane => "C0 Mont Belvieu Ethane (OPIS) Futures",
            DatasetLabel::CadUsd => "C1 Canadian Dollar/U.S. Dollar (CAD/USD) Futures",
            DatasetLabel::EurUsd => "EC Euro/U.S. Dollar (EUR/USD) Futures",
            DatasetLabel::HenryHubNaturalGas => "NG Henry Hub Natural Gas Futures",
        }
    }

    /// Exchange product code, the first word of the heading.
    pub fn code(&self) -> &'static str {
        match self {
            DatasetLabel::CrudeOilLastDay => "26",
            DatasetLabel::MontBelvieuPropane => "B0",
            DatasetLabel::BrentLastDay => "BZ",
            DatasetLabel::MontBelvieuEthane => "C0",
            DatasetLabel::CadUsd => "C1",
            DatasetLabel::EurUsd => "EC",
            DatasetLabel::HenryHubNaturalGas => "NG",
        }
    }
}

impl fmt::Display for DatasetLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.heading())
    }
}

impl FromStr for DatasetLabel {
    type Err = String;

    /// Accepts either the full heading or the product code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        DatasetLabel::ALL
            .into_iter()
            .find(|l| l.heading() == s || l.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown data-set label `{}`", s))
    }
}

impl TryFrom<String> for DatasetLabel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DatasetLabel> for String {
    fn from(l: DatasetLabel) -> Self {
        l.heading().to_string()
    }
}

/// Locate `label`'s section in `lines`, repair its rows and build the table.
#[instrument(level = "debug", skip(lines, policy), fields(data_set = label.code()))]
pub fn parse_dataset<S: AsRef<str>>(
    lines: &[S],
    label: DatasetLabel,
    policy: GapPolicy,
) -> Result<DatasetTable, DatasetError> {
    let section = locate(lines, label.heading(), SECTION_END)?;
    let rows = reconcile_rows(label, section.rows(lines), policy)?;
    let table = assemble(label, &rows)?;
    debug!(
        start = section.start,
        end = section.end,
        rows = table.len(),
        "parsed section"
    );
    Ok(table)
}
