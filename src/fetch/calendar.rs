//! Picking which report dates to ask for.

use std::collections::{BTreeSet, HashSet};

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// How far back the offset walk may go before giving up, whatever the
/// attempt budget.
pub const MAX_OFFSET_DAYS: u32 = 31;

/// Candidate date `days_back` days before `reference`, pushed off weekends.
///
/// Returns the adjusted offset together with the candidate. A Sunday moves
/// the offset by 2 and a Saturday by 1, and the candidate is then taken a
/// further 2 (resp. 1) days back from the adjusted offset, which always
/// lands on a Wednesday or Thursday.
pub fn resolve(reference: NaiveDate, days_back: u32) -> (u32, NaiveDate) {
    let check = reference - Duration::days(i64::from(days_back));
    match check.weekday() {
        Weekday::Sun => {
            let adjusted = days_back + 2;
            (adjusted, reference - Duration::days(i64::from(adjusted + 2)))
        }
        Weekday::Sat => {
            let adjusted = days_back + 1;
            (adjusted, reference - Duration::days(i64::from(adjusted + 1)))
        }
        _ => (days_back, check),
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Distinct candidate dates for offsets 0, 1, 2, … from `reference`,
/// skipping dates already produced and known holidays.
#[derive(Debug, Clone)]
pub struct Lookback<'a> {
    reference: NaiveDate,
    offset: u32,
    seen: HashSet<NaiveDate>,
    holidays: &'a BTreeSet<NaiveDate>,
}

impl<'a> Lookback<'a> {
    pub fn new(reference: NaiveDate, holidays: &'a BTreeSet<NaiveDate>) -> Self {
        Self {
            reference,
            offset: 0,
            seen: HashSet::new(),
            holidays,
        }
    }
}

impl Iterator for Lookback<'_> {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        while self.offset <= MAX_OFFSET_DAYS {
            let (_, candidate) = resolve(self.reference, self.offset);
            self.offset += 1;
            if self.holidays.contains(&candidate) || !self.seen.insert(candidate) {
                continue;
            }
            return Some(candidate);
        }
        None
    }
}
