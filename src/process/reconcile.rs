// src/process/reconcile.rs
//! Padding short report rows back to the canonical column count.
//!
//! Settlement reports leave cells blank instead of printing a placeholder, so
//! a whitespace split loses them. Which cells go missing depends on the
//! contract and on how many tokens survived, so each contract carries a table
//! from token count to the positions where empty fields must be spliced back.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::{DatasetLabel, CANONICAL_WIDTH};
use crate::error::{DatasetError, ReconcileError};

/// After emitting the token at index `after`, append `count` empty fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion {
    pub after: usize,
    pub count: usize,
}

/// Token count → insertions that bring a row of that count to full width.
#[derive(Debug, Clone, Default)]
pub struct RepairRules {
    by_tokens: BTreeMap<usize, Vec<Insertion>>,
}

impl RepairRules {
    /// Build a rule table, checking that every rule lands exactly on the
    /// canonical width and only references tokens that exist.
    pub fn new<I>(entries: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (usize, Vec<(usize, usize)>)>,
    {
        let mut by_tokens = BTreeMap::new();
        for (tokens, pairs) in entries {
            if tokens >= CANONICAL_WIDTH {
                return Err(format!(
                    "rule for {} tokens: only rows shorter than {} are repaired",
                    tokens, CANONICAL_WIDTH
                ));
            }
            let inserts: Vec<Insertion> = pairs
                .into_iter()
                .map(|(after, count)| Insertion { after, count })
                .collect();
            if let Some(bad) = inserts.iter().find(|i| i.after >= tokens) {
                return Err(format!(
                    "rule for {} tokens inserts after missing token {}",
                    tokens, bad.after
                ));
            }
            let produced = tokens + inserts.iter().map(|i| i.count).sum::<usize>();
            if produced != CANONICAL_WIDTH {
                return Err(format!(
                    "rule for {} tokens produces {} fields",
                    tokens, produced
                ));
            }
            by_tokens.insert(tokens, inserts);
        }
        Ok(Self { by_tokens })
    }

    pub fn for_tokens(&self, tokens: usize) -> Option<&[Insertion]> {
        self.by_tokens.get(&tokens).map(Vec::as_slice)
    }

    /// Token counts this table knows how to repair.
    pub fn token_counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_tokens.keys().copied()
    }

    /// Built-in rules for `label`.
    pub fn for_label(label: DatasetLabel) -> &'static RepairRules {
        &BUILTIN_RULES[&label]
    }
}

/// Every contract we pull currently drops the same cells: ACT_EST_VOL when
/// there was no trade, plus PREV_DAY_VOL / PREV_DAY_INT on thin months.
static BUILTIN_RULES: Lazy<HashMap<DatasetLabel, RepairRules>> = Lazy::new(|| {
    DatasetLabel::ALL
        .into_iter()
        .map(|label| {
            let rules = RepairRules::new([
                (10, vec![(7, 1)]),
                (9, vec![(6, 1), (7, 1)]),
                (8, vec![(6, 1), (7, 2)]),
            ])
            .expect("built-in repair rules should be well formed");
            (label, rules)
        })
        .collect()
});

/// Exactly [`CANONICAL_WIDTH`] fields, aligned with [`super::COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow([String; CANONICAL_WIDTH]);

impl NormalizedRow {
    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn get(&self, column: usize) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for NormalizedRow {
    type Error = Vec<String>;

    fn try_from(fields: Vec<String>) -> Result<Self, Self::Error> {
        <[String; CANONICAL_WIDTH]>::try_from(fields).map(NormalizedRow)
    }
}

/// What to do with a row that cannot be brought to the canonical width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Fail the whole data-set.
    #[default]
    Reject,
    /// Drop the row and log it.
    SkipRow,
}

/// Split `line` on whitespace and splice in the empty fields the built-in
/// rules for `label` call for.
pub fn reconcile(label: DatasetLabel, line: &str) -> Result<NormalizedRow, ReconcileError> {
    reconcile_with(RepairRules::for_label(label), label, line)
}

pub fn reconcile_with(
    rules: &RepairRules,
    label: DatasetLabel,
    line: &str,
) -> Result<NormalizedRow, ReconcileError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let n = tokens.len();

    if n > CANONICAL_WIDTH {
        return Err(ReconcileError::Overflow {
            label,
            tokens: n,
            width: CANONICAL_WIDTH,
        });
    }

    let fields: Vec<String> = if n == CANONICAL_WIDTH {
        tokens.into_iter().map(str::to_string).collect()
    } else {
        let inserts = rules
            .for_tokens(n)
            .ok_or(ReconcileError::NoRule { label, tokens: n })?;
        let mut out = Vec::with_capacity(CANONICAL_WIDTH);
        for (i, token) in tokens.into_iter().enumerate() {
            out.push(token.to_string());
            // only the insertions anchored on this token
            for ins in inserts.iter().filter(|ins| ins.after == i) {
                out.extend(std::iter::repeat(String::new()).take(ins.count));
            }
        }
        trace!(%label, tokens = n, "padded short row");
        out
    };

    NormalizedRow::try_from(fields).map_err(|f| ReconcileError::Misaligned {
        label,
        tokens: n,
        produced: f.len(),
    })
}

/// Reconcile every `(line_index, line)` of a section, applying `policy` to
/// rows that cannot be repaired. Errors and warnings name the one-based line
/// number in the report.
pub fn reconcile_rows<'a, I>(
    label: DatasetLabel,
    rows: I,
    policy: GapPolicy,
) -> Result<Vec<NormalizedRow>, DatasetError>
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    let mut out = Vec::new();
    for (index, text) in rows {
        let line = index + 1;
        match reconcile(label, text) {
            Ok(row) => out.push(row),
            Err(source) => match policy {
                GapPolicy::Reject => return Err(DatasetError::Reconcile { line, source }),
                GapPolicy::SkipRow => {
                    warn!(line, error = %source, row = text.trim(), "skipping unrepairable row");
                }
            },
        }
    }
    Ok(out)
}
