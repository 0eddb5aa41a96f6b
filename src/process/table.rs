use std::sync::Arc;

use arrow::{
    array::{ArrayRef, StringArray},
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use csv::ReaderBuilder;

use super::{DatasetLabel, NormalizedRow, CANONICAL_WIDTH, COLUMNS, USABLE_WIDTH};
use crate::error::DatasetError;

/// Field separator used when flattening rows for the CSV reader. Report
/// tokens never contain control characters.
const DELIMITER: u8 = 0x1f;

/// One contract's rows from one report, as a string-typed Arrow batch.
#[derive(Debug, Clone)]
pub struct DatasetTable {
    label: DatasetLabel,
    batch: RecordBatch,
}

/// Arrow schema of a full-width table: every canonical column as Utf8.
pub fn canonical_schema() -> Schema {
    Schema::new(
        COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, false))
            .collect::<Vec<_>>(),
    )
}

/// Header plus rows, joined on [`DELIMITER`] and read back through a strict
/// CSV reader so a row of the wrong width fails here rather than downstream.
pub fn assemble(label: DatasetLabel, rows: &[NormalizedRow]) -> Result<DatasetTable, DatasetError> {
    let sep = char::from(DELIMITER).to_string();
    let mut block = COLUMNS.join(&sep);
    for row in rows {
        block.push('\n');
        block.push_str(&row.fields().join(&sep));
    }

    let mut rdr = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .quoting(false)
        .has_headers(true)
        .flexible(false)
        .from_reader(block.as_bytes());

    let mut columns: Vec<Vec<String>> = vec![Vec::with_capacity(rows.len()); CANONICAL_WIDTH];
    for record in rdr.records() {
        let record = record?;
        for (col, field) in columns.iter_mut().zip(record.iter()) {
            col.push(field.to_string());
        }
    }

    let arrays: Vec<ArrayRef> = columns
        .into_iter()
        .map(|c| Arc::new(StringArray::from(c)) as ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(Arc::new(canonical_schema()), arrays)?;
    Ok(DatasetTable { label, batch })
}

impl DatasetTable {
    pub fn label(&self) -> DatasetLabel {
        self.label
    }

    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Only MTH_STRIKE through SETT.
    pub fn narrow(&self) -> Result<RecordBatch, ArrowError> {
        let indices: Vec<usize> = (0..USABLE_WIDTH).collect();
        self.batch.project(&indices)
    }

    /// Cell at `row` in the column called `column`.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        if row >= self.len() {
            return None;
        }
        let idx = self.batch.schema().index_of(column).ok()?;
        self.batch
            .column(idx)
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|arr| arr.value(row))
    }
}
