//! Arrow RecordBatches of the joined document relation → `DocumentRecord`s.
//!
//! Column lookup is case-insensitive, like DuckDB identifiers. Value columns
//! of any type are rendered as text; score columns are read as `f64`.

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use docreview_core::{DocumentRecord, FieldDefinition, FieldReading};
use tracing::warn;

use crate::StoreError;
use crate::sql::{FILE_NAME_COLUMN, VERIFICATION_DATE_COLUMN};

pub fn decode_documents(
    batches: &[RecordBatch],
    fields: &[FieldDefinition],
) -> Result<Vec<DocumentRecord>, StoreError> {
    let mut docs = Vec::new();
    for batch in batches {
        decode_batch(batch, fields, &mut docs)?;
    }
    Ok(docs)
}

fn decode_batch(
    batch: &RecordBatch,
    fields: &[FieldDefinition],
    out: &mut Vec<DocumentRecord>,
) -> Result<(), StoreError> {
    let names = cast(required(batch, FILE_NAME_COLUMN)?, &DataType::Utf8)?;
    let names = as_utf8(&names, FILE_NAME_COLUMN)?;

    // Absent when decoding the bare source table.
    let verified = match column_ci(batch, VERIFICATION_DATE_COLUMN) {
        Some(col) => Some(cast(
            col,
            &DataType::Timestamp(TimeUnit::Microsecond, None),
        )?),
        None => None,
    };
    let verified = match &verified {
        Some(col) => Some(
            col.as_any()
                .downcast_ref::<TimestampMicrosecondArray>()
                .ok_or_else(|| {
                    StoreError::Other(format!("{VERIFICATION_DATE_COLUMN} is not a timestamp"))
                })?,
        ),
        None => None,
    };

    let mut casts = Vec::with_capacity(fields.len());
    for field in fields {
        let values = cast(required(batch, &field.value_column)?, &DataType::Utf8)?;
        let scores = cast(required(batch, &field.score_column)?, &DataType::Float64)?;
        casts.push((field, values, scores));
    }
    let columns = casts
        .iter()
        .map(|(field, values, scores)| -> Result<_, StoreError> {
            let values = as_utf8(values, &field.value_column)?;
            let scores = scores
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| StoreError::Other(format!("{} not f64", field.score_column)))?;
            Ok((*field, values, scores))
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    for row in 0..batch.num_rows() {
        if names.is_null(row) {
            warn!(row, "skipping document row without a file name");
            continue;
        }
        let mut doc = DocumentRecord::new(names.value(row));
        if let Some(ts) = verified
            && !ts.is_null(row)
        {
            doc.verification_date = ts.value_as_datetime(row);
        }
        for (field, values, scores) in &columns {
            let reading = FieldReading {
                value: (!values.is_null(row)).then(|| values.value(row).to_string()),
                score: (!scores.is_null(row)).then(|| scores.value(row)),
            };
            doc.readings.insert(field.name.clone(), reading);
        }
        out.push(doc);
    }
    Ok(())
}

fn column_ci<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a ArrayRef> {
    let idx = batch
        .schema()
        .fields()
        .iter()
        .position(|f| f.name().eq_ignore_ascii_case(name))?;
    Some(batch.column(idx))
}

fn required<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef, StoreError> {
    column_ci(batch, name).ok_or_else(|| StoreError::MissingColumn(name.to_string()))
}

fn as_utf8<'a>(col: &'a ArrayRef, name: &str) -> Result<&'a StringArray, StoreError> {
    col.as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StoreError::Other(format!("{name} not utf8")))
}
