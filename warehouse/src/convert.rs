use arrow::array::{Array, ArrayRef, AsArray, Date32Array, Int32Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Date32Type, Int32Type, Int64Type};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use common::{Error, Result};
use serde_json::Value;

use crate::schema::Table;

/// Days between 0001-01-01 and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A typed row of one warehouse table.
pub trait WarehouseRow: Sized {
    const TABLE: Table;

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch>;

    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>>;

    fn from_batches(batches: &[RecordBatch]) -> Result<Vec<Self>> {
        let mut rows = Vec::new();
        for batch in batches {
            rows.extend(Self::from_record_batch(batch)?);
        }
        Ok(rows)
    }
}

pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn date_array(dates: impl IntoIterator<Item = NaiveDate>) -> ArrayRef {
    std::sync::Arc::new(Date32Array::from_iter_values(dates.into_iter().map(date_to_days)))
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch.column_by_name(name).ok_or_else(|| {
        Error::SchemaMismatch(format!(
            "column '{}' missing from batch with columns {:?}",
            name,
            batch
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().as_str())
                .collect::<Vec<_>>()
        ))
    })
}

fn null_check(array: &dyn Array, name: &str) -> Result<()> {
    if array.null_count() > 0 {
        return Err(Error::SchemaMismatch(format!(
            "column '{}' holds {} unexpected nulls",
            name,
            array.null_count()
        )));
    }
    Ok(())
}

// Query results may come back as Utf8View or LargeUtf8, and integer columns
// may be widened or narrowed by SQL; everything is cast to the declared type.

pub fn string_column(batch: &RecordBatch, name: &str) -> Result<StringArray> {
    let array = cast(column(batch, name)?, &DataType::Utf8)?;
    null_check(&array, name)?;
    Ok(array.as_string::<i32>().clone())
}

pub fn i64_column(batch: &RecordBatch, name: &str) -> Result<Int64Array> {
    let array = cast(column(batch, name)?, &DataType::Int64)?;
    null_check(&array, name)?;
    Ok(array.as_primitive::<Int64Type>().clone())
}

pub fn nullable_i64_column(batch: &RecordBatch, name: &str) -> Result<Int64Array> {
    let array = cast(column(batch, name)?, &DataType::Int64)?;
    Ok(array.as_primitive::<Int64Type>().clone())
}

pub fn i32_column(batch: &RecordBatch, name: &str) -> Result<Int32Array> {
    let array = cast(column(batch, name)?, &DataType::Int32)?;
    null_check(&array, name)?;
    Ok(array.as_primitive::<Int32Type>().clone())
}

pub fn date_column(batch: &RecordBatch, name: &str) -> Result<Vec<NaiveDate>> {
    let array = cast(column(batch, name)?, &DataType::Date32)?;
    null_check(&array, name)?;
    let dates = array.as_primitive::<Date32Type>();

    (0..dates.len())
        .map(|i| {
            dates.value_as_date(i).ok_or_else(|| {
                Error::SchemaMismatch(format!(
                    "column '{}' row {} holds an out-of-range date",
                    name, i
                ))
            })
        })
        .collect()
}

pub fn optional(array: &Int64Array, index: usize) -> Option<i64> {
    if array.is_null(index) {
        None
    } else {
        Some(array.value(index))
    }
}

/// Renders query results as one JSON object per row.
pub fn batches_to_json(batches: &[RecordBatch]) -> Result<Vec<Value>> {
    let mut writer = arrow::json::ArrayWriter::new(Vec::new());
    let refs: Vec<&RecordBatch> = batches.iter().collect();
    writer.write_batches(&refs)?;
    writer.finish()?;

    let buffer = writer.into_inner();
    if buffer.is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_slice(&buffer)? {
        Value::Array(rows) => Ok(rows),
        other => Ok(vec![other]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{LargeStringArray, StringViewArray};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    #[test]
    fn epoch_offset_matches_arrow() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(date_to_days(date), 0);

        let date = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let array = Date32Array::from(vec![date_to_days(date)]);
        assert_eq!(array.value_as_date(0), Some(date));
    }

    #[test]
    fn strings_are_read_from_any_utf8_layout() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Utf8View, false),
            Field::new("b", DataType::LargeUtf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringViewArray::from(vec!["Azuay"])),
                Arc::new(LargeStringArray::from(vec!["Guayas"])),
            ],
        )
        .unwrap();

        assert_eq!(string_column(&batch, "a").unwrap().value(0), "Azuay");
        assert_eq!(string_column(&batch, "b").unwrap().value(0), "Guayas");
    }

    #[test]
    fn missing_column_is_schema_mismatch() {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1]))]).unwrap();

        assert!(matches!(i64_column(&batch, "y"), Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn json_rows_keep_column_names() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id_tipo", DataType::Int64, false),
            Field::new("tipo", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec!["Natural", "Privada"])),
            ],
        )
        .unwrap();

        let rows = batches_to_json(&[batch]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["tipo"], "Privada");
        assert_eq!(rows[0]["id_tipo"], 1);
    }
}
