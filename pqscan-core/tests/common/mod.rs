#![allow(dead_code)]

use arrow::array::{ArrayRef, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use pqscan_core::{OutputColumn, OutputRowSchema, OutputType};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Write `batches` to `dir/name`, one row group per batch
pub fn write_parquet(dir: &Path, name: &str, batches: &[RecordBatch]) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let schema = batches[0].schema();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    for batch in batches {
        writer.write(batch).unwrap();
        writer.flush().unwrap();
    }
    writer.close().unwrap();
    path
}

// Schema for the people fixture: id, age, name
pub fn people_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("age", DataType::Int32, true),
        Field::new("name", DataType::Utf8, true),
    ]))
}

pub fn people_output() -> OutputRowSchema {
    OutputRowSchema::new(vec![
        OutputColumn::new("id", OutputType::Int64),
        OutputColumn::new("age", OutputType::Int32),
        OutputColumn::new("name", OutputType::Text),
    ])
}

pub fn people_batch(ids: Vec<i64>, ages: Vec<Option<i32>>, names: Vec<Option<&str>>) -> RecordBatch {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(ids)),
        Arc::new(Int32Array::from(ages)),
        Arc::new(StringArray::from(names)),
    ];
    RecordBatch::try_new(people_schema(), columns).unwrap()
}

/// Batch of people whose ids start at `first_id` and whose ages cover
/// `ages` in order; names are `p<id>`
pub fn people_range(first_id: i64, ages: std::ops::RangeInclusive<i32>) -> RecordBatch {
    let ages: Vec<i32> = ages.collect();
    let ids: Vec<i64> = (0..ages.len() as i64).map(|i| first_id + i).collect();
    let names: Vec<String> = ids.iter().map(|id| format!("p{}", id)).collect();
    people_batch(
        ids,
        ages.into_iter().map(Some).collect(),
        names.iter().map(|n| Some(n.as_str())).collect(),
    )
}
