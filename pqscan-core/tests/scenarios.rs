mod common;

use arrow::array::{
    Array, ArrayRef, BinaryArray, BooleanArray, Date32Array, Float32Array, Float64Array, Int16Array,
    Int32Array, Int64Array, LargeBinaryArray, LargeListArray, LargeStringArray, ListArray,
    ListBuilder, StringArray, StringBuilder, StructArray, TimestampMicrosecondArray,
    TimestampMillisecondArray, TimestampNanosecondArray, TimestampSecondArray,
};
use arrow::datatypes::{DataType, Field, Int32Type, Int64Type, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use common::*;
use datafusion::common::ScalarValue;
use datafusion::prelude::{col, lit};
use pqscan_core::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;

/// Drain a scan, returning the value of column `column` of every row
fn collect_column(scan: &mut ScanState, column: usize) -> Vec<Value> {
    let mut values = Vec::new();
    while let Some(row) = scan.next(ReadMode::Materialize).unwrap() {
        values.push(row.to_values()[column].clone());
    }
    values
}

fn ids(range: std::ops::Range<i64>) -> Vec<Value> {
    range.map(Value::Int64).collect()
}

#[test]
fn test_single_row_group_pruned_away() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(dir.path(), "people.parquet", &[people_range(0, 20..=25)]);
    let schema = people_output();

    let plan = plan_scan(&[&path], &[col("age").gt(lit(30))], &schema).unwrap();

    assert!(plan.files.is_empty());
    assert_eq!(plan.skipped_files, vec![path.clone()]);
    assert_eq!(plan.total_rows, 6);
    assert_eq!(plan.rows_to_read, 0);
    assert_eq!(plan.num_work_items(), 0);

    let mut scan = plan.open_scan(&schema, ScanConfig::default()).unwrap();
    assert!(scan.next(ReadMode::Materialize).unwrap().is_none());
    assert!(scan.is_exhausted());
}

#[test]
fn test_lower_bound_keeps_second_row_group() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(
        dir.path(),
        "people.parquet",
        &[people_range(0, 10..=17), people_range(8, 18..=60)],
    );
    let schema = people_output();

    let plan = plan_scan(&[&path], &[col("age").gt_eq(lit(18))], &schema).unwrap();
    assert_eq!(plan.files.len(), 1);
    assert_eq!(plan.files[0].skip, BTreeSet::from([0]));
    assert_eq!(plan.rows_to_read, 43);

    let mut scan = plan.open_scan(&schema, ScanConfig::default()).unwrap();
    assert_eq!(
        scan.build_read_list().items(),
        &[RowGroupWorkItem::new(0, 1)]
    );

    let ages = collect_column(&mut scan, 1);
    assert_eq!(ages.len(), 43);
    assert!(ages.iter().all(|age| matches!(age, Value::Int32(a) if *a >= 18)));
}

#[test]
fn test_two_files_without_filters_read_in_order() {
    let dir = TempDir::new().unwrap();
    let a = write_parquet(
        dir.path(),
        "a.parquet",
        &[people_range(0, 1..=4), people_range(4, 5..=8)],
    );
    let b = write_parquet(
        dir.path(),
        "b.parquet",
        &[people_range(8, 1..=3), people_range(11, 4..=6)],
    );
    let schema = people_output();

    let plan = plan_scan(&[&a, &b], &[], &schema).unwrap();
    assert_eq!(plan.filters_applied, 0);
    assert_eq!(plan.rows_to_read, 14);

    let mut scan = plan.open_scan(&schema, ScanConfig::default()).unwrap();
    assert_eq!(
        scan.build_read_list().items(),
        &[
            RowGroupWorkItem::new(0, 0),
            RowGroupWorkItem::new(0, 1),
            RowGroupWorkItem::new(1, 0),
            RowGroupWorkItem::new(1, 1),
        ]
    );
    assert_eq!(collect_column(&mut scan, 0), ids(0..14));
}

#[test]
fn test_missing_column_fails_before_buffering() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(dir.path(), "people.parquet", &[people_range(0, 20..=25)]);
    let schema = OutputRowSchema::new(vec![
        OutputColumn::new("id", OutputType::Int64),
        OutputColumn::new("salary", OutputType::Float64),
    ]);

    let reader = FileReader::open(&path).unwrap();
    let err = reader.validate_schema(&schema).unwrap_err();
    assert!(matches!(err, ReaderError::MissingColumn { ref column, .. } if column == "salary"));
    assert_eq!(reader.current_row_group(), None);

    let err = plan_scan(&[&path], &[], &schema).unwrap_err();
    assert!(matches!(
        err,
        ScanError::Reader(ReaderError::MissingColumn { .. })
    ));
}

#[test]
fn test_missing_unused_column_reads_as_null() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(dir.path(), "people.parquet", &[people_range(0, 20..=22)]);
    let schema = OutputRowSchema::new(vec![
        OutputColumn::new("id", OutputType::Int64),
        OutputColumn::unused("salary", OutputType::Float64),
    ]);

    let plan = plan_scan(&[&path], &[], &schema).unwrap();
    let mut scan = plan.open_scan(&schema, ScanConfig::default()).unwrap();

    let mut rows = 0;
    while let Some(row) = scan.next(ReadMode::Materialize).unwrap() {
        assert!(!row.is_null(0));
        assert!(row.is_null(1));
        rows += 1;
    }
    assert_eq!(rows, 3);
}

#[test]
fn test_unused_columns_are_null() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(dir.path(), "people.parquet", &[people_range(0, 30..=34)]);
    let schema = people_output().with_used(&["age"]);

    let plan = plan_scan(&[&path], &[], &schema).unwrap();
    let mut scan = plan.open_scan(&schema, ScanConfig::default()).unwrap();

    let row = scan.next(ReadMode::Materialize).unwrap().unwrap();
    assert_eq!(row.to_values(), vec![Value::Null, Value::Int32(30), Value::Null]);
}

#[test]
fn test_decode_every_output_type() {
    let tags = ListArray::from_iter_primitive::<Int32Type, _, _>(vec![
        Some(vec![Some(1), None, Some(3)]),
        Some(vec![]),
    ]);
    let file_schema = Arc::new(Schema::new(vec![
        Field::new("flag", DataType::Boolean, true),
        Field::new("small", DataType::Int16, false),
        Field::new("medium", DataType::Int32, false),
        Field::new("big", DataType::Int64, false),
        Field::new("ratio", DataType::Float32, true),
        Field::new("score", DataType::Float64, false),
        Field::new("label", DataType::Utf8, false),
        Field::new("blob", DataType::Binary, false),
        Field::new("day", DataType::Date32, false),
        Field::new("at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        Field::new("tags", tags.data_type().clone(), true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(BooleanArray::from(vec![Some(true), None])),
        Arc::new(Int16Array::from(vec![-3, 7])),
        Arc::new(Int32Array::from(vec![1, 2])),
        Arc::new(Int64Array::from(vec![i64::MAX, 0])),
        Arc::new(Float32Array::from(vec![Some(1.5), None])),
        Arc::new(Float64Array::from(vec![2.25, -0.5])),
        Arc::new(StringArray::from(vec!["héllo", ""])),
        Arc::new(BinaryArray::from(vec![&b"\x00\xff"[..], &b""[..]])),
        // 2000-01-01 and 2000-01-02
        Arc::new(Date32Array::from(vec![10_957, 10_958])),
        Arc::new(TimestampMillisecondArray::from(vec![
            946_684_800_000,
            946_684_801_500,
        ])),
        Arc::new(tags),
    ];
    let batch = RecordBatch::try_new(file_schema, columns).unwrap();

    let dir = TempDir::new().unwrap();
    let path = write_parquet(dir.path(), "types.parquet", &[batch]);
    let schema = OutputRowSchema::new(vec![
        OutputColumn::new("flag", OutputType::Bool),
        OutputColumn::new("small", OutputType::Int32),
        OutputColumn::new("medium", OutputType::Int64),
        OutputColumn::new("big", OutputType::Int64),
        OutputColumn::new("ratio", OutputType::Float32),
        OutputColumn::new("score", OutputType::Float64),
        OutputColumn::new("label", OutputType::Text),
        OutputColumn::new("blob", OutputType::Bytea),
        OutputColumn::new("day", OutputType::Date),
        OutputColumn::new("at", OutputType::Timestamp),
        OutputColumn::new("tags", OutputType::array_of(OutputType::Int32)),
    ]);

    let plan = plan_scan(&[&path], &[], &schema).unwrap();
    let mut scan = plan.open_scan(&schema, ScanConfig::default()).unwrap();

    let first = scan.next(ReadMode::Materialize).unwrap().unwrap();
    assert_eq!(
        first.to_values(),
        vec![
            Value::Bool(true),
            Value::Int32(-3),
            Value::Int64(1),
            Value::Int64(i64::MAX),
            Value::Float32(1.5),
            Value::Float64(2.25),
            Value::Text("héllo".to_string()),
            Value::Bytea(vec![0x00, 0xff]),
            Value::Date(0),
            Value::Timestamp(0),
            Value::Array(vec![Value::Int32(1), Value::Null, Value::Int32(3)]),
        ]
    );
    assert_eq!(
        first.to_string(),
        "t|-3|1|9223372036854775807|1.5|2.25|héllo|\\x00ff|2000-01-01|2000-01-01 00:00:00|{1,NULL,3}"
    );

    let second = scan.next(ReadMode::Materialize).unwrap().unwrap();
    assert_eq!(
        second.to_values(),
        vec![
            Value::Null,
            Value::Int32(7),
            Value::Int64(2),
            Value::Int64(0),
            Value::Null,
            Value::Float64(-0.5),
            Value::Text(String::new()),
            Value::Bytea(Vec::new()),
            Value::Date(1),
            Value::Timestamp(1_500_000),
            Value::Array(Vec::new()),
        ]
    );

    assert!(scan.next(ReadMode::Materialize).unwrap().is_none());
}

#[test]
fn test_decode_timestamp_units_and_large_types() {
    let mut names = ListBuilder::new(StringBuilder::new());
    names.values().append_value("a");
    names.values().append_null();
    names.append(true);
    names.append(false);
    let names = names.finish();
    let counts = LargeListArray::from_iter_primitive::<Int64Type, _, _>(vec![
        Some(vec![Some(10), Some(-2)]),
        Some(vec![]),
    ]);

    let file_schema = Arc::new(Schema::new(vec![
        Field::new("at_s", DataType::Timestamp(TimeUnit::Second, None), false),
        Field::new("at_us", DataType::Timestamp(TimeUnit::Microsecond, None), false),
        Field::new("at_ns", DataType::Timestamp(TimeUnit::Nanosecond, None), false),
        Field::new("note", DataType::LargeUtf8, false),
        Field::new("raw", DataType::LargeBinary, false),
        Field::new("names", names.data_type().clone(), true),
        Field::new("counts", counts.data_type().clone(), false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(TimestampSecondArray::from(vec![946_684_800, 946_684_801])),
        Arc::new(TimestampMicrosecondArray::from(vec![946_684_800_000_007, 0])),
        // One nanosecond either side of the engine epoch
        Arc::new(TimestampNanosecondArray::from(vec![
            946_684_800_000_001_999,
            946_684_799_999_999_999,
        ])),
        Arc::new(LargeStringArray::from(vec!["größe", ""])),
        Arc::new(LargeBinaryArray::from(vec![&b"\x01\x02"[..], &b""[..]])),
        Arc::new(names),
        Arc::new(counts),
    ];
    let batch = RecordBatch::try_new(file_schema, columns).unwrap();

    let dir = TempDir::new().unwrap();
    let path = write_parquet(dir.path(), "wide.parquet", &[batch]);
    let schema = OutputRowSchema::new(vec![
        OutputColumn::new("at_s", OutputType::Timestamp),
        OutputColumn::new("at_us", OutputType::Timestamp),
        OutputColumn::new("at_ns", OutputType::Timestamp),
        OutputColumn::new("note", OutputType::Text),
        OutputColumn::new("raw", OutputType::Bytea),
        OutputColumn::new("names", OutputType::array_of(OutputType::Text)),
        OutputColumn::new("counts", OutputType::array_of(OutputType::Int64)),
    ]);

    let plan = plan_scan(&[&path], &[], &schema).unwrap();
    let mut scan = plan.open_scan(&schema, ScanConfig::default()).unwrap();

    let first = scan.next(ReadMode::Materialize).unwrap().unwrap();
    assert_eq!(
        first.to_values(),
        vec![
            Value::Timestamp(0),
            Value::Timestamp(7),
            Value::Timestamp(1),
            Value::Text("größe".to_string()),
            Value::Bytea(vec![0x01, 0x02]),
            Value::Array(vec![Value::Text("a".to_string()), Value::Null]),
            Value::Array(vec![Value::Int64(10), Value::Int64(-2)]),
        ]
    );

    let second = scan.next(ReadMode::Materialize).unwrap().unwrap();
    assert_eq!(
        second.to_values(),
        vec![
            Value::Timestamp(1_000_000),
            Value::Timestamp(-946_684_800_000_000),
            Value::Timestamp(-1),
            Value::Text(String::new()),
            Value::Bytea(Vec::new()),
            Value::Null,
            Value::Array(Vec::new()),
        ]
    );

    assert!(scan.next(ReadMode::Materialize).unwrap().is_none());
}

fn write_days(dir: &TempDir, days: Vec<i32>) -> std::path::PathBuf {
    let file_schema = Arc::new(Schema::new(vec![Field::new("day", DataType::Date32, false)]));
    let columns: Vec<ArrayRef> = vec![Arc::new(Date32Array::from(days))];
    let batch = RecordBatch::try_new(file_schema, columns).unwrap();
    write_parquet(dir.path(), "days.parquet", &[batch])
}

#[test]
fn test_dates_at_the_i32_edges_read_as_date() {
    let dir = TempDir::new().unwrap();
    let path = write_days(&dir, vec![i32::MAX, i32::MIN]);
    let schema = OutputRowSchema::new(vec![OutputColumn::new("day", OutputType::Date)]);

    let plan = plan_scan(&[&path], &[], &schema).unwrap();
    let mut scan = plan.open_scan(&schema, ScanConfig::default()).unwrap();

    let first = scan.next(ReadMode::Materialize).unwrap().unwrap();
    assert_eq!(first.to_values(), vec![Value::Date(i32::MAX - 10_957)]);

    let err = scan.next(ReadMode::Materialize).unwrap_err();
    assert!(matches!(
        err,
        ScanError::Reader(ReaderError::Decode { ref column, .. }) if column == "day"
    ));
}

#[test]
fn test_dates_at_the_i32_edges_read_as_timestamp() {
    let schema = OutputRowSchema::new(vec![OutputColumn::new("day", OutputType::Timestamp)]);

    for day in [i32::MIN, i32::MAX] {
        let dir = TempDir::new().unwrap();
        let path = write_days(&dir, vec![day]);

        let plan = plan_scan(&[&path], &[], &schema).unwrap();
        let mut scan = plan.open_scan(&schema, ScanConfig::default()).unwrap();

        let err = scan.next(ReadMode::Materialize).unwrap_err();
        assert!(matches!(
            err,
            ScanError::Reader(ReaderError::Decode { ref column, .. }) if column == "day"
        ));
    }
}

#[test]
fn test_extreme_date_literal_against_timestamp_statistics() {
    let file_schema = Arc::new(Schema::new(vec![Field::new(
        "ts",
        DataType::Timestamp(TimeUnit::Microsecond, None),
        false,
    )]));
    let columns: Vec<ArrayRef> = vec![Arc::new(TimestampMicrosecondArray::from(vec![0, 1_000]))];
    let batch = RecordBatch::try_new(file_schema, columns).unwrap();
    let dir = TempDir::new().unwrap();
    let path = write_parquet(dir.path(), "ts.parquet", &[batch]);
    let schema = OutputRowSchema::new(vec![OutputColumn::new("ts", OutputType::Timestamp)]);

    let latest = || lit(ScalarValue::Date32(Some(i32::MAX)));
    let earliest = || lit(ScalarValue::Date32(Some(i32::MIN)));

    // Nothing lies after the last representable date
    let plan = plan_scan(&[&path], &[col("ts").gt(latest())], &schema).unwrap();
    assert!(plan.files.is_empty());
    assert_eq!(plan.rows_to_read, 0);

    let plan = plan_scan(&[&path], &[col("ts").lt(latest())], &schema).unwrap();
    assert_eq!(plan.rows_to_read, 2);

    let plan = plan_scan(&[&path], &[col("ts").gt(earliest())], &schema).unwrap();
    assert_eq!(plan.rows_to_read, 2);

    let plan = plan_scan(&[&path], &[col("ts").lt_eq(earliest())], &schema).unwrap();
    assert!(plan.files.is_empty());
}

#[test]
fn test_nulls_follow_each_row_group() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(
        dir.path(),
        "people.parquet",
        &[
            people_range(0, 40..=41),
            people_batch(vec![2, 3], vec![None, Some(7)], vec![Some("x"), None]),
        ],
    );
    let schema = people_output();

    let plan = plan_scan(&[&path], &[], &schema).unwrap();
    let mut scan = plan.open_scan(&schema, ScanConfig::sequential()).unwrap();

    let mut rows = Vec::new();
    while let Some(row) = scan.next(ReadMode::Materialize).unwrap() {
        rows.push(row.to_values());
    }
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[1][1], Value::Int32(41));
    assert_eq!(rows[2][1], Value::Null);
    assert_eq!(rows[2][2], Value::Text("x".to_string()));
    assert_eq!(rows[3][1], Value::Int32(7));
    assert_eq!(rows[3][2], Value::Null);
}

#[test]
fn test_all_null_row_group_is_never_pruned() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(
        dir.path(),
        "people.parquet",
        &[people_batch(vec![1, 2], vec![None, None], vec![Some("a"), Some("b")])],
    );
    let schema = people_output();

    let plan = plan_scan(&[&path], &[col("age").gt(lit(30))], &schema).unwrap();
    assert_eq!(plan.files.len(), 1);
    assert!(plan.files[0].skip.is_empty());
    assert_eq!(plan.rows_to_read, 2);
}

#[test]
fn test_fake_mode_counts_without_decoding() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(
        dir.path(),
        "people.parquet",
        &[people_range(0, 1..=10), people_range(10, 11..=15)],
    );
    let schema = people_output();

    let plan = plan_scan(&[&path], &[], &schema).unwrap();
    let mut scan = plan.open_scan(&schema, ScanConfig::default()).unwrap();

    let mut rows = 0;
    while let Some(row) = scan.next(ReadMode::Fake).unwrap() {
        assert!(row.iter().all(|v| v.is_null()));
        rows += 1;
    }
    assert_eq!(rows, 15);
}

#[test]
fn test_rescan_restarts_private_scan() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(
        dir.path(),
        "people.parquet",
        &[people_range(0, 1..=3), people_range(3, 4..=5)],
    );
    let schema = people_output();
    let plan = plan_scan(&[&path], &[], &schema).unwrap();

    let mut scan = plan.open_scan(&schema, ScanConfig::default()).unwrap();
    let first_pass = collect_column(&mut scan, 0);
    assert!(scan.is_exhausted());

    scan.rescan().unwrap();
    assert!(!scan.is_exhausted());
    assert_eq!(collect_column(&mut scan, 0), first_pass);
    assert_eq!(first_pass, ids(0..5));
}

#[test]
fn test_rescan_with_shared_coordinator_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(dir.path(), "people.parquet", &[people_range(0, 1..=3)]);
    let schema = people_output();
    let plan = plan_scan(&[&path], &[], &schema).unwrap();

    let coordinator = Arc::new(ReadCoordinator::new());
    let mut scan = plan
        .open_worker(&schema, ScanConfig::default(), coordinator)
        .unwrap();
    assert!(matches!(scan.rescan(), Err(ScanError::Unsupported(_))));
}

#[test]
fn test_merge_strategy_orders_by_row_group_min() {
    let dir = TempDir::new().unwrap();
    let a = write_parquet(
        dir.path(),
        "a.parquet",
        &[people_range(0, 10..=20), people_range(100, 50..=60)],
    );
    let b = write_parquet(
        dir.path(),
        "b.parquet",
        &[people_range(200, 0..=5), people_range(300, 30..=40)],
    );
    let schema = people_output();
    let plan = plan_scan(&[&a, &b], &[], &schema).unwrap();

    let config = ScanConfig::default().with_strategy(ReadListStrategy::MergeByColumn {
        column: "age".to_string(),
    });
    let mut scan = plan.open_scan(&schema, config).unwrap();
    assert_eq!(
        scan.build_read_list().items(),
        &[
            RowGroupWorkItem::new(1, 0),
            RowGroupWorkItem::new(0, 0),
            RowGroupWorkItem::new(1, 1),
            RowGroupWorkItem::new(0, 1),
        ]
    );

    let ages = collect_column(&mut scan, 1);
    let first_of_each: Vec<Value> = [0, 6, 17, 28].iter().map(|&i| ages[i].clone()).collect();
    assert_eq!(
        first_of_each,
        vec![
            Value::Int32(0),
            Value::Int32(10),
            Value::Int32(30),
            Value::Int32(50)
        ]
    );
}

#[test]
fn test_parallel_and_sequential_decode_agree() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(
        dir.path(),
        "people.parquet",
        &[people_range(0, 1..=50), people_range(50, 1..=50)],
    );
    let schema = people_output();
    let plan = plan_scan(&[&path], &[], &schema).unwrap();

    let mut rows_by_config = Vec::new();
    for config in [
        ScanConfig::sequential(),
        ScanConfig::parallel(),
        ScanConfig::parallel().with_batch_size(7),
        ScanConfig::sequential().with_mmap(true),
        ScanConfig::parallel().with_mmap(true),
    ] {
        let mut scan = plan.open_scan(&schema, config).unwrap();
        let mut rows = Vec::new();
        while let Some(row) = scan.next(ReadMode::Materialize).unwrap() {
            rows.push(row.to_values());
        }
        rows_by_config.push(rows);
    }

    assert_eq!(rows_by_config[0].len(), 100);
    assert_eq!(rows_by_config[0], rows_by_config[1]);
    assert_eq!(rows_by_config[0], rows_by_config[2]);
    assert_eq!(rows_by_config[0], rows_by_config[3]);
    assert_eq!(rows_by_config[0], rows_by_config[4]);
}

#[test]
fn test_mapped_reads_follow_the_config() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(
        dir.path(),
        "people.parquet",
        &[people_range(0, 20..=24), people_range(5, 30..=34)],
    );
    let mut reader = FileReader::open_for(&path, &people_output()).unwrap();
    assert!(!reader.is_mapped());

    reader
        .buffer_row_group(1, &ScanConfig::parallel().with_mmap(true))
        .unwrap();
    assert!(reader.is_mapped());
    assert_eq!(reader.read_row(0, 0).unwrap(), Value::Int64(5));
    assert_eq!(reader.read_row(4, 1).unwrap(), Value::Int32(34));

    reader.buffer_row_group(0, &ScanConfig::sequential()).unwrap();
    assert!(!reader.is_mapped());
    assert_eq!(reader.read_row(0, 1).unwrap(), Value::Int32(20));
}

#[test]
fn test_read_row_random_access() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(dir.path(), "people.parquet", &[people_range(0, 20..=29)]);
    let schema = people_output();
    let plan = plan_scan(&[&path], &[], &schema).unwrap();
    let mut scan = plan.open_scan(&schema, ScanConfig::default()).unwrap();

    assert!(scan.read_row(0, 0).is_err());

    scan.next(ReadMode::Materialize).unwrap().unwrap();
    assert_eq!(scan.read_row(7, 0).unwrap(), Value::Int64(7));
    assert_eq!(scan.read_row(7, 2).unwrap(), Value::Text("p7".to_string()));

    // Random access does not move the cursor
    let row = scan.next(ReadMode::Materialize).unwrap().unwrap();
    assert_eq!(row.get_by_name("ID").map(|v| v.to_string()), Some("1".to_string()));
}

#[test]
fn test_plan_survives_json_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(
        dir.path(),
        "people.parquet",
        &[people_range(0, 10..=17), people_range(8, 18..=60)],
    );
    let schema = people_output();
    let plan = plan_scan(&[&path], &[col("age").gt_eq(lit(18))], &schema).unwrap();

    let json = plan.to_json().unwrap();
    let restored = ScanPlan::from_json(&json).unwrap();
    assert_eq!(restored, plan);
    assert_eq!(restored.row_groups_to_read(0), Some(vec![1]));

    let explain = restored.to_string();
    assert!(explain.contains("Row groups: 2"));
    assert!(explain.contains("Rows: 43 of 51 (1 filter(s))"));
}

#[test]
fn test_schema_drift_between_files() {
    let dir = TempDir::new().unwrap();
    let a = write_parquet(dir.path(), "a.parquet", &[people_range(0, 1..=3)]);

    let other = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("age", DataType::Int64, true),
        Field::new("name", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(
        other,
        vec![
            Arc::new(Int64Array::from(vec![1])),
            Arc::new(Int64Array::from(vec![Some(40)])),
            Arc::new(StringArray::from(vec![Some("z")])),
        ],
    )
    .unwrap();
    let b = write_parquet(dir.path(), "b.parquet", &[batch]);

    let err = plan_scan(&[&a, &b], &[], &people_output()).unwrap_err();
    match err {
        ScanError::SchemaDrift { path, first } => {
            assert_eq!(path, b);
            assert_eq!(first, a);
        }
        other => panic!("expected schema drift, got {:?}", other),
    }
}

#[test]
fn test_file_with_every_row_group_pruned_is_dropped() {
    let dir = TempDir::new().unwrap();
    let a = write_parquet(dir.path(), "a.parquet", &[people_range(0, 30..=40)]);
    let b = write_parquet(
        dir.path(),
        "b.parquet",
        &[people_range(11, 1..=10), people_range(21, 2..=29)],
    );
    let schema = people_output();

    let plan = plan_scan(&[&a, &b], &[col("age").gt(lit(30))], &schema).unwrap();
    assert_eq!(plan.files.len(), 1);
    assert_eq!(plan.files[0].path, a);
    assert_eq!(plan.skipped_files, vec![b]);

    let mut scan = plan.open_scan(&schema, ScanConfig::default()).unwrap();
    assert_eq!(scan.num_files(), 1);
    assert_eq!(collect_column(&mut scan, 0).len(), 11);
}

#[test]
fn test_literal_on_left_is_commuted() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(
        dir.path(),
        "people.parquet",
        &[people_range(0, 10..=17), people_range(8, 18..=60)],
    );
    let schema = people_output();

    // 18 > age  <=>  age < 18
    let plan = plan_scan(&[&path], &[lit(18).gt(col("age"))], &schema).unwrap();
    assert_eq!(plan.files[0].skip, BTreeSet::from([1]));
}

#[test]
fn test_filter_on_unknown_column_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(dir.path(), "people.parquet", &[people_range(0, 1..=3)]);

    let err = plan_scan(&[&path], &[col("height").gt(lit(2))], &people_output()).unwrap_err();
    assert!(matches!(err, ScanError::Filter(_)));
}

#[test]
fn test_nested_struct_column_is_rejected() {
    let address = StructArray::from(vec![(
        Arc::new(Field::new("city", DataType::Utf8, false)),
        Arc::new(StringArray::from(vec!["Oslo"])) as ArrayRef,
    )]);
    let file_schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("address", address.data_type().clone(), false),
    ]));
    let batch = RecordBatch::try_new(
        file_schema.clone(),
        vec![Arc::new(Int64Array::from(vec![1])), Arc::new(address)],
    )
    .unwrap();

    let dir = TempDir::new().unwrap();
    let path = write_parquet(dir.path(), "nested.parquet", &[batch]);

    let (derived, unsupported) = OutputRowSchema::from_arrow_schema(&file_schema);
    assert_eq!(derived.len(), 1);
    assert_eq!(unsupported, vec!["address".to_string()]);

    let schema = OutputRowSchema::new(vec![
        OutputColumn::new("id", OutputType::Int64),
        OutputColumn::new("address", OutputType::Text),
    ]);
    let err = FileReader::open_for(&path, &schema).unwrap_err();
    assert!(matches!(err, ReaderError::UnsupportedNesting { ref column, .. } if column == "address"));
}

#[test]
fn test_type_mismatch_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(dir.path(), "people.parquet", &[people_range(0, 1..=3)]);
    let schema = OutputRowSchema::new(vec![OutputColumn::new("name", OutputType::Int32)]);

    let err = FileReader::open_for(&path, &schema).unwrap_err();
    assert!(matches!(err, ReaderError::TypeMismatch { ref column, .. } if column == "name"));
}

#[test]
fn test_sample_rows_at_fixed_stride() {
    let dir = TempDir::new().unwrap();
    let a = write_parquet(dir.path(), "a.parquet", &[people_range(0, 1..=60)]);
    let b = write_parquet(dir.path(), "b.parquet", &[people_range(60, 1..=40)]);
    let schema = people_output().with_used(&["id"]);

    let sample = sample_rows(&[&a, &b], &schema, 10, ScanConfig::default()).unwrap();
    assert_eq!(sample.total_rows, 100);
    let sampled: Vec<Value> = sample.rows.iter().map(|row| row[0].clone()).collect();
    assert_eq!(sampled, (0..10).map(|i| Value::Int64(i * 10)).collect::<Vec<_>>());
    // Sampling reads every column, not just the used ones
    assert_eq!(sample.rows[1][2], Value::Text("p10".to_string()));

    let everything = sample_rows(&[&a], &schema, 1_000, ScanConfig::default()).unwrap();
    assert_eq!(everything.rows.len(), 60);

    let none: &[std::path::PathBuf] = &[];
    assert!(sample_rows(none, &schema, 10, ScanConfig::default()).is_err());
}
