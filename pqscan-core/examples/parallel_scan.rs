use arrow::array::{ArrayRef, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::{col, lit};
use parquet::arrow::ArrowWriter;
use pqscan_core::storage::ValueRef;
use pqscan_core::{
    plan_scan, FileReader, OutputRowSchema, ReadCoordinator, ReadMode, ScanConfig, ScanError,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Write one file with `row_groups` row groups of `rows` rows each; ages
/// rise with the row group so pruning has something to do
fn write_file(
    path: &Path,
    first_id: i64,
    row_groups: i32,
    rows: i32,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("age", DataType::Int32, false),
        Field::new("city", DataType::Utf8, true),
    ]));
    let mut writer = ArrowWriter::try_new(File::create(path)?, schema.clone(), None)?;
    let cities = ["Oslo", "Lima", "Pune", "Kyiv"];

    for rg in 0..row_groups {
        let base = first_id + (rg * rows) as i64;
        let ids: Vec<i64> = (0..rows as i64).map(|i| base + i).collect();
        let ages: Vec<i32> = (0..rows).map(|i| rg * 20 + i % 20).collect();
        let city: Vec<Option<&str>> = (0..rows as usize)
            .map(|i| if i % 7 == 0 { None } else { Some(cities[i % cities.len()]) })
            .collect();

        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(Int32Array::from(ages)),
            Arc::new(StringArray::from(city)),
        ];
        writer.write(&RecordBatch::try_new(schema.clone(), columns)?)?;
        writer.flush()?;
    }
    writer.close()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("🔎 pqscan Parallel Scan Example\n");

    let data_dir = PathBuf::from("./pqscan_data");
    std::fs::create_dir_all(&data_dir)?;

    let files = vec![data_dir.join("people_0.parquet"), data_dir.join("people_1.parquet")];
    write_file(&files[0], 0, 4, 1_000)?;
    write_file(&files[1], 4_000, 3, 1_000)?;
    println!("✅ Wrote {} files\n", files.len());

    let (schema, _) = {
        let reader = FileReader::open(&files[0])?;
        OutputRowSchema::from_arrow_schema(reader.schema())
    };
    let schema = schema.with_used(&["id", "age"]);

    // Ages 0..19 live in row group 0 of each file; everything else can go
    let clauses = vec![col("age").gt_eq(lit(20))];
    let plan = plan_scan(&files, &clauses, &schema)?;
    println!("📋 Plan:\n{}\n", plan);

    let coordinator = Arc::new(ReadCoordinator::new());
    let workers = 3;
    let scans = (0..workers)
        .map(|_| plan.open_worker(&schema, ScanConfig::default(), coordinator.clone()))
        .collect::<Result<Vec<_>, ScanError>>()?;

    let counts: Vec<Result<(u64, i32), ScanError>> = std::thread::scope(|s| {
        let handles: Vec<_> = scans
            .into_iter()
            .map(|mut scan| {
                s.spawn(move || -> Result<(u64, i32), ScanError> {
                    let mut rows = 0u64;
                    let mut min_age = i32::MAX;
                    while let Some(row) = scan.next(ReadMode::Materialize)? {
                        if let Some(ValueRef::Int32(age)) = row.get_by_name("age") {
                            min_age = min_age.min(age);
                        }
                        rows += 1;
                    }
                    Ok((rows, min_age))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(ScanError::Unsupported("worker panicked".into())))
            })
            .collect()
    });

    let mut total = 0;
    for (worker, result) in counts.into_iter().enumerate() {
        let (rows, min_age) = result?;
        println!("  Worker {}: {} rows (youngest {})", worker, rows, min_age);
        total += rows;
    }

    println!("\n✨ Scanned {} of {} rows", total, plan.total_rows);
    Ok(())
}
