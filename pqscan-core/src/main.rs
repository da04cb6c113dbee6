/// pqscan - scan parquet files with row-group pruning and parallel workers
///
/// Run with: cargo run --bin pqscan -- data/*.parquet --filter "age > 30" --workers 4
use clap::Parser;
use datafusion::common::{Column, DFSchema};
use datafusion::logical_expr::utils::expr_to_columns;
use datafusion::logical_expr::Expr;
use datafusion::prelude::SessionContext;
use pqscan_core::{
    plan_scan, sample_rows, FileReader, OutputRowSchema, ReadCoordinator, ReadMode, ScanConfig,
    ScanError,
};
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Scan parquet files as one table.
///
/// Filters are used to skip row groups whose statistics prove no row can
/// match; rows inside the remaining row groups are not re-checked.
#[derive(Parser, Debug)]
#[command(name = "pqscan", version, about)]
struct Args {
    /// Parquet files, scanned in the order given. All must share one schema.
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// Columns to output, comma separated (default: all).
    #[arg(short, long, value_delimiter = ',')]
    columns: Vec<String>,

    /// SQL restriction used for pruning, e.g. "age > 30". Repeatable.
    #[arg(short, long = "filter", value_name = "SQL")]
    filters: Vec<String>,

    /// Worker threads sharing one work list.
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    /// Stop after this many rows.
    #[arg(long)]
    limit: Option<u64>,

    /// Print the number of rows instead of the rows.
    #[arg(long)]
    count: bool,

    /// Print the row groups that would be read and the row estimate.
    #[arg(long)]
    explain: bool,

    /// Print about N rows spread evenly over all files.
    #[arg(long, value_name = "N")]
    sample: Option<usize>,

    /// Decode the columns of a row group one at a time.
    #[arg(long)]
    no_threads: bool,

    /// Rows per decoded batch.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Read files through a memory mapping.
    #[arg(long)]
    mmap: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = if args.no_threads {
        ScanConfig::sequential()
    } else {
        ScanConfig::parallel()
    }
    .with_mmap(args.mmap);
    if let Some(rows) = args.batch_size {
        config = config.with_batch_size(rows);
    }

    // 1. Row layout comes from the first file
    let first = FileReader::open(&args.files[0])?;
    let (full_schema, unsupported) = OutputRowSchema::from_arrow_schema(first.schema());
    for name in &unsupported {
        warn!(column = %name, "column has no output type, leaving it out");
    }

    if let Some(target) = args.sample {
        let sample = sample_rows(&args.files, &full_schema, target, config)?;
        let mut out = std::io::stdout().lock();
        for row in &sample.rows {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(out, "{}", line.join("|"))?;
        }
        info!(sampled = sample.rows.len(), total_rows = sample.total_rows, "sample done");
        return Ok(());
    }

    // 2. Parse filters against the file schema
    let df_schema = DFSchema::try_from(first.schema().as_ref().clone())?;
    let ctx = SessionContext::new();
    let clauses = args
        .filters
        .iter()
        .map(|sql| ctx.parse_sql_expr(sql, &df_schema))
        .collect::<datafusion::error::Result<Vec<Expr>>>()?;

    // 3. Output columns, plus whatever the filters reference
    let selected: Vec<String> = if args.columns.is_empty() {
        full_schema.columns().iter().map(|c| c.name.clone()).collect()
    } else {
        args.columns.clone()
    };
    let mut projection = Vec::with_capacity(selected.len());
    for name in &selected {
        let index = full_schema
            .index_of(name)
            .ok_or_else(|| format!("unknown or unsupported column '{}'", name))?;
        projection.push(index);
    }

    let mut referenced: HashSet<Column> = HashSet::new();
    for clause in &clauses {
        expr_to_columns(clause, &mut referenced)?;
    }
    let mut used: Vec<String> = if args.count { Vec::new() } else { selected.clone() };
    used.extend(referenced.into_iter().map(|c| c.name));
    let schema = full_schema.with_used(&used);

    // 4. Plan once, then let every worker open its own readers
    let plan = plan_scan(&args.files, &clauses, &schema)?;
    if args.explain {
        println!("{}", plan);
        return Ok(());
    }

    let coordinator = Arc::new(ReadCoordinator::new());
    let emitted = AtomicU64::new(0);
    let limit = args.limit.unwrap_or(u64::MAX);
    let workers = args.workers.max(1);

    let count_only = args.count;
    let mode = if count_only {
        ReadMode::Fake
    } else {
        ReadMode::Materialize
    };
    let scans = (0..workers)
        .map(|_| plan.open_worker(&schema, config.clone(), coordinator.clone()))
        .collect::<Result<Vec<_>, ScanError>>()?;

    let results: Vec<Result<u64, ScanError>> = std::thread::scope(|s| {
        let handles: Vec<_> = scans
            .into_iter()
            .map(|mut scan| {
                let projection = &projection;
                let emitted = &emitted;
                s.spawn(move || -> Result<u64, ScanError> {
                    let mut rows = 0u64;

                    while let Some(row) = scan.next(mode)? {
                        if emitted.fetch_add(1, Ordering::Relaxed) >= limit {
                            break;
                        }
                        rows += 1;
                        if count_only {
                            continue;
                        }
                        let line: Vec<String> = projection
                            .iter()
                            .map(|&i| row.get(i).map(|v| v.to_string()).unwrap_or_default())
                            .collect();
                        let mut out = std::io::stdout().lock();
                        if writeln!(out, "{}", line.join("|")).is_err() {
                            break;
                        }
                    }
                    Ok(rows)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|_| {
                    Err(ScanError::Unsupported("worker thread panicked".to_string()))
                })
            })
            .collect()
    });

    let mut total = 0;
    for result in results {
        total += result?;
    }

    if args.count {
        println!("{}", total);
    }
    info!(rows = total, workers, "scan done");
    Ok(())
}
