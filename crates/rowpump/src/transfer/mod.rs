//! One-shot transfers composing a source with a target.
//!
//! Every mode builds a row stream on the source side and hands it to the
//! target's bulk import; the stream is the only coupling. Target tables
//! are optionally recreated from DDL synthesized out of the stream's
//! prelude, or truncated, before rows flow.

use std::io::Read;
use std::time::{Duration, Instant};

use tokio::io::AsyncWrite;
use tracing::info;

use crate::adapter::Adapter;
use crate::csvio::{write_csv, CsvSource};
use crate::error::Result;
use crate::stream::RowStream;

/// Settings for one transfer invocation.
#[derive(Debug, Clone, Default)]
pub struct TransferConfig {
    pub src_db: Option<String>,
    pub tgt_db: Option<String>,
    pub src_table: String,
    pub tgt_table: String,
    /// When set, the file's contents replace `select * from src_table`.
    pub sql_file: Option<std::path::PathBuf>,
    /// Nonzero wraps the source query with the vendor limit fragment.
    pub limit: u64,
    /// Drop and recreate the target from inferred DDL. Wins over truncate.
    pub drop: bool,
    /// Truncate the target before appending.
    pub truncate: bool,
    pub s3_bucket: Option<String>,
}

/// Outcome of one transfer phase.
#[derive(Debug, Clone)]
pub struct TransferStats {
    pub rows: u64,
    pub elapsed: Duration,
}

impl TransferStats {
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.rows as f64 / secs).round()
        } else {
            0.0
        }
    }
}

/// The source query: the SQL file's contents when given, otherwise
/// `select * from src_table`, wrapped by the vendor limit when nonzero.
fn source_sql(adapter: &Adapter, cfg: &TransferConfig) -> Result<String> {
    let sql = match &cfg.sql_file {
        Some(path) => std::fs::read_to_string(path)?,
        None => format!("select * from {}", cfg.src_table),
    };
    if cfg.limit > 0 {
        Ok(adapter.limit_sql(&cfg.src_table, "*", cfg.limit))
    } else {
        Ok(sql)
    }
}

/// Recreate, truncate, or leave the target table per configuration.
/// Recreation synthesizes DDL from the stream's prelude and columns.
async fn prepare_target(
    target: &Adapter,
    cfg: &TransferConfig,
    stream: &RowStream,
) -> Result<()> {
    if cfg.drop {
        let mut sample = stream.prelude_dataset();
        let ddl = target.generate_ddl(&cfg.tgt_table, &mut sample)?;
        target.drop_table(&[cfg.tgt_table.as_str()]).await?;
        target.execute(&ddl).await?;
        info!("(re)created table {}", cfg.tgt_table);
    } else if cfg.truncate {
        target.truncate_table(&cfg.tgt_table).await?;
        info!("truncated table {}", cfg.tgt_table);
    }
    Ok(())
}

/// Database to database.
pub async fn run_db_to_db(cfg: &TransferConfig) -> Result<TransferStats> {
    let started = Instant::now();

    let src_url = cfg.src_db.clone().unwrap_or_default();
    let tgt_url = cfg.tgt_db.clone().unwrap_or_default();
    let mut source = Adapter::new(&src_url)?;
    let mut target = Adapter::new(&tgt_url)?;
    source.connect().await?;
    target.connect().await?;

    if let Some(bucket) = &cfg.s3_bucket {
        source.set_prop("s3Bucket", bucket);
        target.set_prop("s3Bucket", bucket);
    }

    let sql = source_sql(&source, cfg)?;
    let mut stream = source.bulk_export_stream(&sql).await?;
    prepare_target(&target, cfg, &stream).await?;

    let rows = target.bulk_import_stream(&cfg.tgt_table, &mut stream).await?;
    let stats = TransferStats {
        rows,
        elapsed: started.elapsed(),
    };
    info!("inserted {} rows [{} r/s]", stats.rows, stats.rate());

    source.close().await?;
    target.close().await?;
    Ok(stats)
}

/// CSV byte source (stdin or a file) into a database.
pub async fn run_csv_to_db(
    cfg: &TransferConfig,
    reader: Box<dyn Read + Send>,
) -> Result<TransferStats> {
    let started = Instant::now();

    let tgt_url = cfg.tgt_db.clone().unwrap_or_default();
    let mut target = Adapter::new(&tgt_url)?;
    target.connect().await?;
    if let Some(bucket) = &cfg.s3_bucket {
        target.set_prop("s3Bucket", bucket);
    }

    let mut stream = CsvSource::from_reader(reader)
        .with_sample_size(target.config().sample_size)
        .stream(target.cancel_token().child_token())
        .await?;

    prepare_target(&target, cfg, &stream).await?;

    info!("streaming inserts into {}", cfg.tgt_table);
    let rows = target.bulk_import_stream(&cfg.tgt_table, &mut stream).await?;
    let stats = TransferStats {
        rows,
        elapsed: started.elapsed(),
    };
    info!("inserted {} rows [{} r/s]", stats.rows, stats.rate());

    target.close().await?;
    Ok(stats)
}

/// Database onto a CSV byte sink (stdout).
pub async fn run_db_to_csv(
    cfg: &TransferConfig,
    writer: &mut (impl AsyncWrite + Unpin),
) -> Result<TransferStats> {
    let started = Instant::now();

    let src_url = cfg.src_db.clone().unwrap_or_default();
    let mut source = Adapter::new(&src_url)?;
    source.connect().await?;
    if let Some(bucket) = &cfg.s3_bucket {
        source.set_prop("s3Bucket", bucket);
    }

    let sql = source_sql(&source, cfg)?;
    let mut stream = source.bulk_export_stream(&sql).await?;
    let (rows, _exhausted) = write_csv(&mut stream, writer, 0).await?;
    let stats = TransferStats {
        rows,
        elapsed: started.elapsed(),
    };
    info!("wrote {} rows [{} r/s]", stats.rows, stats.rate());

    source.close().await?;
    Ok(stats)
}
