//! PostgreSQL bulk paths.
//!
//! Export shells out to `psql` and pipes `\copy ... TO STDOUT` through the
//! CSV decoder; import drives the server's COPY protocol over the pooled
//! connection. Both fall back to the cursor paths when unavailable.

use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::core::{split_table_name, textual, Value};
use crate::csvio::CsvSource;
use crate::error::{Result, TransferError};
use crate::redact::redact;
use crate::stream::RowStream;

use super::{find_on_path, Adapter};

/// Bulk export via `psql \copy ... TO STDOUT WITH CSV HEADER`. Falls back
/// to the cursor when the client is not on PATH.
pub async fn bulk_export(adapter: &Adapter, sql: &str) -> Result<RowStream> {
    if find_on_path("psql").is_none() {
        info!("psql not found on PATH, using cursor");
        return adapter.stream_rows(sql).await;
    }

    let copy_query = format!(
        r#"\copy ( {} ) TO STDOUT WITH CSV HEADER DELIMITER ',' QUOTE '"' ESCAPE '"'"#,
        sql.replace('\n', " ")
    );

    let mut child = Command::new("psql")
        .arg(adapter.url())
        .arg("-X")
        .arg("-c")
        .arg(&copy_query)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| TransferError::Io(std::io::Error::other("psql stdout unavailable")))?;
    let mut stderr = child.stderr.take();

    // Surface a redacted command line if the client exits with failure.
    let argv = redact(
        &format!("psql {} -X -c {}", adapter.url(), copy_query),
        adapter.secrets(),
    );
    tokio::spawn(async move {
        let mut err_text = String::new();
        if let Some(stderr) = stderr.as_mut() {
            let _ = stderr.read_to_string(&mut err_text).await;
        }
        match child.wait().await {
            Ok(status) if status.success() => {}
            Ok(_) | Err(_) => {
                warn!(
                    "{}",
                    TransferError::ExternalProcessFailed {
                        argv,
                        stderr: err_text.trim().to_string(),
                    }
                );
            }
        }
    });

    CsvSource::from_async(stdout)
        .with_sample_size(adapter.config().sample_size)
        .stream(adapter.cancel_token().child_token())
        .await
}

/// Bulk import through `COPY table (cols) FROM STDIN` on the pooled
/// connection, inside one transaction. Commits on success; any error
/// aborts the copy and rolls back.
pub async fn bulk_import(
    adapter: &Adapter,
    table_full_name: &str,
    stream: &mut RowStream,
) -> Result<u64> {
    let pool = adapter
        .db()?
        .as_postgres()
        .ok_or_else(|| TransferError::BadState {
            state: "non-postgres pool".to_string(),
            operation: "copy".to_string(),
        })?;

    let (schema, table) = split_table_name(table_full_name);
    let target = if schema.is_empty() {
        table.clone()
    } else {
        format!("{}.{}", schema, table)
    };
    let fields: Vec<String> = stream.columns.iter().map(|c| c.name.clone()).collect();
    let copy_sql = format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv)",
        target,
        fields.join(", ")
    );

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| TransferError::query(e, &copy_sql, adapter.secrets()))?;
    let mut copy = tx
        .copy_in_raw(&copy_sql)
        .await
        .map_err(|e| TransferError::query(e, &copy_sql, adapter.secrets()))?;

    let mut count = 0u64;
    let mut buf: Vec<u8> = Vec::with_capacity(16 * 1024);
    let flush_at = 8 * 1024;
    let mut failed: Option<TransferError> = None;

    loop {
        let Some(row) = stream.next().await else {
            break;
        };
        if let Err(e) = encode_copy_row(&row, &mut buf) {
            failed = Some(e);
            break;
        }
        count += 1;
        if buf.len() >= flush_at {
            if let Err(e) = copy.send(std::mem::take(&mut buf)).await {
                failed = Some(TransferError::query(e, &copy_sql, adapter.secrets()));
                break;
            }
        }
    }

    if failed.is_none() && !buf.is_empty() {
        if let Err(e) = copy.send(buf).await {
            failed = Some(TransferError::query(e, &copy_sql, adapter.secrets()));
        }
    }

    if let Some(e) = failed {
        let _ = copy.abort("import failed").await;
        let _ = tx.rollback().await;
        info!("copy rolled back after {} rows", count);
        return Err(e);
    }

    if let Err(e) = copy.finish().await {
        let _ = tx.rollback().await;
        info!("copy rolled back after {} rows", count);
        return Err(TransferError::query(e, &copy_sql, adapter.secrets()));
    }
    tx.commit()
        .await
        .map_err(|e| TransferError::query(e, &copy_sql, adapter.secrets()))?;

    debug!("copied {} rows into {}", count, target);
    Ok(count)
}

/// Append one row in COPY csv form; empty cell is NULL.
fn encode_copy_row(row: &[Value], buf: &mut Vec<u8>) -> Result<()> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(row.iter().map(|v| match v {
        Value::Null => String::new(),
        other => textual(other),
    }))?;
    let line = w
        .into_inner()
        .map_err(|e| TransferError::Io(std::io::Error::other(e.to_string())))?;
    buf.extend_from_slice(&line);
    Ok(())
}
