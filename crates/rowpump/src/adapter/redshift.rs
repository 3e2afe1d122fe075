//! Redshift bulk paths, staged through an object store.
//!
//! Export issues `UNLOAD` to a bucket prefix and fans the resulting parts
//! into one shared output stream: each part gets a worker that downloads,
//! gunzips and decodes CSV, forwarding rows as they come. Rows from
//! different parts interleave without order guarantee; order holds within
//! a part. Import partitions the input stream into gzip CSV chunks,
//! uploads them concurrently, then issues `COPY ... FROM 's3://...'`.

use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::core::Column;
use crate::csvio::{encode_chunk, CsvSource};
use crate::error::{Result, TransferError};
use crate::store::ObjectStoreGateway;
use crate::stream::RowStream;
use crate::template::render;

use super::Adapter;

fn gateway(adapter: &Adapter) -> Result<ObjectStoreGateway> {
    let bucket = adapter.get_prop("s3Bucket");
    if bucket.is_empty() {
        return Err(TransferError::ObjectStoreError {
            op: "init".to_string(),
            key: String::new(),
            message: "set 's3Bucket' to stage Redshift transfers".to_string(),
        });
    }
    ObjectStoreGateway::new(&bucket)
}

fn aws_credentials() -> Result<(String, String)> {
    let id = std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default();
    let key = std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default();
    if id.is_empty() || key.is_empty() {
        return Err(TransferError::ObjectStoreError {
            op: "credentials".to_string(),
            key: String::new(),
            message: "set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY for Redshift transfers"
                .to_string(),
        });
    }
    Ok((id, key))
}

/// Issue `UNLOAD` for a query; returns the staging prefix that holds the
/// resulting parts.
async fn unload(adapter: &Adapter, store: &ObjectStoreGateway, sql: &str) -> Result<String> {
    let (aws_id, aws_key) = aws_credentials()?;
    let epoch_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let prefix = format!("sling/stream/{}.csv", epoch_ms);

    store.delete_prefix(&prefix).await?;

    // UNLOAD takes the query as a quoted literal.
    let quoted = sql.replace('\n', " ").replace('\'', "''");
    let unload_sql = render(
        &adapter.template().require("core.unload")?,
        &[
            ("sql", &quoted),
            ("s3_bucket", store.bucket()),
            ("s3_path", &prefix),
            ("aws_access_key_id", &aws_id),
            ("aws_secret_access_key", &aws_key),
        ],
    );
    adapter.execute(&unload_sql).await?;
    info!("unloaded to s3://{}/{}", store.bucket(), prefix);
    Ok(prefix)
}

/// Fan-in export: one worker per unloaded part, bounded by the adapter's
/// `max_workers`, all feeding one output stream. The first worker to learn
/// the columns publishes them; the output closes only when every worker is
/// done. Zero parts close the stream immediately.
pub async fn bulk_export(adapter: &Adapter, sql: &str) -> Result<RowStream> {
    let store = Arc::new(gateway(adapter)?);
    let prefix = unload(adapter, &store, sql).await?;
    let parts = store.list(&prefix).await?;

    let (sender, mut stream) = RowStream::channel(
        adapter.config().fanin_capacity,
        adapter.cancel_token().child_token(),
    );

    let (cols_tx, cols_rx) = oneshot::channel::<Vec<Column>>();
    let cols_slot = Arc::new(Mutex::new(Some(cols_tx)));
    let semaphore = Arc::new(Semaphore::new(adapter.config().max_workers));
    let sample_size = adapter.config().sample_size;

    let mut workers = JoinSet::new();
    for part in parts {
        let store = Arc::clone(&store);
        let cols_slot = Arc::clone(&cols_slot);
        let semaphore = Arc::clone(&semaphore);
        let sender = sender.clone();
        let cancel = stream.cancel_token();

        workers.spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return;
            };
            let reader = match store.read_stream(&part).await {
                Ok(r) => r,
                Err(e) => {
                    warn!("{}", e);
                    return;
                }
            };
            let part_stream = CsvSource::from_async(reader)
                .with_sample_size(sample_size)
                .stream(cancel)
                .await;
            let mut part_stream = match part_stream {
                Ok(s) => s,
                Err(e) => {
                    warn!("could not decode part {}: {}", part, e);
                    return;
                }
            };

            if let Some(tx) = cols_slot.lock().expect("columns slot poisoned").take() {
                let _ = tx.send(part_stream.columns.clone());
            }

            // Rows interleave across parts; order holds within this one.
            while let Some(row) = part_stream.next().await {
                if !sender.send(row).await {
                    return;
                }
            }
        });
    }

    tokio::spawn(async move {
        while workers.join_next().await.is_some() {}
        // No part ever published columns (zero parts, or all failed):
        // release the slot so the consumer stops waiting.
        drop(cols_slot.lock().expect("columns slot poisoned").take());
        sender.finish();
    });

    if let Ok(columns) = cols_rx.await {
        stream.columns = columns;
    }
    Ok(stream)
}

/// Staged import: gzip CSV chunks of `file_row_limit` rows uploaded
/// concurrently, then one `COPY ... FROM 's3://...'`.
pub async fn bulk_import(
    adapter: &Adapter,
    table_full_name: &str,
    stream: &mut RowStream,
) -> Result<u64> {
    let store = Arc::new(gateway(adapter)?);
    let (aws_id, aws_key) = aws_credentials()?;
    let prefix = format!("sling/{}.csv", table_full_name);

    store.delete_prefix(&prefix).await?;

    let mut uploads = JoinSet::new();
    let mut part_no = 0u32;
    let mut count = 0u64;
    loop {
        part_no += 1;
        let (bytes, rows, exhausted) =
            encode_chunk(stream, adapter.config().file_row_limit, true).await?;
        count += rows;

        // Upload off the row path so ingress is not stalled.
        let key = format!("{}/{:04}.gz", prefix, part_no);
        let store2 = Arc::clone(&store);
        uploads.spawn(async move { store2.write_bytes(&key, bytes).await });

        if exhausted {
            break;
        }
    }

    while let Some(res) = uploads.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(e) => return Err(TransferError::Io(std::io::Error::other(e.to_string()))),
        }
    }

    let copy_sql = render(
        &adapter.template().require("core.copy_from_s3")?,
        &[
            ("tgt_table", table_full_name),
            ("s3_bucket", store.bucket()),
            ("s3_path", &prefix),
            ("aws_access_key_id", &aws_id),
            ("aws_secret_access_key", &aws_key),
        ],
    );
    adapter.execute(&copy_sql).await?;

    info!(
        "copied {} rows into {} from s3://{}/{}",
        count,
        table_full_name,
        store.bucket(),
        prefix
    );
    Ok(count)
}
