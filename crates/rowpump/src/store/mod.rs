//! Object-store gateway for warehouse staging.
//!
//! A thin surface over an S3-compatible service: multipart upload, streamed
//! download, prefix listing and prefix deletion. Credentials come from the
//! environment; one client is built per gateway.

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, WriteMultipart};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::error::{Result, TransferError};

/// Upload part size.
const UPLOAD_CHUNK: usize = 8 * 1024 * 1024;

/// Concurrent in-flight parts per upload.
const UPLOAD_CONCURRENCY: usize = 10;

/// Listing cap, far above any sane part count.
const MAX_KEYS: usize = 100_000;

/// One bucket on an S3-compatible service.
pub struct ObjectStoreGateway {
    store: object_store::aws::AmazonS3,
    bucket: String,
}

impl ObjectStoreGateway {
    /// Build a gateway for `bucket`. Credentials and, when present, the
    /// region are read from the environment; without a region the default
    /// region is assumed.
    pub fn new(bucket: &str) -> Result<ObjectStoreGateway> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        let has_region = std::env::var("AWS_REGION")
            .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
            .map(|r| !r.is_empty())
            .unwrap_or(false);
        if !has_region {
            builder = builder.with_region("us-east-1");
        }
        let store = builder
            .build()
            .map_err(|e| TransferError::object_store("init", bucket, e))?;
        Ok(ObjectStoreGateway {
            store,
            bucket: bucket.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload a byte stream under `key` with a concurrent multipart upload.
    pub async fn write_stream(
        &self,
        key: &str,
        mut reader: impl AsyncRead + Unpin,
    ) -> Result<()> {
        let path = StorePath::from(key);
        let upload = self
            .store
            .put_multipart(&path)
            .await
            .map_err(|e| TransferError::object_store("upload", key, e))?;
        let mut write = WriteMultipart::new_with_chunk_size(upload, UPLOAD_CHUNK);

        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| TransferError::object_store("upload", key, e))?;
            if n == 0 {
                break;
            }
            write
                .wait_for_capacity(UPLOAD_CONCURRENCY)
                .await
                .map_err(|e| TransferError::object_store("upload", key, e))?;
            write.write(&buf[..n]);
        }
        write
            .finish()
            .await
            .map_err(|e| TransferError::object_store("upload", key, e))?;
        debug!("uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }

    /// Upload an in-memory object under `key`.
    pub async fn write_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = StorePath::from(key);
        self.store
            .put(&path, Bytes::from(bytes).into())
            .await
            .map_err(|e| TransferError::object_store("upload", key, e))?;
        debug!("uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }

    /// Stream an object's bytes.
    pub async fn read_stream(&self, key: &str) -> Result<impl AsyncRead + Send + Unpin> {
        let path = StorePath::from(key);
        let result = self
            .store
            .get(&path)
            .await
            .map_err(|e| TransferError::object_store("download", key, e))?;
        let stream = result
            .into_stream()
            .map_err(|e| std::io::Error::other(e.to_string()));
        Ok(StreamReader::new(stream))
    }

    /// List keys under a prefix, lexicographically sorted.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let path = StorePath::from(prefix);
        let mut keys: Vec<String> = self
            .store
            .list(Some(&path))
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await
            .map_err(|e| TransferError::object_store("list", prefix, e))?;
        keys.sort();
        keys.truncate(MAX_KEYS);
        Ok(keys)
    }

    /// Delete every object under a prefix, then confirm absence.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let keys = self.list(prefix).await?;
        for key in &keys {
            let path = StorePath::from(key.as_str());
            self.store
                .delete(&path)
                .await
                .map_err(|e| TransferError::object_store("delete", key, e))?;
        }
        for key in &keys {
            let path = StorePath::from(key.as_str());
            match self.store.head(&path).await {
                Err(object_store::Error::NotFound { .. }) => {}
                Ok(_) => {
                    return Err(TransferError::object_store(
                        "delete",
                        key,
                        "object still present after delete",
                    ));
                }
                Err(e) => return Err(TransferError::object_store("delete", key, e)),
            }
        }
        debug!("deleted {} objects under {}", keys.len(), prefix);
        Ok(())
    }
}
