//! CSV encode/decode against row streams.
//!
//! The reader peeks two bytes to auto-detect gzip, takes the first record as
//! the header, samples up to the inference window into the stream prelude,
//! runs type inference, and only then publishes rows downstream. The writer
//! renders values through [`textual`] and flushes after every row.
//!
//! Decoding is synchronous (`csv` + `flate2`) and runs under
//! `spawn_blocking`; async byte sources are bridged with `SyncIoBridge`.

use std::io::Read;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::CancellationToken;

use crate::core::{cast_val, textual, AbstractType, Column, Dataset, Row, Value};
use crate::error::{Result, TransferError};
use crate::stream::{RowStream, DEFAULT_CAPACITY};

/// Gzip magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A delimited-text source feeding a [`RowStream`].
pub struct CsvSource {
    reader: Box<dyn Read + Send>,
    delimiter: u8,
    /// Known columns skip inference; cells are cast directly.
    columns: Option<Vec<Column>>,
    sample_size: usize,
}

impl CsvSource {
    pub fn from_reader(reader: Box<dyn Read + Send>) -> Self {
        CsvSource {
            reader,
            delimiter: b',',
            columns: None,
            sample_size: crate::core::DEFAULT_SAMPLE_SIZE,
        }
    }

    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::from_reader(Box::new(file)))
    }

    /// Bridge an async byte source (child stdout, object-store download)
    /// into the synchronous decoder.
    pub fn from_async(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::from_reader(Box::new(SyncIoBridge::new(reader)))
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_sample_size(mut self, n: usize) -> Self {
        self.sample_size = n;
        self
    }

    /// Start decoding. Header errors surface here; row errors after the
    /// header terminate the stream without the closed flag.
    pub async fn stream(self, cancel: CancellationToken) -> Result<RowStream> {
        let CsvSource {
            reader,
            delimiter,
            columns,
            sample_size,
        } = self;

        let (sender, mut stream) = RowStream::channel(DEFAULT_CAPACITY, cancel);
        let (head_tx, head_rx) = oneshot::channel();

        tokio::task::spawn_blocking(move || {
            let decompressed = match decompress(reader) {
                Ok(r) => r,
                Err(e) => {
                    let _ = head_tx.send(Err(e));
                    return;
                }
            };
            let mut rdr = csv::ReaderBuilder::new()
                .delimiter(delimiter)
                .flexible(true)
                .from_reader(decompressed);

            // First record is the header.
            let header = match rdr.headers() {
                Ok(h) => h.iter().map(String::from).collect::<Vec<_>>(),
                Err(e) => {
                    let _ = head_tx.send(Err(TransferError::Csv(e)));
                    return;
                }
            };

            let (cols, prelude, err) = match columns {
                Some(cols) => (cols, Vec::new(), None),
                None => sample_and_infer(&mut rdr, &header, sample_size),
            };
            if let Some(e) = err {
                let _ = head_tx.send(Err(e));
                return;
            }

            let types: Vec<AbstractType> = cols.iter().map(|c| c.typ).collect();
            if head_tx.send(Ok((cols, prelude))).is_err() {
                return;
            }

            // Pump the remainder through the channel.
            for record in rdr.records() {
                let record = match record {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("csv read error, terminating stream: {}", e);
                        return;
                    }
                };
                let row = cast_record(&record, &types);
                if !sender.blocking_send(row) {
                    return;
                }
            }
            sender.finish();
        });

        let (cols, prelude) = head_rx
            .await
            .map_err(|_| TransferError::Io(std::io::Error::other("csv decoder exited early")))??;

        stream.columns = cols;
        for row in prelude {
            stream.push_prelude(row);
        }
        Ok(stream)
    }

    /// Materialize up to `n` rows as a dataset, with types inferred.
    pub async fn sample(self, n: usize) -> Result<Dataset> {
        let stream = self.with_sample_size(n).stream(CancellationToken::new()).await?;
        let data = stream.prelude_dataset();
        Ok(data)
    }
}

/// Sample up to `sample_size` rows, infer column types, and cast the
/// sampled rows to them.
fn sample_and_infer(
    rdr: &mut csv::Reader<Box<dyn Read + Send>>,
    header: &[String],
    sample_size: usize,
) -> (Vec<Column>, Vec<Row>, Option<TransferError>) {
    let mut buffer: Vec<Row> = Vec::new();
    for record in rdr.records().take(sample_size) {
        match record {
            Ok(r) => buffer.push(r.iter().map(|s| Value::Text(s.to_string())).collect()),
            Err(e) => return (Column::from_names(header), Vec::new(), Some(TransferError::Csv(e))),
        }
    }

    let mut sample = Dataset::new(Column::from_names(header), buffer);
    sample.infer_column_types();
    if sample.rows.is_empty() {
        // Header-only input still yields a usable schema.
        for col in &mut sample.columns {
            col.typ = AbstractType::String;
        }
    }

    let types: Vec<AbstractType> = sample.columns.iter().map(|c| c.typ).collect();
    let prelude = sample
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(types.iter())
                .map(|(v, t)| cast_val(v, *t))
                .collect()
        })
        .collect();

    (sample.columns, prelude, None)
}

fn cast_record(record: &csv::StringRecord, types: &[AbstractType]) -> Row {
    types
        .iter()
        .enumerate()
        .map(|(i, t)| match record.get(i) {
            Some("") | None => Value::Null,
            // Raw text goes straight through cast_val so string columns
            // keep their exact bytes (leading zeros, trailing dots).
            Some(s) => cast_val(&Value::Text(s.to_string()), *t),
        })
        .collect()
}

/// Peek two bytes and wrap a gzip decoder when the magic matches.
fn decompress(mut reader: Box<dyn Read + Send>) -> Result<Box<dyn Read + Send>> {
    let mut magic = [0u8; 2];
    let mut have = 0;
    while have < 2 {
        let n = reader.read(&mut magic[have..])?;
        if n == 0 {
            break;
        }
        have += n;
    }

    let head = std::io::Cursor::new(magic[..have].to_vec());
    let chained = Box::new(head.chain(reader));
    if have == 2 && magic == GZIP_MAGIC {
        Ok(Box::new(MultiGzDecoder::new(chained)))
    } else {
        Ok(chained)
    }
}

fn encode_record<'a>(
    fields: impl Iterator<Item = std::borrow::Cow<'a, str>>,
) -> Result<Vec<u8>> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(fields.map(|f| f.into_owned()))?;
    w.into_inner()
        .map_err(|e| TransferError::Io(std::io::Error::other(e.to_string())))
}

/// Write a stream as CSV to an async byte sink, flushing after every row.
///
/// With `limit > 0` at most `limit` rows are written and the stream is left
/// undrained (file partitioning); `limit == 0` drains to completion.
/// Returns the row count and whether the stream was exhausted.
pub async fn write_csv<W: AsyncWrite + Unpin>(
    stream: &mut RowStream,
    w: &mut W,
    limit: u64,
) -> Result<(u64, bool)> {
    let header = encode_record(
        stream
            .columns
            .iter()
            .map(|c| std::borrow::Cow::Borrowed(c.name.as_str())),
    )?;
    w.write_all(&header).await?;

    let mut count = 0u64;
    let mut exhausted = true;
    loop {
        if limit > 0 && count >= limit {
            exhausted = false;
            break;
        }
        let Some(row) = stream.next().await else {
            break;
        };
        let line = encode_record(row.iter().map(|v| std::borrow::Cow::Owned(textual(v))))?;
        w.write_all(&line).await?;
        w.flush().await?;
        count += 1;
    }
    Ok((count, exhausted))
}

/// Encode one CSV chunk (header plus up to `limit` rows) into memory,
/// optionally gzip-compressed. Used to partition a stream into staged
/// object-store parts. Returns the bytes, the row count, and whether the
/// stream was exhausted.
pub async fn encode_chunk(
    stream: &mut RowStream,
    limit: u64,
    gzip: bool,
) -> Result<(Vec<u8>, u64, bool)> {
    let mut buf = Vec::new();
    let header = encode_record(
        stream
            .columns
            .iter()
            .map(|c| std::borrow::Cow::Borrowed(c.name.as_str())),
    )?;
    buf.extend_from_slice(&header);

    let mut count = 0u64;
    let mut exhausted = true;
    loop {
        if limit > 0 && count >= limit {
            exhausted = false;
            break;
        }
        let Some(row) = stream.next().await else {
            break;
        };
        let line = encode_record(row.iter().map(|v| std::borrow::Cow::Owned(textual(v))))?;
        buf.extend_from_slice(&line);
        count += 1;
    }

    if gzip {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        std::io::Write::write_all(&mut enc, &buf)?;
        buf = enc.finish()?;
    }
    Ok((buf, count, exhausted))
}
