//! # rowpump
//!
//! Streaming transfer of tabular data between relational databases and
//! delimited-text endpoints. One invocation composes a *source* with a
//! *target* through a typed row stream, preferring each vendor's native
//! bulk path (COPY, LOAD DATA, SQL*Loader, UNLOAD plus object store) and
//! falling back to cursor streaming when a bulk path is unavailable.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rowpump::{run_db_to_db, TransferConfig};
//!
//! #[tokio::main]
//! async fn main() -> rowpump::Result<()> {
//!     let cfg = TransferConfig {
//!         src_db: Some(std::env::var("POSTGRES_URL").unwrap()),
//!         tgt_db: Some(std::env::var("POSTGRES_URL").unwrap()),
//!         src_table: "public.transactions".into(),
//!         tgt_table: "public.transactions_copy".into(),
//!         drop: true,
//!         ..Default::default()
//!     };
//!     let stats = run_db_to_db(&cfg).await?;
//!     eprintln!("moved {} rows", stats.rows);
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod core;
pub mod csvio;
pub mod error;
pub mod redact;
pub mod store;
pub mod stream;
pub mod template;
pub mod transfer;

pub use crate::adapter::{parse_endpoint, Adapter, AdapterState, DbKind, EngineConfig};
pub use crate::core::{
    cast_val, parse_string, textual, AbstractType, Column, ColumnStats, Dataset, Row, Schema,
    Schemata, TableInfo, Value,
};
pub use crate::csvio::{encode_chunk, write_csv, CsvSource};
pub use crate::error::{Result, TransferError};
pub use crate::store::ObjectStoreGateway;
pub use crate::stream::{RowSender, RowStream};
pub use crate::template::{render, render_map, Template};
pub use crate::transfer::{
    run_csv_to_db, run_db_to_csv, run_db_to_db, TransferConfig, TransferStats,
};
