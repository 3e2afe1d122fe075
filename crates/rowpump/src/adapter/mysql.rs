//! MySQL bulk paths through the `mysql` client binary.
//!
//! Export runs the query in batch mode and decodes the tab-separated
//! output; import feeds `LOAD DATA LOCAL INFILE '/dev/stdin'` with CSV on
//! the child's stdin. Both are gated on the binary being on PATH and the
//! adapter's allow flags, falling back to the cursor paths otherwise.

use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::csvio::{write_csv, CsvSource};
use crate::error::{Result, TransferError};
use crate::redact::redact;
use crate::stream::RowStream;
use crate::template::render;

use super::{find_on_path, Adapter};

struct MysqlCli {
    args: Vec<String>,
    password: String,
}

/// Client arguments from the endpoint URL. The password travels in
/// `MYSQL_PWD` rather than argv.
fn cli_args(adapter: &Adapter) -> Result<MysqlCli> {
    let parsed = url::Url::parse(adapter.url())
        .map_err(|e| TransferError::InvalidEndpoint(e.to_string()))?;
    let mut args = Vec::new();
    if let Some(host) = parsed.host_str() {
        args.push(format!("--host={}", host));
    }
    args.push(format!("--port={}", parsed.port().unwrap_or(3306)));
    if !parsed.username().is_empty() {
        args.push(format!("--user={}", parsed.username()));
    }
    let database = parsed.path().trim_start_matches('/');
    if !database.is_empty() {
        args.push(format!("--database={}", database));
    }
    Ok(MysqlCli {
        args,
        password: parsed.password().unwrap_or_default().to_string(),
    })
}

/// Bulk export through the client's batch mode (tab-separated, header
/// line first). Falls back to the cursor when the binary is absent or
/// bulk export is disallowed.
pub async fn bulk_export(adapter: &Adapter, sql: &str) -> Result<RowStream> {
    if !adapter.prop_bulk_export_allowed() {
        debug!("bulk export disallowed, using cursor");
        return adapter.stream_rows(sql).await;
    }
    if find_on_path("mysql").is_none() {
        info!("mysql not found on PATH, using cursor");
        return adapter.stream_rows(sql).await;
    }

    let cli = cli_args(adapter)?;
    let mut child = Command::new("mysql")
        .args(&cli.args)
        .arg("--batch")
        .arg("--raw")
        .arg("-e")
        .arg(sql)
        .env("MYSQL_PWD", &cli.password)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| TransferError::Io(std::io::Error::other("mysql stdout unavailable")))?;

    let argv = redact(
        &format!("mysql {} --batch --raw -e {}", cli.args.join(" "), sql),
        adapter.secrets(),
    );
    tokio::spawn(async move {
        let mut err_text = String::new();
        if let Some(stderr) = child.stderr.as_mut() {
            let _ = stderr.read_to_string(&mut err_text).await;
        }
        match child.wait().await {
            Ok(status) if status.success() => {}
            Ok(_) | Err(_) => {
                tracing::warn!(
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
        .with_delimiter(b'\t')
        .with_sample_size(adapter.config().sample_size)
        .stream(adapter.cancel_token().child_token())
        .await
}

/// Bulk import through `LOAD DATA LOCAL INFILE '/dev/stdin'`, fed with
/// CSV (header skipped server-side). Falls back to the cursor insert when
/// the binary is absent or bulk import is disallowed.
pub async fn bulk_import(
    adapter: &Adapter,
    table_full_name: &str,
    stream: &mut RowStream,
) -> Result<u64> {
    if !adapter.prop_bulk_import_allowed() {
        debug!("bulk import disallowed, using cursor insert");
        return adapter.insert_stream(table_full_name, stream).await;
    }
    if find_on_path("mysql").is_none() {
        info!("mysql not found on PATH, using cursor insert");
        return adapter.insert_stream(table_full_name, stream).await;
    }

    let load_sql = render(
        &adapter.template().require("core.load_data")?,
        &[("table", table_full_name)],
    );

    let cli = cli_args(adapter)?;
    let mut child = Command::new("mysql")
        .args(&cli.args)
        .arg("--local-infile=1")
        .arg("-e")
        .arg(&load_sql)
        .env("MYSQL_PWD", &cli.password)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| TransferError::Io(std::io::Error::other("mysql stdin unavailable")))?;

    let (count, _exhausted) = write_csv(stream, &mut stdin, 0).await?;
    drop(stdin);

    let mut err_text = String::new();
    if let Some(stderr) = child.stderr.as_mut() {
        let _ = stderr.read_to_string(&mut err_text).await;
    }
    let status = child.wait().await?;
    if !status.success() {
        let argv = redact(
            &format!(
                "mysql {} --local-infile=1 -e {}",
                cli.args.join(" "),
                load_sql
            ),
            adapter.secrets(),
        );
        return Err(TransferError::ExternalProcessFailed {
            argv,
            stderr: err_text.trim().to_string(),
        });
    }

    debug!("loaded {} rows into {}", count, table_full_name);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_from_url() {
        let adapter = Adapter::new("mysql://admin:pw@db.internal:3307/shop").unwrap();
        let cli = cli_args(&adapter).unwrap();
        assert!(cli.args.contains(&"--host=db.internal".to_string()));
        assert!(cli.args.contains(&"--port=3307".to_string()));
        assert!(cli.args.contains(&"--user=admin".to_string()));
        assert!(cli.args.contains(&"--database=shop".to_string()));
        assert_eq!(cli.password, "pw");
    }
}
