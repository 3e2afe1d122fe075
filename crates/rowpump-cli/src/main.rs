//! rowpump CLI - stream tabular data between databases and CSV endpoints.

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;
use rowpump::{run_csv_to_db, run_db_to_csv, run_db_to_db, TransferConfig, TransferError};
use tracing_subscriber::EnvFilter;

const EXAMPLES: &str = r#"
rowpump --srcDB $POSTGRES_URL --srcTable housing.my_data2 --limit 10 > /tmp/my_data2.csv
cat /tmp/my_data2.csv | rowpump --tgtDB $POSTGRES_URL --tgtTable housing.my_data3 --truncate

rowpump --srcDB $POSTGRES_URL --srcTable housing.my_data2 | rowpump --tgtDB $POSTGRES_URL --tgtTable housing.my_data3

rowpump --srcDB $POSTGRES_URL --tgtDB $POSTGRES_URL --srcTable housing.my_data2 --tgtTable housing.my_data3
"#;

#[derive(Parser)]
#[command(name = "rowpump")]
#[command(about = "Streams tabular data between databases and CSV endpoints")]
#[command(version)]
struct Cli {
    /// The source database URL
    #[arg(long = "srcDB")]
    src_db: Option<String>,

    /// The target database URL
    #[arg(long = "tgtDB")]
    tgt_db: Option<String>,

    /// The source table (schema.table)
    #[arg(long = "srcTable", default_value = "")]
    src_table: String,

    /// The target table (schema.table)
    #[arg(long = "tgtTable", default_value = "")]
    tgt_table: String,

    /// Path of a SQL file to use as the source query
    #[arg(long = "sqlFile")]
    sql_file: Option<std::path::PathBuf>,

    /// Maximum rows to transfer (0 is infinite)
    #[arg(long, default_value_t = 0)]
    limit: u64,

    /// Drop and recreate the target table before load (default appends)
    #[arg(long)]
    drop: bool,

    /// Truncate the target table before appending
    #[arg(long)]
    truncate: bool,

    /// The S3 bucket to use for Redshift transfers
    #[arg(long = "s3Bucket")]
    s3_bucket: Option<String>,

    /// Show usage examples
    #[arg(long)]
    examples: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), TransferError> {
    let cli = Cli::parse();

    if cli.examples {
        println!("{}", EXAMPLES);
        return Ok(());
    }

    // Piped stdin is consumed as CSV.
    let stdin_piped = !std::io::stdin().is_terminal();

    let mut cfg = TransferConfig {
        src_db: cli.src_db,
        tgt_db: cli.tgt_db,
        src_table: cli.src_table,
        tgt_table: cli.tgt_table,
        sql_file: cli.sql_file,
        limit: cli.limit,
        drop: cli.drop,
        truncate: cli.truncate,
        s3_bucket: cli.s3_bucket,
    };
    if cfg.drop {
        // drop wins over truncate
        cfg.truncate = false;
    }

    let in_to_db = stdin_piped && cfg.src_db.is_none() && cfg.tgt_db.is_some();
    let db_to_db = cfg.src_db.is_some() && cfg.tgt_db.is_some();
    let db_to_out = cfg.src_db.is_some() && cfg.tgt_db.is_none();

    if in_to_db {
        run_csv_to_db(&cfg, Box::new(std::io::stdin())).await?;
    } else if db_to_db {
        run_db_to_db(&cfg).await?;
    } else if db_to_out {
        let mut stdout = tokio::io::stdout();
        run_db_to_csv(&cfg, &mut stdout).await?;
    } else {
        return Err(TransferError::InvalidEndpoint(
            "must specify --srcDB, or --tgtDB with CSV data on stdin".to_string(),
        ));
    }

    Ok(())
}
