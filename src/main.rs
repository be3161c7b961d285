use clap::{Parser, Subcommand};
use creditline::application::Platform;
use creditline::config::Settings;
use creditline::domain::account::AccountId;
use creditline::domain::capability::Capability;
use creditline::domain::ports::Backend;
use creditline::infrastructure::in_memory;
#[cfg(feature = "storage-rocksdb")]
use creditline::infrastructure::rocksdb::RocksDBStore;
use creditline::interfaces::catalog::CatalogFile;
use creditline::interfaces::csv::account_writer::AccountWriter;
use creditline::interfaces::csv::operation_reader::OperationReader;
use creditline::interfaces::csv::quote_writer::QuoteWriter;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the price and margin breakdown of capabilities as CSV
    Quote {
        /// Only quote this capability
        capability: Option<Capability>,

        /// Catalog JSON file (defaults to the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Exchange rate to quote with, in local currency per USD
        #[arg(long)]
        rate: Option<Decimal>,
    },
    /// Apply an operations CSV file and print the resulting balances
    Process {
        /// Input operations CSV file
        input: PathBuf,

        /// Catalog JSON file (defaults to the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Path to persistent database (optional). If provided, uses RocksDB.
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Comma-separated ids of accounts with a paid subscription
        #[arg(long, value_delimiter = ',')]
        premium: Vec<u32>,

        /// Return upstream results without the simulated latency
        #[arg(long)]
        no_latency: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;

    match cli.command {
        Command::Quote {
            capability,
            catalog,
            rate,
        } => {
            let catalog_file = load_catalog(catalog.or(settings.catalog_path.take()))?;
            let platform = Platform::in_memory(catalog_file.products.clone(), &settings);
            catalog_file.seed(&platform).await?;
            if let Some(rate) = rate {
                platform.rates.set_rate(rate).await?;
            }

            for (capability, engines) in platform.engines.ambiguous_mappings().await? {
                eprintln!(
                    "warning: {capability} is mapped to several active engines ({}); using {}",
                    engines.join(", "),
                    engines[0]
                );
            }

            let quotes = match capability {
                Some(capability) => vec![platform.pricing.quote(capability).await?],
                None => platform.pricing.margin_summary().await?,
            };
            let stdout = io::stdout();
            QuoteWriter::new(stdout.lock()).write_quotes(&quotes)?;
        }
        Command::Process {
            input,
            catalog,
            db_path,
            premium,
            no_latency,
        } => {
            if no_latency {
                settings.simulated_latency = false;
            }
            let catalog_file = load_catalog(catalog.or(settings.catalog_path.take()))?;
            let backend = open_backend(db_path.or(settings.db_path.take()))?;
            let platform = Platform::with_mocks(backend, catalog_file.products.clone(), &settings);
            catalog_file.seed(&platform).await?;

            let premium: HashSet<AccountId> = premium.into_iter().map(AccountId).collect();

            // Process operations
            let file = File::open(input).into_diagnostic()?;
            let reader = OperationReader::new(file);
            for op_result in reader.operations() {
                match op_result {
                    Ok(op) => {
                        let is_premium = premium.contains(&op.account);
                        if let Err(e) = op.execute(&platform, is_premium).await {
                            eprintln!("Error processing operation: {}", e);
                        }
                    }
                    Err(e) => {
                        eprintln!("Error reading operation: {}", e);
                    }
                }
            }

            let mut rows = Vec::new();
            for account in platform.ledger.accounts().await? {
                let entries = platform.ledger.history(account.id).await?.len();
                rows.push((account, entries));
            }
            let stdout = io::stdout();
            AccountWriter::new(stdout.lock()).write_accounts(rows)?;
        }
    }

    Ok(())
}

fn load_catalog(path: Option<PathBuf>) -> Result<CatalogFile> {
    let file = match path {
        Some(path) => CatalogFile::load(path)?,
        None => CatalogFile::builtin()?,
    };
    Ok(file)
}

fn open_backend(db_path: Option<PathBuf>) -> Result<Backend> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBStore::open(path)?;
            Ok(Backend::shared(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(in_memory::backend())
        }
        None => Ok(in_memory::backend()),
    }
}
