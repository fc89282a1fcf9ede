use clap::Parser;
use std::error::Error;
use std::path::{ Path, PathBuf };
use std::process::ExitCode;
use std::sync::Arc;
use log::{ info, error, warn };

use docdb_ops::logging::init_logging;
use docdb_ops::provision::{ ProvisionReport, StatsEntry };
use docdb_ops::{ connect_document_store, get_store_type, DocumentDbConfig, DocumentStore, IndexProvisioner, StoreType };

/// Create the DocumentDB vector and supporting indexes, check them, and
/// write a timestamped JSON report.
#[derive(Parser, Debug)]
#[command(name = "setup-vector-indexes", version)]
struct Args {
    /// Backend to provision: documentdb or memory (dry run)
    #[arg(long, default_value = "documentdb")]
    store: String,

    /// Directory the results report is written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn log_report(report: &ProvisionReport) {
    info!("Vector Index Creation Results:");
    for (collection, ok) in &report.vector_indexes {
        info!("  {}: {}", collection, if *ok { "Success" } else { "Failed" });
    }
    info!("Supporting Index Creation Results:");
    for (index_type, ok) in &report.supporting_indexes {
        info!("  {}: {}", index_type, if *ok { "Success" } else { "Failed" });
    }
    info!("Index Statistics:");
    for (collection, entry) in &report.statistics {
        match entry {
            StatsEntry::Collected(stats) => {
                info!(
                    "  {}: {} documents, {} bytes, vector index {}, {} indexes total",
                    collection.to_uppercase(),
                    stats.document_count,
                    stats.size_bytes,
                    if stats.vector_index_exists { "exists" } else { "missing" },
                    stats.total_indexes
                );
            }
            StatsEntry::Failed { error } => error!("  {}: {}", collection.to_uppercase(), error),
        }
    }
    info!("Performance Test Results:");
    for (name, probe) in &report.performance_tests.tests {
        if probe.success {
            info!(
                "  {}: {} results in {:.2}ms, sample scores {:?}",
                name.to_uppercase(),
                probe.results_count.unwrap_or(0),
                probe.response_time_ms.unwrap_or(0.0),
                probe.sample_scores
            );
        } else {
            error!(
                "  {}: failed: {}",
                name.to_uppercase(),
                probe.error.as_deref().unwrap_or("Unknown error")
            );
        }
    }
}

async fn provision(
    store: Arc<dyn DocumentStore>,
    output_dir: &Path
) -> Result<bool, Box<dyn Error + Send + Sync>> {
    let report = IndexProvisioner::new(store).run().await?;
    log_report(&report);
    report.write_to_dir(output_dir)?;

    if report.all_indexes_created {
        info!("Vector search setup completed successfully; all indexes created and tested");
    } else {
        warn!("Vector search setup completed with some issues; some indexes failed to create");
    }
    Ok(report.all_indexes_created)
}

async fn run(args: &Args) -> Result<bool, Box<dyn Error + Send + Sync>> {
    let store_type = get_store_type(&args.store)?;
    let config = match store_type {
        StoreType::DocumentDb => Some(DocumentDbConfig::from_env()?),
        StoreType::Memory => None,
    };
    let store = connect_document_store(store_type, config.as_ref()).await?;

    let outcome = provision(store.clone(), &args.output_dir).await;

    match store.close().await {
        Ok(()) => info!("Database connections closed"),
        Err(e) => warn!("Error while closing database connections: {}", e),
    }
    outcome
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    info!("DocumentDB Vector Search Setup");

    match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("Setup failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
