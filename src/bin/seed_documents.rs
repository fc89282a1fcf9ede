use clap::{ Parser, ValueEnum };
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use log::{ info, error, warn };

use docdb_ops::{ connect_document_store, get_store_type, DocumentDbConfig, SeedPlan, SeedReport, Seeder, StoreType };

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Dataset {
    /// Knowledge base articles, one bulk insert
    KnowledgeBase,
    /// Product reviews, inserted in batches of 100
    Reviews,
}

/// Replace a collection's documents with a pre-generated JSON array.
#[derive(Parser, Debug)]
#[command(name = "seed-documents", version)]
struct Args {
    #[arg(short, long, value_enum, default_value = "knowledge-base")]
    dataset: Dataset,

    /// Directory holding the generated JSON files
    #[arg(long, default_value = "output")]
    data_dir: PathBuf,

    /// Seed file to load instead of the dataset's default
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Backend to seed: documentdb or memory (dry run)
    #[arg(long, default_value = "documentdb")]
    store: String,

    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn plan(&self) -> SeedPlan {
        let plan = match self.dataset {
            Dataset::KnowledgeBase => SeedPlan::knowledge_base(&self.data_dir),
            Dataset::Reviews => SeedPlan::reviews(&self.data_dir),
        };
        match &self.input {
            Some(input) => plan.with_input(input.clone()),
            None => plan,
        }
    }
}

async fn run(args: &Args) -> Result<SeedReport, Box<dyn Error + Send + Sync>> {
    let plan = args.plan();
    let records = docdb_ops::seed::load_records(&plan.input)?;
    if records.is_empty() {
        info!("No records found for {}. Skipping seeding.", plan.collection);
        return Ok(SeedReport::skipped(&plan.collection));
    }

    let store_type = get_store_type(&args.store)?;
    let config = match store_type {
        StoreType::DocumentDb => Some(DocumentDbConfig::from_env()?),
        StoreType::Memory => None,
    };
    let store = connect_document_store(store_type, config.as_ref()).await?;

    let outcome: Result<SeedReport, Box<dyn Error + Send + Sync>> = match store.ping().await {
        Ok(()) => {
            info!("Seeding {} records to {}...", records.len(), plan.collection);
            Seeder::new(store.clone()).seed(&plan, &records).await.map_err(Into::into)
        }
        Err(e) => Err(format!("DocumentDB connection failed: {}", e).into()),
    };

    if let Err(e) = store.close().await {
        warn!("Error while closing database connection: {}", e);
    }
    outcome
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    docdb_ops::logging::init_logging(args.verbose);
    info!("Document seeder started at {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));

    match run(&args).await {
        Ok(report) if report.success() => {
            if !report.skipped {
                info!(
                    "Seeding completed: {} documents now in collection {} ({} replaced)",
                    report.final_count,
                    report.collection,
                    report.deleted
                );
            }
            ExitCode::SUCCESS
        }
        Ok(report) => {
            error!(
                "Seeding failed verification: loaded {}, found {} in {}",
                report.loaded,
                report.final_count,
                report.collection
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Error seeding documents: {}", e);
            ExitCode::FAILURE
        }
    }
}
