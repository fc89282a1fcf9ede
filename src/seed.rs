use serde::{ Deserialize, Serialize };
use serde_json::Value;
use std::error::Error;
use std::path::{ Path, PathBuf };
use std::sync::Arc;
use thiserror::Error;
use log::{ info, warn };

use crate::db::DocumentStore;
use crate::index::{ IndexDescriptor, IndexOrder, KNOWLEDGE_BASE, REVIEWS };

pub const REVIEW_BATCH_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("seed file {} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("seed file {} must contain a JSON array", .path.display())]
    NotAnArray {
        path: PathBuf,
    },
    #[error("record {index} in {} is not a JSON object", .path.display())]
    NotAnObject {
        path: PathBuf,
        index: usize,
    },
    #[error("{operation} on '{collection}' failed: {source}")]
    Store {
        operation: &'static str,
        collection: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl SeedError {
    fn store(operation: &'static str, collection: &str) -> impl FnOnce(Box<dyn Error + Send + Sync>) -> Self {
        let collection = collection.to_string();
        move |source| SeedError::Store {
            operation,
            collection,
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeedPlan {
    pub collection: String,
    pub input: PathBuf,
    pub indexes: Vec<IndexDescriptor>,
    pub batch_size: Option<usize>,
}

impl SeedPlan {
    pub fn knowledge_base(data_dir: &Path) -> Self {
        Self {
            collection: KNOWLEDGE_BASE.to_string(),
            input: data_dir.join("knowledge_base.json"),
            indexes: vec![
                IndexDescriptor::asc("category"),
                IndexDescriptor::asc("tags"),
                IndexDescriptor::text(&["title"]),
                IndexDescriptor::text(&["content"]),
                IndexDescriptor::desc("createdAt")
            ],
            batch_size: None,
        }
    }

    pub fn reviews(data_dir: &Path) -> Self {
        use IndexOrder::{ Ascending, Descending };
        Self {
            collection: REVIEWS.to_string(),
            input: data_dir.join("reviews.json"),
            indexes: vec![
                IndexDescriptor::asc("productId"),
                IndexDescriptor::asc("rating"),
                IndexDescriptor::asc("sentiment"),
                IndexDescriptor::desc("createdAt"),
                IndexDescriptor::asc("verified"),
                IndexDescriptor::compound(
                    &[
                        ("productId", Ascending),
                        ("rating", Descending),
                    ]
                ),
                IndexDescriptor::compound(
                    &[
                        ("productId", Ascending),
                        ("createdAt", Descending),
                    ]
                ),
                IndexDescriptor::compound(
                    &[
                        ("sentiment", Ascending),
                        ("rating", Descending),
                    ]
                )
            ],
            batch_size: Some(REVIEW_BATCH_SIZE),
        }
    }

    pub fn with_input(mut self, input: PathBuf) -> Self {
        self.input = input;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedReport {
    pub collection: String,
    pub loaded: usize,
    pub deleted: u64,
    pub inserted: usize,
    pub final_count: u64,
    pub indexes_created: Vec<String>,
    pub indexes_failed: Vec<String>,
    pub skipped: bool,
    pub verified: bool,
}

impl SeedReport {
    pub fn skipped(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            loaded: 0,
            deleted: 0,
            inserted: 0,
            final_count: 0,
            indexes_created: Vec::new(),
            indexes_failed: Vec::new(),
            skipped: true,
            verified: true,
        }
    }

    pub fn success(&self) -> bool {
        self.skipped || self.verified
    }
}

/// Reads the seed array. A missing file is an empty seed, not an error.
pub fn load_records(path: &Path) -> Result<Vec<Value>, SeedError> {
    if !path.exists() {
        info!("No seed file found at {}", path.display());
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: Value = serde_json::from_str(&raw).map_err(|source| SeedError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let Value::Array(records) = parsed else {
        return Err(SeedError::NotAnArray { path: path.to_path_buf() });
    };
    if let Some(index) = records.iter().position(|r| !r.is_object()) {
        return Err(SeedError::NotAnObject {
            path: path.to_path_buf(),
            index,
        });
    }
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

pub struct Seeder {
    store: Arc<dyn DocumentStore>,
}

impl Seeder {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn create_indexes(&self, plan: &SeedPlan) -> (Vec<String>, Vec<String>) {
        let mut created = Vec::new();
        let mut failed = Vec::new();
        for index in &plan.indexes {
            match self.store.create_index(&plan.collection, index).await {
                Ok(name) => {
                    info!("Created index on {}", index.field_names().join(", "));
                    created.push(name);
                }
                Err(e) => {
                    warn!("Index on {} may already exist: {}", index.field_names().join(", "), e);
                    failed.push(index.name());
                }
            }
        }
        (created, failed)
    }

    async fn insert(&self, plan: &SeedPlan, records: &[Value]) -> Result<usize, SeedError> {
        let batch_size = plan.batch_size.unwrap_or(records.len()).max(1);
        let mut inserted = 0;
        for batch in records.chunks(batch_size) {
            inserted += self.store
                .insert_many(&plan.collection, batch).await
                .map_err(SeedError::store("insert_many", &plan.collection))?;
            if plan.batch_size.is_some() {
                info!("Inserted {}/{} records", inserted, records.len());
            }
        }
        Ok(inserted)
    }

    pub async fn seed(&self, plan: &SeedPlan, records: &[Value]) -> Result<SeedReport, SeedError> {
        if records.is_empty() {
            info!("No records to seed into {}; skipping", plan.collection);
            return Ok(SeedReport::skipped(&plan.collection));
        }

        info!("Clearing existing documents in {}...", plan.collection);
        let deleted = self.store
            .delete_all(&plan.collection).await
            .map_err(SeedError::store("delete_many", &plan.collection))?;
        info!("Deleted {} existing documents", deleted);

        info!("Inserting {} documents into {}...", records.len(), plan.collection);
        let inserted = self.insert(plan, records).await?;
        info!("Successfully seeded {} documents to {}", inserted, plan.collection);

        let (indexes_created, indexes_failed) = self.create_indexes(plan).await;

        let final_count = self.store
            .count_documents(&plan.collection).await
            .map_err(SeedError::store("count_documents", &plan.collection))?;
        info!("Verification: {} documents found in {}", final_count, plan.collection);

        let verified = final_count == (records.len() as u64);
        if !verified {
            warn!(
                "Verification failed for {}: expected {} documents, found {}",
                plan.collection,
                records.len(),
                final_count
            );
        }

        Ok(SeedReport {
            collection: plan.collection.clone(),
            loaded: records.len(),
            deleted,
            inserted,
            final_count,
            indexes_created,
            indexes_failed,
            skipped: false,
            verified,
        })
    }

    pub async fn run(&self, plan: &SeedPlan) -> Result<SeedReport, SeedError> {
        let records = load_records(&plan.input)?;
        self.seed(plan, &records).await
    }
}
