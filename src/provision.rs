use chrono::{ DateTime, Utc };
use rand::Rng;
use serde::{ Deserialize, Serialize };
use std::collections::BTreeMap;
use std::error::Error;
use std::path::{ Path, PathBuf };
use std::sync::Arc;
use std::time::Instant;
use log::{ info, error, debug };

use crate::db::DocumentStore;
use crate::index::{
    supporting_index_plan,
    vector_index_configs,
    IndexDescriptor,
    VectorIndexConfig,
    EMBEDDING_DIMENSIONS,
    KNOWLEDGE_BASE,
    PRODUCTS,
    REVIEWS,
};
use crate::search::{ ProductFilters, VectorQuery };

const PROBE_MIN_SCORE: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub document_count: u64,
    pub size_bytes: u64,
    pub avg_document_size: f64,
    pub vector_index_exists: bool,
    pub vector_index_config: VectorIndexConfig,
    pub total_indexes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatsEntry {
    Collected(IndexStats),
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchProbe {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_scores: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub timestamp: DateTime<Utc>,
    pub tests: BTreeMap<String, SearchProbe>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub timestamp: DateTime<Utc>,
    pub vector_indexes: BTreeMap<String, bool>,
    pub supporting_indexes: BTreeMap<String, bool>,
    pub statistics: BTreeMap<String, StatsEntry>,
    pub performance_tests: PerformanceReport,
    pub all_indexes_created: bool,
}

impl ProvisionReport {
    pub fn file_name(&self) -> String {
        format!("vector_search_setup_results_{}.json", self.timestamp.format("%Y%m%d_%H%M%S"))
    }

    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, Box<dyn Error + Send + Sync>> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        info!("Detailed results saved to: {}", path.display());
        Ok(path)
    }
}

pub struct IndexProvisioner {
    store: Arc<dyn DocumentStore>,
    vector_configs: Vec<(&'static str, VectorIndexConfig)>,
    supporting_plan: Vec<(&'static str, Vec<IndexDescriptor>)>,
    probe_vector: Option<Vec<f32>>,
}

impl IndexProvisioner {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            vector_configs: vector_index_configs(),
            supporting_plan: supporting_index_plan(),
            probe_vector: None,
        }
    }

    pub fn with_probe_vector(mut self, vector: Vec<f32>) -> Self {
        self.probe_vector = Some(vector);
        self
    }

    async fn ensure_vector_index(
        &self,
        collection: &str,
        config: &VectorIndexConfig
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let existing = self.store.list_index_names(collection).await?;
        if existing.iter().any(|name| *name == config.index_name) {
            info!("Vector index {} already exists for {}", config.index_name, collection);
            return Ok(());
        }
        self.store.create_vector_index(collection, config).await?;
        info!("Created HNSW vector index {} for {}", config.index_name, collection);
        Ok(())
    }

    pub async fn create_vector_indexes(&self) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for (collection, config) in &self.vector_configs {
            let success = match self.ensure_vector_index(collection, config).await {
                Ok(()) => true,
                Err(e) => {
                    error!("Failed to create vector index for {}: {}", collection, e);
                    false
                }
            };
            info!(
                "Vector index creation for {}: {}",
                collection,
                if success { "Success" } else { "Failed" }
            );
            results.insert(collection.to_string(), success);
        }
        results
    }

    pub async fn create_supporting_indexes(&self) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for (collection, indexes) in &self.supporting_plan {
            let mut success = true;
            for index in indexes {
                if let Err(e) = self.store.create_index(collection, index).await {
                    error!("Failed to create supporting indexes for {}: {}", collection, e);
                    success = false;
                    break;
                }
            }
            if success {
                info!("Created supporting indexes for {} collection", collection);
            }
            results.insert(format!("{}_supporting", collection), success);
        }
        results
    }

    async fn collect_stats(
        &self,
        collection: &str,
        config: &VectorIndexConfig
    ) -> Result<IndexStats, Box<dyn Error + Send + Sync>> {
        let stats = self.store.collection_stats(collection).await?;
        let indexes = self.store.list_index_names(collection).await?;
        Ok(IndexStats {
            document_count: stats.count,
            size_bytes: stats.size_bytes,
            avg_document_size: stats.avg_document_size,
            vector_index_exists: indexes.iter().any(|name| *name == config.index_name),
            vector_index_config: config.clone(),
            total_indexes: indexes.len(),
        })
    }

    pub async fn index_stats(&self) -> BTreeMap<String, StatsEntry> {
        let mut stats = BTreeMap::new();
        for (collection, config) in &self.vector_configs {
            let entry = match self.collect_stats(collection, config).await {
                Ok(collected) => StatsEntry::Collected(collected),
                Err(e) => {
                    error!("Failed to collect statistics for {}: {}", collection, e);
                    StatsEntry::Failed { error: e.to_string() }
                }
            };
            stats.insert(collection.to_string(), entry);
        }
        stats
    }

    fn probe_vector(&self) -> Vec<f32> {
        match &self.probe_vector {
            Some(vector) => vector.clone(),
            None => {
                let mut rng = rand::thread_rng();
                (0..EMBEDDING_DIMENSIONS).map(|_| rng.gen::<f32>()).collect()
            }
        }
    }

    async fn probe(&self, collection: &str, query: VectorQuery) -> SearchProbe {
        let started = Instant::now();
        match self.store.vector_search(collection, &query).await {
            Ok(results) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                debug!("Probe on {} returned {} results in {:.2}ms", collection, results.len(), elapsed_ms);
                SearchProbe {
                    success: true,
                    results_count: Some(results.len()),
                    response_time_ms: Some(elapsed_ms),
                    sample_scores: results
                        .iter()
                        .take(3)
                        .map(|(score, _, _)| *score)
                        .collect(),
                    error: None,
                }
            }
            Err(e) => {
                error!("Vector search probe on {} failed: {}", collection, e);
                SearchProbe {
                    success: false,
                    results_count: None,
                    response_time_ms: None,
                    sample_scores: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn test_search_performance(&self) -> PerformanceReport {
        let vector = self.probe_vector();
        let mut tests = BTreeMap::new();

        let products = VectorQuery::products(
            vector.clone(),
            10,
            PROBE_MIN_SCORE,
            &ProductFilters::default()
        );
        tests.insert(PRODUCTS.to_string(), self.probe(PRODUCTS, products).await);

        let reviews = VectorQuery::reviews(vector.clone(), 10, PROBE_MIN_SCORE, None);
        tests.insert(REVIEWS.to_string(), self.probe(REVIEWS, reviews).await);

        let knowledge_base = VectorQuery::knowledge_base(vector, 5, PROBE_MIN_SCORE, None);
        tests.insert(KNOWLEDGE_BASE.to_string(), self.probe(KNOWLEDGE_BASE, knowledge_base).await);

        PerformanceReport {
            timestamp: Utc::now(),
            tests,
        }
    }

    /// Full provisioning pass. Only an unreachable store is an error; every
    /// other failure lands in the report.
    pub async fn run(&self) -> Result<ProvisionReport, Box<dyn Error + Send + Sync>> {
        info!("Testing DocumentDB connection...");
        self.store.ping().await.map_err(|e| format!("DocumentDB connection failed: {}", e))?;
        info!("DocumentDB connection successful");

        info!("Creating vector indexes...");
        let vector_indexes = self.create_vector_indexes().await;

        info!("Creating supporting indexes...");
        let supporting_indexes = self.create_supporting_indexes().await;

        info!("Getting index statistics...");
        let statistics = self.index_stats().await;

        info!("Testing vector search performance...");
        let performance_tests = self.test_search_performance().await;

        let all_indexes_created =
            vector_indexes.values().all(|ok| *ok) && supporting_indexes.values().all(|ok| *ok);

        Ok(ProvisionReport {
            timestamp: Utc::now(),
            vector_indexes,
            supporting_indexes,
            statistics,
            performance_tests,
            all_indexes_created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn report_file_name_uses_utc_timestamp() {
        let report = ProvisionReport {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 7, 14, 5, 9).unwrap(),
            vector_indexes: BTreeMap::new(),
            supporting_indexes: BTreeMap::new(),
            statistics: BTreeMap::new(),
            performance_tests: PerformanceReport {
                timestamp: Utc::now(),
                tests: BTreeMap::new(),
            },
            all_indexes_created: true,
        };
        assert_eq!(report.file_name(), "vector_search_setup_results_20260307_140509.json");
    }

    #[test]
    fn failed_stats_serialize_as_error_object() {
        let entry = StatsEntry::Failed { error: "collStats denied".to_string() };
        assert_eq!(serde_json::to_value(&entry).unwrap(), serde_json::json!({ "error": "collStats denied" }));
    }

    #[test]
    fn failed_probe_omits_measurements() {
        let probe = SearchProbe {
            success: false,
            results_count: None,
            response_time_ms: None,
            sample_scores: Vec::new(),
            error: Some("index not found".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&probe).unwrap(),
            serde_json::json!({ "success": false, "error": "index not found" })
        );
    }
}
