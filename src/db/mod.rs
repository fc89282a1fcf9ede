pub mod memory;
pub mod mongo;
use async_trait::async_trait;
use serde::{ Deserialize, Serialize };
use serde_json::Value;
use std::error::Error;
use std::sync::Arc;
use log::info;

use crate::config::DocumentDbConfig;
use crate::index::{ IndexDescriptor, VectorIndexConfig };
use crate::search::VectorQuery;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub count: u64,
    pub size_bytes: u64,
    pub avg_document_size: f64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn ping(&self) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Creates a secondary index and returns its name. Creating an index
    /// that already exists succeeds.
    async fn create_index(
        &self,
        collection: &str,
        index: &IndexDescriptor
    ) -> Result<String, Box<dyn Error + Send + Sync>>;

    async fn create_vector_index(
        &self,
        collection: &str,
        config: &VectorIndexConfig
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn list_index_names(
        &self,
        collection: &str
    ) -> Result<Vec<String>, Box<dyn Error + Send + Sync>>;

    async fn count_documents(&self, collection: &str) -> Result<u64, Box<dyn Error + Send + Sync>>;

    async fn collection_stats(
        &self,
        collection: &str
    ) -> Result<CollectionStats, Box<dyn Error + Send + Sync>>;

    async fn delete_all(&self, collection: &str) -> Result<u64, Box<dyn Error + Send + Sync>>;

    async fn insert_many(
        &self,
        collection: &str,
        documents: &[Value]
    ) -> Result<usize, Box<dyn Error + Send + Sync>>;

    /// Runs a similarity query; results are `(score, id, document)`.
    async fn vector_search(
        &self,
        collection: &str,
        query: &VectorQuery
    ) -> Result<Vec<(f32, String, Value)>, Box<dyn Error + Send + Sync>>;

    async fn close(&self) -> Result<(), Box<dyn Error + Send + Sync>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreType {
    DocumentDb,
    Memory,
}

pub async fn connect_document_store(
    store_type: StoreType,
    config: Option<&DocumentDbConfig>
) -> Result<Arc<dyn DocumentStore>, Box<dyn Error + Send + Sync>> {
    info!("Creating document store of type: {:?}", store_type);
    match store_type {
        StoreType::DocumentDb => {
            let config = config.ok_or("DocumentDB store requires connection settings")?;
            let store = mongo::MongoDocumentStore::connect(config).await?;
            Ok(Arc::new(store))
        }
        StoreType::Memory => Ok(Arc::new(memory::MemoryDocumentStore::new())),
    }
}

pub fn get_store_type(type_str: &str) -> Result<StoreType, String> {
    match type_str.to_lowercase().as_str() {
        "documentdb" | "docdb" | "mongodb" | "mongo" => Ok(StoreType::DocumentDb),
        "memory" | "in-memory" => Ok(StoreType::Memory),
        _ => Err(format!("Unsupported document store type: {}", type_str)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_store_aliases() {
        assert_eq!(get_store_type("DocumentDB"), Ok(StoreType::DocumentDb));
        assert_eq!(get_store_type("mongo"), Ok(StoreType::DocumentDb));
        assert_eq!(get_store_type("in-memory"), Ok(StoreType::Memory));
        assert!(get_store_type("dynamodb").unwrap_err().contains("dynamodb"));
    }

    #[tokio::test]
    async fn documentdb_store_needs_settings() {
        let err = connect_document_store(StoreType::DocumentDb, None).await.err().unwrap();
        assert!(err.to_string().contains("connection settings"));
    }
}
