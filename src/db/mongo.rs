use mongodb::{ Client, Collection, Database, IndexModel };
use mongodb::bson::{ self, doc, Bson, Document };
use mongodb::error::{ Error as MongoError, ErrorKind };
use mongodb::options::{ ClientOptions, IndexOptions };
use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;
use std::error::Error;
use log::{ info, debug, warn };

use super::{ CollectionStats, DocumentStore };
use crate::config::{ DocumentDbConfig, CONNECT_TIMEOUT };
use crate::index::{ IndexDescriptor, IndexOrder, VectorIndexConfig };
use crate::search::VectorQuery;

const NAMESPACE_NOT_FOUND: i32 = 26;
const INDEX_ALREADY_EXISTS: i32 = 68;
const INDEX_OPTIONS_CONFLICT: i32 = 85;

pub struct MongoDocumentStore {
    client: Client,
    database: Database,
}

impl MongoDocumentStore {
    pub async fn connect(config: &DocumentDbConfig) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let uri = config.connection_uri();
        info!("Connecting to DocumentDB at {}", config.redacted_target());
        if let Some(ca) = &config.ssl_ca_certs {
            info!("Using SSL CA certificate file: {}", ca);
        } else if config.uri.is_none() {
            warn!("No CA bundle configured; connecting without certificate verification.");
        }

        let mut options = ClientOptions::parse(uri.as_str()).await?;
        options.server_selection_timeout = Some(CONNECT_TIMEOUT);
        options.connect_timeout = Some(CONNECT_TIMEOUT);
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);
        info!("DocumentDB client initialized for database: {}", config.database);

        Ok(Self {
            client,
            database,
        })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }

    async fn resolve_conflict(
        &self,
        collection: &str,
        name: &str,
        err: MongoError
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let accepted = match classify_index_error(command_code(&err)) {
            IndexConflict::Exists => true,
            IndexConflict::CheckName => {
                let existing = self.list_index_names(collection).await?;
                existing.iter().any(|n| n == name)
            }
            IndexConflict::Failed => false,
        };
        if !accepted {
            return Err(format!("Failed to create index {} on '{}': {}", name, collection, err).into());
        }
        info!("Index {} already exists on {}", name, collection);
        Ok(())
    }
}

fn command_code(err: &MongoError) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(command_error) => Some(command_error.code),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexConflict {
    Exists,
    CheckName,
    Failed,
}

fn classify_index_error(code: Option<i32>) -> IndexConflict {
    match code {
        Some(INDEX_ALREADY_EXISTS) => IndexConflict::Exists,
        Some(INDEX_OPTIONS_CONFLICT) => IndexConflict::CheckName,
        _ => IndexConflict::Failed,
    }
}

fn key_document(index: &IndexDescriptor) -> Document {
    let mut keys = Document::new();
    for (field, order) in &index.keys {
        let value = match order {
            IndexOrder::Ascending => Bson::Int32(1),
            IndexOrder::Descending => Bson::Int32(-1),
            IndexOrder::Text => Bson::String("text".to_string()),
        };
        keys.insert(field.clone(), value);
    }
    keys
}

pub(crate) fn vector_index_command(collection: &str, config: &VectorIndexConfig) -> Document {
    let mut key = Document::new();
    key.insert(config.vector_field.clone(), "vector");
    let dimensions = config.dimensions as i32;
    let max_connections = config.max_connections as i32;
    let ef_construction = config.ef_construction as i32;
    doc! {
        "createIndexes": collection,
        "indexes": [
            {
                "key": key,
                "name": config.index_name.clone(),
                "vectorOptions": {
                    "type": "hnsw",
                    "dimensions": dimensions,
                    "similarity": config.similarity.clone(),
                    "m": max_connections,
                    "efConstruction": ef_construction,
                },
            }
        ],
    }
}

fn numeric(doc: &Document, key: &str) -> f64 {
    match doc.get(key) {
        Some(Bson::Int32(v)) => *v as f64,
        Some(Bson::Int64(v)) => *v as f64,
        Some(Bson::Double(v)) => *v,
        _ => 0.0,
    }
}

fn id_to_string(id: Option<&Bson>) -> String {
    match id {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "missing_id".to_string(),
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn ping(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        debug!("DocumentDB ping succeeded");
        Ok(())
    }

    async fn create_index(
        &self,
        collection: &str,
        index: &IndexDescriptor
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let name = index.name();
        let model = IndexModel::builder()
            .keys(key_document(index))
            .options(IndexOptions::builder().name(name.clone()).build())
            .build();

        match self.collection(collection).create_index(model).await {
            Ok(result) => {
                debug!("Created index {} on {}", result.index_name, collection);
                Ok(result.index_name)
            }
            Err(e) => {
                self.resolve_conflict(collection, &name, e).await?;
                Ok(name)
            }
        }
    }

    async fn create_vector_index(
        &self,
        collection: &str,
        config: &VectorIndexConfig
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let command = vector_index_command(collection, config);
        debug!("Sending createIndexes for vector index {}: {:?}", config.index_name, command);
        match self.database.run_command(command).await {
            Ok(_) => Ok(()),
            Err(e) => self.resolve_conflict(collection, &config.index_name, e).await,
        }
    }

    async fn list_index_names(
        &self,
        collection: &str
    ) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
        match self.collection(collection).list_index_names().await {
            Ok(names) => Ok(names),
            Err(e) if command_code(&e) == Some(NAMESPACE_NOT_FOUND) => {
                debug!("Collection '{}' does not exist yet; no indexes", collection);
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn count_documents(&self, collection: &str) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let count = self.collection(collection).count_documents(doc! {}).await?;
        debug!("DocumentDB count for '{}': {}", collection, count);
        Ok(count)
    }

    async fn collection_stats(
        &self,
        collection: &str
    ) -> Result<CollectionStats, Box<dyn Error + Send + Sync>> {
        let stats = self.database.run_command(doc! { "collStats": collection }).await?;
        Ok(CollectionStats {
            count: numeric(&stats, "count") as u64,
            size_bytes: numeric(&stats, "size") as u64,
            avg_document_size: numeric(&stats, "avgObjSize"),
        })
    }

    async fn delete_all(&self, collection: &str) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let result = self.collection(collection).delete_many(doc! {}).await?;
        Ok(result.deleted_count)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: &[Value]
    ) -> Result<usize, Box<dyn Error + Send + Sync>> {
        if documents.is_empty() {
            return Ok(0);
        }
        let docs = documents
            .iter()
            .map(bson::to_document)
            .collect::<Result<Vec<Document>, _>>()?;
        let result = self.collection(collection).insert_many(docs).await?;
        Ok(result.inserted_ids.len())
    }

    async fn vector_search(
        &self,
        collection: &str,
        query: &VectorQuery
    ) -> Result<Vec<(f32, String, Value)>, Box<dyn Error + Send + Sync>> {
        let pipeline = query
            .pipeline()
            .iter()
            .map(bson::to_document)
            .collect::<Result<Vec<Document>, _>>()?;

        let cursor = self
            .collection(collection)
            .aggregate(pipeline).await
            .map_err(|e| format!("Vector search failed for '{}': {}", collection, e))?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        debug!("Vector search on '{}' returned {} documents", collection, documents.len());

        Ok(
            documents
                .into_iter()
                .map(|document| {
                    let score = numeric(&document, "similarity_score") as f32;
                    let id = id_to_string(document.get("_id"));
                    (score, id, Bson::Document(document).into_relaxed_extjson())
                })
                .collect()
        )
    }

    async fn close(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.client.clone().shutdown().await;
        info!("DocumentDB connection closed");
        Ok(())
    }
}
