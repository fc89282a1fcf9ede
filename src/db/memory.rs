use async_trait::async_trait;
use serde_json::{ Map, Value };
use std::collections::{ HashMap, HashSet };
use std::error::Error;
use tokio::sync::Mutex;
use log::debug;

use super::{ CollectionStats, DocumentStore };
use crate::index::{ IndexDescriptor, VectorIndexConfig };
use crate::search::VectorQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Ping,
    CreateIndex,
    CreateVectorIndex,
    ListIndexes,
    Count,
    Stats,
    DeleteAll,
    InsertMany,
    VectorSearch,
    Close,
}

#[derive(Debug, Default)]
struct MemoryCollection {
    documents: Vec<Value>,
    indexes: Vec<String>,
    text_index: Option<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, MemoryCollection>,
    failures: HashSet<(Operation, Option<String>)>,
    calls: HashMap<Operation, usize>,
    next_id: u64,
    closed: bool,
}

impl MemoryState {
    fn record(&mut self, op: Operation, collection: Option<&str>) -> Result<(), Box<dyn Error + Send + Sync>> {
        *self.calls.entry(op).or_insert(0) += 1;
        let scoped = collection.map(|c| (op, Some(c.to_string())));
        if self.failures.contains(&(op, None)) || scoped.is_some_and(|key| self.failures.contains(&key)) {
            return Err(
                format!("injected {:?} failure on '{}'", op, collection.unwrap_or("<database>")).into()
            );
        }
        Ok(())
    }

    fn collection(&mut self, name: &str) -> &mut MemoryCollection {
        self.collections.entry(name.to_string()).or_insert_with(|| MemoryCollection {
            indexes: vec!["_id_".to_string()],
            ..Default::default()
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    state: Mutex<MemoryState>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_on(&self, op: Operation, collection: Option<&str>) {
        let mut state = self.state.lock().await;
        state.failures.insert((op, collection.map(String::from)));
    }

    pub async fn calls(&self, op: Operation) -> usize {
        self.state.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    pub async fn preload(&self, collection: &str, documents: Vec<Value>) {
        let mut state = self.state.lock().await;
        state.collection(collection).documents.extend(documents);
    }

    pub async fn documents(&self, collection: &str) -> Vec<Value> {
        let state = self.state.lock().await;
        state.collections
            .get(collection)
            .map(|c| c.documents.clone())
            .unwrap_or_default()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a
        .iter()
        .zip(b)
        .map(|(x, y)| x * y)
        .sum();
    let norm_a = a
        .iter()
        .map(|x| x * x)
        .sum::<f32>()
        .sqrt();
    let norm_b = b
        .iter()
        .map(|x| x * x)
        .sum::<f32>()
        .sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn embedding(document: &Value, path: &str) -> Option<Vec<f32>> {
    document
        .get(path)?
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// Equality on scalar filter values; operator documents always match.
fn matches_filter(document: &Value, filter: Option<&Map<String, Value>>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    filter.iter().all(|(field, expected)| {
        match expected {
            Value::Object(_) => true,
            scalar => document.get(field) == Some(scalar),
        }
    })
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn ping(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.state.lock().await.record(Operation::Ping, None)
    }

    async fn create_index(
        &self,
        collection: &str,
        index: &IndexDescriptor
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        state.record(Operation::CreateIndex, Some(collection))?;
        let name = index.name();
        let target = state.collection(collection);
        if target.indexes.contains(&name) {
            return Ok(name);
        }
        if index.is_text() {
            if let Some(existing) = &target.text_index {
                return Err(
                    format!(
                        "collection '{}' already has text index {}; only one text index is allowed",
                        collection,
                        existing
                    ).into()
                );
            }
            target.text_index = Some(name.clone());
        }
        target.indexes.push(name.clone());
        debug!("Memory store created index {} on {}", name, collection);
        Ok(name)
    }

    async fn create_vector_index(
        &self,
        collection: &str,
        config: &VectorIndexConfig
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        state.record(Operation::CreateVectorIndex, Some(collection))?;
        let target = state.collection(collection);
        if !target.indexes.contains(&config.index_name) {
            target.indexes.push(config.index_name.clone());
        }
        Ok(())
    }

    async fn list_index_names(
        &self,
        collection: &str
    ) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        state.record(Operation::ListIndexes, Some(collection))?;
        Ok(
            state.collections
                .get(collection)
                .map(|c| c.indexes.clone())
                .unwrap_or_default()
        )
    }

    async fn count_documents(&self, collection: &str) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        state.record(Operation::Count, Some(collection))?;
        Ok(
            state.collections
                .get(collection)
                .map_or(0, |c| c.documents.len() as u64)
        )
    }

    async fn collection_stats(
        &self,
        collection: &str
    ) -> Result<CollectionStats, Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        state.record(Operation::Stats, Some(collection))?;
        let Some(target) = state.collections.get(collection) else {
            return Ok(CollectionStats::default());
        };
        let count = target.documents.len() as u64;
        let size_bytes = target.documents
            .iter()
            .map(|d| serde_json::to_vec(d).map_or(0, |bytes| bytes.len() as u64))
            .sum::<u64>();
        let avg_document_size = if count == 0 { 0.0 } else { (size_bytes as f64) / (count as f64) };
        Ok(CollectionStats {
            count,
            size_bytes,
            avg_document_size,
        })
    }

    async fn delete_all(&self, collection: &str) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        state.record(Operation::DeleteAll, Some(collection))?;
        let target = state.collection(collection);
        let deleted = target.documents.len() as u64;
        target.documents.clear();
        Ok(deleted)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: &[Value]
    ) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        state.record(Operation::InsertMany, Some(collection))?;

        let mut prepared = Vec::with_capacity(documents.len());
        for (position, document) in documents.iter().enumerate() {
            let Value::Object(fields) = document else {
                return Err(format!("document {} in batch is not a JSON object", position).into());
            };
            let mut fields = fields.clone();
            if !fields.contains_key("_id") {
                state.next_id += 1;
                fields.insert("_id".to_string(), Value::String(format!("mem-{}", state.next_id)));
            }
            prepared.push(Value::Object(fields));
        }

        let inserted = prepared.len();
        state.collection(collection).documents.extend(prepared);
        Ok(inserted)
    }

    async fn vector_search(
        &self,
        collection: &str,
        query: &VectorQuery
    ) -> Result<Vec<(f32, String, Value)>, Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        state.record(Operation::VectorSearch, Some(collection))?;
        let Some(target) = state.collections.get(collection) else {
            return Err(format!("vector index {} not found on '{}'", query.index_name, collection).into());
        };
        if !target.indexes.contains(&query.index_name) {
            return Err(format!("vector index {} not found on '{}'", query.index_name, collection).into());
        }

        let mut scored: Vec<(f32, String, Value)> = target.documents
            .iter()
            .filter(|d| matches_filter(d, query.filter.as_ref()))
            .filter_map(|d| {
                let vector = embedding(d, &query.path)?;
                if vector.len() != query.vector.len() {
                    return None;
                }
                let score = cosine(&query.vector, &vector);
                let id = match d.get("_id") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => "missing_id".to_string(),
                };
                Some((score, id, d.clone()))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(query.limit);
        scored.retain(|(score, _, _)| *score >= query.min_score);

        for (score, _, document) in scored.iter_mut() {
            if let Value::Object(fields) = document {
                if !query.projection.is_empty() {
                    fields.retain(|k, _| query.projection.contains(k));
                }
                if let Some(number) = serde_json::Number::from_f64(*score as f64) {
                    fields.insert("similarity_score".to_string(), Value::Number(number));
                }
            }
        }
        Ok(scored)
    }

    async fn close(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        state.record(Operation::Close, None)?;
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ knowledge_base_vector_index, IndexDescriptor };
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_ids_and_counts() {
        let store = MemoryDocumentStore::new();
        let inserted = store
            .insert_many("kb", &[json!({ "title": "a" }), json!({ "_id": "fixed", "title": "b" })]).await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(store.count_documents("kb").await.unwrap(), 2);
        let docs = store.documents("kb").await;
        assert_eq!(docs[0]["_id"], "mem-1");
        assert_eq!(docs[1]["_id"], "fixed");
    }

    #[tokio::test]
    async fn rejects_non_object_documents() {
        let store = MemoryDocumentStore::new();
        let err = store.insert_many("kb", &[json!({ "ok": true }), json!(42)]).await.unwrap_err();
        assert!(err.to_string().contains("document 1"));
        assert_eq!(store.count_documents("kb").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn second_text_index_is_refused() {
        let store = MemoryDocumentStore::new();
        store.create_index("kb", &IndexDescriptor::text(&["title"])).await.unwrap();
        assert_eq!(store.create_index("kb", &IndexDescriptor::text(&["title"])).await.unwrap(), "title_text");
        assert!(store.create_index("kb", &IndexDescriptor::text(&["content"])).await.is_err());
    }

    #[tokio::test]
    async fn injected_failures_are_scoped() {
        let store = MemoryDocumentStore::new();
        store.fail_on(Operation::CreateIndex, Some("reviews")).await;
        assert!(store.create_index("reviews", &IndexDescriptor::asc("rating")).await.is_err());
        assert!(store.create_index("products", &IndexDescriptor::asc("rating")).await.is_ok());
        assert_eq!(store.calls(Operation::CreateIndex).await, 2);
    }

    #[tokio::test]
    async fn vector_search_ranks_by_cosine() {
        let store = MemoryDocumentStore::new();
        let config = knowledge_base_vector_index();
        store.create_vector_index("knowledge_base", &config).await.unwrap();
        store.insert_many(
            "knowledge_base",
            &[
                json!({ "title": "returns", "category": "policy", "content_embedding": [1.0, 0.0] }),
                json!({ "title": "shipping", "category": "policy", "content_embedding": [0.6, 0.8] }),
                json!({ "title": "sizing", "category": "fit", "content_embedding": [0.0, 1.0] }),
            ]
        ).await.unwrap();

        let query = VectorQuery::knowledge_base(vec![1.0, 0.0], 5, 0.1, Some("policy"));
        let results = store.vector_search("knowledge_base", &query).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].2["title"], "returns");
        assert!((results[0].0 - 1.0).abs() < 1e-6);
        assert!((results[1].0 - 0.6).abs() < 1e-6);
        assert!(results[0].2.get("content_embedding").is_none());
        assert!(results[0].2.get("similarity_score").is_some());
    }

    #[tokio::test]
    async fn vector_search_needs_the_index() {
        let store = MemoryDocumentStore::new();
        store.preload("reviews", vec![json!({ "content_embedding": [1.0] })]).await;
        let query = VectorQuery::reviews(vec![1.0], 10, 0.1, None);
        let err = store.vector_search("reviews", &query).await.unwrap_err();
        assert!(err.to_string().contains("review_content_vector_index"));
    }
}
