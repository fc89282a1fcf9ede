use serde::{ Deserialize, Serialize };

pub const PRODUCTS: &str = "products";
pub const REVIEWS: &str = "reviews";
pub const KNOWLEDGE_BASE: &str = "knowledge_base";

pub const EMBEDDING_DIMENSIONS: usize = 1536;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexOrder {
    Ascending,
    Descending,
    Text,
}

impl IndexOrder {
    pub fn name_suffix(&self) -> &'static str {
        match self {
            IndexOrder::Ascending => "1",
            IndexOrder::Descending => "-1",
            IndexOrder::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub keys: Vec<(String, IndexOrder)>,
}

impl IndexDescriptor {
    pub fn single(field: &str, order: IndexOrder) -> Self {
        Self { keys: vec![(field.to_string(), order)] }
    }

    pub fn asc(field: &str) -> Self {
        Self::single(field, IndexOrder::Ascending)
    }

    pub fn desc(field: &str) -> Self {
        Self::single(field, IndexOrder::Descending)
    }

    pub fn text(fields: &[&str]) -> Self {
        Self {
            keys: fields
                .iter()
                .map(|f| (f.to_string(), IndexOrder::Text))
                .collect(),
        }
    }

    pub fn compound(keys: &[(&str, IndexOrder)]) -> Self {
        Self {
            keys: keys
                .iter()
                .map(|(f, o)| (f.to_string(), *o))
                .collect(),
        }
    }

    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, order)| format!("{}_{}", field, order.name_suffix()))
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn is_text(&self) -> bool {
        self.keys.iter().any(|(_, o)| *o == IndexOrder::Text)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.keys
            .iter()
            .map(|(f, _)| f.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    pub index_name: String,
    pub vector_field: String,
    pub dimensions: usize,
    pub similarity: String,
    pub ef_construction: u32,
    pub max_connections: u32,
}

impl VectorIndexConfig {
    fn hnsw(index_name: &str, vector_field: &str, ef_construction: u32, max_connections: u32) -> Self {
        Self {
            index_name: index_name.to_string(),
            vector_field: vector_field.to_string(),
            dimensions: EMBEDDING_DIMENSIONS,
            similarity: "cosine".to_string(),
            ef_construction,
            max_connections,
        }
    }
}

pub fn vector_index_configs() -> Vec<(&'static str, VectorIndexConfig)> {
    vec![
        (PRODUCTS, products_vector_index()),
        (REVIEWS, reviews_vector_index()),
        (KNOWLEDGE_BASE, knowledge_base_vector_index())
    ]
}

pub fn products_vector_index() -> VectorIndexConfig {
    VectorIndexConfig::hnsw("product_description_vector_index", "description_embedding", 200, 16)
}

pub fn reviews_vector_index() -> VectorIndexConfig {
    VectorIndexConfig::hnsw("review_content_vector_index", "content_embedding", 200, 16)
}

pub fn knowledge_base_vector_index() -> VectorIndexConfig {
    VectorIndexConfig::hnsw("knowledge_base_vector_index", "content_embedding", 300, 32)
}

pub fn supporting_index_plan() -> Vec<(&'static str, Vec<IndexDescriptor>)> {
    use IndexOrder::{ Ascending, Descending };
    vec![
        (
            PRODUCTS,
            vec![
                IndexDescriptor::asc("category"),
                IndexDescriptor::asc("tags"),
                IndexDescriptor::asc("price"),
                IndexDescriptor::desc("rating"),
                IndexDescriptor::desc("created_at"),
                IndexDescriptor::compound(
                    &[
                        ("category", Ascending),
                        ("rating", Descending),
                        ("price", Ascending),
                    ]
                )
            ],
        ),
        (
            REVIEWS,
            vec![
                IndexDescriptor::asc("product_id"),
                IndexDescriptor::asc("user_id"),
                IndexDescriptor::desc("rating"),
                IndexDescriptor::desc("created_at"),
                IndexDescriptor::desc("helpful_count"),
                IndexDescriptor::compound(
                    &[
                        ("product_id", Ascending),
                        ("rating", Descending),
                        ("created_at", Descending),
                    ]
                ),
                IndexDescriptor::compound(
                    &[
                        ("product_id", Ascending),
                        ("helpful_count", Descending),
                    ]
                )
            ],
        ),
        (
            KNOWLEDGE_BASE,
            vec![
                IndexDescriptor::asc("category"),
                IndexDescriptor::asc("type"),
                IndexDescriptor::asc("tags"),
                IndexDescriptor::desc("created_at"),
                IndexDescriptor::text(&["title", "content"])
            ],
        )
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_mongodb_defaults() {
        assert_eq!(IndexDescriptor::asc("category").name(), "category_1");
        assert_eq!(IndexDescriptor::desc("createdAt").name(), "createdAt_-1");
        assert_eq!(IndexDescriptor::text(&["title", "content"]).name(), "title_text_content_text");
        assert_eq!(
            IndexDescriptor::compound(
                &[
                    ("product_id", IndexOrder::Ascending),
                    ("helpful_count", IndexOrder::Descending),
                ]
            ).name(),
            "product_id_1_helpful_count_-1"
        );
    }

    #[test]
    fn knowledge_base_gets_denser_graph() {
        let kb = knowledge_base_vector_index();
        assert_eq!(kb.ef_construction, 300);
        assert_eq!(kb.max_connections, 32);
        let products = products_vector_index();
        assert_eq!(products.vector_field, "description_embedding");
        assert_eq!(products.dimensions, 1536);
        assert_eq!(reviews_vector_index().ef_construction, 200);
    }

    #[test]
    fn every_vector_collection_has_supporting_indexes() {
        let vector: Vec<_> = vector_index_configs()
            .into_iter()
            .map(|(c, _)| c)
            .collect();
        let supporting: Vec<_> = supporting_index_plan()
            .into_iter()
            .map(|(c, _)| c)
            .collect();
        assert_eq!(vector, supporting);
    }
}
