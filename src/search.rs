use serde_json::{ json, Map, Value };

use crate::index::{
    knowledge_base_vector_index,
    products_vector_index,
    reviews_vector_index,
    VectorIndexConfig,
};

const PRODUCT_FIELDS: &[&str] = &[
    "_id",
    "product_id",
    "title",
    "description",
    "category",
    "price",
    "rating",
    "review_count",
    "image_url",
    "tags",
];

const REVIEW_FIELDS: &[&str] = &[
    "_id",
    "review_id",
    "product_id",
    "user_id",
    "user_name",
    "rating",
    "title",
    "content",
    "sentiment",
    "aspects",
    "helpful_count",
    "created_at",
];

const KNOWLEDGE_BASE_FIELDS: &[&str] = &[
    "_id",
    "article_id",
    "title",
    "content",
    "category",
    "type",
    "tags",
    "created_at",
];

#[derive(Debug, Clone, Default)]
pub struct ProductFilters {
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub index_name: String,
    pub path: String,
    pub vector: Vec<f32>,
    pub num_candidates: usize,
    pub limit: usize,
    pub min_score: f32,
    pub filter: Option<Map<String, Value>>,
    pub projection: Vec<String>,
}

impl VectorQuery {
    fn for_index(
        config: VectorIndexConfig,
        vector: Vec<f32>,
        limit: usize,
        candidate_factor: usize,
        min_score: f32,
        fields: &[&str]
    ) -> Self {
        Self {
            index_name: config.index_name,
            path: config.vector_field,
            vector,
            num_candidates: limit * candidate_factor,
            limit,
            min_score,
            filter: None,
            projection: fields
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }

    pub fn products(vector: Vec<f32>, limit: usize, min_score: f32, filters: &ProductFilters) -> Self {
        let mut query = Self::for_index(
            products_vector_index(),
            vector,
            limit,
            10,
            min_score,
            PRODUCT_FIELDS
        );

        let mut filter = Map::new();
        if let Some(category) = &filters.category {
            filter.insert("category".to_string(), json!(category));
        }
        if filters.min_price.is_some() || filters.max_price.is_some() {
            let mut range = Map::new();
            range.insert("$gte".to_string(), json!(filters.min_price.unwrap_or(0.0)));
            if let Some(max) = filters.max_price {
                range.insert("$lte".to_string(), json!(max));
            }
            filter.insert("price".to_string(), Value::Object(range));
        }
        if let Some(rating) = filters.min_rating {
            filter.insert("rating".to_string(), json!({ "$gte": rating }));
        }
        if !filters.tags.is_empty() {
            filter.insert("tags".to_string(), json!({ "$in": filters.tags }));
        }
        if !filter.is_empty() {
            query.filter = Some(filter);
        }
        query
    }

    pub fn reviews(vector: Vec<f32>, limit: usize, min_score: f32, product_id: Option<&str>) -> Self {
        let mut query = Self::for_index(
            reviews_vector_index(),
            vector,
            limit,
            10,
            min_score,
            REVIEW_FIELDS
        );
        if let Some(id) = product_id {
            let mut filter = Map::new();
            filter.insert("product_id".to_string(), json!(id));
            query.filter = Some(filter);
        }
        query
    }

    pub fn knowledge_base(vector: Vec<f32>, limit: usize, min_score: f32, category: Option<&str>) -> Self {
        let mut query = Self::for_index(
            knowledge_base_vector_index(),
            vector,
            limit,
            20,
            min_score,
            KNOWLEDGE_BASE_FIELDS
        );
        if let Some(category) = category {
            let mut filter = Map::new();
            filter.insert("category".to_string(), json!(category));
            query.filter = Some(filter);
        }
        query
    }

    pub fn pipeline(&self) -> Vec<Value> {
        let mut search = Map::new();
        search.insert("index".to_string(), json!(self.index_name));
        search.insert("path".to_string(), json!(self.path));
        search.insert("queryVector".to_string(), json!(self.vector));
        search.insert("numCandidates".to_string(), json!(self.num_candidates));
        search.insert("limit".to_string(), json!(self.limit));
        if let Some(filter) = &self.filter {
            search.insert("filter".to_string(), Value::Object(filter.clone()));
        }

        let mut stages = vec![
            json!({ "$vectorSearch": Value::Object(search) }),
            json!({ "$addFields": { "similarity_score": { "$meta": "vectorSearchScore" } } }),
            json!({ "$match": { "similarity_score": { "$gte": self.min_score } } })
        ];

        if !self.projection.is_empty() {
            let mut project: Map<String, Value> = self.projection
                .iter()
                .map(|f| (f.clone(), json!(1)))
                .collect();
            project.insert("similarity_score".to_string(), json!(1));
            stages.push(json!({ "$project": Value::Object(project) }));
        }
        stages
    }
}
