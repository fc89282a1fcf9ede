pub mod config;
pub mod db;
pub mod index;
pub mod logging;
pub mod provision;
pub mod search;
pub mod seed;
pub mod test_runner;
pub use db::{ DocumentStore, connect_document_store, get_store_type, StoreType, CollectionStats };
pub use config::{ DocumentDbConfig, ConfigError };
pub use index::{ IndexDescriptor, IndexOrder, VectorIndexConfig };
pub use provision::{ IndexProvisioner, ProvisionReport };
pub use seed::{ Seeder, SeedPlan, SeedReport, SeedError };
