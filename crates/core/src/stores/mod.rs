pub mod meilisearch;

pub use meilisearch::MeilisearchIndex;
