//! Search backend client and the seven query strategies.
//!
//! The backend is an inverted-index document store (Elasticsearch `_search`
//! contract) reached through the [`backend::SearchBackend`] trait; query
//! bodies are built in [`queries`] and executed by
//! [`strategies::RestaurantIndex`], which converts every backend fault into
//! a degraded-but-valid `SearchResult` rather than propagating it.

pub mod backend;
pub mod queries;
pub mod strategies;

pub use backend::{EsClient, Hit, QueryResponse, SearchBackend};
pub use strategies::RestaurantIndex;
