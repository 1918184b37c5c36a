//! Core domain for the matzip search agent.
//!
//! This crate holds everything the rest of the workspace agrees on:
//! - the closed set of search strategies and their validated parameters
//!   (`domain::action`)
//! - the result model returned by every strategy (`domain::result`)
//! - the error taxonomy shared across collaborators (`errors`)
//! - the retry/validation policy that decides when a resolution attempt or
//!   a result set is good enough (`policy`)
//! - application configuration (`config`)
//!
//! # Design principle
//!
//! The language model is strictly a branch selector. It never constructs
//! queries or inspects results; its tool choice is untrusted input that must
//! parse into the `SearchStrategy` sum type before anything executes.

pub mod config;
pub mod domain;
pub mod errors;
pub mod policy;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::action::{
    Action, CategoryParams, DetailParams, MenuParams, ParamMap, PriceRangeParams, SearchStrategy,
    SimilarParams, UnifiedParams,
};
pub use domain::result::{
    CategoryBucket, MenuItem, RestaurantRecord, SearchResult, SearchStats,
};
pub use errors::SearchError;
pub use policy::{PolicyConfig, ResolutionPolicy, RetryDecision, Verdict};
