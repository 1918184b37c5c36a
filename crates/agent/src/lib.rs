//! Agent runtime - LLM-backed intent resolution and orchestration
//!
//! This crate is the "brain" of the matzip system:
//! - Presents the search strategies to a language model as a tool catalog
//! - Resolves free-text queries into one typed search action, with a
//!   bounded retry loop over implausible candidates
//! - Executes the chosen strategy and widens a weak result set exactly once
//!
//! # Architecture
//!
//! The agent follows a constrained loop:
//! 1. **Intent Resolution** (`resolver`) - NL query → typed `Action`
//! 2. **Strategy Execution** - run the action against the restaurant index
//! 3. **Result Validation** - judge the result set, widen at most once
//!
//! # Key Types
//!
//! - `SearchAgent` - Main orchestrator (see `runtime` module)
//! - `LlmClient` - Pluggable model trait; `AnthropicClient` is the default
//! - `IntentResolver` - The bounded resolution loop
//!
//! # Safety Principle
//!
//! The LLM is strictly a branch selector. It NEVER shapes queries, ranks
//! results, or decides retries. Those are deterministic decisions made by
//! `ResolutionPolicy` and the strategy layer.

pub mod llm;
pub mod resolver;
pub mod runtime;
pub mod tools;

pub use llm::{AnthropicClient, LlmClient, ModelReply, ToolInvocation};
pub use resolver::{IntentResolver, Resolution};
pub use runtime::{SearchAgent, SearchOutcome};
