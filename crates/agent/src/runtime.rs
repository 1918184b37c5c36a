use matzip_core::domain::action::Action;
use matzip_core::domain::result::SearchResult;
use matzip_search::{RestaurantIndex, SearchBackend};
use tracing::info;

use crate::llm::LlmClient;
use crate::resolver::IntentResolver;

/// Everything one query produced: the resolved action, the result that is
/// actually returned, and how the validation judged the first execution.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub query: String,
    /// The action that produced `result` (the widened one when `widened`).
    pub action: Action,
    pub reasoning: Option<String>,
    pub attempts: u32,
    /// Whether the first execution already satisfied the validation.
    pub satisfactory: bool,
    pub verdict_reason: String,
    /// True when the corrective action ran in place of the first result.
    pub widened: bool,
    pub result: SearchResult,
}

/// Orchestrates one query end to end: resolve, execute, validate, and widen
/// a weak result set at most once. The widened execution is terminal; its
/// result is returned without another validation round.
pub struct SearchAgent<L, B> {
    resolver: IntentResolver<L>,
    index: RestaurantIndex<B>,
}

impl<L, B> SearchAgent<L, B> {
    pub fn new(resolver: IntentResolver<L>, index: RestaurantIndex<B>) -> Self {
        Self { resolver, index }
    }

    pub fn index(&self) -> &RestaurantIndex<B> {
        &self.index
    }
}

impl<L: LlmClient, B: SearchBackend> SearchAgent<L, B> {
    pub async fn resolve_and_search(&self, query: &str) -> SearchOutcome {
        let resolution = self.resolver.resolve(query).await;
        info!(
            event_name = "agent.intent_resolved",
            strategy = %resolution.action.strategy,
            attempts = resolution.attempts,
            "resolved query to a search action"
        );

        let first = self.index.execute(&resolution.action).await;
        let verdict = self.resolver.policy().validate(&first, query);
        info!(
            event_name = "agent.result_validated",
            total = first.total,
            satisfactory = verdict.satisfactory,
            reason = %verdict.reason,
            "validated first execution"
        );

        let Some(alternative) = verdict.alternative else {
            return SearchOutcome {
                query: query.to_owned(),
                action: resolution.action,
                reasoning: resolution.reasoning,
                attempts: resolution.attempts,
                satisfactory: verdict.satisfactory,
                verdict_reason: verdict.reason,
                widened: false,
                result: first,
            };
        };

        info!(
            event_name = "agent.search_widened",
            strategy = %alternative.strategy,
            "re-running with the corrective action"
        );
        let result = self.index.execute(&alternative).await;
        SearchOutcome {
            query: query.to_owned(),
            action: alternative,
            reasoning: resolution.reasoning,
            attempts: resolution.attempts,
            satisfactory: false,
            verdict_reason: verdict.reason,
            widened: true,
            result,
        }
    }
}
