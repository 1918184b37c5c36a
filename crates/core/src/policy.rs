use serde::Deserialize;

use crate::domain::action::{Action, DEFAULT_LIMIT, DEFAULT_SEARCH_TERM, SearchStrategy};
use crate::domain::result::SearchResult;

/// Tunable thresholds for the retry/validation policy. Injected at
/// construction so tests can tighten or disable individual heuristics.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Maximum resolution attempts, fallback included.
    pub max_attempts: u32,
    /// Result sets smaller than this are widened once.
    pub min_results_threshold: u64,
    /// Limit used when re-running the original query widened.
    pub widened_limit: u32,
    /// Limit used for the default-term fallback search.
    pub default_limit: u32,
    /// Catch-all search term for fallback actions.
    pub default_query: String,
    /// Detail-lookup names longer than this look like a guessed entity.
    pub max_detail_name_chars: usize,
    /// Price bands narrower than this (won) are too narrow to be useful.
    pub min_price_band_width: i64,
    /// Price floors above this (won) are implausible for the district.
    pub max_plausible_min_price: i64,
    /// Vague intent markers ("recommend/find/where"); a detail lookup
    /// resolved from a query containing one of these is a mismatch.
    /// Admittedly incomplete coverage; replaceable via configuration.
    pub generic_keywords: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_results_threshold: 2,
            widened_limit: 15,
            default_limit: DEFAULT_LIMIT,
            default_query: DEFAULT_SEARCH_TERM.to_owned(),
            max_detail_name_chars: 15,
            min_price_band_width: 5_000,
            max_plausible_min_price: 50_000,
            generic_keywords: ["추천", "찾아", "어디", "맛집"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Outcome of the pre-execution retry predicate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub reason: String,
}

impl RetryDecision {
    fn accept(reason: impl Into<String>) -> Self {
        Self { retry: false, reason: reason.into() }
    }

    fn retry(reason: impl Into<String>) -> Self {
        Self { retry: true, reason: reason.into() }
    }
}

/// Post-execution judgment over one result set.
#[derive(Clone, Debug, PartialEq)]
pub struct Verdict {
    pub satisfactory: bool,
    pub reason: String,
    /// Corrective action, executed exactly once and never re-validated.
    pub alternative: Option<Action>,
}

/// The two pure predicates driving the adaptive loop: whether a candidate
/// action deserves another resolution attempt, and whether an executed
/// result set is good enough. No side effects, no shared state.
#[derive(Clone, Debug, Default)]
pub struct ResolutionPolicy {
    config: PolicyConfig,
}

impl ResolutionPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Pre-execution retry predicate over the candidate action.
    ///
    /// `candidate` is `None` when the model produced no recognizable tool
    /// choice. Always accepts on the final allowed attempt; otherwise the
    /// first matching condition wins, in fixed order: missing candidate,
    /// detail-name specificity, price band plausibility, generic-intent
    /// mismatch.
    pub fn should_retry(
        &self,
        candidate: Option<&Action>,
        original_query: &str,
        attempt_index: u32,
    ) -> RetryDecision {
        if attempt_index + 1 >= self.config.max_attempts {
            return RetryDecision::accept("final attempt, accepting candidate");
        }

        let Some(action) = candidate else {
            return RetryDecision::retry("no recognizable tool choice in model reply");
        };

        if action.strategy == SearchStrategy::GetRestaurantDetails {
            if let Some(name) = action.str_param("restaurant_name") {
                if name.chars().count() > self.config.max_detail_name_chars
                    || name.contains(self.config.default_query.as_str())
                {
                    return RetryDecision::retry(
                        "restaurant name looks like an over-specific guess",
                    );
                }
            }
        }

        if action.strategy == SearchStrategy::SearchByPriceRange {
            let min_price = action.int_param("min_price");
            let max_price = action.int_param("max_price");
            if let (Some(min), Some(max)) = (min_price, max_price) {
                if max - min < self.config.min_price_band_width {
                    return RetryDecision::retry("price range too narrow to be useful");
                }
            }
            if min_price.is_some_and(|min| min > self.config.max_plausible_min_price) {
                return RetryDecision::retry("implausibly high minimum price");
            }
        }

        if action.strategy == SearchStrategy::GetRestaurantDetails
            && self.config.generic_keywords.iter().any(|kw| original_query.contains(kw.as_str()))
        {
            return RetryDecision::retry(
                "generic query resolved to a specific-restaurant lookup",
            );
        }

        RetryDecision::accept("candidate action accepted")
    }

    /// Post-execution validation. An empty result widens to the default
    /// term; a thin result re-runs the original query with a higher limit.
    pub fn validate(&self, result: &SearchResult, original_query: &str) -> Verdict {
        if result.total == 0 {
            let reason = match &result.error {
                Some(error) => format!("search degraded: {error}"),
                None => "no results for the resolved action".to_owned(),
            };
            return Verdict {
                satisfactory: false,
                reason,
                alternative: Some(Action::unified(
                    self.config.default_query.clone(),
                    self.config.default_limit,
                )),
            };
        }

        if result.total < self.config.min_results_threshold {
            return Verdict {
                satisfactory: false,
                reason: format!(
                    "only {} result(s), below threshold {}",
                    result.total, self.config.min_results_threshold
                ),
                alternative: Some(Action::unified(original_query, self.config.widened_limit)),
            };
        }

        Verdict {
            satisfactory: true,
            reason: format!("{} results", result.total),
            alternative: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::domain::action::ParamMap;
    use crate::errors::SearchError;

    use super::*;

    fn policy() -> ResolutionPolicy {
        ResolutionPolicy::new(PolicyConfig::default())
    }

    fn action(strategy: SearchStrategy, params: serde_json::Value) -> Action {
        Action::new(strategy, params.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn missing_candidate_retries_until_final_attempt() {
        let policy = policy();
        let first = policy.should_retry(None, "맛집 추천", 0);
        assert!(first.retry);

        let last = policy.should_retry(None, "맛집 추천", 2);
        assert!(!last.retry);
    }

    #[test]
    fn predicate_is_deterministic() {
        let policy = policy();
        let candidate = action(
            SearchStrategy::SearchByPriceRange,
            json!({"min_price": 10000, "max_price": 12000}),
        );
        let first = policy.should_retry(Some(&candidate), "만원대 점심", 0);
        let second = policy.should_retry(Some(&candidate), "만원대 점심", 0);
        assert_eq!(first, second);
    }

    #[test]
    fn over_specific_detail_name_triggers_retry() {
        let policy = policy();
        let guessed = action(
            SearchStrategy::GetRestaurantDetails,
            json!({"restaurant_name": "매우맛있는전통한식맛집"}),
        );
        assert!(policy.should_retry(Some(&guessed), "한식 먹고 싶다", 0).retry);

        let plausible = action(
            SearchStrategy::GetRestaurantDetails,
            json!({"restaurant_name": "은하수"}),
        );
        assert!(!policy.should_retry(Some(&plausible), "은하수 메뉴 보여줘", 0).retry);
    }

    #[test]
    fn narrow_price_band_retries_wide_band_passes() {
        let policy = policy();
        let narrow = action(
            SearchStrategy::SearchByPriceRange,
            json!({"min_price": 10000, "max_price": 12000}),
        );
        let narrow_decision = policy.should_retry(Some(&narrow), "점심 메뉴", 0);
        assert!(narrow_decision.retry);
        assert!(narrow_decision.reason.contains("narrow"));

        let wide = action(
            SearchStrategy::SearchByPriceRange,
            json!({"min_price": 10000, "max_price": 30000}),
        );
        assert!(!policy.should_retry(Some(&wide), "점심 메뉴", 0).retry);
    }

    #[test]
    fn implausible_price_floor_retries() {
        let policy = policy();
        let absurd = action(
            SearchStrategy::SearchByPriceRange,
            json!({"min_price": 80000, "max_price": 200000}),
        );
        let decision = policy.should_retry(Some(&absurd), "비싼 곳", 0);
        assert!(decision.retry);
        assert!(decision.reason.contains("minimum price"));
    }

    #[test]
    fn generic_query_mapped_to_detail_lookup_retries() {
        let policy = policy();
        let candidate = action(
            SearchStrategy::GetRestaurantDetails,
            json!({"restaurant_name": "은하수"}),
        );
        assert!(policy.should_retry(Some(&candidate), "점심 맛집 추천해줘", 0).retry);
        assert!(!policy.should_retry(Some(&candidate), "은하수 영업시간", 0).retry);
    }

    #[test]
    fn final_attempt_overrides_every_retry_condition() {
        let policy = policy();
        let bad = action(
            SearchStrategy::SearchByPriceRange,
            json!({"min_price": 99000, "max_price": 99500}),
        );
        assert!(!policy.should_retry(Some(&bad), "맛집 추천", 2).retry);
    }

    #[test]
    fn empty_result_widens_to_default_term() {
        let policy = policy();
        let empty = SearchResult::default();
        let verdict = policy.validate(&empty, "갈비찜 맛있는 집");

        assert!(!verdict.satisfactory);
        let alternative = verdict.alternative.expect("alternative action");
        assert_eq!(alternative.strategy, SearchStrategy::SearchRestaurants);
        assert_eq!(alternative.str_param("query"), Some("맛집"));
        assert_eq!(alternative.int_param("limit"), Some(10));
    }

    #[test]
    fn thin_result_reruns_original_query_widened() {
        let policy = policy();
        let thin = SearchResult { total: 1, ..SearchResult::default() };
        let verdict = policy.validate(&thin, "갈비찜 맛있는 집");

        assert!(!verdict.satisfactory);
        let alternative = verdict.alternative.expect("alternative action");
        assert_eq!(alternative.str_param("query"), Some("갈비찜 맛있는 집"));
        assert_eq!(alternative.int_param("limit"), Some(15));
    }

    #[test]
    fn healthy_result_is_satisfactory() {
        let policy = policy();
        let healthy = SearchResult { total: 5, ..SearchResult::default() };
        let verdict = policy.validate(&healthy, "갈비찜");
        assert!(verdict.satisfactory);
        assert!(verdict.alternative.is_none());
    }

    #[test]
    fn errored_result_counts_as_empty() {
        let policy = policy();
        let errored = SearchResult::degraded(
            &SearchError::BackendUnavailable("connection refused".to_owned()),
            ParamMap::new(),
        );
        let verdict = policy.validate(&errored, "카페");
        assert!(!verdict.satisfactory);
        assert!(verdict.reason.contains("degraded"));
        assert!(verdict.alternative.is_some());
    }
}
