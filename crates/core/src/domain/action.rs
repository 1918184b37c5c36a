use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::SearchError;

/// Catch-all search term used when a query cannot be recovered from the
/// resolved parameters. "맛집" is the generic Korean term for a good
/// restaurant, so it widens the search instead of failing it.
pub const DEFAULT_SEARCH_TERM: &str = "맛집";

pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_SIMILAR_LIMIT: u32 = 5;

/// Untyped parameter bag as produced by the model's tool invocation.
pub type ParamMap = Map<String, Value>;

/// The closed set of query-construction strategies.
///
/// The wire names double as tool names in the catalog the model chooses
/// from; `parse` fails closed (`None`) on anything outside this set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    SearchRestaurants,
    SearchByCategory,
    SearchByMenu,
    SearchByPriceRange,
    GetRestaurantDetails,
    GetStatistics,
    RecommendSimilarRestaurants,
}

impl SearchStrategy {
    pub const ALL: [SearchStrategy; 7] = [
        Self::SearchRestaurants,
        Self::SearchByCategory,
        Self::SearchByMenu,
        Self::SearchByPriceRange,
        Self::GetRestaurantDetails,
        Self::GetStatistics,
        Self::RecommendSimilarRestaurants,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "search_restaurants" => Some(Self::SearchRestaurants),
            "search_by_category" => Some(Self::SearchByCategory),
            "search_by_menu" => Some(Self::SearchByMenu),
            "search_by_price_range" => Some(Self::SearchByPriceRange),
            "get_restaurant_details" => Some(Self::GetRestaurantDetails),
            "get_statistics" => Some(Self::GetStatistics),
            "recommend_similar_restaurants" => Some(Self::RecommendSimilarRestaurants),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchRestaurants => "search_restaurants",
            Self::SearchByCategory => "search_by_category",
            Self::SearchByMenu => "search_by_menu",
            Self::SearchByPriceRange => "search_by_price_range",
            Self::GetRestaurantDetails => "get_restaurant_details",
            Self::GetStatistics => "get_statistics",
            Self::RecommendSimilarRestaurants => "recommend_similar_restaurants",
        }
    }
}

impl std::fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved `(strategy, parameters)` pair ready for dispatch.
///
/// Parameters stay untyped here because they arrive from an untrusted model
/// reply; each strategy validates them into its own param struct before a
/// query is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub strategy: SearchStrategy,
    #[serde(default)]
    pub params: ParamMap,
}

impl Action {
    pub fn new(strategy: SearchStrategy, params: ParamMap) -> Self {
        Self { strategy, params }
    }

    /// Unified search over `query`, the shape every fallback reduces to.
    pub fn unified(query: impl Into<String>, limit: u32) -> Self {
        let mut params = ParamMap::new();
        params.insert("query".to_owned(), Value::String(query.into()));
        params.insert("limit".to_owned(), Value::from(limit));
        Self { strategy: SearchStrategy::SearchRestaurants, params }
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn int_param(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(Value::as_i64)
    }

    pub fn bool_param(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(Value::as_bool)
    }

    fn limit_param(&self, default: u32) -> u32 {
        self.int_param("limit").and_then(|v| u32::try_from(v).ok()).filter(|v| *v > 0)
            .unwrap_or(default)
    }
}

/// Parameters for unified search.
///
/// Construction never fails: a missing `query` falls back to `keyword` and
/// then to the default term, so the dispatcher's catch-all arm always yields
/// some result set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnifiedParams {
    pub query: String,
    pub limit: u32,
    pub include_details: bool,
}

impl UnifiedParams {
    pub fn from_action(action: &Action) -> Self {
        let query = action
            .str_param("query")
            .or_else(|| action.str_param("keyword"))
            .unwrap_or(DEFAULT_SEARCH_TERM)
            .to_owned();
        Self {
            query,
            limit: action.limit_param(DEFAULT_LIMIT),
            include_details: action.bool_param("include_details").unwrap_or(false),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryParams {
    pub category: String,
    pub limit: u32,
}

impl CategoryParams {
    pub fn from_action(action: &Action) -> Result<Self, SearchError> {
        let category = action
            .str_param("category")
            .ok_or_else(|| SearchError::InvalidParameters("category is required".to_owned()))?
            .to_owned();
        Ok(Self { category, limit: action.limit_param(DEFAULT_LIMIT) })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuParams {
    pub menu_keyword: String,
    pub limit: u32,
}

impl MenuParams {
    pub fn from_action(action: &Action) -> Result<Self, SearchError> {
        let menu_keyword = action
            .str_param("menu_keyword")
            .ok_or_else(|| SearchError::InvalidParameters("menu_keyword is required".to_owned()))?
            .to_owned();
        Ok(Self { menu_keyword, limit: action.limit_param(DEFAULT_LIMIT) })
    }
}

/// Price band over nested menu prices, in won. At least one bound must be
/// present for the range filter to mean anything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceRangeParams {
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub limit: u32,
}

impl PriceRangeParams {
    pub fn from_action(action: &Action) -> Result<Self, SearchError> {
        let min_price = action.int_param("min_price");
        let max_price = action.int_param("max_price");
        if min_price.is_none() && max_price.is_none() {
            return Err(SearchError::InvalidParameters(
                "at least one of min_price or max_price is required".to_owned(),
            ));
        }
        Ok(Self { min_price, max_price, limit: action.limit_param(DEFAULT_LIMIT) })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetailParams {
    pub restaurant_name: String,
}

impl DetailParams {
    pub fn from_action(action: &Action) -> Result<Self, SearchError> {
        let restaurant_name = action
            .str_param("restaurant_name")
            .ok_or_else(|| {
                SearchError::InvalidParameters("restaurant_name is required".to_owned())
            })?
            .to_owned();
        Ok(Self { restaurant_name })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimilarParams {
    pub restaurant_name: String,
    pub limit: u32,
}

impl SimilarParams {
    pub fn from_action(action: &Action) -> Result<Self, SearchError> {
        let restaurant_name = action
            .str_param("restaurant_name")
            .ok_or_else(|| {
                SearchError::InvalidParameters("restaurant_name is required".to_owned())
            })?
            .to_owned();
        Ok(Self { restaurant_name, limit: action.limit_param(DEFAULT_SIMILAR_LIMIT) })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: serde_json::Value) -> ParamMap {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn strategy_names_round_trip() {
        for strategy in SearchStrategy::ALL {
            assert_eq!(SearchStrategy::parse(strategy.as_str()), Some(strategy));
        }
        assert_eq!(SearchStrategy::parse("drop_all_tables"), None);
        assert_eq!(SearchStrategy::parse(""), None);
    }

    #[test]
    fn unified_params_fall_back_through_keyword_to_default_term() {
        let from_query = Action::new(
            SearchStrategy::SearchRestaurants,
            params(json!({"query": "갈비찜", "limit": 5, "include_details": true})),
        );
        let unified = UnifiedParams::from_action(&from_query);
        assert_eq!(unified.query, "갈비찜");
        assert_eq!(unified.limit, 5);
        assert!(unified.include_details);

        let from_keyword = Action::new(
            SearchStrategy::SearchRestaurants,
            params(json!({"keyword": "짬뽕"})),
        );
        assert_eq!(UnifiedParams::from_action(&from_keyword).query, "짬뽕");

        let empty = Action::new(SearchStrategy::SearchRestaurants, ParamMap::new());
        let fallback = UnifiedParams::from_action(&empty);
        assert_eq!(fallback.query, DEFAULT_SEARCH_TERM);
        assert_eq!(fallback.limit, DEFAULT_LIMIT);
        assert!(!fallback.include_details);
    }

    #[test]
    fn price_range_requires_at_least_one_bound() {
        let unbounded = Action::new(SearchStrategy::SearchByPriceRange, ParamMap::new());
        assert!(matches!(
            PriceRangeParams::from_action(&unbounded),
            Err(SearchError::InvalidParameters(_))
        ));

        let upper_only = Action::new(
            SearchStrategy::SearchByPriceRange,
            params(json!({"max_price": 15000})),
        );
        let range = PriceRangeParams::from_action(&upper_only).expect("one bound suffices");
        assert_eq!(range.min_price, None);
        assert_eq!(range.max_price, Some(15000));
    }

    #[test]
    fn detail_lookup_requires_a_name() {
        let nameless = Action::new(SearchStrategy::GetRestaurantDetails, ParamMap::new());
        assert!(DetailParams::from_action(&nameless).is_err());

        let blank = Action::new(
            SearchStrategy::GetRestaurantDetails,
            params(json!({"restaurant_name": "   "})),
        );
        assert!(DetailParams::from_action(&blank).is_err());
    }

    #[test]
    fn similar_limit_defaults_to_five() {
        let action = Action::new(
            SearchStrategy::RecommendSimilarRestaurants,
            params(json!({"restaurant_name": "여의도 한정식"})),
        );
        assert_eq!(SimilarParams::from_action(&action).expect("valid").limit, 5);
    }

    #[test]
    fn nonsense_limits_revert_to_default() {
        let action = Action::new(
            SearchStrategy::SearchRestaurants,
            params(json!({"query": "카페", "limit": -3})),
        );
        assert_eq!(UnifiedParams::from_action(&action).limit, DEFAULT_LIMIT);
    }
}
