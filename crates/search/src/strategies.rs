use std::time::Instant;

use matzip_core::domain::action::{
    Action, CategoryParams, DetailParams, MenuParams, ParamMap, PriceRangeParams, SearchStrategy,
    SimilarParams, UnifiedParams,
};
use matzip_core::domain::result::{
    CategoryBucket, MenuItem, RestaurantRecord, SearchResult, SearchStats,
};
use matzip_core::SearchError;
use serde_json::{json, Value};
use tracing::warn;

use crate::backend::{Hit, QueryResponse, SearchBackend};
use crate::queries;

const MATCHING_MENU_CAP: usize = 3;
const PRICE_MENU_CAP: usize = 5;
const TOP_CATEGORY_CAP: usize = 10;

/// The seven strategies over one restaurant index.
///
/// Every method returns a terminal `SearchResult`: backend faults, invalid
/// parameters and missing documents are folded into the result's `error`
/// field, never raised. The dispatcher (`execute`) guarantees that any
/// resolved action yields some result set.
#[derive(Clone, Debug)]
pub struct RestaurantIndex<B> {
    backend: B,
}

impl<B> RestaurantIndex<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: SearchBackend> RestaurantIndex<B> {
    /// Route a resolved action to its strategy. Parameter validation
    /// failures degrade; the unified arm cannot fail closed because
    /// `UnifiedParams` always recovers a query term.
    pub async fn execute(&self, action: &Action) -> SearchResult {
        match action.strategy {
            SearchStrategy::SearchRestaurants => {
                self.search_restaurants(&UnifiedParams::from_action(action)).await
            }
            SearchStrategy::SearchByCategory => match CategoryParams::from_action(action) {
                Ok(params) => self.search_by_category(&params).await,
                Err(error) => self.degrade(action, &error),
            },
            SearchStrategy::SearchByMenu => match MenuParams::from_action(action) {
                Ok(params) => self.search_by_menu(&params).await,
                Err(error) => self.degrade(action, &error),
            },
            SearchStrategy::SearchByPriceRange => match PriceRangeParams::from_action(action) {
                Ok(params) => self.search_by_price_range(&params).await,
                Err(error) => self.degrade(action, &error),
            },
            SearchStrategy::GetRestaurantDetails => match DetailParams::from_action(action) {
                Ok(params) => self.get_restaurant_details(&params).await,
                Err(error) => self.degrade(action, &error),
            },
            SearchStrategy::GetStatistics => self.get_statistics().await,
            SearchStrategy::RecommendSimilarRestaurants => {
                match SimilarParams::from_action(action) {
                    Ok(params) => self.recommend_similar(&params).await,
                    Err(error) => self.degrade(action, &error),
                }
            }
        }
    }

    pub async fn search_restaurants(&self, params: &UnifiedParams) -> SearchResult {
        let echo = SearchResult::echo(&[
            ("query", json!(params.query)),
            ("limit", json!(params.limit)),
            ("include_details", json!(params.include_details)),
        ]);

        match self.run(queries::unified(params)).await {
            Err(error) => degraded(SearchStrategy::SearchRestaurants, &error, echo),
            Ok((response, took_ms)) => {
                let records = response
                    .hits
                    .hits
                    .iter()
                    .map(|hit| {
                        let mut record = base_record(hit);
                        if params.include_details {
                            record.menu = menu_field(&hit.source);
                            record.images = images_field(&hit.source);
                        }
                        record
                    })
                    .collect();
                SearchResult {
                    total: response.total(),
                    records,
                    params: echo,
                    took_ms,
                    stats: None,
                    error: None,
                }
            }
        }
    }

    pub async fn search_by_category(&self, params: &CategoryParams) -> SearchResult {
        let echo = SearchResult::echo(&[
            ("category", json!(params.category)),
            ("limit", json!(params.limit)),
        ]);

        match self.run(queries::by_category(params)).await {
            Err(error) => degraded(SearchStrategy::SearchByCategory, &error, echo),
            Ok((response, took_ms)) => SearchResult {
                total: response.total(),
                records: response.hits.hits.iter().map(base_record).collect(),
                params: echo,
                took_ms,
                stats: None,
                error: None,
            },
        }
    }

    /// The only strategy surfacing partial (nested) matches: each record
    /// carries up to three matched menu entries.
    pub async fn search_by_menu(&self, params: &MenuParams) -> SearchResult {
        let echo = SearchResult::echo(&[
            ("menu_keyword", json!(params.menu_keyword)),
            ("limit", json!(params.limit)),
        ]);

        match self.run(queries::by_menu(params)).await {
            Err(error) => degraded(SearchStrategy::SearchByMenu, &error, echo),
            Ok((response, took_ms)) => {
                let records = response
                    .hits
                    .hits
                    .iter()
                    .map(|hit| {
                        let mut record = base_record(hit);
                        record.matching_menus = Some(inner_menus(hit, MATCHING_MENU_CAP));
                        record
                    })
                    .collect();
                SearchResult {
                    total: response.total(),
                    records,
                    params: echo,
                    took_ms,
                    stats: None,
                    error: None,
                }
            }
        }
    }

    pub async fn search_by_price_range(&self, params: &PriceRangeParams) -> SearchResult {
        let echo = SearchResult::echo(&[
            ("min_price", json!(params.min_price)),
            ("max_price", json!(params.max_price)),
            ("limit", json!(params.limit)),
        ]);

        match self.run(queries::by_price_range(params)).await {
            Err(error) => degraded(SearchStrategy::SearchByPriceRange, &error, echo),
            Ok((response, took_ms)) => {
                let records = response
                    .hits
                    .hits
                    .iter()
                    .map(|hit| {
                        let mut record = base_record(hit);
                        record.price_range_menus = Some(inner_menus(hit, PRICE_MENU_CAP));
                        record
                    })
                    .collect();
                SearchResult {
                    total: response.total(),
                    records,
                    params: echo,
                    took_ms,
                    stats: None,
                    error: None,
                }
            }
        }
    }

    /// Single best hit with the complete document (menu and images).
    /// Zero hits surface as a `NotFound` error field, not a failure.
    pub async fn get_restaurant_details(&self, params: &DetailParams) -> SearchResult {
        let echo =
            SearchResult::echo(&[("restaurant_name", json!(params.restaurant_name))]);

        match self.run(queries::detail(params)).await {
            Err(error) => degraded(SearchStrategy::GetRestaurantDetails, &error, echo),
            Ok((response, took_ms)) => {
                let Some(hit) = response.hits.hits.first() else {
                    let error = SearchError::NotFound(format!(
                        "no restaurant named `{}`",
                        params.restaurant_name
                    ));
                    return degraded(SearchStrategy::GetRestaurantDetails, &error, echo);
                };

                let mut record = base_record(hit);
                record.menu = menu_field(&hit.source);
                record.images = images_field(&hit.source);

                SearchResult {
                    total: response.total(),
                    records: vec![record],
                    params: echo,
                    took_ms,
                    stats: None,
                    error: None,
                }
            }
        }
    }

    /// Terms aggregation over categories plus a capped bulk scan, combined
    /// into index-wide statistics. `total` mirrors the restaurant count so
    /// post-hoc validation applies uniformly.
    pub async fn get_statistics(&self) -> SearchResult {
        let echo = ParamMap::new();

        let (agg_response, agg_ms) = match self.run(queries::stats_categories()).await {
            Ok(ok) => ok,
            Err(error) => return degraded(SearchStrategy::GetStatistics, &error, echo),
        };
        let (scan_response, scan_ms) = match self.run(queries::stats_scan()).await {
            Ok(ok) => ok,
            Err(error) => return degraded(SearchStrategy::GetStatistics, &error, echo),
        };

        let total_restaurants = scan_response.hits.hits.len() as u64;
        let total_menus: u64 = scan_response
            .hits
            .hits
            .iter()
            .map(|hit| hit.source.get("menu").and_then(Value::as_array).map_or(0, Vec::len) as u64)
            .sum();
        let average = if total_restaurants > 0 {
            round1(total_menus as f64 / total_restaurants as f64)
        } else {
            0.0
        };

        let mut categories: Vec<CategoryBucket> = agg_response
            .aggregations
            .and_then(|aggs| aggs.categories)
            .map(|terms| {
                terms
                    .buckets
                    .into_iter()
                    .map(|bucket| CategoryBucket { key: bucket.key, count: bucket.doc_count })
                    .collect()
            })
            .unwrap_or_default();
        categories.sort_by(|a, b| b.count.cmp(&a.count));
        let top_categories = categories.iter().take(TOP_CATEGORY_CAP).cloned().collect();

        SearchResult {
            total: total_restaurants,
            records: Vec::new(),
            params: echo,
            took_ms: agg_ms + scan_ms,
            stats: Some(SearchStats {
                total_restaurants,
                total_menus,
                average_menus_per_restaurant: average,
                categories,
                top_categories,
            }),
            error: None,
        }
    }

    /// Same-category recommendations, excluding the base restaurant by
    /// exact name. A failed base lookup propagates its error unchanged.
    pub async fn recommend_similar(&self, params: &SimilarParams) -> SearchResult {
        let echo = SearchResult::echo(&[
            ("restaurant_name", json!(params.restaurant_name)),
            ("limit", json!(params.limit)),
        ]);

        let base = self
            .get_restaurant_details(&DetailParams {
                restaurant_name: params.restaurant_name.clone(),
            })
            .await;
        if let Some(error) = base.error {
            return SearchResult {
                total: 0,
                records: Vec::new(),
                params: echo,
                took_ms: base.took_ms,
                stats: None,
                error: Some(error),
            };
        }
        let Some(base_category) =
            base.records.first().map(|record| record.category.clone())
        else {
            let error = SearchError::NotFound(format!(
                "no restaurant named `{}`",
                params.restaurant_name
            ));
            return degraded(SearchStrategy::RecommendSimilarRestaurants, &error, echo);
        };

        let body = queries::similar(&base_category, &params.restaurant_name, params.limit);
        match self.run(body).await {
            Err(error) => degraded(SearchStrategy::RecommendSimilarRestaurants, &error, echo),
            Ok((response, took_ms)) => {
                let reason = format!("같은 카테고리 ({base_category})");
                let records = response
                    .hits
                    .hits
                    .iter()
                    .map(|hit| {
                        let mut record = base_record(hit);
                        record.similarity_reason = Some(reason.clone());
                        record
                    })
                    .collect();
                SearchResult {
                    total: response.total(),
                    records,
                    params: echo,
                    took_ms,
                    stats: None,
                    error: None,
                }
            }
        }
    }

    async fn run(&self, body: Value) -> Result<(QueryResponse, u64), SearchError> {
        let started = Instant::now();
        let response = self.backend.run_query(body).await?;
        Ok((response, started.elapsed().as_millis() as u64))
    }

    fn degrade(&self, action: &Action, error: &SearchError) -> SearchResult {
        degraded(action.strategy, error, action.params.clone())
    }
}

fn degraded(strategy: SearchStrategy, error: &SearchError, params: ParamMap) -> SearchResult {
    warn!(
        event_name = "search.strategy.degraded",
        strategy = %strategy,
        error = %error,
        "strategy degraded to an empty result"
    );
    SearchResult::degraded(error, params)
}

fn base_record(hit: &Hit) -> RestaurantRecord {
    let source = &hit.source;
    RestaurantRecord {
        name: string_field(source, "name"),
        category: string_field(source, "category"),
        score: round2(hit.score.unwrap_or(0.0)),
        id: source
            .get("restaurant_id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| hit.id.clone()),
        ..RestaurantRecord::default()
    }
}

fn string_field(source: &Value, key: &str) -> String {
    source.get(key).and_then(Value::as_str).unwrap_or_default().to_owned()
}

fn menu_field(source: &Value) -> Option<Vec<MenuItem>> {
    let entries = source.get("menu")?.as_array()?;
    Some(entries.iter().filter_map(|entry| serde_json::from_value(entry.clone()).ok()).collect())
}

fn images_field(source: &Value) -> Option<Vec<String>> {
    let entries = source.get("images")?.as_array()?;
    Some(entries.iter().filter_map(Value::as_str).map(str::to_owned).collect())
}

/// Matched nested menu entries from `inner_hits`, capped client-side even
/// if the backend returns more than the query requested.
fn inner_menus(hit: &Hit, cap: usize) -> Vec<MenuItem> {
    hit.inner_hits
        .as_ref()
        .and_then(|inner| inner.pointer("/menu/hits/hits"))
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .take(cap)
                .filter_map(|menu_hit| {
                    serde_json::from_value(menu_hit.get("_source")?.clone()).ok()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use matzip_core::domain::action::ParamMap;
    use serde_json::json;

    use super::*;

    struct MockBackend {
        replies: Mutex<VecDeque<Result<QueryResponse, SearchError>>>,
        bodies: Mutex<Vec<Value>>,
    }

    impl MockBackend {
        fn scripted(replies: Vec<Result<Value, SearchError>>) -> Self {
            let replies = replies
                .into_iter()
                .map(|reply| reply.map(|value| parse_response(value)))
                .collect();
            Self { replies: Mutex::new(replies), bodies: Mutex::new(Vec::new()) }
        }

        fn recorded_bodies(&self) -> Vec<Value> {
            self.bodies.lock().expect("bodies lock").clone()
        }
    }

    #[async_trait]
    impl SearchBackend for MockBackend {
        async fn run_query(&self, body: Value) -> Result<QueryResponse, SearchError> {
            self.bodies.lock().expect("bodies lock").push(body);
            self.replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or_else(|| Ok(QueryResponse::default()))
        }
    }

    fn parse_response(value: Value) -> QueryResponse {
        serde_json::from_value(value).expect("scripted response must deserialize")
    }

    fn hits_response(hits: Vec<Value>, total: u64) -> Value {
        json!({"took": 2, "hits": {"total": {"value": total}, "hits": hits}})
    }

    fn restaurant_hit(id: &str, name: &str, category: &str, score: f64) -> Value {
        json!({
            "_id": id,
            "_score": score,
            "_source": {"name": name, "category": category, "restaurant_id": id}
        })
    }

    #[tokio::test]
    async fn unified_search_omits_details_when_not_requested() {
        let backend = MockBackend::scripted(vec![Ok(hits_response(
            vec![json!({
                "_id": "r-1",
                "_score": 9.1,
                "_source": {
                    "name": "여의도 한정식",
                    "category": "한식",
                    "menu": [{"name": "갈비찜", "price": "32,000원"}],
                    "images": ["a.jpg"]
                }
            })],
            1,
        ))]);
        let index = RestaurantIndex::new(backend);

        let result = index
            .search_restaurants(&UnifiedParams {
                query: "한정식".to_owned(),
                limit: 10,
                include_details: false,
            })
            .await;

        assert_eq!(result.total, 1);
        let record = &result.records[0];
        assert!(record.menu.is_none());
        assert!(record.images.is_none());
    }

    #[tokio::test]
    async fn unified_search_attaches_details_when_requested() {
        let backend = MockBackend::scripted(vec![Ok(hits_response(
            vec![json!({
                "_id": "r-1",
                "_score": 9.1,
                "_source": {
                    "name": "여의도 한정식",
                    "category": "한식",
                    "restaurant_id": "rest-77",
                    "menu": [{"name": "갈비찜", "price": "32,000원", "price_numeric": 32000}],
                    "images": ["a.jpg", "b.jpg"]
                }
            })],
            1,
        ))]);
        let index = RestaurantIndex::new(backend);

        let result = index
            .search_restaurants(&UnifiedParams {
                query: "한정식".to_owned(),
                limit: 10,
                include_details: true,
            })
            .await;

        let record = &result.records[0];
        assert_eq!(record.id, "rest-77");
        assert_eq!(record.menu.as_ref().map(Vec::len), Some(1));
        assert_eq!(record.images.as_ref().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn backend_fault_degrades_instead_of_propagating() {
        let backend = MockBackend::scripted(vec![Err(SearchError::BackendUnavailable(
            "connection refused".to_owned(),
        ))]);
        let index = RestaurantIndex::new(backend);

        let action = Action::unified("카페", 10);
        let result = index.execute(&action).await;

        assert_eq!(result.total, 0);
        assert!(result.records.is_empty());
        assert!(result.error.as_deref().unwrap_or_default().contains("unreachable"));
    }

    #[tokio::test]
    async fn menu_search_caps_matching_menus_at_three() {
        let inner = (0..5)
            .map(|i| json!({"_source": {"name": format!("메뉴{i}"), "price": "9,000원"}}))
            .collect::<Vec<_>>();
        let backend = MockBackend::scripted(vec![Ok(hits_response(
            vec![json!({
                "_id": "r-1",
                "_score": 4.4,
                "_source": {"name": "중화반점", "category": "중식당"},
                "inner_hits": {"menu": {"hits": {"hits": inner}}}
            })],
            1,
        ))]);
        let index = RestaurantIndex::new(backend);

        let result = index
            .search_by_menu(&MenuParams { menu_keyword: "짬뽕".to_owned(), limit: 10 })
            .await;

        let menus = result.records[0].matching_menus.as_ref().expect("matching menus");
        assert_eq!(menus.len(), 3);
    }

    #[tokio::test]
    async fn price_search_caps_menus_at_five() {
        let inner = (0..7)
            .map(|i| {
                json!({"_source": {
                    "name": format!("메뉴{i}"),
                    "price": "12,000원",
                    "price_numeric": 12000
                }})
            })
            .collect::<Vec<_>>();
        let backend = MockBackend::scripted(vec![Ok(hits_response(
            vec![json!({
                "_id": "r-1",
                "_score": 1.0,
                "_source": {"name": "김밥천국", "category": "분식"},
                "inner_hits": {"menu": {"hits": {"hits": inner}}}
            })],
            1,
        ))]);
        let index = RestaurantIndex::new(backend);

        let result = index
            .search_by_price_range(&PriceRangeParams {
                min_price: Some(10000),
                max_price: Some(20000),
                limit: 10,
            })
            .await;

        let menus = result.records[0].price_range_menus.as_ref().expect("price menus");
        assert_eq!(menus.len(), 5);
        assert_eq!(menus[0].price_numeric, Some(12000));
    }

    #[tokio::test]
    async fn detail_lookup_surfaces_not_found_in_error_field() {
        let backend = MockBackend::scripted(vec![Ok(hits_response(vec![], 0))]);
        let index = RestaurantIndex::new(backend);

        let result = index
            .get_restaurant_details(&DetailParams { restaurant_name: "없는집".to_owned() })
            .await;

        assert_eq!(result.total, 0);
        assert!(result.error.as_deref().unwrap_or_default().contains("not found"));
    }

    #[tokio::test]
    async fn similarity_propagates_base_lookup_error_unchanged() {
        let backend = MockBackend::scripted(vec![Ok(hits_response(vec![], 0))]);
        let index = RestaurantIndex::new(backend);

        let result = index
            .recommend_similar(&SimilarParams {
                restaurant_name: "없는집".to_owned(),
                limit: 5,
            })
            .await;

        assert_eq!(result.total, 0);
        assert!(result.error.as_deref().unwrap_or_default().contains("없는집"));
        // only the detail lookup ran
        assert_eq!(index.backend().recorded_bodies().len(), 1);
    }

    #[tokio::test]
    async fn similarity_excludes_base_name_and_tags_reason() {
        let backend = MockBackend::scripted(vec![
            Ok(hits_response(vec![restaurant_hit("r-1", "여의도 한정식", "한식", 8.0)], 1)),
            Ok(hits_response(
                vec![
                    restaurant_hit("r-2", "한강 한정식", "한식", 3.0),
                    restaurant_hit("r-3", "서강 한식당", "한식", 2.5),
                ],
                2,
            )),
        ]);
        let index = RestaurantIndex::new(backend);

        let result = index
            .recommend_similar(&SimilarParams {
                restaurant_name: "여의도 한정식".to_owned(),
                limit: 5,
            })
            .await;

        assert_eq!(result.total, 2);
        assert!(result.records.iter().all(|r| r.name != "여의도 한정식"));
        assert!(result
            .records
            .iter()
            .all(|r| r.similarity_reason.as_deref() == Some("같은 카테고리 (한식)")));

        let bodies = index.backend().recorded_bodies();
        assert_eq!(
            bodies[1]["query"]["bool"]["must_not"][0]["term"]["name.keyword"],
            "여의도 한정식"
        );
    }

    #[tokio::test]
    async fn dispatcher_degrades_on_missing_required_params() {
        let backend = MockBackend::scripted(vec![]);
        let index = RestaurantIndex::new(backend);

        let action = Action::new(SearchStrategy::SearchByCategory, ParamMap::new());
        let result = index.execute(&action).await;

        assert_eq!(result.total, 0);
        assert!(result.error.as_deref().unwrap_or_default().contains("category"));
        // no query was issued for invalid parameters
        assert!(index.backend().recorded_bodies().is_empty());
    }

    #[tokio::test]
    async fn dispatcher_unified_arm_recovers_a_query_term() {
        let backend = MockBackend::scripted(vec![Ok(hits_response(vec![], 0))]);
        let index = RestaurantIndex::new(backend);

        let action = Action::new(SearchStrategy::SearchRestaurants, ParamMap::new());
        let result = index.execute(&action).await;

        assert!(result.error.is_none());
        let bodies = index.backend().recorded_bodies();
        let phrase = &bodies[0]["query"]["bool"]["should"][0]["multi_match"]["query"];
        assert_eq!(phrase, "맛집");
    }

    #[tokio::test]
    async fn statistics_combine_aggregation_and_scan() {
        let backend = MockBackend::scripted(vec![
            Ok(json!({
                "hits": {"total": {"value": 3}, "hits": []},
                "aggregations": {"categories": {"buckets": [
                    {"key": "카페", "doc_count": 1},
                    {"key": "한식", "doc_count": 2}
                ]}}
            })),
            Ok(hits_response(
                vec![
                    json!({"_id": "r-1", "_source": {"name": "a", "category": "한식",
                        "menu": [{"name": "m1"}, {"name": "m2"}]}}),
                    json!({"_id": "r-2", "_source": {"name": "b", "category": "한식",
                        "menu": [{"name": "m3"}]}}),
                    json!({"_id": "r-3", "_source": {"name": "c", "category": "카페"}}),
                ],
                3,
            )),
        ]);
        let index = RestaurantIndex::new(backend);

        let result = index.get_statistics().await;
        let stats = result.stats.expect("stats");

        assert_eq!(result.total, 3);
        assert_eq!(stats.total_restaurants, 3);
        assert_eq!(stats.total_menus, 3);
        assert_eq!(stats.average_menus_per_restaurant, 1.0);
        assert_eq!(stats.categories[0].key, "한식");
        assert_eq!(stats.top_categories.len(), 2);
    }
}
