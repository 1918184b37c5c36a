use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::action::ParamMap;
use crate::errors::SearchError;

/// One menu entry on a restaurant document. `price` is the display string
/// as indexed ("12,000원"); `price_numeric` is its integer mirror in won
/// when the indexer could parse one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_numeric: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One ranked restaurant hit. The optional fields are strategy-specific:
/// `menu`/`images` only appear on detail lookups (or unified search with
/// details requested), `matching_menus` only on menu search (max 3),
/// `price_range_menus` only on price search (max 5), `similarity_reason`
/// only on recommendations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RestaurantRecord {
    pub name: String,
    pub category: String,
    pub score: f64,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<Vec<MenuItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_menus: Option<Vec<MenuItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range_menus: Option<Vec<MenuItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBucket {
    pub key: String,
    pub count: u64,
}

/// Aggregate view produced by the statistics strategy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub total_restaurants: u64,
    pub total_menus: u64,
    pub average_menus_per_restaurant: f64,
    /// All category buckets, sorted descending by count.
    pub categories: Vec<CategoryBucket>,
    /// The ten largest buckets, retained separately.
    pub top_categories: Vec<CategoryBucket>,
}

/// Terminal result of executing one strategy.
///
/// Invariants: `total == 0` whenever `records` is empty is not required, but
/// `records` is empty whenever `total == 0`, and a present `error` forces
/// `total == 0`. Backend faults never propagate past this type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub total: u64,
    pub records: Vec<RestaurantRecord>,
    /// Echo of the parameters the strategy actually ran with.
    #[serde(default)]
    pub params: ParamMap,
    pub took_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<SearchStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResult {
    /// Degraded-but-valid result: the shape every caught failure reduces to.
    pub fn degraded(error: &SearchError, params: ParamMap) -> Self {
        Self {
            total: 0,
            records: Vec::new(),
            params,
            took_ms: 0,
            stats: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }

    /// Echo helper for strategies whose params are already typed.
    pub fn echo(pairs: &[(&str, Value)]) -> ParamMap {
        let mut map = ParamMap::new();
        for (key, value) in pairs {
            map.insert((*key).to_owned(), value.clone());
        }
        map
    }
}
