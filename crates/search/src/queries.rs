//! Query-body builders, one per strategy.
//!
//! These reproduce the index's ranking contract: the unified disjunction
//! weights nested menu matches (boost 4) above exact phrase matches
//! (boost 3) above general name/category matches (boost 2), with ngram and
//! wildcard clauses at the implicit boost 1 as catch-alls.

use matzip_core::domain::action::{
    CategoryParams, DetailParams, MenuParams, PriceRangeParams, UnifiedParams,
};
use serde_json::{json, Value};

/// Cap for matched menu entries attached per restaurant by menu search.
pub const MENU_INNER_HITS: u32 = 3;
/// Cap for matched menu entries attached per restaurant by price search.
pub const PRICE_INNER_HITS: u32 = 5;
/// Terms-aggregation bucket cap for statistics.
pub const STATS_CATEGORY_BUCKETS: u32 = 50;
/// Bulk-scan document cap for statistics.
pub const STATS_SCAN_SIZE: u32 = 1000;

pub fn unified(params: &UnifiedParams) -> Value {
    let query = params.query.as_str();
    let source = if params.include_details {
        json!(["name", "category", "menu", "images", "restaurant_id"])
    } else {
        json!(["name", "category"])
    };

    json!({
        "query": {
            "bool": {
                "should": [
                    {
                        "multi_match": {
                            "query": query,
                            "fields": ["name^10", "category^8"],
                            "type": "phrase",
                            "boost": 3
                        }
                    },
                    {
                        "multi_match": {
                            "query": query,
                            "fields": ["name^5", "category^3", "name.ngram^2"],
                            "type": "cross_fields",
                            "boost": 2
                        }
                    },
                    {
                        "nested": {
                            "path": "menu",
                            "query": {
                                "multi_match": {
                                    "query": query,
                                    "fields": [
                                        "menu.name^5",
                                        "menu.name.ngram^3",
                                        "menu.description^2"
                                    ],
                                    "type": "cross_fields"
                                }
                            },
                            "boost": 4
                        }
                    },
                    {
                        "multi_match": {
                            "query": query,
                            "fields": ["full_text_search.ngram"],
                            "type": "cross_fields"
                        }
                    },
                    {
                        "bool": {
                            "should": [
                                {"wildcard": {"name": format!("*{query}*")}},
                                {"wildcard": {"category": format!("*{query}*")}},
                                {
                                    "nested": {
                                        "path": "menu",
                                        "query": {
                                            "bool": {
                                                "should": [
                                                    {"wildcard": {"menu.name": format!("*{query}*")}},
                                                    {"wildcard": {"menu.description": format!("*{query}*")}}
                                                ]
                                            }
                                        }
                                    }
                                }
                            ]
                        }
                    }
                ],
                "minimum_should_match": 1
            }
        },
        "_source": source,
        "size": params.limit
    })
}

pub fn by_category(params: &CategoryParams) -> Value {
    json!({
        "query": {
            "bool": {
                "should": [
                    {"term": {"category": params.category}},
                    {"wildcard": {"category": format!("*{}*", params.category)}}
                ]
            }
        },
        "_source": ["name", "category"],
        "size": params.limit
    })
}

pub fn by_menu(params: &MenuParams) -> Value {
    json!({
        "query": {
            "nested": {
                "path": "menu",
                "query": {
                    "bool": {
                        "should": [
                            {
                                "multi_match": {
                                    "query": params.menu_keyword,
                                    "fields": ["menu.name^3", "menu.description"],
                                    "type": "cross_fields"
                                }
                            },
                            {"wildcard": {"menu.name": format!("*{}*", params.menu_keyword)}}
                        ]
                    }
                },
                "inner_hits": {
                    "size": MENU_INNER_HITS,
                    "_source": ["menu.name", "menu.price"]
                }
            }
        },
        "_source": ["name", "category"],
        "size": params.limit
    })
}

pub fn by_price_range(params: &PriceRangeParams) -> Value {
    let mut conditions = Vec::new();
    if let Some(min) = params.min_price {
        conditions.push(json!({"range": {"menu.price_numeric": {"gte": min}}}));
    }
    if let Some(max) = params.max_price {
        conditions.push(json!({"range": {"menu.price_numeric": {"lte": max}}}));
    }

    json!({
        "query": {
            "nested": {
                "path": "menu",
                "query": {"bool": {"must": conditions}},
                "inner_hits": {
                    "size": PRICE_INNER_HITS,
                    "_source": ["menu.name", "menu.price", "menu.price_numeric"]
                }
            }
        },
        "_source": ["name", "category"],
        "size": params.limit
    })
}

pub fn detail(params: &DetailParams) -> Value {
    json!({
        "query": {
            "bool": {
                "should": [
                    {"term": {"name.keyword": params.restaurant_name}},
                    {"match": {"name": params.restaurant_name}}
                ]
            }
        },
        "size": 1
    })
}

pub fn stats_categories() -> Value {
    json!({
        "aggs": {
            "categories": {
                "terms": {
                    "field": "category",
                    "size": STATS_CATEGORY_BUCKETS
                }
            }
        },
        "size": 0
    })
}

pub fn stats_scan() -> Value {
    json!({
        "query": {"match_all": {}},
        "_source": ["name", "category", "menu"],
        "size": STATS_SCAN_SIZE
    })
}

pub fn similar(category: &str, exclude_name: &str, limit: u32) -> Value {
    json!({
        "query": {
            "bool": {
                "must": [
                    {"term": {"category": category}}
                ],
                "must_not": [
                    {"term": {"name.keyword": exclude_name}}
                ]
            }
        },
        "_source": ["name", "category"],
        "size": limit
    })
}

#[cfg(test)]
mod tests {
    use matzip_core::domain::action::{
        CategoryParams, DetailParams, MenuParams, PriceRangeParams, UnifiedParams,
    };

    use super::*;

    #[test]
    fn unified_ranking_ladder_is_ordered() {
        let body = unified(&UnifiedParams {
            query: "갈비찜".to_owned(),
            limit: 10,
            include_details: false,
        });

        let clauses = body["query"]["bool"]["should"].as_array().expect("should clauses");
        assert_eq!(clauses.len(), 5);
        assert_eq!(clauses[0]["multi_match"]["boost"], 3);
        assert_eq!(clauses[1]["multi_match"]["boost"], 2);
        assert_eq!(clauses[2]["nested"]["boost"], 4);
        assert!(clauses[3]["multi_match"]["boost"].is_null());
        assert_eq!(body["query"]["bool"]["minimum_should_match"], 1);
        assert_eq!(body["size"], 10);
    }

    #[test]
    fn unified_projects_fields_by_detail_flag() {
        let slim = unified(&UnifiedParams {
            query: "카페".to_owned(),
            limit: 5,
            include_details: false,
        });
        assert_eq!(slim["_source"], serde_json::json!(["name", "category"]));

        let full = unified(&UnifiedParams {
            query: "카페".to_owned(),
            limit: 5,
            include_details: true,
        });
        let fields = full["_source"].as_array().expect("fields");
        assert!(fields.iter().any(|f| f == "menu"));
        assert!(fields.iter().any(|f| f == "images"));
    }

    #[test]
    fn category_query_mixes_term_and_wildcard() {
        let body = by_category(&CategoryParams { category: "중식당".to_owned(), limit: 10 });
        let clauses = body["query"]["bool"]["should"].as_array().expect("clauses");
        assert_eq!(clauses[0]["term"]["category"], "중식당");
        assert_eq!(clauses[1]["wildcard"]["category"], "*중식당*");
    }

    #[test]
    fn menu_query_caps_inner_hits_at_three() {
        let body = by_menu(&MenuParams { menu_keyword: "짬뽕".to_owned(), limit: 10 });
        assert_eq!(body["query"]["nested"]["inner_hits"]["size"], 3);
        assert_eq!(body["query"]["nested"]["path"], "menu");
    }

    #[test]
    fn price_query_builds_bounds_that_are_present() {
        let both = by_price_range(&PriceRangeParams {
            min_price: Some(10000),
            max_price: Some(20000),
            limit: 10,
        });
        let musts = both["query"]["nested"]["query"]["bool"]["must"].as_array().expect("musts");
        assert_eq!(musts.len(), 2);
        assert_eq!(musts[0]["range"]["menu.price_numeric"]["gte"], 10000);
        assert_eq!(musts[1]["range"]["menu.price_numeric"]["lte"], 20000);
        assert_eq!(both["query"]["nested"]["inner_hits"]["size"], 5);

        let upper_only = by_price_range(&PriceRangeParams {
            min_price: None,
            max_price: Some(15000),
            limit: 10,
        });
        let musts =
            upper_only["query"]["nested"]["query"]["bool"]["must"].as_array().expect("musts");
        assert_eq!(musts.len(), 1);
    }

    #[test]
    fn detail_query_is_capped_to_the_best_hit() {
        let body = detail(&DetailParams { restaurant_name: "은하수".to_owned() });
        assert_eq!(body["size"], 1);
        let clauses = body["query"]["bool"]["should"].as_array().expect("clauses");
        assert_eq!(clauses[0]["term"]["name.keyword"], "은하수");
    }

    #[test]
    fn similar_query_excludes_the_base_restaurant() {
        let body = similar("한식", "여의도 한정식", 5);
        assert_eq!(body["query"]["bool"]["must"][0]["term"]["category"], "한식");
        assert_eq!(
            body["query"]["bool"]["must_not"][0]["term"]["name.keyword"],
            "여의도 한정식"
        );
        assert_eq!(body["size"], 5);
    }

    #[test]
    fn stats_queries_use_the_documented_caps() {
        let agg = stats_categories();
        assert_eq!(agg["aggs"]["categories"]["terms"]["size"], 50);
        assert_eq!(agg["size"], 0);

        let scan = stats_scan();
        assert_eq!(scan["size"], 1000);
        assert!(scan["query"]["match_all"].is_object());
    }
}
