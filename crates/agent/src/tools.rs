//! The tool catalog shown to the model.
//!
//! One descriptor per search strategy, in catalog order. The model picks a
//! tool and fills its arguments; nothing here executes anything. Names must
//! stay in lock step with [`SearchStrategy`], which is what the resolver
//! parses replies against.

use matzip_core::domain::action::SearchStrategy;
use serde_json::{json, Value};

pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    schema: fn() -> Value,
}

impl ToolSpec {
    pub fn input_schema(&self) -> Value {
        (self.schema)()
    }

    /// The descriptor in Anthropic Messages API shape.
    pub fn to_api_value(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.input_schema()
        })
    }
}

pub fn catalog() -> &'static [ToolSpec] {
    &CATALOG
}

pub fn catalog_json() -> Vec<Value> {
    CATALOG.iter().map(ToolSpec::to_api_value).collect()
}

const CATALOG: [ToolSpec; 7] = [
    ToolSpec {
        name: "search_restaurants",
        description: "여의도 지역 식당을 통합 검색합니다. 식당명, 카테고리, 메뉴명 등으로 검색 가능",
        schema: unified_schema,
    },
    ToolSpec {
        name: "search_by_category",
        description: "특정 카테고리의 식당들을 검색합니다",
        schema: category_schema,
    },
    ToolSpec {
        name: "search_by_menu",
        description: "특정 메뉴를 제공하는 식당들을 검색합니다",
        schema: menu_schema,
    },
    ToolSpec {
        name: "search_by_price_range",
        description: "특정 가격대의 메뉴를 제공하는 식당들을 검색합니다",
        schema: price_range_schema,
    },
    ToolSpec {
        name: "get_restaurant_details",
        description: "특정 식당의 상세 정보를 조회합니다 (전체 메뉴, 가격 등)",
        schema: detail_schema,
    },
    ToolSpec {
        name: "get_statistics",
        description: "전체 식당 통계 정보를 조회합니다 (식당 수, 카테고리별 분포 등)",
        schema: statistics_schema,
    },
    ToolSpec {
        name: "recommend_similar_restaurants",
        description: "특정 식당과 유사한 다른 식당들을 추천합니다",
        schema: similar_schema,
    },
];

fn limit_property(default: u32) -> Value {
    json!({
        "type": "integer",
        "description": format!("검색 결과 개수 (기본값: {default})"),
        "default": default
    })
}

fn unified_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "검색어 (예: '중식당', '갈비찜', '매운 음식', '스타벅스')"
            },
            "limit": limit_property(10),
            "include_details": {
                "type": "boolean",
                "description": "메뉴 등 상세 정보 포함 여부 (기본값: false)",
                "default": false
            }
        },
        "required": ["query"]
    })
}

fn category_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "category": {
                "type": "string",
                "description": "식당 카테고리 (예: '중식당', '일식당', '한식', '카페')"
            },
            "limit": limit_property(10)
        },
        "required": ["category"]
    })
}

fn menu_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "menu_keyword": {
                "type": "string",
                "description": "메뉴 키워드 (예: '갈비찜', '짬뽕', '파스타', '스시')"
            },
            "limit": limit_property(10)
        },
        "required": ["menu_keyword"]
    })
}

fn price_range_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "min_price": {
                "type": "integer",
                "description": "최소 가격 (원 단위)"
            },
            "max_price": {
                "type": "integer",
                "description": "최대 가격 (원 단위)"
            },
            "limit": limit_property(10)
        }
    })
}

fn detail_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "restaurant_name": {
                "type": "string",
                "description": "조회할 식당명"
            }
        },
        "required": ["restaurant_name"]
    })
}

fn statistics_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

fn similar_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "restaurant_name": {
                "type": "string",
                "description": "기준이 될 식당명"
            },
            "limit": limit_property(5)
        },
        "required": ["restaurant_name"]
    })
}
