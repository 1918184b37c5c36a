use std::time::Duration;

use async_trait::async_trait;
use matzip_core::config::SearchBackendConfig;
use matzip_core::SearchError;
use serde::Deserialize;
use serde_json::Value;

/// Ranked-document store contract. One method: run a structured query,
/// get ranked hits (plus aggregations for statistics queries) back.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn run_query(&self, body: Value) -> Result<QueryResponse, SearchError>;
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub hits: HitsEnvelope,
    #[serde(default)]
    pub aggregations: Option<Aggregations>,
}

impl QueryResponse {
    pub fn total(&self) -> u64 {
        self.hits.total.value
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default)]
    pub total: TotalHits,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TotalHits {
    #[serde(default)]
    pub value: u64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Hit {
    #[serde(default, rename = "_id")]
    pub id: String,
    #[serde(default, rename = "_score")]
    pub score: Option<f64>,
    #[serde(default, rename = "_source")]
    pub source: Value,
    #[serde(default, rename = "inner_hits")]
    pub inner_hits: Option<Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Aggregations {
    #[serde(default)]
    pub categories: Option<TermsAggregation>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TermsAggregation {
    #[serde(default)]
    pub buckets: Vec<TermsBucket>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TermsBucket {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub doc_count: u64,
}

/// HTTP client for the Elasticsearch `_search` endpoint. Timeout is bounded
/// by configuration; transport failures map to `BackendUnavailable` and
/// non-2xx responses to `BackendError`.
#[derive(Clone, Debug)]
pub struct EsClient {
    http: reqwest::Client,
    base_url: String,
    index: String,
}

impl EsClient {
    pub fn new(config: &SearchBackendConfig) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| SearchError::BackendUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            index: config.index.clone(),
        })
    }

    /// Reachability probe for health checks; does not touch the index.
    pub async fn ping(&self) -> Result<(), SearchError> {
        let response = self
            .http
            .get(&self.base_url)
            .send()
            .await
            .map_err(|error| SearchError::BackendUnavailable(error.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SearchError::BackendError {
                status: response.status().as_u16(),
                detail: "ping failed".to_owned(),
            })
        }
    }
}

#[async_trait]
impl SearchBackend for EsClient {
    async fn run_query(&self, body: Value) -> Result<QueryResponse, SearchError> {
        let url = format!("{}/{}/_search", self.base_url, self.index);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|error| SearchError::BackendUnavailable(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_owned());
            return Err(SearchError::BackendError { status: status.as_u16(), detail });
        }

        response.json::<QueryResponse>().await.map_err(|error| SearchError::BackendError {
            status: status.as_u16(),
            detail: format!("malformed search response: {error}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::QueryResponse;

    #[test]
    fn deserializes_ranked_hits_with_inner_hits() {
        let response: QueryResponse = serde_json::from_value(json!({
            "took": 4,
            "hits": {
                "total": {"value": 2, "relation": "eq"},
                "hits": [
                    {
                        "_id": "r-1",
                        "_score": 7.25,
                        "_source": {"name": "여의도 한정식", "category": "한식"},
                        "inner_hits": {"menu": {"hits": {"hits": []}}}
                    },
                    {
                        "_id": "r-2",
                        "_score": null,
                        "_source": {"name": "IFC 이탈리안", "category": "이탈리안"}
                    }
                ]
            }
        }))
        .expect("valid search response");

        assert_eq!(response.total(), 2);
        assert_eq!(response.hits.hits.len(), 2);
        assert_eq!(response.hits.hits[0].score, Some(7.25));
        assert!(response.hits.hits[0].inner_hits.is_some());
        assert_eq!(response.hits.hits[1].score, None);
    }

    #[test]
    fn deserializes_aggregation_buckets() {
        let response: QueryResponse = serde_json::from_value(json!({
            "hits": {"total": {"value": 0}, "hits": []},
            "aggregations": {
                "categories": {
                    "buckets": [
                        {"key": "한식", "doc_count": 40},
                        {"key": "카페", "doc_count": 25}
                    ]
                }
            }
        }))
        .expect("valid aggregation response");

        let buckets =
            response.aggregations.expect("aggregations").categories.expect("categories").buckets;
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].key, "한식");
        assert_eq!(buckets[0].doc_count, 40);
    }
}
