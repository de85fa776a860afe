//! Catalog backend client
//!
//! Speaks the common `?ac=detail` query contract shared by the catalog
//! backends. Responses are `{ "list": [...] }` with loosely typed records that
//! are normalized into [`RawContentRecord`] at this boundary.

use reqwest::Url;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::api::gateway::{Gateway, Payload};
use crate::error::{Error, Result};
use crate::models::RawContentRecord;

/// Client for any backend implementing the detail/search contract
#[derive(Clone)]
pub struct CatalogClient {
    gateway: Gateway,
}

impl CatalogClient {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Look up records by backend id
    #[instrument(skip(self), level = "debug")]
    pub async fn detail_by_id(&self, endpoint: &str, id: &str) -> Result<Vec<RawContentRecord>> {
        let url = build_query(endpoint, &[("ac", "detail"), ("ids", id)])?;
        self.fetch_records(endpoint, url.as_str()).await
    }

    /// Search records by keyword
    #[instrument(skip(self), level = "debug")]
    pub async fn search(&self, endpoint: &str, keyword: &str) -> Result<Vec<RawContentRecord>> {
        let url = build_query(endpoint, &[("ac", "detail"), ("wd", keyword)])?;
        self.fetch_records(endpoint, url.as_str()).await
    }

    async fn fetch_records(&self, endpoint: &str, url: &str) -> Result<Vec<RawContentRecord>> {
        // A 200 without a list (captcha pages, HTML errors) falls through to the relays
        let payload = self
            .gateway
            .fetch_accepting(url, |p| p.as_json().is_some_and(has_list))
            .await?;

        let value = match payload {
            Payload::Json(value) => value,
            Payload::Text(_) => {
                return Err(Error::MalformedResponse(format!("non-JSON body from {}", endpoint)))
            }
        };
        let records = parse_list(&value, endpoint)?;
        debug!(endpoint, count = records.len(), "catalog records");
        Ok(records)
    }
}

fn has_list(value: &Value) -> bool {
    value.get("list").is_some_and(Value::is_array)
}

/// Normalize a `{list: [...]}` body, discarding incomplete records
pub fn parse_list(value: &Value, endpoint: &str) -> Result<Vec<RawContentRecord>> {
    let list = value
        .get("list")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedResponse(format!("missing list from {}", endpoint)))?;

    let records: Vec<RawContentRecord> = list
        .iter()
        .filter_map(|item| RawContentRecord::from_value(item, endpoint))
        .collect();

    let dropped = list.len() - records.len();
    if dropped > 0 {
        debug!(endpoint, dropped, "discarded records missing id or title");
    }
    Ok(records)
}

/// Append query parameters (plus `out=json`) to a backend endpoint
pub fn build_query(endpoint: &str, params: &[(&str, &str)]) -> Result<Url> {
    let mut url = Url::parse(endpoint).map_err(|_| Error::InvalidEndpoint(endpoint.to_string()))?;
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
        pairs.append_pair("out", "json");
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_query() {
        let url = build_query(
            "https://cms.example/api.php/provide/vod",
            &[("ac", "detail"), ("wd", "让子弹飞")],
        )
        .unwrap();
        assert_eq!(url.path(), "/api.php/provide/vod");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("ac".into(), "detail".into()),
                ("wd".into(), "让子弹飞".into()),
                ("out".into(), "json".into()),
            ]
        );
    }

    #[test]
    fn test_build_query_invalid_endpoint() {
        assert!(matches!(
            build_query("not a url", &[]),
            Err(Error::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_parse_list_filters_incomplete() {
        let body = json!({
            "code": 1,
            "list": [
                {"vod_id": 1, "vod_name": "A"},
                {"vod_id": 2},
                {"vod_name": "C"},
                {"vod_id": "4", "vod_name": "D"}
            ]
        });
        let records = parse_list(&body, "http://b").unwrap();
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "D"]);
    }

    #[test]
    fn test_parse_list_missing() {
        assert!(matches!(
            parse_list(&json!({"code": 0}), "http://b"),
            Err(Error::MalformedResponse(_))
        ));
    }
}
