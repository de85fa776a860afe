//! Scraped metadata source
//!
//! The community rating site exposes a small JSON suggest endpoint and
//! otherwise only HTML subject pages. Pages are scraped with CSS selectors;
//! every field is optional because the markup changes without notice.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::api::gateway::{Gateway, Payload};
use crate::error::{Error, Result};
use crate::models::{OriginHint, RawContentRecord, SearchHit};

pub const DEFAULT_METADATA_URL: &str = "https://movie.douban.com";

/// Suggest endpoint hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataHit {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub poster_url: Option<String>,
}

impl From<MetadataHit> for SearchHit {
    fn from(hit: MetadataHit) -> Self {
        Self {
            id: hit.id,
            title: hit.title,
            poster_url: hit.poster_url.unwrap_or_default(),
            year: hit.year,
            origin: OriginHint::Scraped,
            origin_endpoint: None,
        }
    }
}

/// Fields scraped from a subject page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedMetadata {
    pub id: String,
    pub title: Option<String>,
    pub score: Option<String>,
    pub synopsis: Option<String>,
    pub poster_url: Option<String>,
    pub director: Option<String>,
    pub cast: Vec<String>,
}

/// Client for the scraped metadata source
#[derive(Clone)]
pub struct MetadataClient {
    gateway: Gateway,
    base_url: String,
}

impl MetadataClient {
    pub fn new(gateway: Gateway) -> Self {
        Self::with_base_url(gateway, DEFAULT_METADATA_URL)
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(gateway: Gateway, base_url: impl Into<String>) -> Self {
        Self {
            gateway,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Keyword suggestions
    #[instrument(skip(self), level = "debug")]
    pub async fn suggest(&self, keyword: &str) -> Result<Vec<MetadataHit>> {
        let url = format!(
            "{}/j/subject_suggest?q={}",
            self.base_url,
            urlencoding::encode(keyword)
        );
        let payload = self.gateway.fetch(&url).await?;
        let items = payload
            .as_json()
            .and_then(Value::as_array)
            .ok_or_else(|| Error::MalformedResponse("suggest did not return an array".into()))?;

        Ok(items.iter().filter_map(parse_hit).collect())
    }

    /// Scrape a subject page
    #[instrument(skip(self), level = "debug")]
    pub async fn subject(&self, id: &str) -> Result<ScrapedMetadata> {
        let url = format!("{}/subject/{}/", self.base_url, id);
        let html = match self.gateway.fetch(&url).await? {
            Payload::Text(html) => html,
            Payload::Json(_) => {
                return Err(Error::MalformedResponse(format!(
                    "subject {} returned JSON instead of HTML",
                    id
                )))
            }
        };
        Ok(parse_subject(id, &html))
    }

    /// Title for a scraped id, or `None` when the page yields nothing usable
    pub async fn title_for(&self, id: &str) -> Option<String> {
        match self.subject(id).await {
            Ok(meta) => meta.title,
            Err(e) => {
                warn!(id, error = %e, "metadata title lookup failed");
                None
            }
        }
    }

    /// Fill blank fields of `record` from the best suggest match
    pub async fn enrich(&self, record: &mut RawContentRecord) {
        let hits = match self.suggest(&record.title).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(title = %record.title, error = %e, "metadata suggest failed");
                return;
            }
        };
        let Some(hit) = hits
            .iter()
            .find(|h| h.title == record.title)
            .or_else(|| hits.first())
        else {
            debug!(title = %record.title, "no metadata hit");
            return;
        };
        match self.subject(&hit.id).await {
            Ok(meta) => meta.apply_to(record),
            Err(e) => warn!(id = %hit.id, error = %e, "metadata subject failed"),
        }
    }
}

impl ScrapedMetadata {
    /// Copy scraped fields into blank slots of `record`
    pub fn apply_to(&self, record: &mut RawContentRecord) {
        fill(&mut record.synopsis, self.synopsis.as_deref());
        fill(&mut record.poster_url, self.poster_url.as_deref());
        fill(&mut record.director, self.director.as_deref());
        if record.cast.is_empty() && !self.cast.is_empty() {
            record.cast = self.cast.join(" / ");
        }
        if record.score_or_rank.is_none() {
            record.score_or_rank = self.score.clone();
        }
    }
}

fn fill(slot: &mut String, value: Option<&str>) {
    if slot.trim().is_empty() {
        if let Some(v) = value {
            *slot = v.to_string();
        }
    }
}

/// Suggest entry for a title; people ("celebrity") are skipped
fn parse_hit(item: &Value) -> Option<MetadataHit> {
    if item.get("type").and_then(Value::as_str) == Some("celebrity") {
        return None;
    }
    let id = match item.get("id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let title = item.get("title")?.as_str()?.to_string();
    Some(MetadataHit {
        id,
        title,
        year: item.get("year").and_then(Value::as_str).map(str::to_string),
        poster_url: item
            .get("img")
            .and_then(Value::as_str)
            .map(large_poster),
    })
}

/// Swap the thumbnail size segment for the large variant
fn large_poster(url: &str) -> String {
    url.replace("s_ratio_poster", "l").replace("/m/public", "/l/public")
}

/// Extract subject fields from page HTML
pub fn parse_subject(id: &str, html: &str) -> ScrapedMetadata {
    let doc = Html::parse_document(html);

    ScrapedMetadata {
        id: id.to_string(),
        title: select_text(&doc, r#"span[property="v:itemreviewed"]"#),
        score: select_text(&doc, ".ll.rating_num"),
        synopsis: select_text(&doc, r#"span[property="v:summary"]"#),
        poster_url: select_attr(&doc, "#mainpic img", "src"),
        director: select_text(&doc, r#"a[rel="v:directedBy"]"#),
        cast: select_all_text(&doc, r#"a[rel="v:starring"]"#, 5),
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn element_text(el: scraper::ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn select_text(doc: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    doc.select(&sel)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

fn select_attr(doc: &Html, css: &str, attr: &str) -> Option<String> {
    let sel = selector(css)?;
    doc.select(&sel)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

fn select_all_text(doc: &Html, css: &str, limit: usize) -> Vec<String> {
    let Some(sel) = selector(css) else {
        return Vec::new();
    };
    doc.select(&sel)
        .map(element_text)
        .filter(|s| !s.is_empty())
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SUBJECT_HTML: &str = r#"
        <html><body>
          <h1><span property="v:itemreviewed">让子弹飞</span></h1>
          <div id="mainpic"><img src="https://img.example/p1.jpg"></div>
          <strong class="ll rating_num">8.9</strong>
          <a rel="v:directedBy">姜文</a>
          <a rel="v:starring">姜文</a><a rel="v:starring">葛优</a>
          <a rel="v:starring">周润发</a><a rel="v:starring">刘嘉玲</a>
          <a rel="v:starring">陈坤</a><a rel="v:starring">张默</a>
          <span property="v:summary">  民国年间的故事。 </span>
        </body></html>"#;

    #[test]
    fn test_parse_subject() {
        let meta = parse_subject("3742360", SUBJECT_HTML);
        assert_eq!(meta.title.as_deref(), Some("让子弹飞"));
        assert_eq!(meta.score.as_deref(), Some("8.9"));
        assert_eq!(meta.director.as_deref(), Some("姜文"));
        assert_eq!(meta.poster_url.as_deref(), Some("https://img.example/p1.jpg"));
        assert_eq!(meta.synopsis.as_deref(), Some("民国年间的故事。"));
        assert_eq!(meta.cast.len(), 5);
        assert_eq!(meta.cast[1], "葛优");
    }

    #[test]
    fn test_parse_subject_empty_page() {
        let meta = parse_subject("1", "<html></html>");
        assert!(meta.title.is_none());
        assert!(meta.cast.is_empty());
    }

    #[test]
    fn test_parse_hit_numeric_and_string_ids() {
        let hit = parse_hit(&json!({
            "id": "26100958",
            "title": "复仇者联盟4",
            "year": "2019",
            "img": "https://img.example/view/photo/s_ratio_poster/public/p1.jpg"
        }))
        .unwrap();
        assert_eq!(hit.id, "26100958");
        assert_eq!(
            hit.poster_url.as_deref(),
            Some("https://img.example/view/photo/l/public/p1.jpg")
        );
        assert_eq!(parse_hit(&json!({"id": 5, "title": "x"})).unwrap().id, "5");
        assert!(parse_hit(&json!({"title": "no id"})).is_none());
        assert!(parse_hit(&json!({"id": 7, "title": "姜文", "type": "celebrity"})).is_none());

        let search_hit = SearchHit::from(hit);
        assert_eq!(search_hit.origin, OriginHint::Scraped);
        assert_eq!(search_hit.year.as_deref(), Some("2019"));
        assert!(search_hit.origin_endpoint.is_none());
    }

    #[test]
    fn test_apply_fills_only_blanks() {
        let mut record = RawContentRecord::from_value(
            &json!({"vod_id": 1, "vod_name": "让子弹飞", "vod_director": "Someone"}),
            "http://b",
        )
        .unwrap();
        parse_subject("3742360", SUBJECT_HTML).apply_to(&mut record);
        assert_eq!(record.director, "Someone");
        assert_eq!(record.synopsis, "民国年间的故事。");
        assert!(record.cast.starts_with("姜文 / 葛优"));
        assert_eq!(record.score_or_rank.as_deref(), Some("8.9"));
    }
}
