//! Direct JSON API tier. Career platforms that render from a public search
//! endpoint are cheaper to read there than through the DOM.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{lookup, ExtractContext};
use crate::error::StrategyError;
use crate::record::{value_text, AuxField, RawHit};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSpec {
    /// Endpoint template; `{offset}`, `{limit}` and `{page}` are filled per request.
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    /// Raw JSON body for POST endpoints, filled like `url`. Kept as text so
    /// the endpoint's own key casing survives config loading.
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub items_path: String,
    #[serde(default)]
    pub total_path: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Record field -> dotted path inside one item. Overrides alias detection.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Prepended to relative item URLs.
    #[serde(default)]
    pub url_prefix: Option<String>,
    /// Per-listing detail endpoint, `{id}` is the item's job id. Only used
    /// when full details are requested.
    #[serde(default)]
    pub detail_url: Option<String>,
    #[serde(default = "default_detail_path")]
    pub detail_path: String,
}

fn default_page_size() -> usize {
    20
}

fn default_detail_path() -> String {
    "description".to_string()
}

#[derive(Debug, Clone, Copy)]
struct Window {
    offset: usize,
    limit: usize,
    page: usize,
}

fn fill(template: &str, w: Window) -> String {
    template
        .replace("{offset}", &w.offset.to_string())
        .replace("{limit}", &w.limit.to_string())
        .replace("{page}", &w.page.to_string())
}

impl ApiSpec {
    fn hit_from_item(&self, item: &Value) -> Option<RawHit> {
        let mut hit = RawHit::from_json(item)?;
        for (key, path) in &self.fields {
            let Some(text) = lookup(item, path).and_then(value_text) else {
                continue;
            };
            match key.as_str() {
                "title" => hit.title = Some(text),
                "url" => hit.url = Some(text),
                "location" => hit.location = Some(text),
                "job_id" => hit.job_id = Some(text),
                other => {
                    hit.fields.insert(other.to_string(), Value::String(text));
                }
            }
        }
        if let (Some(prefix), Some(url)) = (self.url_prefix.as_deref(), hit.url.clone()) {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                hit.url = Some(format!(
                    "{}/{}",
                    prefix.trim_end_matches('/'),
                    url.trim_start_matches('/')
                ));
            }
        }
        Some(hit)
    }

    async fn request(&self, ctx: &ExtractContext, w: Window) -> Result<Value, StrategyError> {
        let url = fill(&self.url, w);
        debug!("api request {}", url);
        let mut req = match self.method {
            HttpMethod::Get => ctx.http.get(&url),
            HttpMethod::Post => ctx.http.post(&url),
        }
        .timeout(ctx.timeout);
        for (name, value) in &self.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &self.body {
            req = req
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(fill(body, w));
        }
        Ok(req.send().await?.error_for_status()?.json::<Value>().await?)
    }

    async fn describe(&self, ctx: &ExtractContext, hit: &mut RawHit) {
        let (Some(template), Some(id)) = (&self.detail_url, hit.job_id.as_deref()) else {
            return;
        };
        let url = template.replace("{id}", id);
        let detail = async {
            ctx.http
                .get(&url)
                .timeout(ctx.timeout)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await
        };
        match detail.await {
            Ok(value) => {
                if let Some(text) = lookup(&value, &self.detail_path).and_then(value_text) {
                    hit.set(AuxField::Description, text);
                }
            }
            Err(e) => warn!("detail request {} failed: {}", url, e),
        }
    }
}

/// Read every result window on the first listing page, bounded by
/// `max_pages` requests and the reported total. Later pages are already
/// covered and yield nothing.
pub async fn fetch(spec: &ApiSpec, ctx: &ExtractContext) -> Result<Vec<RawHit>, StrategyError> {
    if ctx.page > 1 {
        return Ok(Vec::new());
    }
    let limit = spec.page_size.max(1);
    let mut hits = Vec::new();
    for page in 0..ctx.max_pages {
        let w = Window {
            offset: page * limit,
            limit,
            page: page + 1,
        };
        let body = match spec.request(ctx, w).await {
            Ok(body) => body,
            Err(e) if !hits.is_empty() => {
                warn!("api window at offset {} failed, keeping {} items: {}", w.offset, hits.len(), e);
                break;
            }
            Err(e) => return Err(e),
        };
        let items = match lookup(&body, &spec.items_path) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(StrategyError::Malformed(format!(
                    "no array at {:?} in api response",
                    spec.items_path
                )))
            }
        };
        if items.is_empty() {
            break;
        }
        hits.extend(items.iter().filter_map(|item| spec.hit_from_item(item)));

        let total = spec
            .total_path
            .as_deref()
            .and_then(|p| lookup(&body, p))
            .and_then(Value::as_u64)
            .map(|t| t as usize);
        let seen = w.offset + items.len();
        if items.len() < limit || total.is_some_and(|t| seen >= t) {
            break;
        }
    }
    info!("api returned {} items", hits.len());

    if ctx.fetch_full_details && spec.detail_url.is_some() {
        for hit in hits.iter_mut() {
            spec.describe(ctx, hit).await;
        }
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::strategy::tests::ctx;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    type Responder = Arc<dyn Fn(&str) -> (u16, String) + Send + Sync>;

    /// Minimal HTTP/1.1 responder on a random local port. Returns the base
    /// URL and the request paths seen so far.
    async fn serve(respond: Responder) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let paths = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&paths);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                while read < buf.len() {
                    let n = stream.read(&mut buf[read..]).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    read += n;
                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let head = String::from_utf8_lossy(&buf[..read]).to_string();
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                seen.lock().unwrap().push(path.clone());
                let (status, body) = respond(&path);
                let reply = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        (base, paths)
    }

    fn query_num(path: &str, key: &str) -> usize {
        path.split(['?', '&'])
            .find_map(|kv| kv.strip_prefix(key)?.strip_prefix('='))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Board with `available` postings that reports `total` to clients.
    fn board(available: usize, total: usize) -> Responder {
        Arc::new(move |path: &str| {
            if let Some(id) = path.strip_prefix("/detail/") {
                return (200, json!({ "description": format!("Full text {}", id) }).to_string());
            }
            let offset = query_num(path, "offset");
            let limit = query_num(path, "limit");
            let items: Vec<Value> = (offset..(offset + limit).min(available))
                .map(|i| json!({ "title": format!("Role {}", i), "id": format!("r-{}", i) }))
                .collect();
            (200, json!({ "data": { "jobs": items, "total": total } }).to_string())
        })
    }

    fn local_spec(base: &str) -> ApiSpec {
        serde_json::from_value(json!({
            "url": format!("{}/jobs?offset={{offset}}&limit={{limit}}", base),
            "items_path": "data.jobs",
            "total_path": "data.total",
            "page_size": 2,
            "detail_url": format!("{}/detail/{{id}}", base),
        }))
        .unwrap()
    }

    fn local_ctx(max_pages: usize, details: bool) -> ExtractContext {
        let mut c = ctx(1);
        c.max_pages = max_pages;
        c.fetch_full_details = details;
        c.http = reqwest::Client::builder().no_proxy().build().unwrap();
        c
    }

    fn listing_requests(paths: &Mutex<Vec<String>>) -> Vec<String> {
        paths.lock().unwrap().iter().filter(|p| p.starts_with("/jobs")).cloned().collect()
    }

    fn spec() -> ApiSpec {
        serde_json::from_value(json!({
            "url": "https://acme.wd3.example/wday/cxs/acme/jobs?offset={offset}&limit={limit}",
            "method": "post",
            "body": r#"{"appliedFacets":{},"limit":{limit},"offset":{offset},"searchText":""}"#,
            "items_path": "jobPostings",
            "total_path": "total",
            "fields": { "url": "externalPath", "job_id": "bulletFields.0", "location": "locationsText" },
            "url_prefix": "https://acme.wd3.example/en-US/careers/",
        }))
        .unwrap()
    }

    #[test]
    fn fills_templates() {
        let w = Window { offset: 40, limit: 20, page: 3 };
        assert_eq!(
            fill(&spec().url, w),
            "https://acme.wd3.example/wday/cxs/acme/jobs?offset=40&limit=20"
        );
        let body: Value = serde_json::from_str(&fill(spec().body.as_deref().unwrap(), w)).unwrap();
        assert_eq!(body["offset"], json!(40));
        assert_eq!(body["limit"], json!(20));
        assert_eq!(body["appliedFacets"], json!({}));
    }

    #[test]
    fn maps_items_with_field_paths() {
        let item = json!({
            "title": "Cloud Engineer",
            "externalPath": "/job/Pune/Cloud-Engineer_JR-5521",
            "locationsText": "Pune, India",
            "postedOn": "Posted 3 Days Ago",
            "bulletFields": ["JR-5521"],
        });
        let hit = spec().hit_from_item(&item).unwrap();
        assert_eq!(hit.title.as_deref(), Some("Cloud Engineer"));
        assert_eq!(hit.job_id.as_deref(), Some("JR-5521"));
        assert_eq!(
            hit.url.as_deref(),
            Some("https://acme.wd3.example/en-US/careers/job/Pune/Cloud-Engineer_JR-5521")
        );
        assert_eq!(hit.aux(AuxField::PostedDate).as_deref(), Some("Posted 3 Days Ago"));
    }

    #[test]
    fn method_defaults_to_get() {
        let s: ApiSpec = serde_json::from_value(json!({ "url": "https://x.example/api" })).unwrap();
        assert_eq!(s.method, HttpMethod::Get);
        assert_eq!(s.page_size, 20);
        assert_eq!(s.detail_path, "description");
    }

    #[tokio::test]
    async fn later_pages_do_not_refetch() {
        let hits = fetch(&spec(), &ctx(2)).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn pages_through_windows_until_short_page() {
        let (base, paths) = serve(board(5, 5)).await;
        let hits = fetch(&local_spec(&base), &local_ctx(10, false)).await.unwrap();
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[4].job_id.as_deref(), Some("r-4"));
        assert_eq!(
            listing_requests(&paths),
            vec!["/jobs?offset=0&limit=2", "/jobs?offset=2&limit=2", "/jobs?offset=4&limit=2"]
        );
        assert!(hits.iter().all(|h| h.aux(AuxField::Description).is_none()));
    }

    #[tokio::test]
    async fn stops_at_reported_total() {
        let (base, paths) = serve(board(100, 4)).await;
        let hits = fetch(&local_spec(&base), &local_ctx(10, false)).await.unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(listing_requests(&paths).len(), 2);
    }

    #[tokio::test]
    async fn window_count_bounded_by_max_pages() {
        let (base, paths) = serve(board(100, 100)).await;
        let hits = fetch(&local_spec(&base), &local_ctx(3, false)).await.unwrap();
        assert_eq!(hits.len(), 6);
        assert_eq!(listing_requests(&paths).len(), 3);
    }

    #[tokio::test]
    async fn full_details_fill_description() {
        let (base, paths) = serve(board(3, 3)).await;
        let hits = fetch(&local_spec(&base), &local_ctx(10, true)).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].aux(AuxField::Description).as_deref(), Some("Full text r-0"));
        assert_eq!(hits[2].aux(AuxField::Description).as_deref(), Some("Full text r-2"));
        let details = paths.lock().unwrap().iter().filter(|p| p.starts_with("/detail/")).count();
        assert_eq!(details, 3);
    }

    #[tokio::test]
    async fn failing_status_is_an_error() {
        let (base, _) = serve(Arc::new(|_: &str| (500, "{}".to_string()))).await;
        assert!(fetch(&local_spec(&base), &local_ctx(3, false)).await.is_err());
    }

    #[tokio::test]
    async fn later_window_failure_keeps_earlier_items() {
        let inner = board(100, 100);
        let (base, paths) = serve(Arc::new(move |path: &str| {
            if query_num(path, "offset") >= 2 {
                (503, "{}".to_string())
            } else {
                inner(path)
            }
        }))
        .await;
        let hits = fetch(&local_spec(&base), &local_ctx(5, false)).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(listing_requests(&paths).len(), 2);
    }
}
