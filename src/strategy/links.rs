//! Link harvesting: any anchor whose path looks like a job posting.

use std::collections::HashSet;

use scraper::{ElementRef, Html};
use serde::Deserialize;
use url::Url;

use super::dom::{nearest_container, select_text, selector, text_of, DEFAULT_CONTAINER_DEPTH};
use crate::error::StrategyError;
use crate::record::RawHit;

const DEFAULT_KEYWORDS: &[&str] = &["job", "career", "opening", "position", "vacanc", "requisition"];
const DEFAULT_LOCATION: &str = "[class*=location], [class*=Location], [data-automation-id*=location], .loc";

/// Anchors inside these never point at a listing.
const CHROME: &[&str] = &["nav", "header", "footer"];
const EXCLUDED_PATH_PARTS: &[&str] = &[
    "login", "signin", "sign-in", "sign_in", "register", "signup", "logout", "privacy", "cookie",
    "terms", "saved", "alert",
];
const SOCIAL_HOSTS: &[&str] = &[
    "linkedin.com", "facebook.com", "twitter.com", "x.com", "instagram.com", "youtube.com",
    "glassdoor.com", "tiktok.com",
];
const GENERIC_TITLES: &[&str] = &[
    "apply", "apply now", "view", "view job", "view details", "details", "learn more", "read more",
    "more", "see all", "see all jobs", "view all jobs", "all jobs", "jobs", "careers",
    "open positions", "search jobs", "next", "previous", "back",
];
/// Last path segments that denote a listing index rather than a posting.
const ROOT_SEGMENTS: &[&str] = &[
    "job", "jobs", "career", "careers", "openings", "positions", "vacancies", "search",
    "search-results", "results", "en", "en-us",
];

#[derive(Debug, Clone, Deserialize)]
pub struct LinkSpec {
    /// Path fragments that mark a posting link; matched case-insensitively.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    /// Extra path fragments to reject.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Restrict harvesting to anchors under this selector.
    #[serde(default)]
    pub scope: Option<String>,
    /// Location selector evaluated inside the nearest listing container.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_depth")]
    pub container_depth: usize,
}

fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

fn default_depth() -> usize {
    DEFAULT_CONTAINER_DEPTH
}

impl Default for LinkSpec {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            exclude: Vec::new(),
            scope: None,
            location: None,
            container_depth: DEFAULT_CONTAINER_DEPTH,
        }
    }
}

pub fn extract(spec: &LinkSpec, html: &str) -> Result<Vec<RawHit>, StrategyError> {
    let anchors = selector("a[href]")?;
    let scope = spec.scope.as_deref().map(selector).transpose()?;
    let location = selector(spec.location.as_deref().unwrap_or(DEFAULT_LOCATION))?;
    let doc = Html::parse_document(html);
    let roots: Vec<ElementRef<'_>> = match &scope {
        Some(s) => doc.select(s).collect(),
        None => vec![doc.root_element()],
    };

    let mut seen = HashSet::new();
    let mut hits = Vec::new();
    for a in roots.iter().flat_map(|root| root.select(&anchors)) {
        let Some(href) = a.value().attr("href").map(str::trim) else {
            continue;
        };
        if !spec.is_posting(href) || in_page_chrome(a) {
            continue;
        }
        let title = anchor_title(a);
        if title.is_empty() || GENERIC_TITLES.contains(&title.to_lowercase().as_str()) {
            continue;
        }
        if !seen.insert(href.to_string()) {
            continue;
        }
        let mut hit = RawHit::new(title.clone()).with_url(href);
        hit.location = nearest_container(a, spec.container_depth)
            .and_then(|c| select_text(c, &location))
            .filter(|loc| *loc != title);
        hits.push(hit);
    }
    Ok(hits)
}

impl LinkSpec {
    fn is_posting(&self, href: &str) -> bool {
        let lower = href.to_lowercase();
        if lower.is_empty()
            || lower.starts_with('#')
            || lower.starts_with("javascript:")
            || lower.starts_with("mailto:")
            || lower.starts_with("tel:")
        {
            return false;
        }
        // Relative hrefs only need a syntactic base to expose their path.
        let Ok(parsed) = Url::parse("https://listing.invalid/").and_then(|base| base.join(&lower)) else {
            return false;
        };
        if parsed
            .host_str()
            .is_some_and(|host| SOCIAL_HOSTS.iter().any(|s| host == *s || host.ends_with(&format!(".{}", s))))
        {
            return false;
        }

        let path = parsed.path();
        let target = format!("{}?{}", path, parsed.query().unwrap_or(""));
        if EXCLUDED_PATH_PARTS.iter().any(|x| path.contains(x))
            || self.exclude.iter().any(|x| target.contains(&x.to_lowercase()))
        {
            return false;
        }
        if !self.keywords.iter().any(|k| target.contains(&k.to_lowercase())) {
            return false;
        }
        let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
        !(last.is_empty() || ROOT_SEGMENTS.contains(&last)) || parsed.query().is_some()
    }
}

fn in_page_chrome(a: ElementRef<'_>) -> bool {
    a.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|e| CHROME.contains(&e.value().name()) || e.value().attr("role") == Some("navigation"))
}

fn anchor_title(a: ElementRef<'_>) -> String {
    let text = text_of(a);
    if !text.is_empty() {
        return text;
    }
    ["aria-label", "title"]
        .iter()
        .find_map(|attr| a.value().attr(attr))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}
