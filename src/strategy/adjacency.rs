//! Heading/anchor adjacency: a heading names the listing, the closest link
//! points at it.

use scraper::{ElementRef, Html};
use serde::Deserialize;

use super::dom::{first_href, nearest_container, select_text, selector, text_of, DEFAULT_CONTAINER_DEPTH};
use crate::error::StrategyError;
use crate::record::RawHit;

const DEFAULT_HEADINGS: &str = "h1, h2, h3, h4, h5";
const DEFAULT_LOCATION: &str = "[class*=location], [class*=Location], .loc";

#[derive(Debug, Clone, Deserialize)]
pub struct AdjacencySpec {
    #[serde(default = "default_headings")]
    pub headings: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_depth")]
    pub container_depth: usize,
    /// Following siblings searched for a link when the heading has none.
    #[serde(default = "default_sibling_limit")]
    pub sibling_limit: usize,
}

fn default_headings() -> String {
    DEFAULT_HEADINGS.to_string()
}

fn default_depth() -> usize {
    DEFAULT_CONTAINER_DEPTH
}

fn default_sibling_limit() -> usize {
    3
}

impl Default for AdjacencySpec {
    fn default() -> Self {
        Self {
            headings: default_headings(),
            scope: None,
            location: None,
            container_depth: DEFAULT_CONTAINER_DEPTH,
            sibling_limit: default_sibling_limit(),
        }
    }
}

pub fn extract(spec: &AdjacencySpec, html: &str) -> Result<Vec<RawHit>, StrategyError> {
    let headings = selector(&spec.headings)?;
    let scope = spec.scope.as_deref().map(selector).transpose()?;
    let location = selector(spec.location.as_deref().unwrap_or(DEFAULT_LOCATION))?;
    let doc = Html::parse_document(html);
    let roots: Vec<ElementRef<'_>> = match &scope {
        Some(s) => doc.select(s).collect(),
        None => vec![doc.root_element()],
    };

    let mut hits = Vec::new();
    for heading in roots.iter().flat_map(|root| root.select(&headings)) {
        let title = text_of(heading);
        if title.is_empty() {
            continue;
        }
        let container = nearest_container(heading, spec.container_depth);
        let Some(href) = paired_href(heading, container, spec.sibling_limit) else {
            continue;
        };
        let mut hit = RawHit::new(title).with_url(href);
        hit.location = container.and_then(|c| select_text(c, &location));
        hits.push(hit);
    }
    Ok(hits)
}

/// Link for a heading: an enclosing anchor, one inside the heading, one in
/// its listing container, or one among the next few siblings.
fn paired_href(heading: ElementRef<'_>, container: Option<ElementRef<'_>>, sibling_limit: usize) -> Option<String> {
    heading
        .ancestors()
        .take(2)
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "a")
        .and_then(|a| a.value().attr("href").map(str::to_string))
        .or_else(|| first_href(heading))
        .or_else(|| container.and_then(first_href))
        .or_else(|| {
            heading
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .take(sibling_limit)
                .find_map(first_href)
        })
}
