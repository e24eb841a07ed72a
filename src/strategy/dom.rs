//! Pure helpers over a parsed HTML snapshot.

use scraper::{ElementRef, Selector};

use crate::error::StrategyError;
use crate::normalize::collapse_whitespace;

/// Class/id/data fragments that mark an element as a listing container.
const CONTAINER_LABELS: &[&str] = &[
    "job", "career", "opening", "position", "vacanc", "posting", "listing", "result", "card", "role",
    "requisition",
];
const CONTAINER_TAGS: &[&str] = &["li", "tr", "article"];

pub const DEFAULT_CONTAINER_DEPTH: usize = 4;

pub fn selector(css: &str) -> Result<Selector, StrategyError> {
    Selector::parse(css).map_err(|e| StrategyError::Selector {
        selector: css.to_string(),
        reason: format!("{:?}", e),
    })
}

pub fn text_of(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first `sel` match under `el`, if non-empty.
pub fn select_text(el: ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel).map(text_of).find(|t| !t.is_empty())
}

/// `href` of `el` itself when it is an anchor, else of its first descendant anchor.
pub fn first_href(el: ElementRef<'_>) -> Option<String> {
    if el.value().name() == "a" {
        if let Some(h) = el.value().attr("href") {
            return Some(h.to_string());
        }
    }
    let anchors = Selector::parse("a[href]").ok()?;
    el.select(&anchors)
        .find_map(|a| a.value().attr("href"))
        .map(str::to_string)
}

fn is_labeled_container(el: &ElementRef<'_>) -> bool {
    let v = el.value();
    if CONTAINER_TAGS.contains(&v.name()) {
        return true;
    }
    v.attrs().any(|(name, value)| {
        (name == "class" || name == "id" || name.starts_with("data-"))
            && CONTAINER_LABELS.iter().any(|label| value.to_lowercase().contains(label))
    })
}

/// Walk at most `max_depth` ancestors of `el` and return the nearest one that
/// looks like a listing container.
pub fn nearest_container<'a>(el: ElementRef<'a>, max_depth: usize) -> Option<ElementRef<'a>> {
    el.ancestors()
        .take(max_depth)
        .filter_map(ElementRef::wrap)
        .find(|a| is_labeled_container(a) && a.value().name() != "body")
}
