//! Structural platform markup: one container element per listing.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::Value;

use super::dom::{first_href, select_text, selector, text_of};
use crate::error::StrategyError;
use crate::record::RawHit;

const HEADINGS: &str = "h1, h2, h3, h4, h5, [role=heading]";

#[derive(Debug, Clone, Deserialize)]
pub struct CardSpec {
    /// One match per listing.
    pub container: String,
    /// Title selector inside the card. Defaults to the first heading, then
    /// the first link.
    #[serde(default)]
    pub title: Option<String>,
    /// Link selector inside the card. Defaults to the card itself or its
    /// first anchor.
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Attribute on the container holding the site's job id.
    #[serde(default)]
    pub id_attr: Option<String>,
    /// Auxiliary record field -> selector inside the card.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

struct Compiled {
    container: Selector,
    title: Option<Selector>,
    link: Option<Selector>,
    location: Option<Selector>,
    headings: Selector,
    anchors: Selector,
    fields: Vec<(String, Selector)>,
}

impl CardSpec {
    fn compile(&self) -> Result<Compiled, StrategyError> {
        let optional = |css: &Option<String>| css.as_deref().map(selector).transpose();
        Ok(Compiled {
            container: selector(&self.container)?,
            title: optional(&self.title)?,
            link: optional(&self.link)?,
            location: optional(&self.location)?,
            headings: selector(HEADINGS)?,
            anchors: selector("a[href]")?,
            fields: self
                .fields
                .iter()
                .map(|(k, css)| Ok((k.clone(), selector(css)?)))
                .collect::<Result<_, StrategyError>>()?,
        })
    }
}

pub fn extract(spec: &CardSpec, html: &str) -> Result<Vec<RawHit>, StrategyError> {
    let sel = spec.compile()?;
    let doc = Html::parse_document(html);
    Ok(doc
        .select(&sel.container)
        .filter_map(|card| card_hit(spec, &sel, card))
        .collect())
}

fn card_hit(spec: &CardSpec, sel: &Compiled, card: ElementRef<'_>) -> Option<RawHit> {
    let title = match &sel.title {
        Some(t) => select_text(card, t),
        None => select_text(card, &sel.headings).or_else(|| select_text(card, &sel.anchors)),
    }?;

    let mut hit = RawHit::new(title);
    hit.url = match &sel.link {
        Some(l) => card.select(l).find_map(first_href),
        None => first_href(card),
    };
    hit.location = sel.location.as_ref().and_then(|l| select_text(card, l));
    hit.job_id = spec
        .id_attr
        .as_deref()
        .and_then(|attr| card.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    for (key, field_sel) in &sel.fields {
        if let Some(text) = card.select(field_sel).map(text_of).find(|t| !t.is_empty()) {
            hit.fields.insert(key.clone(), Value::String(text));
        }
    }
    Some(hit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AuxField;

    const WORKDAY_LIKE: &str = r#"
        <html><body><ul role="list">
          <li class="css-1q2dra3" data-job-id="R-1001">
            <h3><a data-automation-id="jobTitle" href="/en-US/job/Pune/Backend-Engineer_R-1001">Backend Engineer</a></h3>
            <dd class="css-129m7dg">Pune, Maharashtra, India</dd>
            <dd data-automation-id="postedOn">Posted Today</dd>
          </li>
          <li class="css-1q2dra3" data-job-id="R-1002">
            <h3><a data-automation-id="jobTitle" href="/en-US/job/Remote/QA-Analyst_R-1002">QA   Analyst</a></h3>
            <dd class="css-129m7dg">Remote</dd>
          </li>
          <li class="css-1q2dra3"><span>no title here</span></li>
        </ul></body></html>"#;

    fn spec() -> CardSpec {
        CardSpec {
            container: "li.css-1q2dra3".into(),
            title: None,
            link: None,
            location: Some("dd.css-129m7dg".into()),
            id_attr: Some("data-job-id".into()),
            fields: [("posted_date".to_string(), "[data-automation-id=postedOn]".to_string())].into(),
        }
    }

    #[test]
    fn extracts_cards_in_document_order() {
        let hits = extract(&spec(), WORKDAY_LIKE).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title.as_deref(), Some("Backend Engineer"));
        assert_eq!(hits[0].job_id.as_deref(), Some("R-1001"));
        assert_eq!(hits[0].location.as_deref(), Some("Pune, Maharashtra, India"));
        assert_eq!(hits[0].aux(AuxField::PostedDate).as_deref(), Some("Posted Today"));
        assert_eq!(hits[1].title.as_deref(), Some("QA Analyst"));
        assert_eq!(hits[1].url.as_deref(), Some("/en-US/job/Remote/QA-Analyst_R-1002"));
        assert_eq!(hits[1].aux(AuxField::PostedDate), None);
    }

    #[test]
    fn falls_back_to_anchor_text() {
        let spec = CardSpec {
            container: "div.opening".into(),
            title: None,
            link: None,
            location: None,
            id_attr: None,
            fields: BTreeMap::new(),
        };
        let html = r#"<div class="opening"><a href="https://boards.example/acme/jobs/9">Data Engineer</a></div>"#;
        let hits = extract(&spec, html).unwrap();
        assert_eq!(hits[0].title.as_deref(), Some("Data Engineer"));
        assert_eq!(hits[0].url.as_deref(), Some("https://boards.example/acme/jobs/9"));
    }

    #[test]
    fn no_match_is_empty_and_bad_selector_errors() {
        let mut s = spec();
        s.container = "article.posting".into();
        assert!(extract(&s, WORKDAY_LIKE).unwrap().is_empty());
        s.location = Some("dd[[".into());
        assert!(matches!(extract(&s, WORKDAY_LIKE), Err(StrategyError::Selector { .. })));
    }
}
