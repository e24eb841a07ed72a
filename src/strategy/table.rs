//! Tabular listings: one row per job, columns mapped to record fields.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html};
use serde::Deserialize;
use serde_json::Value;

use super::dom::{first_href, selector, text_of};
use crate::error::StrategyError;
use crate::record::{AuxField, RawHit};

#[derive(Debug, Clone, Deserialize)]
pub struct TableSpec {
    #[serde(default = "default_rows")]
    pub rows: String,
    /// Zero-based column indices. When unset, the header row decides.
    #[serde(default)]
    pub title_col: Option<usize>,
    #[serde(default)]
    pub location_col: Option<usize>,
    /// Auxiliary record field -> column index.
    #[serde(default)]
    pub columns: BTreeMap<String, usize>,
}

fn default_rows() -> String {
    "table tr".to_string()
}

impl Default for TableSpec {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            title_col: None,
            location_col: None,
            columns: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct Layout {
    title: usize,
    location: Option<usize>,
    columns: BTreeMap<String, usize>,
}

/// Map header labels to columns.
fn layout_from_header(headers: &[String]) -> Layout {
    let find = |labels: &[&str]| {
        headers
            .iter()
            .position(|h| labels.iter().any(|l| h.to_lowercase().contains(l)))
    };
    let mut columns = BTreeMap::new();
    let aux: [(AuxField, &[&str]); 6] = [
        (AuxField::Department, &["department", "team"]),
        (AuxField::EmploymentType, &["type", "schedule"]),
        (AuxField::ExperienceLevel, &["experience", "level"]),
        (AuxField::PostedDate, &["posted", "date"]),
        (AuxField::JobFunction, &["function", "category"]),
        (AuxField::SalaryRange, &["salary", "pay"]),
    ];
    for (field, labels) in aux {
        if let Some(i) = find(labels) {
            columns.insert(field.key().to_string(), i);
        }
    }
    Layout {
        title: find(&["title", "position", "role", "job", "opening"]).unwrap_or(0),
        location: find(&["location", "city", "office"]),
        columns,
    }
}

pub fn extract(spec: &TableSpec, html: &str) -> Result<Vec<RawHit>, StrategyError> {
    let rows = selector(&spec.rows)?;
    let td = selector("td")?;
    let th = selector("th")?;
    let doc = Html::parse_document(html);

    let header: Vec<String> = doc
        .select(&rows)
        .map(|r| r.select(&th).map(text_of).collect::<Vec<_>>())
        .find(|cells| !cells.is_empty())
        .unwrap_or_default();
    let detected = layout_from_header(&header);
    let layout = Layout {
        title: spec.title_col.unwrap_or(detected.title),
        location: spec.location_col.or(detected.location),
        columns: if spec.columns.is_empty() {
            detected.columns
        } else {
            spec.columns.clone()
        },
    };

    let mut hits = Vec::new();
    for row in doc.select(&rows) {
        let cells: Vec<ElementRef<'_>> = row.select(&td).collect();
        let Some(title_cell) = cells.get(layout.title) else {
            continue;
        };
        let title = text_of(*title_cell);
        if title.is_empty() {
            continue;
        }
        let mut hit = RawHit::new(title);
        hit.url = first_href(*title_cell).or_else(|| first_href(row));
        hit.location = layout
            .location
            .and_then(|i| cells.get(i))
            .map(|c| text_of(*c))
            .filter(|t| !t.is_empty());
        hit.job_id = row
            .value()
            .attr("data-id")
            .or_else(|| row.value().attr("data-job-id"))
            .map(str::to_string);
        for (key, i) in &layout.columns {
            if let Some(text) = cells.get(*i).map(|c| text_of(*c)).filter(|t| !t.is_empty()) {
                hit.fields.insert(key.clone(), Value::String(text));
            }
        }
        hits.push(hit);
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
        <table class="careers">
          <thead><tr><th>Department</th><th>Job Title</th><th>Location</th><th>Employment Type</th></tr></thead>
          <tbody>
            <tr data-id="77"><td>Finance</td><td><a href="/careers/77">Financial Analyst</a></td><td>Mumbai, India</td><td>Full-time</td></tr>
            <tr><td>Engineering</td><td><a href="/careers/78">Firmware Engineer</a></td><td>Austin, TX</td><td></td></tr>
            <tr><td colspan="4">No more openings</td></tr>
          </tbody>
        </table>"#;

    #[test]
    fn header_drives_column_mapping() {
        let hits = extract(&TableSpec::default(), TABLE).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title.as_deref(), Some("Financial Analyst"));
        assert_eq!(hits[0].url.as_deref(), Some("/careers/77"));
        assert_eq!(hits[0].location.as_deref(), Some("Mumbai, India"));
        assert_eq!(hits[0].job_id.as_deref(), Some("77"));
        assert_eq!(hits[0].aux(AuxField::Department).as_deref(), Some("Finance"));
        assert_eq!(hits[0].aux(AuxField::EmploymentType).as_deref(), Some("Full-time"));
        assert_eq!(hits[1].aux(AuxField::EmploymentType), None);
    }

    #[test]
    fn explicit_columns_win() {
        let spec = TableSpec {
            rows: "tbody tr".into(),
            title_col: Some(0),
            location_col: None,
            columns: BTreeMap::new(),
        };
        let hits = extract(&spec, TABLE).unwrap();
        let titles: Vec<_> = hits.iter().filter_map(|h| h.title.as_deref()).collect();
        assert_eq!(titles, vec!["Finance", "Engineering", "No more openings"]);
        assert_eq!(hits[0].url.as_deref(), Some("/careers/77"));
    }

    #[test]
    fn header_labels() {
        let layout = layout_from_header(&["Role".into(), "Office".into(), "Posted".into()]);
        assert_eq!(layout.title, 0);
        assert_eq!(layout.location, Some(1));
        assert_eq!(layout.columns.get("posted_date"), Some(&2));
    }
}
