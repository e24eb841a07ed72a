pub mod identity;
pub mod location;

use url::Url;

use crate::record::{AuxField, JobRecord, RawHit, STATUS_ACTIVE};
use identity::SiteKey;
use location::{work_mode, LocationParser};

/// Maps raw hits from one site into canonical [`JobRecord`]s.
pub struct RecordNormalizer {
    company_name: String,
    locations: LocationParser,
}

impl RecordNormalizer {
    pub fn new(company_name: &str, default_country: Option<&str>) -> Self {
        Self {
            company_name: company_name.trim().to_string(),
            locations: LocationParser::new(default_country),
        }
    }

    /// Normalize one hit. `ordinal` is the hit's position in its page's
    /// result list; `page_url` is the listing page it came from.
    /// Returns `None` for hits without a usable title.
    pub fn normalize(&self, hit: RawHit, ordinal: usize, page_url: &str) -> Option<JobRecord> {
        let title = collapse_whitespace(hit.title.as_deref().unwrap_or(""));
        if title.is_empty() {
            return None;
        }

        let resolved = hit.url.as_deref().and_then(|href| resolve_url(page_url, href));
        let key = match hit.job_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => SiteKey::Native(id.to_string()),
            None => match &resolved {
                Some(url) => SiteKey::Url(url.clone()),
                None => SiteKey::TitleOrdinal {
                    title: title.clone(),
                    ordinal,
                },
            },
        };

        let location = collapse_whitespace(hit.location.as_deref().unwrap_or(""));
        let parsed = self.locations.parse(&location);
        let aux = |field: AuxField| {
            hit.aux(field)
                .map(|v| collapse_whitespace(&v))
                .unwrap_or_default()
        };
        let remote_type = Some(aux(AuxField::RemoteType))
            .filter(|v| !v.is_empty())
            .or_else(|| work_mode(&location).or_else(|| work_mode(&title)).map(str::to_string))
            .unwrap_or_default();

        Some(JobRecord {
            external_id: identity::external_id(&self.company_name, &key),
            company_name: self.company_name.clone(),
            apply_url: resolved.unwrap_or_else(|| page_url.to_string()),
            city: parsed.city,
            state: parsed.state,
            country: parsed.country,
            department: aux(AuxField::Department),
            job_function: aux(AuxField::JobFunction),
            employment_type: aux(AuxField::EmploymentType),
            experience_level: aux(AuxField::ExperienceLevel),
            salary_range: aux(AuxField::SalaryRange),
            posted_date: aux(AuxField::PostedDate),
            description: aux(AuxField::Description),
            remote_type,
            location,
            title,
            status: STATUS_ACTIVE.to_string(),
        })
    }
}

/// Resolve `href` against the page URL. Non-navigational hrefs
/// (`#`, `javascript:`, `mailto:`) yield `None`.
pub fn resolve_url(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    let lower = href.to_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
    {
        return None;
    }
    let url = match Url::parse(href) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(page_url).ok()?.join(href).ok()?,
        Err(_) => return None,
    };
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
