use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STATUS_ACTIVE: &str = "active";

/// Canonical, normalized job listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub external_id: String,
    pub company_name: String,
    pub title: String,
    pub location: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub apply_url: String,
    pub department: String,
    pub job_function: String,
    pub employment_type: String,
    pub experience_level: String,
    pub salary_range: String,
    pub remote_type: String,
    pub posted_date: String,
    pub description: String,
    pub status: String,
}

/// Auxiliary text fields a strategy may attach to a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxField {
    Department,
    JobFunction,
    EmploymentType,
    ExperienceLevel,
    SalaryRange,
    RemoteType,
    PostedDate,
    Description,
}

impl AuxField {
    pub const ALL: [AuxField; 8] = [
        AuxField::Department,
        AuxField::JobFunction,
        AuxField::EmploymentType,
        AuxField::ExperienceLevel,
        AuxField::SalaryRange,
        AuxField::RemoteType,
        AuxField::PostedDate,
        AuxField::Description,
    ];

    pub fn key(self) -> &'static str {
        match self {
            AuxField::Department => "department",
            AuxField::JobFunction => "job_function",
            AuxField::EmploymentType => "employment_type",
            AuxField::ExperienceLevel => "experience_level",
            AuxField::SalaryRange => "salary_range",
            AuxField::RemoteType => "remote_type",
            AuxField::PostedDate => "posted_date",
            AuxField::Description => "description",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        AuxField::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Keys platforms commonly use for the same field.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            AuxField::Department => &["department", "team", "departmentName", "category"],
            AuxField::JobFunction => &["job_function", "function", "jobFunction", "jobFamily"],
            AuxField::EmploymentType => &[
                "employment_type",
                "employmentType",
                "timeType",
                "jobType",
                "commitment",
            ],
            AuxField::ExperienceLevel => &["experience_level", "experience", "seniority", "level"],
            AuxField::SalaryRange => &["salary_range", "salary", "compensation", "pay"],
            AuxField::RemoteType => &["remote_type", "workplaceType", "remote", "workMode"],
            AuxField::PostedDate => &["posted_date", "postedOn", "datePosted", "postedAt", "createdAt"],
            AuxField::Description => &["description", "summary", "jobDescription", "shortDescription"],
        }
    }
}

/// Loosely-typed result of one extraction strategy. Consumed immediately by
/// the normalizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawHit {
    pub title: Option<String>,
    pub url: Option<String>,
    pub location: Option<String>,
    /// Site-native job identifier, when the platform exposes one.
    pub job_id: Option<String>,
    pub fields: BTreeMap<String, Value>,
}

const TITLE_KEYS: &[&str] = &["title", "name", "jobTitle", "job_title", "text"];
const URL_KEYS: &[&str] = &["url", "href", "link", "applyUrl", "apply_url", "absolute_url", "hostedUrl"];
const LOCATION_KEYS: &[&str] = &["location", "locationName", "locationsText", "location_text"];
const ID_KEYS: &[&str] = &["job_id", "id", "jobId", "reqId", "requisitionId"];

impl RawHit {
    /// Build a hit from one JSON object as returned by a page script or API.
    /// Known keys (and their common aliases) fill the typed slots; every other
    /// key is kept for [`RawHit::aux`].
    pub fn from_json(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let pick = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| map.get(*k))
                .filter_map(value_text)
                .find(|s| !s.trim().is_empty())
        };
        let typed: Vec<&str> = [TITLE_KEYS, URL_KEYS, LOCATION_KEYS, ID_KEYS].concat();
        Some(Self {
            title: pick(TITLE_KEYS),
            url: pick(URL_KEYS),
            location: pick(LOCATION_KEYS),
            job_id: pick(ID_KEYS),
            fields: map
                .iter()
                .filter(|(k, _)| !typed.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }

    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_job_id(mut self, id: impl Into<String>) -> Self {
        self.job_id = Some(id.into());
        self
    }

    pub fn set(&mut self, field: AuxField, value: impl Into<String>) {
        let value = value.into();
        if !value.trim().is_empty() {
            self.fields.insert(field.key().to_string(), Value::String(value));
        }
    }

    /// First non-empty value among the field's known keys.
    pub fn aux(&self, field: AuxField) -> Option<String> {
        field
            .aliases()
            .iter()
            .filter_map(|k| self.fields.get(*k))
            .filter_map(value_text)
            .find(|s| !s.trim().is_empty())
    }
}

/// Render a JSON scalar (or a `{name|text|label}` object) as text.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => ["name", "text", "label", "value"]
            .iter()
            .find_map(|k| map.get(*k).and_then(value_text)),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_text).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        Value::Null => None,
    }
}
