use sha2::{Digest, Sha256};

const ID_HEX_LEN: usize = 32;

/// Where a record's site-level identifier came from, most stable first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteKey {
    Native(String),
    Url(String),
    TitleOrdinal { title: String, ordinal: usize },
}

impl SiteKey {
    fn material(&self) -> String {
        match self {
            SiteKey::Native(id) => format!("id:{}", id),
            SiteKey::Url(url) => format!("url:{}", digest(url)),
            SiteKey::TitleOrdinal { title, ordinal } => format!("title:{}", digest(&format!("{}#{}", title, ordinal))),
        }
    }
}

fn digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deterministic record identity for `(company, site key)`.
pub fn external_id(company_name: &str, key: &SiteKey) -> String {
    let mut out = digest(&format!("{}\u{1f}{}", company_name.trim(), key.material()));
    out.truncate(ID_HEX_LEN);
    out
}

/// Short digest used for page fingerprints.
pub fn short_digest(input: &str) -> String {
    let mut out = digest(input);
    out.truncate(16);
    out
}
