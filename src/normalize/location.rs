use std::sync::LazyLock;

use regex::Regex;

static PARENS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\([^)]*\)").unwrap());
static WORK_MODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(fully\s+)?(remote|hybrid|on[\s-]?site|in[\s-]office|work\s+from\s+home|wfh|anywhere)$")
        .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub city: String,
    pub state: String,
    pub country: String,
}

pub struct Country {
    pub name: &'static str,
    /// Codes and alternate names, compared case-insensitively without dots.
    pub codes: &'static [&'static str],
}

const COUNTRIES: &[Country] = &[
    Country { name: "India", codes: &["in", "ind", "bharat"] },
    Country {
        name: "United States",
        codes: &["us", "usa", "united states of america", "america"],
    },
    Country {
        name: "United Kingdom",
        codes: &["uk", "gb", "gbr", "great britain", "england", "scotland", "wales"],
    },
    Country { name: "Canada", codes: &["ca", "can"] },
    Country { name: "Germany", codes: &["de", "deu", "deutschland"] },
    Country { name: "France", codes: &["fr", "fra"] },
    Country { name: "Netherlands", codes: &["nl", "nld", "the netherlands", "holland"] },
    Country { name: "Ireland", codes: &["ie", "irl"] },
    Country { name: "Spain", codes: &["es", "esp"] },
    Country { name: "Italy", codes: &["it", "ita"] },
    Country { name: "Portugal", codes: &["pt", "prt"] },
    Country { name: "Poland", codes: &["pl", "pol"] },
    Country { name: "Romania", codes: &["ro", "rou"] },
    Country { name: "Sweden", codes: &["se", "swe"] },
    Country { name: "Switzerland", codes: &["ch", "che"] },
    Country { name: "Israel", codes: &["il", "isr"] },
    Country { name: "United Arab Emirates", codes: &["ae", "are", "uae"] },
    Country { name: "Saudi Arabia", codes: &["sa", "sau", "ksa"] },
    Country { name: "Qatar", codes: &["qa", "qat"] },
    Country { name: "Egypt", codes: &["eg", "egy"] },
    Country { name: "South Africa", codes: &["za", "zaf"] },
    Country { name: "Singapore", codes: &["sg", "sgp"] },
    Country { name: "Malaysia", codes: &["my", "mys"] },
    Country { name: "Indonesia", codes: &["id", "idn"] },
    Country { name: "Philippines", codes: &["ph", "phl"] },
    Country { name: "Vietnam", codes: &["vn", "vnm", "viet nam"] },
    Country { name: "Hong Kong", codes: &["hk", "hkg"] },
    Country { name: "China", codes: &["cn", "chn", "prc"] },
    Country { name: "Japan", codes: &["jp", "jpn"] },
    Country { name: "South Korea", codes: &["kr", "kor", "korea", "republic of korea"] },
    Country { name: "Australia", codes: &["au", "aus"] },
    Country { name: "New Zealand", codes: &["nz", "nzl"] },
    Country { name: "Sri Lanka", codes: &["lk", "lka"] },
    Country { name: "Bangladesh", codes: &["bd", "bgd"] },
    Country { name: "Pakistan", codes: &["pk", "pak"] },
    Country { name: "Nepal", codes: &["np", "npl"] },
    Country { name: "Brazil", codes: &["br", "bra", "brasil"] },
    Country { name: "Mexico", codes: &["mx", "mex"] },
    Country { name: "Argentina", codes: &["ar", "arg"] },
];

/// Two-letter codes that are also US state abbreviations ("San Jose, CA").
/// They only count as a country through the home-country override.
const STATE_CODES: &[&str] = &[
    "al", "ak", "az", "ar", "ca", "co", "ct", "de", "fl", "ga", "hi", "id", "il", "in", "ia",
    "ks", "ky", "la", "me", "md", "ma", "mi", "mn", "ms", "mo", "mt", "ne", "nv", "nh", "nj",
    "nm", "ny", "nc", "nd", "oh", "ok", "or", "pa", "ri", "sc", "sd", "tn", "tx", "ut", "vt",
    "va", "wa", "wv", "wi", "wy", "dc",
];

fn key(token: &str) -> String {
    token
        .chars()
        .filter(|c| *c != '.')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl Country {
    fn matches(&self, token: &str) -> bool {
        let k = key(token);
        k == key(self.name) || self.codes.contains(&k.as_str())
    }
}

/// Look up a token as a country name or unambiguous code.
pub fn find_country(token: &str) -> Option<&'static Country> {
    let k = key(token);
    if STATE_CODES.contains(&k.as_str()) {
        return COUNTRIES.iter().find(|c| key(c.name) == k);
    }
    COUNTRIES.iter().find(|c| c.matches(token))
}

/// Detect a work-mode marker ("Remote", "Hybrid", "On-site") in free text.
pub fn work_mode(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    if lower.contains("hybrid") {
        Some("Hybrid")
    } else if lower.contains("remote") || lower.contains("work from home") || lower.contains("wfh") {
        Some("Remote")
    } else if lower.contains("on-site") || lower.contains("onsite") || lower.contains("on site") {
        Some("On-site")
    } else {
        None
    }
}

/// Parses free-text locations into (city, state, country) for one site.
pub struct LocationParser {
    default_country: String,
    home: Option<&'static Country>,
}

impl LocationParser {
    pub fn new(default_country: Option<&str>) -> Self {
        let default_country = default_country.map(str::trim).unwrap_or_default();
        let home = COUNTRIES.iter().find(|c| c.matches(default_country));
        Self {
            default_country: home.map(|c| c.name).unwrap_or(default_country).to_string(),
            home,
        }
    }

    pub fn default_country(&self) -> &str {
        &self.default_country
    }

    pub fn parse(&self, raw: &str) -> Location {
        let cleaned = PARENS_RE.replace_all(raw, "");
        let tokens: Vec<&str> = cleaned
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty() && !WORK_MODE_RE.is_match(t))
            .collect();

        let mut loc = Location {
            country: self.default_country.clone(),
            ..Default::default()
        };

        match tokens.as_slice() {
            [] => {}
            [only] => loc.city = only.to_string(),
            [city, second] => {
                loc.city = city.to_string();
                match find_country(second) {
                    Some(c) => loc.country = c.name.to_string(),
                    None => loc.state = second.to_string(),
                }
            }
            [city, .., state, country] => {
                loc.city = city.to_string();
                loc.state = state.to_string();
                loc.country = find_country(country)
                    .map(|c| c.name.to_string())
                    .unwrap_or_else(|| country.to_string());
            }
        }

        if self.is_home(&tokens) {
            loc.country = self.default_country.clone();
        }
        loc
    }

    fn is_home(&self, tokens: &[&str]) -> bool {
        match self.home {
            Some(home) => tokens.iter().any(|t| home.matches(t)),
            None => {
                !self.default_country.is_empty()
                    && tokens.iter().any(|t| t.eq_ignore_ascii_case(&self.default_country))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn india() -> LocationParser {
        LocationParser::new(Some("India"))
    }

    fn loc(city: &str, state: &str, country: &str) -> Location {
        Location {
            city: city.into(),
            state: state.into(),
            country: country.into(),
        }
    }

    #[test]
    fn three_tokens() {
        assert_eq!(india().parse("Mumbai, Maharashtra, India"), loc("Mumbai", "Maharashtra", "India"));
    }

    #[test]
    fn city_and_country() {
        assert_eq!(india().parse("Bangalore, India"), loc("Bangalore", "", "India"));
    }

    #[test]
    fn empty_uses_default() {
        assert_eq!(india().parse(""), loc("", "", "India"));
        assert_eq!(india().parse("  ,  "), loc("", "", "India"));
        assert_eq!(LocationParser::new(None).parse(""), loc("", "", ""));
    }

    #[test]
    fn city_and_state_fall_back_to_default() {
        assert_eq!(india().parse("Gurgaon, Haryana"), loc("Gurgaon", "Haryana", "India"));
    }

    #[test]
    fn single_token_is_city() {
        assert_eq!(india().parse("Hyderabad"), loc("Hyderabad", "", "India"));
        assert_eq!(india().parse("Germany"), loc("Germany", "", "India"));
    }

    #[test]
    fn single_token_keeps_city_under_home_override() {
        assert_eq!(india().parse("Singapore"), loc("Singapore", "", "India"));
        assert_eq!(india().parse("India"), loc("India", "", "India"));
        assert_eq!(LocationParser::new(None).parse("Singapore"), loc("Singapore", "", ""));
    }

    #[test]
    fn home_country_code_overrides_position() {
        assert_eq!(india().parse("Chennai, Tamil Nadu, IN"), loc("Chennai", "Tamil Nadu", "India"));
        assert_eq!(india().parse("Noida, IND, Uttar Pradesh"), loc("Noida", "IND", "India"));
    }

    #[test]
    fn foreign_country_in_second_position() {
        assert_eq!(india().parse("London, UK"), loc("London", "", "United Kingdom"));
        assert_eq!(india().parse("Berlin, Germany"), loc("Berlin", "", "Germany"));
    }

    #[test]
    fn state_codes_are_not_countries() {
        let us = LocationParser::new(Some("USA"));
        assert_eq!(us.parse("San Jose, CA"), loc("San Jose", "CA", "United States"));
        assert_eq!(us.default_country(), "United States");
    }

    #[test]
    fn more_than_three_tokens() {
        assert_eq!(
            india().parse("Whitefield, Bengaluru, Karnataka, India"),
            loc("Whitefield", "Karnataka", "India")
        );
    }

    #[test]
    fn work_mode_tokens_are_ignored() {
        assert_eq!(india().parse("Pune (Hybrid), Maharashtra"), loc("Pune", "Maharashtra", "India"));
        assert_eq!(india().parse("Remote, India"), loc("India", "", "India"));
        assert_eq!(work_mode("Remote - India"), Some("Remote"));
        assert_eq!(work_mode("Pune (Hybrid)"), Some("Hybrid"));
        assert_eq!(work_mode("Pune"), None);
    }

    #[test]
    fn unknown_default_country_still_applies() {
        let p = LocationParser::new(Some("Atlantis"));
        assert_eq!(p.parse("Poseidonia"), loc("Poseidonia", "", "Atlantis"));
        assert_eq!(p.parse("Poseidonia, Atlantis"), loc("Poseidonia", "Atlantis", "Atlantis"));
    }
}
