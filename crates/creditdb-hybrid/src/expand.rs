//! Rule-based expansion of one question into targeted LEED sub-queries.
//!
//! Everything here is a pure function of the query and the static tables
//! below: no I/O, no randomness, no failure path.

use std::collections::HashSet;

const LEED_CONTEXT: &str = "LEED v4.1 BD+C";
const LEED_VERSION: &str = "LEED v4.1";

const MAX_CREDIT_CODES: usize = 3;
const MAX_CATEGORIES: usize = 2;
const MAX_TERMS: usize = 3;

/// Category keyword → credit category code and long name.
const CREDIT_CATEGORIES: &[(&str, &[&str])] = &[
    ("energy", &["EA", "ENERGY AND ATMOSPHERE"]),
    ("water", &["WE", "WATER EFFICIENCY"]),
    ("materials", &["MR", "MATERIALS AND RESOURCES"]),
    ("indoor", &["EQ", "INDOOR ENVIRONMENTAL QUALITY"]),
    ("site", &["SS", "SUSTAINABLE SITES"]),
    ("location", &["LT", "LOCATION AND TRANSPORTATION"]),
    ("innovation", &["IN", "INNOVATION"]),
    ("regional", &["RP", "REGIONAL PRIORITY"]),
];

const CREDIT_CODES: &[&str] = &["EA", "WE", "MR", "EQ", "SS", "LT", "IN", "RP", "IP"];

/// Domain keyword → synonym phrases (at most two).
const TERM_EXPANSIONS: &[(&str, &[&str])] = &[
    (
        "energy efficiency",
        &["EA Minimum Energy Performance", "EA Optimize Energy Performance"],
    ),
    ("energy", &["EA credit requirements", "energy performance ASHRAE 90.1"]),
    ("water", &["WE water use reduction", "WE outdoor water use reduction"]),
    (
        "materials",
        &["MR building life-cycle impact reduction", "MR building product disclosure"],
    ),
    ("requirements", &["prerequisite requirements", "credit requirements"]),
    ("efficiency", &["energy efficiency", "water efficiency"]),
];

#[derive(Debug, Default, PartialEq)]
struct Keywords {
    categories: Vec<&'static str>,
    terms: Vec<&'static str>,
    credit_codes: Vec<&'static str>,
    has_requirements: bool,
    has_thresholds: bool,
    has_documentation: bool,
}

fn extract_keywords(query: &str) -> Keywords {
    let lower = query.to_lowercase();
    let mut kw = Keywords::default();

    for (keyword, codes) in CREDIT_CATEGORIES {
        if lower.contains(keyword) {
            kw.categories.extend_from_slice(codes);
        }
    }

    // Credit codes are only recognised as standalone upper-case tokens.
    for token in query.split(|c: char| !c.is_alphanumeric() && c != '_') {
        if let Some(code) = CREDIT_CODES.iter().find(|code| **code == token) {
            if !kw.credit_codes.contains(code) {
                kw.credit_codes.push(*code);
            }
        }
    }

    for (term, _) in TERM_EXPANSIONS {
        if lower.contains(term) {
            kw.terms.push(*term);
        }
    }

    kw.has_requirements = lower.contains("requirement") || lower.contains("prerequisite");
    kw.has_thresholds = ["threshold", "point", "score"]
        .iter()
        .any(|w| lower.contains(w));
    kw.has_documentation = ["documentation", "submittal", "evidence"]
        .iter()
        .any(|w| lower.contains(w));
    kw
}

fn credit_queries(kw: &Keywords, base: &str) -> Vec<String> {
    let mut out = Vec::new();
    if !kw.credit_codes.is_empty() {
        let base_mentions_requirement = base.to_lowercase().contains("requirement");
        for code in kw.credit_codes.iter().take(MAX_CREDIT_CODES) {
            if kw.has_requirements {
                out.push(format!("{code} prerequisite requirements {LEED_VERSION}"));
                out.push(format!("{code} credit requirements {LEED_VERSION}"));
            } else {
                out.push(format!("{code} credit {LEED_CONTEXT}"));
                if !base_mentions_requirement {
                    out.push(format!("{code} requirements thresholds"));
                }
            }
        }
    } else {
        for category in kw.categories.iter().take(MAX_CATEGORIES) {
            match *category {
                "EA" | "ENERGY AND ATMOSPHERE" => {
                    out.push(format!(
                        "EA Minimum Energy Performance requirements {LEED_CONTEXT}"
                    ));
                    out.push("EA Optimize Energy Performance requirements thresholds".to_string());
                    out.push(
                        "energy performance prerequisite baseline ASHRAE Appendix G".to_string(),
                    );
                }
                "WE" | "WATER EFFICIENCY" => {
                    out.push(format!("WE water use reduction requirements {LEED_VERSION}"));
                    out.push("WE outdoor water use reduction thresholds".to_string());
                }
                "MR" | "MATERIALS AND RESOURCES" => {
                    out.push("MR building product disclosure requirements".to_string());
                    out.push("MR construction waste management requirements".to_string());
                }
                _ => {}
            }
        }
    }
    out
}

fn term_queries(kw: &Keywords) -> Vec<String> {
    let mut out = Vec::new();
    for term in kw.terms.iter().take(MAX_TERMS) {
        let found = TERM_EXPANSIONS.iter().find(|(t, _)| t == term);
        let Some((_, phrases)) = found else {
            continue;
        };
        for phrase in phrases.iter().take(2) {
            if !kw.has_requirements {
                out.push(format!("{phrase} {LEED_CONTEXT}"));
            } else if !phrase.to_lowercase().contains("requirement") {
                out.push(format!("{phrase} requirements {LEED_VERSION}"));
            }
        }
    }
    out
}

fn section_queries(kw: &Keywords, base: &str) -> Vec<String> {
    let mut out = Vec::new();
    if kw.has_requirements {
        out.push(format!("{base} prerequisite requirements"));
        out.push(format!("{base} credit requirements"));
    }
    if kw.has_thresholds {
        out.push(format!("{base} thresholds points"));
    }
    if kw.has_documentation {
        out.push(format!("{base} documentation submittals"));
    }
    out
}

/// The query as sent to the indices: with LEED context appended unless the
/// user already mentioned LEED.
pub fn contextualize(query: &str) -> String {
    if query.to_lowercase().contains("leed") {
        query.to_string()
    } else {
        format!("{query} {LEED_CONTEXT}")
    }
}

/// Expand `query` into at most `max_subqueries` sub-queries.
///
/// The first entry is always the contextualised original. Duplicates are
/// removed case-insensitively, keeping the first occurrence. When no rule
/// fires the result is just `[query]`.
pub fn expand(query: &str, max_subqueries: usize) -> Vec<String> {
    let base = query.trim();
    if base.is_empty() {
        return vec![base.to_string()];
    }

    let kw = extract_keywords(base);
    let mut generated = credit_queries(&kw, base);
    generated.extend(term_queries(&kw));
    generated.extend(section_queries(&kw, base));
    if generated.is_empty() {
        return vec![base.to_string()];
    }

    let mut seen = HashSet::new();
    std::iter::once(contextualize(base))
        .chain(generated)
        .filter(|q| seen.insert(q.trim().to_lowercase()))
        .take(max_subqueries.max(1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_for_water_requirements() {
        let kw = extract_keywords("water efficiency requirements");
        assert_eq!(kw.categories, vec!["WE", "WATER EFFICIENCY"]);
        assert_eq!(kw.terms, vec!["water", "requirements", "efficiency"]);
        assert!(kw.credit_codes.is_empty());
        assert!(kw.has_requirements);
        assert!(!kw.has_thresholds);
    }

    #[test]
    fn credit_codes_must_be_upper_case_tokens() {
        assert_eq!(extract_keywords("EA-c1 and WE points").credit_codes, vec!["EA", "WE"]);
        assert!(extract_keywords("we need ea data").credit_codes.is_empty());
        assert!(extract_keywords("EA1 WEX").credit_codes.is_empty());
    }

    #[test]
    fn requirement_phrases_are_not_decorated_twice() {
        let kw = extract_keywords("requirements");
        assert!(term_queries(&kw).is_empty(), "both synonyms already mention requirements");
    }
}
