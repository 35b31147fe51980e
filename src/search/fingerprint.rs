//! Canonical cache keys for search filters

use super::filters::{format_number, normalize_text, SearchFilters};

const PREFIX: &str = "search?";

/// Build the cache key for a filter set.
///
/// Absent, empty and default values are dropped, the remaining keys are
/// sorted, and numbers are rendered canonically. Logically equal filter sets
/// always produce the same key; the empty filter set maps to `"search?"`.
pub fn fingerprint(filters: &SearchFilters) -> String {
    let mut pairs: Vec<(&'static str, String)> = Vec::with_capacity(6);

    if let Some(q) = filters.query.as_deref().map(normalize_text) {
        if !q.is_empty() {
            pairs.push(("q", q));
        }
    }
    if let Some(loc) = filters.location_id.as_deref().map(str::trim) {
        if !loc.is_empty() {
            pairs.push(("location", loc.to_string()));
        }
    }
    if let Some(bhk) = filters.bhk {
        pairs.push(("bhk", bhk.to_string()));
    }
    if let Some(min) = filters.min_price.filter(|n| n.is_finite() && *n > 0.0) {
        pairs.push(("minPrice", format_number(min)));
    }
    if let Some(max) = filters.max_price.filter(|n| n.is_finite()) {
        pairs.push(("maxPrice", format_number(max)));
    }
    if let Some(limit) = filters.limit {
        pairs.push(("limit", limit.to_string()));
    }

    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let body = pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", escape(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{PREFIX}{body}")
}

/// Human-readable form of a fingerprint for analytics output.
pub fn describe(fingerprint: &str) -> &str {
    fingerprint.strip_prefix(PREFIX).unwrap_or(fingerprint)
}

fn escape(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    for c in v.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            c => out.push(c),
        }
    }
    out
}
