//! Search filter input and boundary validation

use crate::catalog::PropertyCandidate;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};

const MAX_QUERY_CHARS: usize = 200;
const MAX_LOCATION_CHARS: usize = 64;
const MAX_BHK: u32 = 20;

/// A filter value as it arrives over the wire. Query strings always carry
/// text, JSON bodies may carry either form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Text(String),
}

impl FilterValue {
    fn as_text(&self) -> Option<String> {
        match self {
            FilterValue::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            FilterValue::Number(n) if n.is_finite() => Some(format_number(*n)),
            FilterValue::Number(_) => None,
        }
    }

    fn as_number(&self, field: &str) -> Result<Option<f64>, EngineError> {
        let n = match self {
            FilterValue::Number(n) => *n,
            FilterValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                s.parse::<f64>().map_err(|_| {
                    EngineError::InvalidInput(format!("{field} must be a number, got '{s}'"))
                })?
            }
        };
        if !n.is_finite() {
            return Err(EngineError::InvalidInput(format!("{field} must be finite")));
        }
        Ok(Some(n))
    }

    fn as_whole(&self, field: &str) -> Result<Option<u64>, EngineError> {
        match self.as_number(field)? {
            None => Ok(None),
            Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(Some(n as u64)),
            Some(n) => Err(EngineError::InvalidInput(format!(
                "{field} must be a non-negative integer, got {n}"
            ))),
        }
    }
}

/// Filters exactly as received, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSearchFilters {
    #[serde(default, alias = "q", alias = "text")]
    pub query: Option<FilterValue>,
    #[serde(default, alias = "location", alias = "location_id")]
    pub location_id: Option<FilterValue>,
    #[serde(default, alias = "bedrooms")]
    pub bhk: Option<FilterValue>,
    #[serde(default, alias = "min_price")]
    pub min_price: Option<FilterValue>,
    #[serde(default, alias = "max_price")]
    pub max_price: Option<FilterValue>,
    #[serde(default)]
    pub limit: Option<FilterValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterLimits {
    pub default_limit: usize,
    pub max_limit: usize,
}

/// Validated, canonical search filters. Every field is optional; `None`
/// means "not constrained" (or, for `limit`, "use the default").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub query: Option<String>,
    pub location_id: Option<String>,
    pub bhk: Option<u32>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub limit: Option<usize>,
}

impl RawSearchFilters {
    pub fn validate(&self, limits: FilterLimits) -> Result<SearchFilters, EngineError> {
        let query = match self.query.as_ref().and_then(FilterValue::as_text) {
            Some(q) => {
                let q = normalize_text(&q);
                if q.chars().count() > MAX_QUERY_CHARS {
                    return Err(EngineError::InvalidInput(format!(
                        "query must be at most {MAX_QUERY_CHARS} characters"
                    )));
                }
                Some(q)
            }
            None => None,
        };

        let location_id = match self.location_id.as_ref().and_then(FilterValue::as_text) {
            Some(l) if l.chars().count() > MAX_LOCATION_CHARS => {
                return Err(EngineError::InvalidInput(format!(
                    "location must be at most {MAX_LOCATION_CHARS} characters"
                )));
            }
            other => other,
        };

        let bhk = match self.bhk.as_ref() {
            Some(v) => match v.as_whole("bhk")? {
                Some(n) if n > MAX_BHK as u64 => {
                    return Err(EngineError::InvalidInput(format!(
                        "bhk must be at most {MAX_BHK}"
                    )));
                }
                other => other.map(|n| n as u32),
            },
            None => None,
        };

        let min_price = match self.min_price.as_ref() {
            Some(v) => match v.as_number("minPrice")? {
                Some(n) if n < 0.0 => {
                    return Err(EngineError::InvalidInput(
                        "minPrice must not be negative".to_string(),
                    ));
                }
                // A zero lower bound constrains nothing.
                Some(n) if n == 0.0 => None,
                other => other,
            },
            None => None,
        };

        let max_price = match self.max_price.as_ref() {
            Some(v) => match v.as_number("maxPrice")? {
                Some(n) if n <= 0.0 => {
                    return Err(EngineError::InvalidInput(
                        "maxPrice must be positive".to_string(),
                    ));
                }
                other => other,
            },
            None => None,
        };

        if let (Some(lo), Some(hi)) = (min_price, max_price) {
            if lo > hi {
                return Err(EngineError::InvalidInput(
                    "minPrice must not exceed maxPrice".to_string(),
                ));
            }
        }

        let limit = match self.limit.as_ref() {
            Some(v) => match v.as_whole("limit")? {
                Some(0) => {
                    return Err(EngineError::InvalidInput("limit must be positive".to_string()));
                }
                Some(n) if n as usize > limits.max_limit => {
                    return Err(EngineError::InvalidInput(format!(
                        "limit must be at most {}",
                        limits.max_limit
                    )));
                }
                Some(n) if n as usize == limits.default_limit => None,
                other => other.map(|n| n as usize),
            },
            None => None,
        };

        Ok(SearchFilters {
            query,
            location_id,
            bhk,
            min_price,
            max_price,
            limit,
        })
    }
}

impl SearchFilters {
    pub fn effective_limit(&self, default_limit: usize) -> usize {
        self.limit.unwrap_or(default_limit)
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_none()
            && self.location_id.is_none()
            && self.bhk.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
    }

    /// In-process evaluation of the filters against one listing.
    pub fn matches(&self, p: &PropertyCandidate) -> bool {
        if let Some(q) = &self.query {
            let q = q.to_lowercase();
            if !p.title.to_lowercase().contains(&q) && !p.id.to_lowercase().contains(&q) {
                return false;
            }
        }
        if let Some(loc) = &self.location_id {
            if &p.location_id != loc {
                return false;
            }
        }
        if let Some(bhk) = self.bhk {
            if p.bedrooms != bhk {
                return false;
            }
        }
        if let Some(lo) = self.min_price {
            if p.price < lo {
                return false;
            }
        }
        if let Some(hi) = self.max_price {
            if p.price > hi {
                return false;
            }
        }
        true
    }
}

/// Lowercase and collapse internal whitespace.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Integral values print without a fractional part so that `2`, `2.0` and
/// `"2"` all render the same.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const LIMITS: FilterLimits = FilterLimits {
        default_limit: 20,
        max_limit: 100,
    };

    fn raw(json: serde_json::Value) -> RawSearchFilters {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn numeric_strings_normalize_to_numbers() {
        let a = raw(serde_json::json!({"bhk": "2", "minPrice": "1500000", "maxPrice": 2e6}))
            .validate(LIMITS)
            .unwrap();
        let b = raw(serde_json::json!({"bhk": 2, "minPrice": 1500000, "maxPrice": "2000000"}))
            .validate(LIMITS)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.bhk, Some(2));
        assert_eq!(a.max_price, Some(2_000_000.0));
    }

    #[test]
    fn aliases_are_accepted() {
        let f = raw(serde_json::json!({"q": "  Sea   View ", "location": "L1", "bedrooms": 3}))
            .validate(LIMITS)
            .unwrap();
        assert_eq!(f.query.as_deref(), Some("sea view"));
        assert_eq!(f.location_id.as_deref(), Some("L1"));
        assert_eq!(f.bhk, Some(3));
    }

    #[test]
    fn empty_and_default_values_are_dropped() {
        let f = raw(serde_json::json!({"q": "   ", "location": "", "minPrice": 0, "limit": 20}))
            .validate(LIMITS)
            .unwrap();
        assert_eq!(f, SearchFilters::default());
        assert!(f.is_empty());
    }

    #[test_case(serde_json::json!({"bhk": "two"}); "non numeric bhk")]
    #[test_case(serde_json::json!({"bhk": 2.5}); "fractional bhk")]
    #[test_case(serde_json::json!({"bhk": 99}); "bhk too large")]
    #[test_case(serde_json::json!({"minPrice": -1}); "negative min price")]
    #[test_case(serde_json::json!({"maxPrice": 0}); "zero max price")]
    #[test_case(serde_json::json!({"minPrice": 10, "maxPrice": 5}); "inverted price range")]
    #[test_case(serde_json::json!({"limit": 0}); "zero limit")]
    #[test_case(serde_json::json!({"limit": 1000}); "limit above max")]
    fn invalid_filters_are_rejected(value: serde_json::Value) {
        let err = raw(value).validate(LIMITS).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn matches_applies_every_constraint() {
        let p = PropertyCandidate {
            id: "P1".to_string(),
            title: "Sunny Sea View Flat".to_string(),
            price: 150.0,
            area: 900.0,
            bedrooms: 2,
            property_type: "apartment".to_string(),
            location_id: "L1".to_string(),
            category_ids: Default::default(),
        };
        let mut f = SearchFilters {
            query: Some("sea view".to_string()),
            location_id: Some("L1".to_string()),
            bhk: Some(2),
            min_price: Some(100.0),
            max_price: Some(200.0),
            limit: None,
        };
        assert!(f.matches(&p));
        f.max_price = Some(120.0);
        assert!(!f.matches(&p));
    }

    #[test_case(2.0, "2")]
    #[test_case(2.5, "2.5")]
    #[test_case(-3.0, "-3")]
    fn format_number_drops_integral_fraction(n: f64, expected: &str) {
        assert_eq!(format_number(n), expected);
    }
}
