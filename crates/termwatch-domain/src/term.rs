//! Query terms - the strings searched for inside alert texts

use serde::{Deserialize, Serialize};

/// Identifier of a query term as assigned by the term feed
pub type TermId = i64;

/// A single query term fetched from the term feed
///
/// `id` is unique within one fetched page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTerm {
    /// Term identifier
    pub id: TermId,

    /// Text to search for
    pub text: String,

    /// Language code of the term (e.g. "en"), if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl QueryTerm {
    /// Create a new query term
    pub fn new(id: TermId, text: impl Into<String>, language: Option<&str>) -> Self {
        Self {
            id,
            text: text.into(),
            language: language.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_ignores_unknown_fields() {
        let json = r#"{"id": 7, "text": "IG Metall", "language": "de", "keepOrder": true}"#;
        let term: QueryTerm = serde_json::from_str(json).unwrap();
        assert_eq!(term, QueryTerm::new(7, "IG Metall", Some("de")));
    }

    #[test]
    fn test_language_is_optional() {
        let term: QueryTerm = serde_json::from_str(r#"{"id": 1, "text": "union"}"#).unwrap();
        assert_eq!(term.language, None);
    }
}
