//! Alert texts - the messages query terms are searched in

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One piece of an alert's content (title, snippet, body, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertContent {
    /// The text of this piece
    pub text: String,

    /// Kind of content as labelled by the feed (e.g. "title", "snippet")
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Language code of the text (e.g. "en", "de"), if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl AlertContent {
    /// Create a content piece without a kind label
    pub fn new(text: impl Into<String>, language: Option<&str>) -> Self {
        Self {
            text: text.into(),
            kind: None,
            language: language.map(str::to_string),
        }
    }
}

/// A single alert fetched from the alert feed
///
/// `id` is unique within one fetched page.
///
/// # Examples
///
/// ```
/// use termwatch_domain::AlertText;
///
/// let alert = AlertText::new("a1", "The IG Metall union filed a complaint", Some("en"));
/// assert_eq!(alert.contents.len(), 1);
/// assert_eq!(alert.full_text(), "The IG Metall union filed a complaint");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertText {
    /// Alert identifier
    pub id: String,

    /// Content pieces making up the alert
    #[serde(default)]
    pub contents: Vec<AlertContent>,

    /// When the alert was issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,

    /// Source or type of the alert input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
}

impl AlertText {
    /// Create an alert consisting of a single text with an optional language
    pub fn new(id: impl Into<String>, text: impl Into<String>, language: Option<&str>) -> Self {
        Self {
            id: id.into(),
            contents: vec![AlertContent::new(text, language)],
            date: None,
            input_type: None,
        }
    }

    /// Create an alert from several content pieces
    pub fn with_contents(id: impl Into<String>, contents: Vec<AlertContent>) -> Self {
        Self {
            id: id.into(),
            contents,
            date: None,
            input_type: None,
        }
    }

    /// All content texts joined with a single space
    pub fn full_text(&self) -> String {
        self.contents
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_text_alert() {
        let alert = AlertText::new("a1", "hello world", None);
        assert_eq!(alert.id, "a1");
        assert_eq!(alert.contents[0].language, None);
        assert_eq!(alert.full_text(), "hello world");
    }

    #[test]
    fn test_full_text_joins_contents() {
        let alert = AlertText::with_contents(
            "a2",
            vec![
                AlertContent::new("Supply chain disruption", Some("en")),
                AlertContent::new("affects all sectors", Some("en")),
            ],
        );
        assert_eq!(alert.full_text(), "Supply chain disruption affects all sectors");
    }

    #[test]
    fn test_serializes_wire_names() {
        let mut alert = AlertText::new("a3", "text", Some("de"));
        alert.contents[0].kind = Some("title".to_string());
        alert.input_type = Some("news".to_string());

        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["inputType"], "news");
        assert_eq!(json["contents"][0]["type"], "title");
        assert_eq!(json["contents"][0]["language"], "de");
        assert!(json.get("date").is_none());
    }
}
