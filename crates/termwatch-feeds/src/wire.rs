//! Upstream payload shapes and their conversion into domain types
//!
//! Both feeds answer with a bare JSON array. Records are decoded one by one so
//! that the error names the offending index.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use termwatch_domain::{AlertContent, AlertText, QueryTerm, SourceError, TermId};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAlert {
    id: String,
    contents: Vec<WireContent>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    input_type: Option<String>,
}

#[derive(Deserialize)]
struct WireContent {
    text: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Deserialize)]
struct WireTerm {
    id: TermId,
    text: String,
    #[serde(default)]
    language: Option<String>,
}

/// Decode an alert feed response body
pub fn decode_alerts(body: Value) -> Result<Vec<AlertText>, SourceError> {
    decode_array(body, "alert")?
        .into_iter()
        .enumerate()
        .map(|(index, wire)| alert_from_wire(index, wire))
        .collect()
}

/// Decode a term feed response body
pub fn decode_terms(body: Value) -> Result<Vec<QueryTerm>, SourceError> {
    Ok(decode_array::<WireTerm>(body, "term")?
        .into_iter()
        .map(|wire| QueryTerm {
            id: wire.id,
            text: wire.text,
            language: wire.language,
        })
        .collect())
}

fn decode_array<T: serde::de::DeserializeOwned>(
    body: Value,
    what: &str,
) -> Result<Vec<T>, SourceError> {
    let Value::Array(items) = body else {
        return Err(SourceError::Decode(format!(
            "{} feed response is not a list",
            what
        )));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item)
                .map_err(|e| SourceError::Decode(format!("{} #{}: {}", what, index, e)))
        })
        .collect()
}

fn alert_from_wire(index: usize, wire: WireAlert) -> Result<AlertText, SourceError> {
    let date = match wire.date.as_deref() {
        Some(raw) => Some(parse_date(raw).ok_or_else(|| {
            SourceError::Decode(format!("alert #{}: unrecognised date {:?}", index, raw))
        })?),
        None => None,
    };

    Ok(AlertText {
        id: wire.id,
        contents: wire
            .contents
            .into_iter()
            .map(|c| AlertContent {
                text: c.text,
                kind: c.kind,
                language: c.language,
            })
            .collect(),
        date,
        input_type: wire.input_type,
    })
}

/// Parse an RFC 3339 timestamp, treating timestamps without offset as UTC
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
