//! Match results and the per-iteration record written to the result sink

use crate::{AlertText, QueryTerm, TermId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A confirmed occurrence of a query term inside an alert
///
/// Equality and hashing cover the `(alert_id, term_id)` pair only, which is
/// what deduplication is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermMatch {
    /// Alert the term was found in
    pub alert_id: String,
    /// Term that was found
    pub term_id: TermId,
}

impl TermMatch {
    /// Create a new match
    pub fn new(alert_id: impl Into<String>, term_id: TermId) -> Self {
        Self {
            alert_id: alert_id.into(),
            term_id,
        }
    }
}

/// Everything one extraction iteration fetched and matched
///
/// One record is appended to the result sink per successful iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRecord {
    /// Run that produced this record
    pub run_id: String,
    /// 1-based iteration number within the run
    pub iteration: u64,
    /// Fetch timestamp of the iteration
    pub created_at: DateTime<Utc>,
    /// Fetched alert batch
    pub alerts: Vec<AlertText>,
    /// Fetched term batch
    pub terms: Vec<QueryTerm>,
    /// Matches found in this iteration
    pub matches: Vec<TermMatch>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_term_match_equality_and_hashing() {
        let m1 = TermMatch::new("alert_1", 1);
        let m2 = TermMatch::new("alert_1", 1);
        let m3 = TermMatch::new("alert_2", 1);
        let m4 = TermMatch::new("alert_1", 2);

        assert_eq!(m1, m2);
        assert_ne!(m1, m3);
        assert_ne!(m1, m4);

        let set: HashSet<_> = [m1, m2].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_record_json_shape() {
        let record = ExtractionRecord {
            run_id: "run-1".to_string(),
            iteration: 1,
            created_at: Utc::now(),
            alerts: vec![AlertText::new("a1", "IG Metall", Some("de"))],
            terms: vec![QueryTerm::new(3, "ig metall", Some("de"))],
            matches: vec![TermMatch::new("a1", 3)],
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["runId"], "run-1");
        assert_eq!(json["matches"][0]["alertId"], "a1");
        assert_eq!(json["matches"][0]["termId"], 3);
        assert!(json["createdAt"].is_string());
    }
}
