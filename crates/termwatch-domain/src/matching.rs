//! Matching engine - finds which query terms occur in which alert texts
//!
//! Matching is a case-insensitive substring test performed after lower-casing
//! both sides; no other normalization is applied.
//!
//! # Language filters
//!
//! With [`MatchOptions::language`] set, only alert content pieces and terms
//! whose language equals the filter take part. Content or terms without a
//! language (or with a malformed code) are left out.
//!
//! With [`MatchOptions::by_term_language`] set, each term is matched only
//! against the content pieces written in that term's own language, so a
//! German term is never found in English text. Terms without a valid
//! language code never match in this mode.
//!
//! With neither set every content piece and every term is considered.
//!
//! # Ordered matching
//!
//! With [`MatchOptions::keep_order`] set, the terms are walked per alert in the
//! order supplied, with a cursor that starts at the beginning of the text.
//! A term matches when it occurs at or after the cursor; the first such
//! occurrence is taken and the cursor moves to its end. Consecutive matched
//! terms therefore never overlap. A term that is not found after the cursor is
//! skipped and leaves the cursor where it is. Under `by_term_language` each
//! language's text keeps its own cursor.
//!
//! Without `keep_order` each term is checked on its own against the whole
//! text and the order of the term list is irrelevant.
//!
//! # Examples
//!
//! ```
//! use termwatch_domain::{find_matches, AlertText, MatchOptions, QueryTerm, TermMatch};
//!
//! let alerts = vec![AlertText::new("a1", "the IG Metall union filed a complaint", Some("de"))];
//! let terms = vec![
//!     QueryTerm::new(1, "ig metall", Some("de")),
//!     QueryTerm::new(2, "union", Some("de")),
//! ];
//!
//! let matches = find_matches(&alerts, &terms, &MatchOptions::default());
//! assert_eq!(matches, vec![TermMatch::new("a1", 1), TermMatch::new("a1", 2)]);
//!
//! // Per-term language: an English term is not looked for in German text
//! let terms = vec![QueryTerm::new(3, "union", Some("en"))];
//! let options = MatchOptions::default().with_term_language();
//! assert!(find_matches(&alerts, &terms, &options).is_empty());
//! ```

use crate::language;
use crate::{AlertText, QueryTerm, TermId, TermMatch};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Options controlling a matching pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOptions {
    /// Require matched terms to appear in the text in term-list order
    #[serde(default)]
    pub keep_order: bool,

    /// Restrict matching to alert content and terms in this language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Match each term only against content in the term's own language
    #[serde(default)]
    pub by_term_language: bool,
}

impl MatchOptions {
    /// Options with ordered matching switched on
    pub fn ordered() -> Self {
        Self {
            keep_order: true,
            ..Self::default()
        }
    }

    /// Set the language filter
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Match each term against content in its own language only
    pub fn with_term_language(mut self) -> Self {
        self.by_term_language = true;
        self
    }
}

/// A term prepared for one pass
struct Needle<'a> {
    id: TermId,
    text: String,
    /// Language the term is confined to under `by_term_language`
    scope: Option<&'a str>,
}

/// Lower-cased text of one alert for one scope, plus the ordered-mode cursor
struct Haystack {
    text: Option<String>,
    cursor: usize,
}

/// Find every `(alert, term)` pair where the term occurs in the alert text
///
/// The result is deduplicated on the `(alert id, term id)` pair and keeps the
/// order in which pairs were first found: alerts in input order, and for each
/// alert the terms in input order. Empty inputs give an empty result.
pub fn find_matches(
    alerts: &[AlertText],
    terms: &[QueryTerm],
    options: &MatchOptions,
) -> Vec<TermMatch> {
    let needles = prepare_terms(terms, options);
    if needles.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut matches = Vec::new();

    for alert in alerts {
        for term_id in alert_hits(alert, &needles, options) {
            let found = TermMatch::new(alert.id.as_str(), term_id);
            if seen.insert(found.clone()) {
                matches.push(found);
            }
        }
    }

    matches
}

/// Terms in scope for this pass, in input order
fn prepare_terms<'a>(terms: &'a [QueryTerm], options: &MatchOptions) -> Vec<Needle<'a>> {
    terms
        .iter()
        .filter(|term| !term.text.trim().is_empty())
        .filter(|term| match options.language.as_deref() {
            Some(filter) => language::matches_filter(term.language.as_deref(), filter),
            None => true,
        })
        .filter_map(|term| {
            let scope = if options.by_term_language {
                Some(term.language.as_deref().filter(|code| language::is_valid(code))?)
            } else {
                None
            };
            Some(Needle {
                id: term.id,
                text: term.text.to_lowercase(),
                scope,
            })
        })
        .collect()
}

/// Term ids found in one alert, in term order
fn alert_hits(
    alert: &AlertText,
    needles: &[Needle<'_>],
    options: &MatchOptions,
) -> Vec<TermId> {
    let mut haystacks: HashMap<Option<String>, Haystack> = HashMap::new();
    let mut hits = Vec::new();

    for needle in needles {
        let key = needle.scope.map(str::to_ascii_lowercase);
        let haystack = haystacks.entry(key).or_insert_with(|| Haystack {
            text: relevant_text(alert, options, needle.scope).map(|text| text.to_lowercase()),
            cursor: 0,
        });
        let Some(text) = haystack.text.as_deref() else {
            continue;
        };

        if options.keep_order {
            // cursor always sits on the end of a previous match, a char boundary
            if let Some(offset) = text[haystack.cursor..].find(needle.text.as_str()) {
                hits.push(needle.id);
                haystack.cursor += offset + needle.text.len();
            }
        } else if text.contains(needle.text.as_str()) {
            hits.push(needle.id);
        }
    }

    hits
}

/// The alert text taking part for `scope`, or `None` if nothing is left
fn relevant_text(
    alert: &AlertText,
    options: &MatchOptions,
    scope: Option<&str>,
) -> Option<String> {
    let pieces: Vec<&str> = alert
        .contents
        .iter()
        .filter(|content| match options.language.as_deref() {
            Some(filter) => language::matches_filter(content.language.as_deref(), filter),
            None => true,
        })
        .filter(|content| match scope {
            Some(code) => language::matches_filter(content.language.as_deref(), code),
            None => true,
        })
        .map(|content| content.text.as_str())
        .collect();

    if pieces.is_empty() {
        None
    } else {
        Some(pieces.join(" "))
    }
}
