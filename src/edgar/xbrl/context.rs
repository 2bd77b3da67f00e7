use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodType {
    Instant,
    Duration,
    Unknown,
}

/// One period definition referenced by fact elements via its context id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub period_type: PeriodType,
    pub instant: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Raw period text captured when neither an instant nor an end date
    /// was present, so the record is not silently dropped.
    pub raw: Option<String>,
}

impl Context {
    /// The single date used for period matching: the instant date, the
    /// duration end date, or whatever raw text an unknown period carried.
    pub fn primary_date(&self) -> Option<&str> {
        self.instant
            .as_deref()
            .or(self.end_date.as_deref())
            .or(self.raw.as_deref())
    }
}

/// Classifies a period from whichever sub-element texts a dialect walker
/// found. Returns `None` when there is nothing to keep, which drops the
/// context record entirely.
pub(crate) fn build_context(
    instant: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    raw: Option<String>,
) -> Option<Context> {
    if let Some(date) = instant.filter(|s| !s.is_empty()) {
        return Some(Context {
            period_type: PeriodType::Instant,
            instant: Some(date),
            start_date: None,
            end_date: None,
            raw: None,
        });
    }

    if let Some(end) = end_date.filter(|s| !s.is_empty()) {
        // Some contexts omit startDate; the end date still matters.
        return Some(Context {
            period_type: PeriodType::Duration,
            instant: None,
            start_date: start_date.filter(|s| !s.is_empty()),
            end_date: Some(end),
            raw: None,
        });
    }

    let raw = raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())?;
    Some(Context {
        period_type: PeriodType::Unknown,
        instant: None,
        start_date: None,
        end_date: None,
        raw: Some(raw),
    })
}

/// Context id -> period descriptor for one document. Built once per parse
/// and read-only afterwards. Duplicate ids are last-seen-wins; well-formed
/// documents do not duplicate ids.
#[derive(Debug, Default)]
pub struct ContextIndex {
    contexts: HashMap<String, Context>,
}

impl ContextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: String, context: Context) {
        self.contexts.insert(id, context);
    }

    pub fn get(&self, id: &str) -> Option<&Context> {
        self.contexts.get(id)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
