use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::context::{Context, PeriodType};
use super::document::{canonical_tag, XbrlDocument};
use super::value;
use crate::aliases::AliasMap;
use crate::edgar::filing::Filing;

/// Metrics that represent point-in-time balances and therefore prefer
/// `instant` contexts; everything else prefers `duration`.
const INSTANT_METRICS: &[&str] = &["Assets", "Liabilities"];

/// A candidate value for one metric, tied to the context it was tagged
/// with. Consumed by period selection within the same extraction call.
#[derive(Clone, Debug)]
pub struct RawFact {
    pub metric: String,
    pub value: f64,
    pub decimals: String,
    pub period_type: PeriodType,
    pub primary_date: Option<String>,
    pub period: Context,
    pub context_ref: String,
}

/// The persisted output shape for one metric of one filing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub cik: String,
    pub metric: String,
    pub value: f64,
    pub period_end_date: NaiveDate,
    pub fiscal_year: i32,
    pub fiscal_quarter: u32,
    pub form_type: String,
    pub filing_date: NaiveDate,
}

/// Finds every element tagged with a known alias and an indexed context
/// and turns it into a raw candidate fact. Non-numeric values are skipped
/// with a diagnostic; filers tag prose blocks with these names too.
pub fn extract_raw_facts(document: &XbrlDocument, aliases: &AliasMap) -> Vec<RawFact> {
    let mut raw_facts = Vec::new();

    for (metric, tags) in aliases {
        let wanted: HashSet<String> = tags
            .iter()
            .map(|tag| canonical_tag(tag).to_string())
            .collect();

        for (element, context) in document.matching_elements(&wanted) {
            let text = match element.text.as_deref() {
                Some(text) => text,
                None => continue,
            };

            let numeric = match value::normalize(text) {
                Some(numeric) => numeric,
                None => {
                    debug!("Skipping {}: non-numeric value '{}'", metric, text);
                    continue;
                }
            };

            let scaled = value::apply_decimals(
                numeric.as_f64(),
                element.decimals.as_deref(),
                document.dialect(),
            );

            raw_facts.push(RawFact {
                metric: metric.clone(),
                value: scaled,
                decimals: element
                    .decimals
                    .clone()
                    .unwrap_or_else(|| "INF".to_string()),
                period_type: context.period_type,
                primary_date: context.primary_date().map(str::to_string),
                period: context.clone(),
                context_ref: element.context_ref.clone(),
            });
        }
    }

    raw_facts
}

fn prefers_instant(metric: &str) -> bool {
    INSTANT_METRICS.contains(&metric)
}

/// Lower is better: absolute day distance from the filing's report date,
/// minus 0.5 for non-instant periods so a duration wins a date-distance
/// tie against an instant. Missing or unparsable dates sort last.
fn period_score(fact: &RawFact, report_date: NaiveDate) -> f64 {
    let date_str = match fact.primary_date.as_deref() {
        Some(date_str) => date_str,
        None => return f64::INFINITY,
    };
    let date = match NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => return f64::INFINITY,
    };

    let distance = (date - report_date).num_days().abs() as f64;
    match fact.period_type {
        PeriodType::Instant => distance,
        _ => distance - 0.5,
    }
}

/// Reduces raw candidates to at most one fact per standard metric,
/// preferring each metric's period type and the period closest to the
/// filing's report date. Ties keep the first-seen candidate.
pub fn select_facts(raw_facts: Vec<RawFact>, filing: &Filing) -> Vec<Fact> {
    let mut metric_order: Vec<String> = Vec::new();
    let mut by_metric: HashMap<String, Vec<RawFact>> = HashMap::new();
    for fact in raw_facts {
        if !by_metric.contains_key(&fact.metric) {
            metric_order.push(fact.metric.clone());
        }
        by_metric.entry(fact.metric.clone()).or_default().push(fact);
    }

    let mut selected = Vec::new();
    for metric in metric_order {
        let facts = match by_metric.remove(&metric) {
            Some(facts) => facts,
            None => continue,
        };

        let preferred_type = if prefers_instant(&metric) {
            PeriodType::Instant
        } else {
            PeriodType::Duration
        };
        let preferred: Vec<&RawFact> = facts
            .iter()
            .filter(|f| f.period_type == preferred_type)
            .collect();
        let candidates = if preferred.is_empty() {
            facts.iter().collect()
        } else {
            preferred
        };

        let mut best: Option<(&RawFact, f64)> = None;
        for candidate in candidates {
            let score = period_score(candidate, filing.report_date);
            match best {
                Some((_, best_score)) if score >= best_score => {}
                _ => best = Some((candidate, score)),
            }
        }

        if let Some((fact, _)) = best {
            selected.push(to_fact(fact, filing));
        }
    }

    selected
}

fn to_fact(raw: &RawFact, filing: &Filing) -> Fact {
    let period_end = raw
        .primary_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
        .unwrap_or(filing.report_date);

    Fact {
        cik: filing.cik.clone(),
        metric: raw.metric.clone(),
        value: raw.value,
        period_end_date: period_end,
        fiscal_year: period_end.year(),
        fiscal_quarter: (period_end.month() - 1) / 3 + 1,
        form_type: filing.form_type.to_string(),
        filing_date: filing.filing_date,
    }
}
