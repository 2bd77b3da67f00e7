use anyhow::{anyhow, Result};
use log::{debug, warn};
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::{BTreeMap, HashMap};
use url::Url;

use super::filing::Filing;
use super::utils::fetch_text;
use crate::config::Config;

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Presentation labels containing these terms mark structural, non-leaf
/// nodes (schedules, detail tables, policy text blocks); matches against
/// them are deprioritized but not excluded.
const BOILERPLATE_TERMS: &[&str] = &["schedule", "table", "text block", "details"];

/// Label and presentation linkbase file names harvested from a filing's
/// index page.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TaxonomyFiles {
    pub label: Option<String>,
    pub presentation: Option<String>,
}

/// Ranking key for a label/metric match. Lower sorts better; shorter
/// labels win among equal ranks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatchScore {
    pub rank: u32,
    pub label_len: usize,
}

/// Harvests the label (`_lab.xml`) and presentation (`_pre.xml`) linkbase
/// file names from a filing index page.
pub fn taxonomy_links(index_html: &str) -> TaxonomyFiles {
    let anchor = Selector::parse("a[href]").expect("anchor selector");
    let page = Html::parse_document(index_html);

    let mut files = TaxonomyFiles::default();
    for link in page.select(&anchor) {
        let href = match link.value().attr("href") {
            Some(href) => href.trim(),
            None => continue,
        };
        if href.is_empty() {
            continue;
        }

        let filename = href.rsplit('/').next().unwrap_or(href).to_string();
        let lower = href.to_lowercase();
        if lower.ends_with("_lab.xml") {
            files.label = Some(filename);
        } else if lower.ends_with("_pre.xml") {
            files.presentation = Some(filename);
        }
    }
    files
}

fn strip_suffix_ci<'a>(value: &'a str, suffix: &str) -> &'a str {
    let split = value.len().saturating_sub(suffix.len());
    if value.len() >= suffix.len()
        && value.is_char_boundary(split)
        && value[split..].eq_ignore_ascii_case(suffix)
    {
        &value[..split]
    } else {
        value
    }
}

/// Builds tag name -> human-readable label from a label linkbase. The
/// `_lbl` suffix on xlink labels is stripped; first occurrence wins.
pub fn build_label_map(label_xml: &str) -> Result<HashMap<String, String>> {
    let tree = roxmltree::Document::parse(label_xml)
        .map_err(|e| anyhow!("Failed to parse label linkbase: {}", e))?;

    let mut labels = HashMap::new();
    for node in tree
        .root_element()
        .descendants()
        .filter(|n| n.has_tag_name("label"))
    {
        let tag_name = match node.attribute((XLINK_NS, "label")) {
            Some(tag_name) => tag_name,
            None => continue,
        };
        let text = node.text().map(str::trim).unwrap_or("");
        if text.is_empty() {
            continue;
        }

        let key = strip_suffix_ci(tag_name, "_lbl");
        labels
            .entry(key.to_string())
            .or_insert_with(|| text.to_string());
    }
    Ok(labels)
}

fn word_match(term: &str, label: &str) -> bool {
    Regex::new(&format!(r"\b{}\b", regex::escape(term)))
        .map(|re| re.is_match(label))
        .unwrap_or(false)
}

fn singular_word_match(metric: &str, label: &str) -> bool {
    if let Some(stem) = metric.strip_suffix('s') {
        if word_match(stem, label) {
            return true;
        }
    }
    if let Some(stem) = metric.strip_suffix("es") {
        if word_match(stem, label) {
            return true;
        }
    }
    false
}

/// Scores how well a human-readable label matches a standard metric name.
/// Exact equality ranks 0, a word-boundary hit 1, a singular-form hit 2;
/// boilerplate wording adds a penalty of 2. Returns `None` when there is
/// no reasonable match.
pub fn score_label(metric: &str, label: &str) -> Option<MatchScore> {
    let metric_lower = metric.to_lowercase();
    let label_lower = label.to_lowercase();

    let base = if label_lower == metric_lower {
        0
    } else if word_match(&metric_lower, &label_lower) {
        1
    } else if singular_word_match(&metric_lower, &label_lower) {
        2
    } else {
        return None;
    };

    let penalty = if BOILERPLATE_TERMS
        .iter()
        .any(|term| label_lower.contains(term))
    {
        2
    } else {
        0
    };

    Some(MatchScore {
        rank: base + penalty,
        label_len: label_lower.len(),
    })
}

/// Walks presentation locators, resolves each to its human label, and
/// keeps the best-scoring tag name per missing metric. Metrics with no
/// matching locator are simply absent from the result.
pub fn match_missing_metrics(
    presentation_xml: &str,
    labels: &HashMap<String, String>,
    missing_metrics: &[String],
) -> Result<BTreeMap<String, String>> {
    let tree = roxmltree::Document::parse(presentation_xml)
        .map_err(|e| anyhow!("Failed to parse presentation linkbase: {}", e))?;

    let mut best_scores: HashMap<String, MatchScore> = HashMap::new();
    let mut discovered: BTreeMap<String, String> = BTreeMap::new();

    for node in tree
        .root_element()
        .descendants()
        .filter(|n| n.has_tag_name("loc"))
    {
        let raw_tag = match node.attribute((XLINK_NS, "label")) {
            Some(raw_tag) => raw_tag,
            None => continue,
        };
        let tag = strip_suffix_ci(raw_tag, "_loc");

        let label = match labels.get(tag) {
            Some(label) => label,
            None => continue,
        };

        for metric in missing_metrics {
            let score = match score_label(metric, label) {
                Some(score) => score,
                None => continue,
            };

            let better = best_scores
                .get(metric)
                .map_or(true, |current| score < *current);
            if better {
                debug!(
                    "Candidate alias {} -> {} (rank {}, label '{}')",
                    metric, tag, score.rank, label
                );
                best_scores.insert(metric.clone(), score);
                discovered.insert(metric.clone(), tag.to_string());
            }
        }
    }

    Ok(discovered)
}

/// Inspects a filing's taxonomy to propose tag aliases for the metrics
/// that produced no facts. Missing linkbases or unusable content yield an
/// empty result, never an error; the caller keeps the document unmatched.
pub async fn discover_aliases(
    client: &Client,
    config: &Config,
    filing: &Filing,
    missing_metrics: &[String],
) -> Result<BTreeMap<String, String>> {
    if missing_metrics.is_empty() {
        return Ok(BTreeMap::new());
    }

    let index_url = Url::parse(&filing.index_page_url())?;
    let index_html = fetch_text(client, &index_url, &config.user_agent).await?;
    let files = taxonomy_links(&index_html);

    let (label_file, presentation_file) = match (files.label, files.presentation) {
        (Some(label), Some(presentation)) => (label, presentation),
        _ => {
            warn!(
                "Missing taxonomy files for {}; cannot discover aliases",
                filing.accession_number
            );
            return Ok(BTreeMap::new());
        }
    };

    let base = filing.archive_base();
    let label_url = Url::parse(&format!("{}/{}", base, label_file))?;
    let label_xml = fetch_text(client, &label_url, &config.user_agent).await?;
    let labels = match build_label_map(&label_xml) {
        Ok(labels) if !labels.is_empty() => labels,
        Ok(_) => {
            warn!("Label linkbase for {} is empty", filing.accession_number);
            return Ok(BTreeMap::new());
        }
        Err(e) => {
            warn!("{:#}", e);
            return Ok(BTreeMap::new());
        }
    };

    let presentation_url = Url::parse(&format!("{}/{}", base, presentation_file))?;
    let presentation_xml = fetch_text(client, &presentation_url, &config.user_agent).await?;
    match match_missing_metrics(&presentation_xml, &labels, missing_metrics) {
        Ok(discovered) => Ok(discovered),
        Err(e) => {
            warn!("{:#}", e);
            Ok(BTreeMap::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const LABEL_FIXTURE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<linkbase xmlns="http://www.xbrl.org/2003/linkbase"
          xmlns:xlink="http://www.w3.org/1999/xlink">
  <labelLink>
    <label xlink:type="resource" xlink:label="us-gaap_SalesRevenueNet_lbl">Total Revenues</label>
    <label xlink:type="resource" xlink:label="us-gaap_SalesRevenueNet_lbl">Duplicate Ignored</label>
    <label xlink:type="resource" xlink:label="us-gaap_RevenueNote_lbl">Revenue Recognition Policy [Text Block]</label>
    <label xlink:type="resource" xlink:label="us-gaap_Assets_lbl">Total assets</label>
    <label xlink:type="resource" xlink:label="empty_lbl">   </label>
  </labelLink>
</linkbase>"#;

    pub(crate) const PRESENTATION_FIXTURE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<linkbase xmlns="http://www.xbrl.org/2003/linkbase"
          xmlns:xlink="http://www.w3.org/1999/xlink">
  <presentationLink>
    <loc xlink:type="locator" xlink:label="us-gaap_RevenueNote_loc" xlink:href="us-gaap.xsd#us-gaap_RevenueNote"/>
    <loc xlink:type="locator" xlink:label="us-gaap_SalesRevenueNet_loc" xlink:href="us-gaap.xsd#us-gaap_SalesRevenueNet"/>
    <loc xlink:type="locator" xlink:label="us-gaap_Assets_loc" xlink:href="us-gaap.xsd#us-gaap_Assets"/>
    <loc xlink:type="locator" xlink:label="us-gaap_Unlabeled_loc" xlink:href="us-gaap.xsd#us-gaap_Unlabeled"/>
  </presentationLink>
</linkbase>"#;

    const INDEX_FIXTURE: &str = r#"<html><body>
<table class="tableFile">
  <tr><td><a href="/Archives/edgar/data/320193/000032019325000073/aapl-20241231.htm">aapl-20241231.htm</a></td></tr>
  <tr><td><a href="/Archives/edgar/data/320193/000032019325000073/aapl-20241231_lab.xml">aapl-20241231_lab.xml</a></td></tr>
  <tr><td><a href="/Archives/edgar/data/320193/000032019325000073/aapl-20241231_pre.xml">aapl-20241231_pre.xml</a></td></tr>
  <tr><td><a href="/Archives/edgar/data/320193/000032019325000073/aapl-20241231_cal.xml">aapl-20241231_cal.xml</a></td></tr>
</table>
</body></html>"#;

    #[test]
    fn test_taxonomy_links() {
        let files = taxonomy_links(INDEX_FIXTURE);
        assert_eq!(files.label.as_deref(), Some("aapl-20241231_lab.xml"));
        assert_eq!(
            files.presentation.as_deref(),
            Some("aapl-20241231_pre.xml")
        );
    }

    #[test]
    fn test_taxonomy_links_absent() {
        let files = taxonomy_links("<html><body><a href=\"report.htm\">doc</a></body></html>");
        assert_eq!(files, TaxonomyFiles::default());
    }

    #[test]
    fn test_build_label_map() {
        let labels = build_label_map(LABEL_FIXTURE).unwrap();
        // First occurrence wins, the empty label is dropped.
        assert_eq!(
            labels.get("us-gaap_SalesRevenueNet").map(String::as_str),
            Some("Total Revenues")
        );
        assert_eq!(
            labels.get("us-gaap_Assets").map(String::as_str),
            Some("Total assets")
        );
        assert!(!labels.contains_key("empty"));
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn test_score_label_ranks() {
        assert_eq!(
            score_label("Revenues", "revenues"),
            Some(MatchScore { rank: 0, label_len: 8 })
        );
        assert_eq!(score_label("Revenues", "Total Revenues").unwrap().rank, 1);
        // Singular form matches at a worse rank.
        assert_eq!(score_label("Revenues", "Deferred Revenue").unwrap().rank, 2);
        assert_eq!(score_label("Revenues", "Cost of Goods Sold"), None);
        // Word-boundary, not substring: "Revenuestream" does not match.
        assert_eq!(score_label("Revenues", "Revenuestream"), None);
    }

    #[test]
    fn test_boilerplate_labels_are_penalized() {
        let clean = score_label("Revenues", "Total Revenues").unwrap();
        let boilerplate = score_label("Revenues", "Revenue Recognition Policy [Text Block]").unwrap();
        assert!(clean < boilerplate);
        assert_eq!(boilerplate.rank, 4);
    }

    #[test]
    fn test_shorter_label_wins_equal_rank() {
        let short = score_label("Revenues", "Net Revenues").unwrap();
        let long = score_label("Revenues", "Net Revenues From External Customers").unwrap();
        assert_eq!(short.rank, long.rank);
        assert!(short < long);
    }

    #[test]
    fn test_match_missing_metrics() {
        let labels = build_label_map(LABEL_FIXTURE).unwrap();
        let missing = vec!["Revenues".to_string(), "Assets".to_string()];
        let discovered =
            match_missing_metrics(PRESENTATION_FIXTURE, &labels, &missing).unwrap();

        // The policy text block matches "Revenues" too, but the penalty
        // keeps the leaf concept in front even though it appears first.
        assert_eq!(
            discovered.get("Revenues").map(String::as_str),
            Some("us-gaap_SalesRevenueNet")
        );
        assert_eq!(
            discovered.get("Assets").map(String::as_str),
            Some("us-gaap_Assets")
        );
    }

    #[test]
    fn test_match_missing_metrics_no_match() {
        let labels = build_label_map(LABEL_FIXTURE).unwrap();
        let missing = vec!["Liabilities".to_string()];
        let discovered =
            match_missing_metrics(PRESENTATION_FIXTURE, &labels, &missing).unwrap();
        assert!(discovered.is_empty());
    }

    #[test]
    fn test_strip_suffix_ci() {
        assert_eq!(strip_suffix_ci("us-gaap_Assets_lbl", "_lbl"), "us-gaap_Assets");
        assert_eq!(strip_suffix_ci("us-gaap_Assets_LBL", "_lbl"), "us-gaap_Assets");
        assert_eq!(strip_suffix_ci("us-gaap_Assets", "_lbl"), "us-gaap_Assets");
        assert_eq!(strip_suffix_ci("x", "_lbl"), "x");
    }
}
