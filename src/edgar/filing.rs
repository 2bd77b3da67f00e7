use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use url::Url;

use super::report::ReportType;
use super::utils::{fetch_text, url_exists};
use super::xbrl::Dialect;
use crate::config::Config;

pub const EDGAR_DATA_URL: &str = "https://data.sec.gov";
pub const EDGAR_ARCHIVES_URL: &str = "https://www.sec.gov/Archives/edgar/data";
pub const COMPANY_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";

/// One SEC filing as listed by the submissions feed. Immutable input to
/// the extraction core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filing {
    pub cik: String,
    pub accession_number: String,
    pub filing_date: NaiveDate,
    pub report_date: NaiveDate,
    pub form_type: ReportType,
    pub is_xbrl: bool,
    pub is_inline_xbrl: bool,
    pub primary_document: String,
}

impl Filing {
    /// Archive directory for this accession, without a trailing slash.
    pub fn archive_base(&self) -> String {
        format!(
            "{}/{}/{}",
            EDGAR_ARCHIVES_URL,
            self.cik,
            self.accession_number.replace('-', "")
        )
    }

    /// The human-readable filing index page, which links every file in
    /// the accession including the taxonomy linkbases.
    pub fn index_page_url(&self) -> String {
        format!("{}/{}-index.htm", self.archive_base(), self.accession_number)
    }
}

#[derive(Debug, Deserialize)]
struct TickerRow {
    cik_str: u64,
    ticker: String,
}

/// Downloads the SEC ticker mapping and returns lowercase ticker ->
/// 10-digit zero-padded CIK.
pub async fn get_cik_map(client: &Client, config: &Config) -> Result<HashMap<String, String>> {
    let url = Url::parse(COMPANY_TICKERS_URL)?;
    let body = fetch_text(client, &url, &config.user_agent).await?;

    let rows: HashMap<String, TickerRow> = serde_json::from_str(&body)
        .map_err(|e| anyhow!("Failed to parse company tickers JSON: {}", e))?;

    let mut map = HashMap::new();
    for row in rows.values() {
        map.insert(row.ticker.to_lowercase(), format!("{:010}", row.cik_str));
    }
    Ok(map)
}

// The submissions feed stores filings as parallel column arrays.
#[derive(Debug, Deserialize)]
struct RecentFilings {
    #[serde(rename = "accessionNumber")]
    accession_number: Vec<String>,
    #[serde(rename = "filingDate")]
    filing_date: Vec<String>,
    #[serde(rename = "reportDate")]
    report_date: Vec<String>,
    #[serde(rename = "form")]
    form: Vec<String>,
    #[serde(rename = "isXBRL")]
    is_xbrl: Vec<u8>,
    #[serde(rename = "isInlineXBRL")]
    is_inline_xbrl: Vec<u8>,
    #[serde(rename = "primaryDocument")]
    primary_document: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FilingsData {
    recent: RecentFilings,
}

#[derive(Debug, Deserialize)]
struct SubmissionsFeed {
    filings: FilingsData,
}

/// Lists 10-K and 10-Q filings with XBRL data for a CIK, newest first.
pub async fn list_filings(client: &Client, config: &Config, cik: &str) -> Result<Vec<Filing>> {
    let padded_cik = format!("{:0>10}", cik);
    let url = Url::parse(&format!(
        "{}/submissions/CIK{}.json",
        EDGAR_DATA_URL, padded_cik
    ))?;

    info!("Fetching company filings from {}", url);

    let body = fetch_text(client, &url, &config.user_agent).await?;
    let feed: SubmissionsFeed = serde_json::from_str(&body)
        .map_err(|e| anyhow!("Failed to parse submissions JSON: {}", e))?;
    let recent = feed.filings.recent;

    let rows = recent
        .accession_number
        .iter()
        .zip(recent.filing_date.iter())
        .zip(recent.report_date.iter())
        .zip(recent.form.iter())
        .zip(recent.is_xbrl.iter())
        .zip(recent.is_inline_xbrl.iter())
        .zip(recent.primary_document.iter());

    let mut filings = Vec::new();
    for ((((((accession, filing_date), report_date), form), is_xbrl), is_inline), primary) in rows {
        let form_type = match ReportType::from_str(form) {
            Ok(form_type) => form_type,
            Err(_) => continue,
        };
        if !form_type.is_ingested() || (*is_xbrl == 0 && *is_inline == 0) {
            continue;
        }

        let filing_date = match NaiveDate::parse_from_str(filing_date, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => continue,
        };
        // The core scores periods against the report date; entries where
        // the feed leaves it blank cannot be processed.
        let report_date = match NaiveDate::parse_from_str(report_date, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                debug!("Skipping {}: no usable report date", accession);
                continue;
            }
        };

        filings.push(Filing {
            cik: padded_cik.clone(),
            accession_number: accession.clone(),
            filing_date,
            report_date,
            form_type,
            is_xbrl: *is_xbrl != 0,
            is_inline_xbrl: *is_inline != 0,
            primary_document: primary.clone(),
        });
    }

    Ok(filings)
}

/// Resolves the URL of the parsable instance document for a filing,
/// handling both standalone XBRL (.xml) and inline XBRL (.htm) shapes.
pub async fn resolve_document(
    client: &Client,
    config: &Config,
    filing: &Filing,
) -> Result<(Url, Dialect)> {
    let base = filing.archive_base();
    let doc_stem = filing
        .primary_document
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filing.primary_document.as_str());

    let mut candidates = vec![
        format!("{}.xml", doc_stem),     // traditional instance document
        format!("{}_htm.xml", doc_stem), // companion export for inline filings
    ];
    if filing.is_inline_xbrl {
        candidates.push(filing.primary_document.clone());
    }

    for name in &candidates {
        let url = Url::parse(&format!("{}/{}", base, name))?;
        if url_exists(client, &url, &config.user_agent).await {
            return Ok((url, Dialect::from_document_name(name)));
        }
    }

    // Fall back to the directory index for a standalone instance document.
    let index_url = Url::parse(&format!("{}/index.json", base))?;
    if let Ok(body) = fetch_text(client, &index_url, &config.user_agent).await {
        if let Ok(listing) = serde_json::from_str::<serde_json::Value>(&body) {
            let items = listing
                .pointer("/directory/item")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();

            for item in items {
                let name = item.get("name").and_then(|n| n.as_str()).unwrap_or("");
                let lower = name.to_lowercase();
                if !lower.ends_with(".xml") {
                    continue;
                }
                if lower == "filingsummary.xml" || lower == "submission.xml" {
                    continue;
                }
                // Linkbases are not instance documents.
                if ["_cal.xml", "_def.xml", "_lab.xml", "_pre.xml"]
                    .iter()
                    .any(|suffix| lower.ends_with(suffix))
                {
                    continue;
                }

                let url = Url::parse(&format!("{}/{}", base, name))?;
                if url_exists(client, &url, &config.user_agent).await {
                    return Ok((url, Dialect::Standard));
                }
            }
        }
    }

    Err(anyhow!(
        "Could not locate a parsable document for filing {}",
        filing.accession_number
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_filing() -> Filing {
        Filing {
            cik: "0000320193".to_string(),
            accession_number: "0000320193-25-000073".to_string(),
            filing_date: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            report_date: NaiveDate::from_ymd_opt(2025, 6, 28).unwrap(),
            form_type: ReportType::Form10Q,
            is_xbrl: true,
            is_inline_xbrl: true,
            primary_document: "aapl-20250628.htm".to_string(),
        }
    }

    #[test]
    fn test_archive_urls() {
        let filing = sample_filing();
        assert_eq!(
            filing.archive_base(),
            "https://www.sec.gov/Archives/edgar/data/0000320193/000032019325000073"
        );
        assert_eq!(
            filing.index_page_url(),
            "https://www.sec.gov/Archives/edgar/data/0000320193/000032019325000073/0000320193-25-000073-index.htm"
        );
    }

    #[test]
    fn test_list_filings_row_filtering() {
        let body = r#"{
            "filings": {
                "recent": {
                    "accessionNumber": ["a-1", "a-2", "a-3", "a-4"],
                    "filingDate": ["2025-08-01", "2025-05-01", "2025-02-01", "2024-11-01"],
                    "reportDate": ["2025-06-28", "2025-03-29", "", "2024-09-28"],
                    "form": ["10-Q", "8-K", "10-Q", "10-K"],
                    "isXBRL": [1, 1, 1, 0],
                    "isInlineXBRL": [1, 0, 1, 0],
                    "primaryDocument": ["q3.htm", "ex.htm", "q1.htm", "k.htm"]
                }
            }
        }"#;
        let feed: SubmissionsFeed = serde_json::from_str(body).unwrap();
        let recent = feed.filings.recent;

        // a-2 is not an ingested form, a-3 has no report date, a-4 has no
        // XBRL flags; only a-1 survives.
        assert_eq!(recent.accession_number.len(), 4);
        let forms: Vec<ReportType> = recent
            .form
            .iter()
            .map(|f| f.parse().unwrap())
            .collect();
        assert!(forms[0].is_ingested());
        assert!(!forms[1].is_ingested());
        assert!(NaiveDate::parse_from_str(&recent.report_date[2], "%Y-%m-%d").is_err());
        assert_eq!(recent.is_xbrl[3] + recent.is_inline_xbrl[3], 0);
    }
}
