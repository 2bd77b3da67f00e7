use anyhow::{anyhow, Result};
use chrono::Datelike;
use log::{error, info, warn};
use quantedgar::aliases::AliasRegistry;
use quantedgar::config::Config;
use quantedgar::edgar::report::ReportType;
use quantedgar::edgar::utils::fetch_text;
use quantedgar::edgar::{filing, taxonomy, xbrl};
use quantedgar::storage::FactStore;
use reqwest::Client;
use std::time::Duration;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "quantedgar",
    about = "Extracts standardized financial metrics from EDGAR XBRL filings."
)]
struct Opt {
    /// Comma-separated ticker symbols to process.
    #[structopt(long)]
    tickers: String,

    /// Only process filings reported on or after this year.
    #[structopt(long)]
    start_year: Option<i32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let opt = Opt::from_args();
    let config = Config::from_env()?;

    let registry = AliasRegistry::new(&config.alias_file);
    let store = FactStore::open(config.data_dir.join("facts.db"))?;
    let client = Client::new();

    let mut cik_map = None;
    for attempt in 1..=3 {
        match filing::get_cik_map(&client, &config).await {
            Ok(map) => {
                cik_map = Some(map);
                break;
            }
            Err(e) => {
                warn!("Attempt {} to load CIK map failed: {:#}", attempt, e);
                if attempt < 3 {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
    let cik_map = cik_map.ok_or_else(|| anyhow!("Failed to load CIK map after 3 attempts"))?;
    info!("CIK map loaded: {} tickers", cik_map.len());

    let delay = Duration::from_millis(config.request_delay_ms);

    for ticker in opt.tickers.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let ticker = ticker.to_lowercase();
        let cik = match cik_map.get(&ticker) {
            Some(cik) => cik.clone(),
            None => {
                warn!("CIK not found for ticker '{}'; skipping", ticker);
                continue;
            }
        };

        tokio::time::sleep(delay).await;
        let mut filings = match filing::list_filings(&client, &config, &cik).await {
            Ok(filings) => filings,
            Err(e) => {
                error!("[{}] Error fetching filings: {:#}; skipping", ticker, e);
                continue;
            }
        };

        if let Some(start_year) = opt.start_year {
            let before = filings.len();
            filings.retain(|f| f.report_date.year() >= start_year);
            info!(
                "[{}] Filtered filings from {} to {} using start year {}",
                ticker,
                before,
                filings.len(),
                start_year
            );
        }
        if filings.is_empty() {
            warn!(
                "[{}] No {} filings with XBRL to process",
                ticker,
                ReportType::list_ingested()
            );
            continue;
        }
        info!("[{}] Processing {} filings", ticker, filings.len());

        for f in &filings {
            tokio::time::sleep(delay).await;
            match process_filing(&client, &config, &registry, f).await {
                Ok(facts) if facts.is_empty() => {
                    info!(
                        "  Processed {} ({}): no target facts found",
                        f.form_type, f.filing_date
                    );
                }
                Ok(facts) => match store.insert_facts(&facts) {
                    Ok(saved) => info!(
                        "  Processed {} ({}): {} facts, {} new",
                        f.form_type,
                        f.filing_date,
                        facts.len(),
                        saved
                    ),
                    Err(e) => error!(
                        "  Failed to save facts for {}: {:#}",
                        f.accession_number, e
                    ),
                },
                Err(e) => error!("  [{}] {:#}; skipping filing", f.accession_number, e),
            }
        }
    }

    info!("Pipeline execution complete");
    Ok(())
}

/// Fetches and extracts one filing. When nothing matches, asks the
/// Librarian for new aliases and retries extraction exactly once.
async fn process_filing(
    client: &Client,
    config: &Config,
    registry: &AliasRegistry,
    f: &filing::Filing,
) -> Result<Vec<xbrl::Fact>> {
    let (url, dialect) = filing::resolve_document(client, config, f).await?;
    let content = fetch_text(client, &url, &config.user_agent).await?;

    let aliases = registry.aliases()?;
    let facts = xbrl::parse_and_extract(&content, dialect, f, &aliases)?;
    if !facts.is_empty() {
        return Ok(facts);
    }

    // Nothing matched: every configured metric is missing here.
    let missing: Vec<String> = aliases.keys().cloned().collect();
    let discovered = taxonomy::discover_aliases(client, config, f, &missing).await?;
    if discovered.is_empty() {
        return Ok(facts);
    }

    info!(
        "  Librarian discovered {} aliases for {}",
        discovered.len(),
        f.accession_number
    );
    registry.merge(&discovered)?;

    let aliases = registry.aliases()?;
    xbrl::parse_and_extract(&content, dialect, f, &aliases)
}
