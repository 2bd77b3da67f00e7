use anyhow::Result;
use reqwest::Client;
use url::Url;

/// Fetches a URL as text with the SEC-required user agent.
pub async fn fetch_text(client: &Client, url: &Url, user_agent: &str) -> Result<String> {
    log::debug!("Fetching URL: {}", url);

    let response = client
        .get(url.as_str())
        .header(reqwest::header::USER_AGENT, user_agent)
        .header(reqwest::header::ACCEPT_ENCODING, "gzip, deflate")
        .send()
        .await?;

    log::debug!("Response status: {}", response.status());

    if !response.status().is_success() {
        return Err(anyhow::anyhow!(
            "HTTP request failed with status: {}",
            response.status()
        ));
    }

    Ok(response.text().await?)
}

/// Returns true when the URL answers a probe with a success status.
/// Some endpoints reject HEAD even though GET works, so a failed HEAD
/// falls back to a GET probe.
pub async fn url_exists(client: &Client, url: &Url, user_agent: &str) -> bool {
    if let Ok(response) = client
        .head(url.as_str())
        .header(reqwest::header::USER_AGENT, user_agent)
        .send()
        .await
    {
        if response.status().is_success() {
            return true;
        }
    }

    match client
        .get(url.as_str())
        .header(reqwest::header::USER_AGENT, user_agent)
        .send()
        .await
    {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}
