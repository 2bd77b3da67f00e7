use anyhow::Result;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub user_agent: String,
    pub data_dir: PathBuf,
    pub alias_file: PathBuf,
    pub request_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // SEC requires a contact address in the user agent.
        let user_agent = std::env::var("EDGAR_USER_AGENT")
            .unwrap_or_else(|_| "quantedgar admin@example.com".to_string());

        let data_dir = PathBuf::from(
            std::env::var("QUANTEDGAR_DATA_DIR").unwrap_or_else(|_| "edgar_data".to_string()),
        );

        let alias_file = match std::env::var("QUANTEDGAR_ALIAS_FILE") {
            Ok(path) => PathBuf::from(path),
            Err(_) => data_dir.join("metric_aliases.json"),
        };

        let request_delay_ms = std::env::var("QUANTEDGAR_REQUEST_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(200);

        Ok(Self {
            user_agent,
            data_dir,
            alias_file,
            request_delay_ms,
        })
    }
}
