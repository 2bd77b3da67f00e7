use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use strum::{EnumIter, IntoEnumIterator};

/// Form types the pipeline knows about. Anything else flows through
/// `Other` and is filtered out when listing filings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
#[serde(try_from = "String")]
pub enum ReportType {
    Form10K,
    Form10Q,
    Other(String),
}

impl ReportType {
    pub fn is_ingested(&self) -> bool {
        matches!(self, ReportType::Form10K | ReportType::Form10Q)
    }

    pub fn list_ingested() -> &'static str {
        &INGESTED_FORMS
    }
}

impl TryFrom<String> for ReportType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ReportType::from_str(&s)
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportType::Form10K => write!(f, "10-K"),
            ReportType::Form10Q => write!(f, "10-Q"),
            ReportType::Other(s) => write!(f, "{}", s),
        }
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<ReportType, String> {
        match s.to_uppercase().as_str() {
            "10-K" => Ok(ReportType::Form10K),
            "10-Q" => Ok(ReportType::Form10Q),
            _ => Ok(ReportType::Other(s.to_string())),
        }
    }
}

static INGESTED_FORMS: Lazy<String> = Lazy::new(|| {
    ReportType::iter()
        .filter(|t| t.is_ingested())
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
});
