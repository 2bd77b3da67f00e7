pub mod context;
pub mod document;
pub mod facts;
pub mod value;

pub use context::{Context, ContextIndex, PeriodType};
pub use document::{Dialect, XbrlDocument};
pub use facts::{extract_raw_facts, select_facts, Fact, RawFact};
pub use value::NumericValue;

use anyhow::Result;

use crate::aliases::AliasMap;
use crate::edgar::filing::Filing;

/// The whole per-document pipeline: parse one instance document, extract
/// raw candidates for every known alias, and reduce them to at most one
/// fact per standard metric. Retry-after-discovery is the caller's call.
pub fn parse_and_extract(
    content: &str,
    dialect: Dialect,
    filing: &Filing,
    aliases: &AliasMap,
) -> Result<Vec<Fact>> {
    let document = XbrlDocument::parse(content, dialect)?;
    let raw_facts = extract_raw_facts(&document, aliases);
    Ok(select_facts(raw_facts, filing))
}
