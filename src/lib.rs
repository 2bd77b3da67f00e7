pub mod aliases;
pub mod config;
pub mod edgar;
pub mod storage;

// Re-exports
pub use aliases::{AliasMap, AliasRegistry};
pub use config::Config;
pub use edgar::filing::Filing;
pub use edgar::xbrl::{Dialect, Fact};
