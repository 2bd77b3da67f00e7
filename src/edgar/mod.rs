pub mod filing;
pub mod report;
pub mod taxonomy;
pub mod utils;
pub mod xbrl;
