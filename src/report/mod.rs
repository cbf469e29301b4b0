//! Report consumption: alias-aware field access, scoring and normalization.
//!
//! Raw reports are untyped JSON whose shape varies between service versions.
//! Nothing here fails on malformed input; missing data degrades to
//! placeholders.

pub mod fields;
pub mod normalizer;
pub mod scorer;

pub use normalizer::{normalize, overview, parse_report, Overview};
pub use scorer::assess;
