pub mod collect;
pub mod diff;

pub use collect::{AmbiguityWarning, Collector, Correlation};
pub use diff::Diff;
