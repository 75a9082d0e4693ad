use core::fmt::{self, Debug};
use std::collections::BTreeSet;

use prjsense_types::{ConfigImage, TileCoord};
use serde::{Deserialize, Serialize};

mod error;
pub mod fake;
pub mod job;
pub mod netdir;
pub mod probe;
pub mod replay;
mod run;

pub use error::{DerivationError, Error};
pub use job::{DirectionOverrides, Job, JobSpec, NetPolicy};
pub use netdir::{DirectionMap, HeuristicTable, Provenance, classify, fallback_direction};
pub use prjsense_re_collector::{AmbiguityWarning, Correlation};
pub use run::{JobOutcome, JobReport, JobStats, RunSummary, Session};

/// A net put into its active state for one derivation.
///
/// Source nets are driven; sink nets are only attached as an observed load.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Drive(String),
    Sink(String),
}

impl Signal {
    pub fn net(&self) -> &str {
        match self {
            Signal::Drive(net) | Signal::Sink(net) => net,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Drive(net) => write!(f, "drive:{net}"),
            Signal::Sink(net) => write!(f, "sink:{net}"),
        }
    }
}

/// The set of nets held active for one derivation. Empty means every
/// in-scope net sits in its idle state.
pub type ActiveSet = BTreeSet<Signal>;

/// The external configuration tooling.
///
/// Must behave as a pure function of `(scope, active)` for a fixed device. The
/// engine calls it one request at a time and never assumes it is re-entrant.
pub trait Backend: Debug + Sync {
    fn derive_image(
        &self,
        scope: &[TileCoord],
        active: &ActiveSet,
    ) -> Result<ConfigImage, DerivationError>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn derive_image(
        &self,
        scope: &[TileCoord],
        active: &ActiveSet,
    ) -> Result<ConfigImage, DerivationError> {
        (**self).derive_image(scope, active)
    }
}
