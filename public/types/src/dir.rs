use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of a net during fuzzing.
///
/// Source nets get actively driven by perturbations. Sink nets are only ever
/// attached as an observed load and must never be driven.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Source,
    Sink,
    Unspecified,
}

impl Direction {
    pub fn is_resolved(self) -> bool {
        self != Direction::Unspecified
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Source => "source",
            Direction::Sink => "sink",
            Direction::Unspecified => "unspecified",
        })
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source" => Ok(Direction::Source),
            "sink" => Ok(Direction::Sink),
            "unspecified" => Ok(Direction::Unspecified),
            _ => Err(format!("unknown net direction {s:?}")),
        }
    }
}
