use std::collections::{BTreeMap, HashSet};

use indexmap::IndexSet;
use itertools::Itertools;
use prjsense_tiledb::Database;
use prjsense_types::{Direction, TileCoord};

use crate::Error;

/// How the job's nets are turned into probe targets.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum NetPolicy {
    /// Every net is its own probe target.
    #[default]
    PerNet,
    /// All nets are fuzzed together as a single probe target.
    Union,
}

/// Caller-supplied directions that beat any naming heuristic.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DirectionOverrides {
    pub nets: BTreeMap<String, Direction>,
    /// Applies to every net without its own entry.
    pub default: Option<Direction>,
}

impl DirectionOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(dir: Direction) -> Self {
        Self {
            nets: BTreeMap::new(),
            default: Some(dir),
        }
    }

    pub fn with(mut self, net: impl Into<String>, dir: Direction) -> Self {
        self.nets.insert(net.into(), dir);
        self
    }
}

/// Unvalidated job parameters, as read from a campaign.
#[derive(Clone, Debug, Default)]
pub struct JobSpec {
    pub family: String,
    pub part: String,
    pub tiles: Vec<TileCoord>,
    pub nets: Vec<String>,
    pub prefix: String,
    pub policy: NetPolicy,
    pub overrides: DirectionOverrides,
}

/// A validated job. Immutable once built.
#[derive(Clone, Debug)]
pub struct Job {
    family: String,
    part: String,
    tiles: Vec<TileCoord>,
    nets: IndexSet<String>,
    prefix: String,
    policy: NetPolicy,
    overrides: DirectionOverrides,
}

fn is_prefix_fragment(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

impl Job {
    pub fn new(db: &Database, spec: JobSpec) -> Result<Job, Error> {
        if spec.tiles.is_empty() {
            return Err(Error::configuration("job has no tiles"));
        }
        let nets: IndexSet<String> = spec.nets.into_iter().collect();
        if nets.is_empty() {
            return Err(Error::configuration("job has no nets"));
        }
        if nets.iter().any(|n| n.is_empty()) {
            return Err(Error::configuration("job has an empty net name"));
        }
        if !is_prefix_fragment(&spec.prefix) {
            return Err(Error::configuration(format!(
                "prefix {:?} is not a valid identifier fragment",
                spec.prefix
            )));
        }
        let Some(dev) = db.device(&spec.family, &spec.part) else {
            return Err(Error::configuration(format!(
                "unknown device {} {}",
                spec.family, spec.part
            )));
        };
        let mut seen = HashSet::new();
        for tile in &spec.tiles {
            if !seen.insert(tile) {
                return Err(Error::configuration(format!("tile {tile} listed twice")));
            }
            if dev.tile_catalog().any(|t| t == tile) {
                continue;
            }
            return Err(match dev.tile_by_region(&tile.region) {
                Some(t) => Error::configuration(format!(
                    "tile {tile}: region {region} has kind {kind} on {part}",
                    region = tile.region,
                    kind = t.tile.kind,
                    part = spec.part
                )),
                None => Error::configuration(format!(
                    "tile {tile} does not exist on {part}",
                    part = spec.part
                )),
            });
        }
        for (net, dir) in &spec.overrides.nets {
            if !dir.is_resolved() {
                return Err(Error::configuration(format!(
                    "override for {net} must be source or sink"
                )));
            }
        }
        if spec.overrides.default == Some(Direction::Unspecified) {
            return Err(Error::configuration(
                "default override must be source or sink",
            ));
        }
        Ok(Job {
            family: spec.family,
            part: spec.part,
            tiles: spec.tiles,
            nets,
            prefix: spec.prefix,
            policy: spec.policy,
            overrides: spec.overrides,
        })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn part(&self) -> &str {
        &self.part
    }

    pub fn tiles(&self) -> &[TileCoord] {
        &self.tiles
    }

    pub fn nets(&self) -> impl Iterator<Item = &str> {
        self.nets.iter().map(|x| x.as_str())
    }

    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn policy(&self) -> NetPolicy {
        self.policy
    }

    pub fn overrides(&self) -> &DirectionOverrides {
        &self.overrides
    }

    pub fn scope_name(&self) -> String {
        self.tiles.iter().join(",")
    }
}
