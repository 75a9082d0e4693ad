//! Net direction classification.
//!
//! Each net ends up as either a source (driven during its perturbation) or a
//! sink (observed only). The decision is taken from, in order: an explicit
//! per-net override, the job's blanket default override, the first matching
//! naming heuristic, and finally [`fallback_direction`].

use indexmap::IndexMap;
use prjsense_types::Direction;
use regex::Regex;

use crate::{Error, job::DirectionOverrides};

#[derive(Clone, Debug)]
pub struct HeuristicRule {
    pub pattern: Regex,
    pub direction: Direction,
}

/// Ordered naming rules; the first rule whose pattern matches the net wins.
#[derive(Clone, Debug, Default)]
pub struct HeuristicTable {
    rules: Vec<HeuristicRule>,
}

impl HeuristicTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pattern: &str, direction: Direction) -> Result<(), Error> {
        if !direction.is_resolved() {
            return Err(Error::configuration(format!(
                "heuristic {pattern:?} must map to source or sink"
            )));
        }
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::configuration(format!("heuristic {pattern:?}: {e}")))?;
        self.rules.push(HeuristicRule { pattern, direction });
        Ok(())
    }

    pub fn from_rules<'a>(
        rules: impl IntoIterator<Item = (&'a str, Direction)>,
    ) -> Result<Self, Error> {
        let mut res = Self::new();
        for (pattern, direction) in rules {
            res.push(pattern, direction)?;
        }
        Ok(res)
    }

    pub fn rules(&self) -> &[HeuristicRule] {
        &self.rules
    }

    pub fn lookup(&self, net: &str) -> Option<(usize, Direction)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.pattern.is_match(net))
            .map(|(idx, rule)| (idx, rule.direction))
    }
}

/// Why a net got its direction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Provenance {
    Override,
    DefaultOverride,
    Heuristic(usize),
    Fallback,
}

/// Direction used when neither overrides nor heuristics decide. An undriven
/// net is the quieter choice: it cannot toggle bits belonging to other nets.
pub fn fallback_direction() -> Direction {
    Direction::Sink
}

/// Resolved directions for a job's nets, in job net order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DirectionMap {
    dirs: IndexMap<String, (Direction, Provenance)>,
}

impl DirectionMap {
    pub fn get(&self, net: &str) -> Option<Direction> {
        self.dirs.get(net).map(|&(dir, _)| dir)
    }

    pub fn provenance(&self, net: &str) -> Option<Provenance> {
        self.dirs.get(net).map(|&(_, prov)| prov)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Direction, Provenance)> {
        self.dirs
            .iter()
            .map(|(net, &(dir, prov))| (net.as_str(), dir, prov))
    }

    pub fn nets_with(&self, dir: Direction) -> impl Iterator<Item = &str> {
        self.iter().filter(move |x| x.1 == dir).map(|x| x.0)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

pub fn classify<'a>(
    nets: impl IntoIterator<Item = &'a str>,
    overrides: &DirectionOverrides,
    table: &HeuristicTable,
) -> DirectionMap {
    let mut dirs = IndexMap::new();
    for net in nets {
        let res = if let Some(&dir) = overrides.nets.get(net) {
            (dir, Provenance::Override)
        } else if let Some(dir) = overrides.default {
            (dir, Provenance::DefaultOverride)
        } else if let Some((idx, dir)) = table.lookup(net) {
            (dir, Provenance::Heuristic(idx))
        } else {
            (fallback_direction(), Provenance::Fallback)
        };
        dirs.insert(net.to_string(), res);
    }
    DirectionMap { dirs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn table() -> HeuristicTable {
        HeuristicTable::from_rules([
            (r"_CLKO\d*(_|$)", Direction::Source),
            (r"_(CLKI|JCE)\d*(_|$)", Direction::Sink),
            (r"_ECLKO\d*$", Direction::Source),
        ])
        .unwrap()
    }

    #[test]
    fn test_fallback_is_sink() {
        assert_eq!(fallback_direction(), Direction::Sink);
        let dirs = classify(["R1C1_MYSTERY"], &DirectionOverrides::new(), &table());
        assert_eq!(dirs.get("R1C1_MYSTERY"), Some(Direction::Sink));
        assert_eq!(dirs.provenance("R1C1_MYSTERY"), Some(Provenance::Fallback));
    }

    #[test]
    fn test_heuristics() {
        let nets = ["R6C13_CLKO0_DCC", "R6C13_CLKI0_DCC", "R6C13_JCE0_DCC"];
        let dirs = classify(nets, &DirectionOverrides::new(), &table());
        assert_eq!(dirs.get("R6C13_CLKO0_DCC"), Some(Direction::Source));
        assert_eq!(dirs.provenance("R6C13_CLKO0_DCC"), Some(Provenance::Heuristic(0)));
        assert_eq!(dirs.get("R6C13_CLKI0_DCC"), Some(Direction::Sink));
        assert_eq!(dirs.get("R6C13_JCE0_DCC"), Some(Direction::Sink));
        assert_eq!(dirs.nets_with(Direction::Source).collect::<Vec<_>>(), ["R6C13_CLKO0_DCC"]);
    }

    #[test]
    fn test_override_precedence() {
        let ov = DirectionOverrides::new().with("R6C13_CLKO0_DCC", Direction::Sink);
        let dirs = classify(["R6C13_CLKO0_DCC", "R6C13_CLKI0_DCC"], &ov, &table());
        assert_eq!(dirs.get("R6C13_CLKO0_DCC"), Some(Direction::Sink));
        assert_eq!(dirs.provenance("R6C13_CLKO0_DCC"), Some(Provenance::Override));

        let ov = DirectionOverrides::all(Direction::Sink).with("R6C13_CLKI0_DCC", Direction::Source);
        let dirs = classify(["R6C13_CLKO0_DCC", "R6C13_CLKI0_DCC"], &ov, &table());
        assert_eq!(dirs.get("R6C13_CLKO0_DCC"), Some(Direction::Sink));
        assert_eq!(dirs.provenance("R6C13_CLKO0_DCC"), Some(Provenance::DefaultOverride));
        assert_eq!(dirs.get("R6C13_CLKI0_DCC"), Some(Direction::Source));
    }

    #[test]
    fn test_never_unspecified() {
        let dirs = classify(["A", "R1_CLKO", "B"], &DirectionOverrides::new(), &table());
        assert_eq!(dirs.len(), 3);
        assert!(dirs.iter().all(|(_, dir, _)| dir.is_resolved()));
        assert_eq!(
            dirs.iter().map(|x| x.0).collect::<Vec<_>>(),
            ["A", "R1_CLKO", "B"]
        );
    }

    #[test]
    fn test_bad_rules() {
        let mut t = HeuristicTable::new();
        assert_matches!(t.push("(", Direction::Source), Err(Error::Configuration(_)));
        assert_matches!(t.push("x", Direction::Unspecified), Err(Error::Configuration(_)));
        assert!(t.rules().is_empty());
    }
}
