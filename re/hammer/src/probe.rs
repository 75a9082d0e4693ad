use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use prjsense_tiledb::DeviceRef;
use prjsense_types::{BitCoord, Direction, TileCoord};
use unnamed_entity::{EntityVec, entity_id};

use crate::{ActiveSet, Error, Signal, job::Job, job::NetPolicy, netdir::DirectionMap};

entity_id! {
    pub id TargetId u32;
}

/// The bits each job net can address inside the job's tile scope.
#[derive(Clone, Debug)]
pub struct NetMap {
    nets: IndexMap<String, BTreeSet<BitCoord>>,
}

impl NetMap {
    /// Resolves every net of the job; fails on the first net that addresses
    /// nothing within the tile scope.
    pub fn build(dev: DeviceRef<'_>, job: &Job) -> Result<NetMap, Error> {
        let mut nets = IndexMap::new();
        for net in job.nets() {
            let bits = dev.resolve(net, job.tiles());
            if bits.is_empty() {
                return Err(Error::Resolution {
                    net: net.to_string(),
                    scope: job.scope_name(),
                });
            }
            nets.insert(net.to_string(), bits);
        }
        Ok(NetMap { nets })
    }

    pub fn bits(&self, net: &str) -> Option<&BTreeSet<BitCoord>> {
        self.nets.get(net)
    }

    pub fn tiles(&self, net: &str) -> BTreeSet<&TileCoord> {
        self.nets
            .get(net)
            .into_iter()
            .flatten()
            .map(|bit| &bit.tile)
            .collect()
    }

    /// Groups the nets by the physical tiles that address them. A net
    /// spanning several tiles shows up under each.
    pub fn by_tile(&self) -> BTreeMap<&TileCoord, Vec<&str>> {
        let mut res: BTreeMap<&TileCoord, Vec<&str>> = BTreeMap::new();
        for net in self.nets.keys() {
            for tile in self.tiles(net) {
                res.entry(tile).or_default().push(net);
            }
        }
        res
    }

    /// Union of the candidate bits of several nets.
    pub fn candidates<'a>(&self, nets: impl IntoIterator<Item = &'a str>) -> BTreeSet<BitCoord> {
        nets.into_iter()
            .filter_map(|net| self.nets.get(net))
            .flatten()
            .cloned()
            .collect()
    }
}

/// One net, or one group of nets, fuzzed in a single pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProbeTarget {
    pub name: String,
    pub members: Vec<String>,
}

pub fn enumerate_targets(job: &Job) -> EntityVec<TargetId, ProbeTarget> {
    let mut res = EntityVec::new();
    match job.policy() {
        NetPolicy::PerNet => {
            for net in job.nets() {
                res.push(ProbeTarget {
                    name: net.to_string(),
                    members: vec![net.to_string()],
                });
            }
        }
        NetPolicy::Union => {
            let members: Vec<String> = job.nets().map(String::from).collect();
            res.push(ProbeTarget {
                name: members.join("+"),
                members,
            });
        }
    }
    res
}

/// The active state of a net. Sinks are never driven.
pub fn signal_for(net: &str, dir: Direction) -> Signal {
    match dir {
        Direction::Source => Signal::Drive(net.to_string()),
        Direction::Sink | Direction::Unspecified => Signal::Sink(net.to_string()),
    }
}

/// Active sets to derive for a target, relative to the all-idle baseline.
///
/// A single-net target is probed once. A group is probed with all members
/// active at once and then with each member alone.
pub fn plan(target: &ProbeTarget, dirs: &DirectionMap) -> Vec<ActiveSet> {
    let signal = |net: &str| {
        let dir = dirs.get(net).unwrap_or_else(crate::netdir::fallback_direction);
        signal_for(net, dir)
    };
    let mut res = vec![target.members.iter().map(|net| signal(net)).collect()];
    if target.members.len() > 1 {
        for net in &target.members {
            res.push(ActiveSet::from([signal(net)]));
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{DirectionOverrides, JobSpec};
    use crate::netdir::{HeuristicTable, classify};
    use assert_matches::assert_matches;
    use prjsense_tiledb::Database;
    use unnamed_entity::EntityId;

    const DB: &str = r#"{
        "devices": [{
            "family": "MachXO2",
            "part": "LCMXO2-1200HC",
            "tiles": [
                {"tile": "R1C1:PLC"},
                {"tile": "R1C2:PLC", "nets": {"R1C1_A": [[1, 1]]}},
                {"tile": "R1C3:PLC"}
            ]
        }],
        "kinds": {"PLC": {"frames": 2, "bits": 2, "nets": {"A": [[0, 0]], "B": [[0, 1]]}}}
    }"#;

    fn job(db: &Database, nets: &[&str], policy: NetPolicy) -> Job {
        Job::new(
            db,
            JobSpec {
                family: "MachXO2".into(),
                part: "LCMXO2-1200HC".into(),
                tiles: vec!["R1C1:PLC".parse().unwrap(), "R1C2:PLC".parse().unwrap()],
                nets: nets.iter().map(|x| x.to_string()).collect(),
                prefix: "p_".into(),
                policy,
                overrides: DirectionOverrides::new().with("R1C1_A", Direction::Source),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_netmap() {
        let db = Database::from_json(DB).unwrap();
        let dev = db.device("MachXO2", "LCMXO2-1200HC").unwrap();
        let job = job(&db, &["R1C1_A", "R1C2_B"], NetPolicy::PerNet);
        let nm = NetMap::build(dev, &job).unwrap();
        assert_eq!(nm.bits("R1C1_A").unwrap().len(), 2);
        let groups: Vec<_> = nm
            .by_tile()
            .into_iter()
            .map(|(t, nets)| (t.to_string(), nets))
            .collect();
        assert_eq!(
            groups,
            [
                ("R1C1:PLC".to_string(), vec!["R1C1_A"]),
                ("R1C2:PLC".to_string(), vec!["R1C1_A", "R1C2_B"]),
            ]
        );
        assert_eq!(nm.candidates(["R1C1_A", "R1C2_B"]).len(), 3);
    }

    #[test]
    fn test_netmap_out_of_scope() {
        let db = Database::from_json(DB).unwrap();
        let dev = db.device("MachXO2", "LCMXO2-1200HC").unwrap();
        let job = job(&db, &["R1C1_A", "R1C3_A"], NetPolicy::PerNet);
        assert_matches!(
            NetMap::build(dev, &job),
            Err(Error::Resolution { net, .. }) if net == "R1C3_A"
        );
    }

    #[test]
    fn test_targets_and_plan() {
        let db = Database::from_json(DB).unwrap();
        let j = job(&db, &["R1C1_A", "R1C2_B"], NetPolicy::PerNet);
        let dirs = classify(j.nets(), j.overrides(), &HeuristicTable::new());
        let targets = enumerate_targets(&j);
        assert_eq!(targets.len(), 2);
        let t0 = &targets[TargetId::from_idx(0)];
        assert_eq!(t0.name, "R1C1_A");
        assert_eq!(
            plan(t0, &dirs),
            vec![ActiveSet::from([Signal::Drive("R1C1_A".into())])]
        );
        let t1 = &targets[TargetId::from_idx(1)];
        assert_eq!(
            plan(t1, &dirs),
            vec![ActiveSet::from([Signal::Sink("R1C2_B".into())])]
        );

        let j = job(&db, &["R1C1_A", "R1C2_B"], NetPolicy::Union);
        let targets = enumerate_targets(&j);
        assert_eq!(targets.len(), 1);
        let t = &targets[TargetId::from_idx(0)];
        assert_eq!(t.name, "R1C1_A+R1C2_B");
        let p = plan(t, &dirs);
        assert_eq!(p.len(), 3);
        assert_eq!(p[0].len(), 2);
        assert!(p.iter().all(|set| !set.contains(&Signal::Drive("R1C2_B".into()))));
    }

    #[test]
    fn test_signal_for() {
        assert_eq!(signal_for("X", Direction::Source), Signal::Drive("X".into()));
        assert_eq!(signal_for("X", Direction::Sink), Signal::Sink("X".into()));
        assert_eq!(signal_for("X", Direction::Unspecified), Signal::Sink("X".into()));

        let db = Database::from_json(DB).unwrap();
        let j = job(&db, &["R1C1_A", "R1C2_B"], NetPolicy::Union);
        let dirs = classify(j.nets(), j.overrides(), &HeuristicTable::new());
        let targets = enumerate_targets(&j);
        for active in plan(&targets[TargetId::from_idx(0)], &dirs) {
            for sig in &active {
                let dir = dirs.get(sig.net()).unwrap();
                assert_eq!(*sig, signal_for(sig.net(), dir));
            }
        }
    }
}
