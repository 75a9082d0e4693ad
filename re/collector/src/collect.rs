use core::fmt;
use std::collections::{BTreeMap, BTreeSet};

use prjsense_types::{BitCoord, SenseDb, SenseRecord, StoreError};

use crate::diff::Diff;

/// A bit that changed for more than one distinct probe target of a job.
///
/// This can be a multi-purpose bit (e.g. a shared enable gating whether another
/// net's toggle is observable at all) or a real contradiction; telling the two
/// apart needs a separate, manually scoped fuzz pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AmbiguityWarning {
    pub prefix: String,
    pub bit: BitCoord,
    pub targets: Vec<String>,
}

impl fmt::Display for AmbiguityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: bit {} shared by", self.prefix, self.bit)?;
        for target in &self.targets {
            write!(f, " {target}")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Entry {
    target: String,
    members: Vec<String>,
    diff: Diff,
}

/// Accumulates the diff of every probe target of one job, in probe order.
#[derive(Debug)]
pub struct Collector {
    prefix: String,
    entries: Vec<Entry>,
    owners: BTreeMap<BitCoord, BTreeSet<usize>>,
}

impl Collector {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: vec![],
            owners: BTreeMap::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn insert(&mut self, target: impl Into<String>, members: Vec<String>, diff: Diff) {
        let idx = self.entries.len();
        for bit in diff.bits.keys() {
            self.owners.entry(bit.clone()).or_default().insert(idx);
        }
        self.entries.push(Entry {
            target: target.into(),
            members,
            diff,
        });
    }

    pub fn diff(&self, target: &str) -> Option<&Diff> {
        self.entries
            .iter()
            .find(|e| e.target == target)
            .map(|e| &e.diff)
    }

    /// Every bit claimed by two or more distinct targets, in bit order.
    pub fn ambiguities(&self) -> Vec<AmbiguityWarning> {
        let mut res = vec![];
        for (bit, owners) in &self.owners {
            let targets: BTreeSet<&str> = owners
                .iter()
                .map(|&idx| self.entries[idx].target.as_str())
                .collect();
            if targets.len() > 1 {
                res.push(AmbiguityWarning {
                    prefix: self.prefix.clone(),
                    bit: bit.clone(),
                    targets: targets.into_iter().map(String::from).collect(),
                });
            }
        }
        res
    }

    pub fn finish(self) -> Correlation {
        let ambiguities = self.ambiguities();
        let records = self
            .entries
            .into_iter()
            .map(|e| SenseRecord {
                prefix: self.prefix.clone(),
                target: e.target,
                members: e.members,
                bits: e.diff.sense_bits(),
            })
            .collect();
        Correlation {
            records,
            ambiguities,
        }
    }
}

/// The finished outcome of one job: records in probe order plus the shared bits.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Correlation {
    pub records: Vec<SenseRecord>,
    pub ambiguities: Vec<AmbiguityWarning>,
}

impl Correlation {
    /// Writes everything into `db`, or nothing if any record would collide.
    pub fn commit(&self, db: &mut SenseDb) -> Result<(), StoreError> {
        let mut part = SenseDb::new();
        for record in &self.records {
            part.insert_record(record.clone())?;
        }
        for amb in &self.ambiguities {
            part.insert_ambiguity(&amb.prefix, amb.bit.clone(), amb.targets.iter().cloned());
        }
        db.merge(&part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(bits: &[&str]) -> Diff {
        Diff {
            bits: bits.iter().map(|b| (b.parse().unwrap(), true)).collect(),
        }
    }

    #[test]
    fn test_disjoint() {
        let mut c = Collector::new("p_");
        c.insert("A", vec!["A".into()], diff(&["R1C1:PLC:F0B0"]));
        c.insert("B", vec!["B".into()], diff(&["R1C1:PLC:F0B1"]));
        assert!(c.ambiguities().is_empty());
        let corr = c.finish();
        let keys: Vec<_> = corr.records.iter().map(|r| r.key()).collect();
        assert_eq!(keys, ["p_A", "p_B"]);
    }

    #[test]
    fn test_shared_bits() {
        let mut c = Collector::new("p_");
        c.insert("B", vec!["B".into()], diff(&["R1C1:PLC:F0B0", "R1C1:PLC:F0B5"]));
        c.insert("A", vec!["A".into()], diff(&["R1C1:PLC:F0B5", "R1C1:PLC:F1B0"]));
        c.insert("C", vec!["C".into()], diff(&["R1C1:PLC:F0B5"]));
        let amb = c.ambiguities();
        assert_eq!(amb.len(), 1);
        assert_eq!(amb[0].bit.to_string(), "R1C1:PLC:F0B5");
        assert_eq!(amb[0].targets, ["A", "B", "C"]);
        assert_eq!(amb[0].to_string(), "p_: bit R1C1:PLC:F0B5 shared by A B C");
        assert_eq!(c.diff("A").unwrap().len(), 2);

        let corr = c.finish();
        let mut db = SenseDb::new();
        corr.commit(&mut db).unwrap();
        assert_eq!(db.records.len(), 3);
        assert_eq!(db.num_ambiguous("p_"), 1);
        // committing the same outcome again is a no-op
        corr.commit(&mut db).unwrap();
        assert_eq!(db.records.len(), 3);
    }
}
