use core::fmt::Debug;
use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use prjsense_types::{BitCoord, ConfigImage, SenseBit, TileCoord};

/// Bits that changed between two configuration images, with their new value.
#[derive(Clone, Eq, PartialEq, Default)]
pub struct Diff {
    pub bits: BTreeMap<BitCoord, bool>,
}

impl Debug for Diff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (k, v) in &self.bits {
            write!(f, "{k:?}:{v}, ")?;
        }
        write!(f, "]")?;
        Ok(())
    }
}

impl Diff {
    /// Compares two images over the tiles of `scope` only.
    pub fn between(base: &ConfigImage, other: &ConfigImage, scope: &[TileCoord]) -> Diff {
        let mut res = Diff::default();
        for tile in scope.iter().unique() {
            res.bits.extend(base.diff_tile(other, tile));
        }
        res
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Splits two diffs into (only in a, only in b, common).
    pub fn split(mut a: Diff, mut b: Diff) -> (Diff, Diff, Diff) {
        let mut common = Diff::default();
        a.bits.retain(|k, av| match b.bits.remove(k) {
            Some(bv) if bv == *av => {
                common.bits.insert(k.clone(), bv);
                false
            }
            Some(bv) => {
                b.bits.insert(k.clone(), bv);
                true
            }
            None => true,
        });
        (a, b, common)
    }

    pub fn split_bits_by(&mut self, mut f: impl FnMut(&BitCoord) -> bool) -> Diff {
        let mut res = Diff::default();
        self.bits.retain(|k, v| {
            if f(k) {
                res.bits.insert(k.clone(), *v);
                false
            } else {
                true
            }
        });
        res
    }

    pub fn split_bits(&mut self, bits: &BTreeSet<BitCoord>) -> Diff {
        self.split_bits_by(|bit| bits.contains(bit))
    }

    pub fn sense_bits(&self) -> BTreeSet<SenseBit> {
        self.bits
            .iter()
            .map(|(k, &v)| SenseBit::new(k.clone(), v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bit(s: &str) -> BitCoord {
        s.parse().unwrap()
    }

    fn diff(bits: &[(&str, bool)]) -> Diff {
        Diff {
            bits: bits.iter().map(|&(b, v)| (bit(b), v)).collect(),
        }
    }

    #[test]
    fn test_between_scoped() {
        let t1 = TileCoord::new("R1C1", "PLC");
        let t2 = TileCoord::new("R1C2", "PLC");
        let base = ConfigImage::new();
        let mut other = ConfigImage::new();
        other.set(&BitCoord::new(t1.clone(), 0, 3), true);
        other.set(&BitCoord::new(t2.clone(), 1, 1), true);
        let d = Diff::between(&base, &other, &[t1.clone()]);
        assert_eq!(d, diff(&[("R1C1:PLC:F0B3", true)]));
        let d = Diff::between(&other, &base, &[t1, t2]);
        assert_eq!(d, diff(&[("R1C1:PLC:F0B3", false), ("R1C2:PLC:F1B1", false)]));
    }

    #[test]
    fn test_split() {
        let a = diff(&[("R1C1:PLC:F0B0", true), ("R1C1:PLC:F0B1", true)]);
        let b = diff(&[("R1C1:PLC:F0B1", true), ("R1C1:PLC:F0B2", false)]);
        let (oa, ob, common) = Diff::split(a, b);
        assert_eq!(oa, diff(&[("R1C1:PLC:F0B0", true)]));
        assert_eq!(ob, diff(&[("R1C1:PLC:F0B2", false)]));
        assert_eq!(common, diff(&[("R1C1:PLC:F0B1", true)]));
    }

    #[test]
    fn test_split_bits_and_sense() {
        let mut a = diff(&[("R1C1:PLC:F0B0", true), ("R1C1:PLC:F0B1", false)]);
        let outside = a.split_bits(&BTreeSet::from([bit("R1C1:PLC:F0B1")]));
        assert_eq!(outside, diff(&[("R1C1:PLC:F0B1", false)]));
        let sense: Vec<_> = outside.sense_bits().iter().map(|b| b.to_string()).collect();
        assert_eq!(sense, ["!R1C1:PLC:F0B1"]);
        assert_eq!(a.len(), 1);
    }
}
