use std::collections::BTreeMap;

use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};

use crate::coord::{BitCoord, TileCoord};

/// Snapshot of the configuration bits of a set of tiles for one test point.
///
/// Every tile is a list of frames. Tiles, frames and bits absent from the
/// image read as zero.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawImage", try_from = "RawImage")]
pub struct ConfigImage {
    tiles: BTreeMap<TileCoord, Vec<BitVec>>,
}

type RawImage = BTreeMap<TileCoord, Vec<String>>;

impl From<ConfigImage> for RawImage {
    fn from(image: ConfigImage) -> Self {
        image
            .tiles
            .into_iter()
            .map(|(tile, frames)| {
                let frames = frames
                    .iter()
                    .map(|frame| frame.iter().map(|b| if *b { '1' } else { '0' }).collect())
                    .collect();
                (tile, frames)
            })
            .collect()
    }
}

impl TryFrom<RawImage> for ConfigImage {
    type Error = String;

    fn try_from(raw: RawImage) -> Result<Self, Self::Error> {
        let mut tiles = BTreeMap::new();
        for (tile, frames) in raw {
            let mut data = vec![];
            for (fidx, frame) in frames.iter().enumerate() {
                let mut bv = BitVec::with_capacity(frame.len());
                for c in frame.chars() {
                    match c {
                        '0' => bv.push(false),
                        '1' => bv.push(true),
                        _ => return Err(format!("bad bit {c:?} in {tile} frame {fidx}")),
                    }
                }
                data.push(bv);
            }
            tiles.insert(tile, data);
        }
        Ok(ConfigImage { tiles })
    }
}

impl ConfigImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an all-zero tile of the given geometry, replacing any previous contents.
    pub fn add_tile(&mut self, tile: TileCoord, frames: usize, bits: usize) {
        self.tiles.insert(tile, vec![BitVec::repeat(false, bits); frames]);
    }

    pub fn set(&mut self, coord: &BitCoord, val: bool) {
        let frames = self.tiles.entry(coord.tile.clone()).or_default();
        if frames.len() <= coord.frame {
            frames.resize(coord.frame + 1, BitVec::new());
        }
        let frame = &mut frames[coord.frame];
        if frame.len() <= coord.bit {
            frame.resize(coord.bit + 1, false);
        }
        frame.set(coord.bit, val);
    }

    pub fn get(&self, coord: &BitCoord) -> bool {
        self.tiles
            .get(&coord.tile)
            .and_then(|frames| frames.get(coord.frame))
            .and_then(|frame| frame.get(coord.bit).map(|b| *b))
            .unwrap_or(false)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &TileCoord> {
        self.tiles.keys()
    }

    pub fn frames(&self, tile: &TileCoord) -> &[BitVec] {
        self.tiles.get(tile).map(|x| &x[..]).unwrap_or(&[])
    }

    /// Lists every bit of `tile` whose value differs between `self` and `other`,
    /// together with its value in `other`.
    pub fn diff_tile(&self, other: &ConfigImage, tile: &TileCoord) -> Vec<(BitCoord, bool)> {
        let fa = self.frames(tile);
        let fb = other.frames(tile);
        let mut res = vec![];
        for fidx in 0..fa.len().max(fb.len()) {
            let a = fa.get(fidx);
            let b = fb.get(fidx);
            let la = a.map_or(0, |x| x.len());
            let lb = b.map_or(0, |x| x.len());
            for bidx in 0..la.max(lb) {
                let va = a.and_then(|x| x.get(bidx).map(|v| *v)).unwrap_or(false);
                let vb = b.and_then(|x| x.get(bidx).map(|v| *v)).unwrap_or(false);
                if va != vb {
                    res.push((BitCoord::new(tile.clone(), fidx, bidx), vb));
                }
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bit(tile: &TileCoord, frame: usize, bit: usize) -> BitCoord {
        BitCoord::new(tile.clone(), frame, bit)
    }

    #[test]
    fn test_set_get() {
        let t = TileCoord::new("R2C3", "PLC");
        let mut img = ConfigImage::new();
        assert!(!img.get(&bit(&t, 4, 9)));
        img.set(&bit(&t, 4, 9), true);
        assert!(img.get(&bit(&t, 4, 9)));
        assert!(!img.get(&bit(&t, 4, 8)));
        assert_eq!(img.frames(&t).len(), 5);
    }

    #[test]
    fn test_diff_tile_uneven() {
        let t = TileCoord::new("R2C3", "PLC");
        let mut a = ConfigImage::new();
        a.add_tile(t.clone(), 2, 4);
        a.set(&bit(&t, 0, 1), true);
        let mut b = ConfigImage::new();
        b.set(&bit(&t, 1, 6), true);
        let diff = a.diff_tile(&b, &t);
        assert_eq!(diff, vec![(bit(&t, 0, 1), false), (bit(&t, 1, 6), true)]);
        assert!(a.diff_tile(&a, &t).is_empty());
    }

    #[test]
    fn test_json() {
        let t = TileCoord::new("CENTER5", "CENTER5");
        let mut img = ConfigImage::new();
        img.add_tile(t.clone(), 2, 3);
        img.set(&bit(&t, 1, 2), true);
        let s = serde_json::to_string(&img).unwrap();
        assert_eq!(s, r#"{"CENTER5:CENTER5":["000","001"]}"#);
        let back: ConfigImage = serde_json::from_str(&s).unwrap();
        assert_eq!(back, img);
        assert!(serde_json::from_str::<ConfigImage>(r#"{"A:B":["01x"]}"#).is_err());
    }
}
