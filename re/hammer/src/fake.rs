//! A table-driven backend, for running the engine without vendor tools.

use std::collections::BTreeMap;
use std::sync::Mutex;

use prjsense_types::{BitCoord, ConfigImage, TileCoord};

use crate::{ActiveSet, Backend, DerivationError, Signal};

/// Derives images from a fixed base image plus per-signal bit effects.
///
/// Every active signal applies its effects on top of the base; effects of
/// different signals are or-ed together. Only tiles in the requested scope
/// are returned. Each request is logged for later inspection.
#[derive(Debug, Default)]
pub struct TableBackend {
    base: ConfigImage,
    effects: BTreeMap<Signal, Vec<(BitCoord, bool)>>,
    fail: Vec<Signal>,
    log: Mutex<Vec<(Vec<TileCoord>, ActiveSet)>>,
}

impl TableBackend {
    pub fn new(base: ConfigImage) -> Self {
        TableBackend {
            base,
            ..Default::default()
        }
    }

    pub fn effect(mut self, sig: Signal, bits: &[(&str, bool)]) -> Self {
        let entry = self.effects.entry(sig).or_default();
        for &(bit, val) in bits {
            let bit: BitCoord = bit.parse().expect("bad bit coordinate in effect table");
            entry.push((bit, val));
        }
        self
    }

    /// Makes any request holding `sig` active fail.
    pub fn failing(mut self, sig: Signal) -> Self {
        self.fail.push(sig);
        self
    }

    pub fn requests(&self) -> Vec<(Vec<TileCoord>, ActiveSet)> {
        self.log.lock().unwrap().clone()
    }
}

impl Backend for TableBackend {
    fn derive_image(
        &self,
        scope: &[TileCoord],
        active: &ActiveSet,
    ) -> Result<ConfigImage, DerivationError> {
        self.log
            .lock()
            .unwrap()
            .push((scope.to_vec(), active.clone()));
        if let Some(sig) = self.fail.iter().find(|sig| active.contains(sig)) {
            return Err(format!("cannot place {sig}").into());
        }
        let mut image = ConfigImage::new();
        for tile in scope {
            for (fidx, frame) in self.base.frames(tile).iter().enumerate() {
                for (bidx, val) in frame.iter().enumerate() {
                    image.set(&BitCoord::new(tile.clone(), fidx, bidx), *val);
                }
            }
        }
        for sig in active {
            for (bit, val) in self.effects.get(sig).into_iter().flatten() {
                if scope.contains(&bit.tile) {
                    image.set(bit, *val);
                }
            }
        }
        Ok(image)
    }
}
