//! Device/tile database: which tiles each device has, how large each tile's
//! bit array is, and which configuration bits each named net can address.
//!
//! Nets are looked up per tile in two ways. A tile kind carries a table of
//! nets named relative to the tile's region, so `R6C13_JCE0_DCC` resolves in
//! any tile of region `R6C13` whose kind lists `JCE0_DCC`. Tiles whose naming
//! does not follow that pattern carry their own table of full net names.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    error::Error,
    fs::read_to_string,
    path::Path,
};

use prjsense_types::{BitCoord, TileCoord};
use serde::{Deserialize, Serialize};
use simple_error::bail;

pub type NetBits = BTreeMap<String, Vec<(usize, usize)>>;

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TileKind {
    pub frames: usize,
    pub bits: usize,
    #[serde(default)]
    pub nets: NetBits,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub tile: TileCoord,
    #[serde(default)]
    pub nets: NetBits,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub family: String,
    pub part: String,
    pub tiles: Vec<Tile>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub devices: Vec<Device>,
    pub kinds: BTreeMap<String, TileKind>,
}

impl Database {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let s = read_to_string(path)?;
        Self::from_json(&s)
    }

    pub fn from_json(s: &str) -> Result<Self, Box<dyn Error>> {
        let db: Database = serde_json::from_str(s)?;
        db.verify()?;
        Ok(db)
    }

    fn verify(&self) -> Result<(), Box<dyn Error>> {
        let check = |what: &str, kind: &TileKind, nets: &NetBits| -> Result<(), Box<dyn Error>> {
            for (net, bits) in nets {
                for &(frame, bit) in bits {
                    if frame >= kind.frames || bit >= kind.bits {
                        bail!(
                            "{}: net {} addresses F{}B{} outside {}x{} tile",
                            what,
                            net,
                            frame,
                            bit,
                            kind.frames,
                            kind.bits
                        );
                    }
                }
            }
            Ok(())
        };
        for (name, kind) in &self.kinds {
            check(&format!("tile kind {name}"), kind, &kind.nets)?;
        }
        let mut seen_devices = HashSet::new();
        for dev in &self.devices {
            if !seen_devices.insert((&dev.family, &dev.part)) {
                bail!("device {} {} listed twice", dev.family, dev.part);
            }
            let mut seen_tiles = HashSet::new();
            for tile in &dev.tiles {
                let Some(kind) = self.kinds.get(&tile.tile.kind) else {
                    bail!("{}: unknown tile kind {}", dev.part, tile.tile.kind);
                };
                if !seen_tiles.insert(&tile.tile.region) {
                    bail!("{}: region {} listed twice", dev.part, tile.tile.region);
                }
                check(&format!("{} tile {}", dev.part, tile.tile), kind, &tile.nets)?;
            }
        }
        Ok(())
    }

    pub fn device(&self, family: &str, part: &str) -> Option<DeviceRef<'_>> {
        self.devices
            .iter()
            .find(|dev| dev.family == family && dev.part == part)
            .map(|device| DeviceRef { db: self, device })
    }

}

#[derive(Debug, Clone, Copy)]
pub struct DeviceRef<'a> {
    pub db: &'a Database,
    pub device: &'a Device,
}

impl<'a> DeviceRef<'a> {
    pub fn family(&self) -> &'a str {
        &self.device.family
    }

    pub fn part(&self) -> &'a str {
        &self.device.part
    }

    /// All tiles of the device, in database order.
    pub fn tile_catalog(&self) -> impl Iterator<Item = &'a TileCoord> + 'a {
        self.device.tiles.iter().map(|t| &t.tile)
    }

    pub fn tile(&self, tile: &TileCoord) -> Option<&'a Tile> {
        self.device.tiles.iter().find(|t| t.tile == *tile)
    }

    /// Finds the tile placed at `region`, whatever its kind.
    pub fn tile_by_region(&self, region: &str) -> Option<&'a Tile> {
        self.device.tiles.iter().find(|t| t.tile.region == region)
    }

    fn resolve_tile(&self, net: &str, tile: &Tile) -> Vec<BitCoord> {
        let mut res = vec![];
        if let Some(bits) = tile.nets.get(net) {
            res.extend(
                bits.iter()
                    .map(|&(frame, bit)| BitCoord::new(tile.tile.clone(), frame, bit)),
            );
        }
        if let Some(rel) = net
            .strip_prefix(tile.tile.region.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
        {
            if let Some(bits) = self
                .db
                .kinds
                .get(&tile.tile.kind)
                .and_then(|kind| kind.nets.get(rel))
            {
                res.extend(
                    bits.iter()
                        .map(|&(frame, bit)| BitCoord::new(tile.tile.clone(), frame, bit)),
                );
            }
        }
        res
    }

    /// Every bit `net` can address within `scope`. Tiles of `scope` that are
    /// not part of this device address nothing.
    pub fn resolve(&self, net: &str, scope: &[TileCoord]) -> BTreeSet<BitCoord> {
        scope
            .iter()
            .filter_map(|tc| self.tile(tc))
            .flat_map(|tile| self.resolve_tile(net, tile))
            .collect()
    }
}
