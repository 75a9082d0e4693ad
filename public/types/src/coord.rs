use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ParseCoordError {
    #[error("malformed tile coordinate {0:?} (expected REGION:KIND)")]
    Tile(String),
    #[error("malformed bit coordinate {0:?} (expected REGION:KIND:F<frame>B<bit>)")]
    Bit(String),
}

/// One physical tile: the region it sits in plus its tile type.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TileCoord {
    pub region: String,
    pub kind: String,
}

impl TileCoord {
    pub fn new(region: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Debug for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.region, self.kind)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.region, self.kind)
    }
}

impl FromStr for TileCoord {
    type Err = ParseCoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((region, kind)) = s.split_once(':') else {
            return Err(ParseCoordError::Tile(s.into()));
        };
        if region.is_empty() || kind.is_empty() || kind.contains(':') {
            return Err(ParseCoordError::Tile(s.into()));
        }
        Ok(TileCoord::new(region, kind))
    }
}

/// A configuration bit, addressed by tile, frame and bit-within-frame.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BitCoord {
    pub tile: TileCoord,
    pub frame: usize,
    pub bit: usize,
}

impl BitCoord {
    pub fn new(tile: TileCoord, frame: usize, bit: usize) -> Self {
        Self { tile, frame, bit }
    }
}

impl fmt::Debug for BitCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:F{}B{}", self.tile, self.frame, self.bit)
    }
}

impl fmt::Display for BitCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:F{}B{}", self.tile, self.frame, self.bit)
    }
}

impl FromStr for BitCoord {
    type Err = ParseCoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseCoordError::Bit(s.into());
        let (tile, fb) = s.rsplit_once(':').ok_or_else(err)?;
        let tile: TileCoord = tile.parse().map_err(|_| err())?;
        let fb = fb.strip_prefix('F').ok_or_else(err)?;
        let (frame, bit) = fb.split_once('B').ok_or_else(err)?;
        Ok(BitCoord {
            tile,
            frame: frame.parse().map_err(|_| err())?,
            bit: bit.parse().map_err(|_| err())?,
        })
    }
}

/// A bit together with the value it takes when its probe target is active:
/// `inv == false` means the bit gets set, `inv == true` means it gets cleared.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SenseBit {
    pub coord: BitCoord,
    pub inv: bool,
}

impl SenseBit {
    pub fn new(coord: BitCoord, value: bool) -> Self {
        Self { coord, inv: !value }
    }
}

impl fmt::Debug for SenseBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for SenseBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inv {
            write!(f, "!")?;
        }
        write!(f, "{}", self.coord)
    }
}

impl FromStr for SenseBit {
    type Err = ParseCoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('!') {
            Some(rest) => Ok(SenseBit {
                coord: rest.parse()?,
                inv: true,
            }),
            None => Ok(SenseBit {
                coord: s.parse()?,
                inv: false,
            }),
        }
    }
}

macro_rules! serde_via_str {
    ($($ty:ty),*) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }

            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    let s = String::deserialize(deserializer)?;
                    s.parse().map_err(de::Error::custom)
                }
            }
        )*
    };
}

serde_via_str!(TileCoord, BitCoord, SenseBit);
