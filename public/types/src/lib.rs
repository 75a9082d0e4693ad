pub mod coord;
pub mod dir;
pub mod image;
pub mod sensedb;

pub use coord::{BitCoord, ParseCoordError, SenseBit, TileCoord};
pub use dir::Direction;
pub use image::ConfigImage;
pub use sensedb::{SenseDb, SenseRecord, StoreError};
