//! Tile codec: converts a [`Raster`](crate::Raster) to and from the
//! odd/even BLOB pair stored per tile.
//!
//! The odd BLOB always exists and carries the header, the main payload and
//! any palette or NODATA section. The even BLOB exists only when the tile
//! has a transparency mask or when multi-byte samples were split into byte
//! planes, and is tied to its odd half by the odd BLOB's checksum.

mod decode;
mod encode;
mod header;

pub use decode::{decode, is_valid_dbms_raster_tile, pyramid_spec, rewrite_palette, validate_tile};
pub use encode::{EncodeOptions, EncodedTile, encode, encode_with};
pub use header::{TileHeader, peek_header};

pub(crate) use decode::decode_tile;

use crate::error::{Rl2Error, Rl2Result};

/// Decode scale, as a reduction ratio of the tile's declared size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scale {
    #[default]
    Full,
    Half,
    Quarter,
    Eighth,
}

impl Scale {
    #[must_use] pub fn factor(self) -> usize {
        match self {
            Scale::Full => 1,
            Scale::Half => 2,
            Scale::Quarter => 4,
            Scale::Eighth => 8,
        }
    }

    pub fn from_factor(factor: u32) -> Rl2Result<Self> {
        match factor {
            1 => Ok(Scale::Full),
            2 => Ok(Scale::Half),
            4 => Ok(Scale::Quarter),
            8 => Ok(Scale::Eighth),
            other => Err(Rl2Error::unsupported(format!("scale 1:{other}"))),
        }
    }

    /// Output dimensions for a `width` x `height` tile at this scale
    #[must_use] pub fn reduce(self, width: usize, height: usize) -> (usize, usize) {
        let f = self.factor();
        (width.div_ceil(f), height.div_ceil(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_reduce() {
        assert_eq!(Scale::Full.reduce(256, 256), (256, 256));
        assert_eq!(Scale::Half.reduce(5, 3), (3, 2));
        assert_eq!(Scale::Quarter.reduce(5, 3), (2, 1));
        assert_eq!(Scale::Eighth.reduce(17, 8), (3, 1));
    }

    #[test]
    fn test_scale_from_factor() {
        assert_eq!(Scale::from_factor(4).unwrap(), Scale::Quarter);
        assert!(matches!(Scale::from_factor(3), Err(Rl2Error::UnsupportedEncoding(_))));
    }
}
