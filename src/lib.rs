//! # rasterlite - Raster tile codec and statistics engine
//!
//! Encodes geo-referenced raster tiles into the compact BLOB pairs stored
//! per tile of a raster coverage, decodes them back at full or reduced
//! resolution, and builds mergeable per-band statistics.
//!
//! ## Features
//!
//! - **Typed pixels**: 1/2/4-bit, 8/16/32-bit integer, float and double
//!   samples as monochrome, palette, grayscale, RGB, multiband or data-grid
//! - **Tile format**: odd/even BLOB pair with an explicit byte-order flag
//!   and CRC32 framing on every BLOB
//! - **Compression**: DEFLATE, LZMA, LZW, ZSTD, PNG, GIF, JPEG, WEBP and
//!   CCITT Group 3/4
//! - **Reduced scales**: decode at 1:1, 1:2, 1:4 or 1:8 without building
//!   the full-resolution buffer first
//! - **Statistics**: per-band min/max/mean/variance and histograms that
//!   merge across tiles in any order
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rasterlite::{Compression, PixelSpec, PixelType, Raster, RasterStatistics, SampleType, Scale};
//!
//! let spec = PixelSpec::new(SampleType::UInt8, PixelType::Grayscale, 1)?;
//! let raster = Raster::new(2, 2, spec, vec![10, 20, 30, 40])?;
//!
//! let tile = rasterlite::encode(&raster, Compression::Deflate, 80)?;
//! let half = rasterlite::decode(Scale::Half, &tile.odd, tile.even(), None)?;
//! assert_eq!((half.width(), half.height()), (1, 1));
//!
//! let stats = RasterStatistics::from_tile(&tile.odd, tile.even(), None, None)?;
//! println!("mean = {}", stats.band_summary(0)?.mean);
//! ```
//!
//! ## Architecture
//!
//! - [`sample`], [`pixel`], [`palette`]: the pixel data model
//! - [`raster`]: in-memory rasters and the [`RasterSource`] read trait
//! - [`geometry`]: georeferencing ([`Georeference`], [`Extent`], [`Point`])
//! - [`compression`]: compression kinds and the pixel-spec compatibility matrix
//! - [`codec`]: tile encode/decode, validity check and palette rewrite
//! - [`stats`]: mergeable raster statistics
//! - [`coverage`]: per-coverage tile configuration via [`TileSpec`]

// ============================================================================
// Public modules
// ============================================================================

pub mod codec;
pub mod compression;
pub mod coverage;
pub mod error;
pub mod geometry;
pub mod palette;
pub mod pixel;
pub mod raster;
pub mod sample;
pub mod stats;

mod blob;
mod ccitt;
mod container;
mod convert;

// ============================================================================
// Errors
// ============================================================================

pub use error::{Rl2Error, Rl2Result};

// ============================================================================
// Pixel Model
// ============================================================================

pub use sample::{
    Endianness,
    PixelSpec,
    PixelType,
    SampleType,
    mask_size,
};
pub use pixel::{Pixel, Sample};
pub use palette::{MAX_PALETTE_ENTRIES, Palette, PaletteEntry};

// ============================================================================
// Rasters & Georeferencing
// ============================================================================

pub use raster::{Raster, RasterSource};
pub use geometry::{
    Corner,
    Extent,
    GEOREFERENCING_NONE,
    Georeference,
    Point,
};

// ============================================================================
// Tile Codec
// ============================================================================

pub use compression::Compression;
pub use codec::{
    EncodeOptions,
    EncodedTile,
    Scale,
    TileHeader,
    decode,
    encode,
    encode_with,
    is_valid_dbms_raster_tile,
    peek_header,
    rewrite_palette,
    validate_tile,
};
pub use blob::crc32;

// ============================================================================
// Statistics
// ============================================================================

pub use stats::{
    BandSummary,
    RasterStatistics,
    StatisticsSummary,
    VarianceFragment,
};

// ============================================================================
// Coverage
// ============================================================================

pub use coverage::{Coverage, TileSpec};
