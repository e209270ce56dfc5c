//! Per-coverage tile configuration.
//!
//! A [`Coverage`] fixes the sample spec, compression, tile size and
//! optional NODATA pixel and palette that every stored tile must share.
//! Callers that keep coverage metadata elsewhere can implement
//! [`TileSpec`] and still use the validity check.

use std::sync::Arc;

use tracing::debug;

use crate::codec::{
    self, EncodeOptions, EncodedTile, Scale, is_valid_dbms_raster_tile, pyramid_spec,
};
use crate::compression::Compression;
use crate::error::{Rl2Error, Rl2Result};
use crate::geometry::{GEOREFERENCING_NONE, Georeference, Point};
use crate::palette::Palette;
use crate::pixel::Pixel;
use crate::raster::Raster;
use crate::sample::{PixelSpec, PixelType};
use crate::stats::RasterStatistics;

pub const MIN_TILE_SIZE: u32 = 256;
pub const MAX_TILE_SIZE: u32 = 1024;
const TILE_SIZE_STEP: u32 = 16;

/// Source of the tile geometry and encoding a stored tile must match
pub trait TileSpec {
    fn tile_width(&self) -> u32;
    fn tile_height(&self) -> u32;
    fn pixel_spec(&self) -> PixelSpec;
    fn compression(&self) -> Compression;

    /// Cheap header check of a stored tile at pyramid `level`
    fn is_valid_tile(&self, level: u32, odd: &[u8], even: Option<&[u8]>) -> bool {
        is_valid_dbms_raster_tile(
            level,
            self.tile_width(),
            self.tile_height(),
            odd,
            even,
            self.pixel_spec(),
            self.compression(),
        )
    }
}

fn check_tile_size(size: u32) -> Rl2Result<()> {
    if !(MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&size) || size % TILE_SIZE_STEP != 0 {
        return Err(Rl2Error::out_of_range(format!(
            "tile size {size} must be a multiple of {TILE_SIZE_STEP} in {MIN_TILE_SIZE}..={MAX_TILE_SIZE}"
        )));
    }
    Ok(())
}

/// A named collection of tiles sharing one spec, compression and tile size
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    name: String,
    spec: PixelSpec,
    compression: Compression,
    quality: u8,
    tile_width: u32,
    tile_height: u32,
    srid: i32,
    resolution: Option<(f64, f64)>,
    nodata: Option<Pixel>,
    palette: Option<Arc<Palette>>,
}

impl Coverage {
    pub fn new(
        name: impl Into<String>,
        spec: PixelSpec,
        compression: Compression,
        tile_width: u32,
        tile_height: u32,
    ) -> Rl2Result<Self> {
        check_tile_size(tile_width)?;
        check_tile_size(tile_height)?;
        compression.check_compatible(&spec)?;
        let defaults = EncodeOptions::default();
        Ok(Self {
            name: name.into(),
            spec,
            compression,
            quality: defaults.quality,
            tile_width,
            tile_height,
            srid: GEOREFERENCING_NONE,
            resolution: None,
            nodata: None,
            palette: None,
        })
    }

    /// Lossy quality used by [`encode_tile`](Self::encode_tile), clamped to 0-100
    #[must_use] pub fn with_quality(mut self, quality: i32) -> Self {
        self.quality = EncodeOptions::default().with_quality(quality).quality;
        self
    }

    /// Base-level SRID and pixel resolution
    pub fn with_georeference(mut self, srid: i32, horz_res: f64, vert_res: f64) -> Rl2Result<Self> {
        Georeference::new(srid, horz_res, vert_res, Point::origin())?;
        self.srid = srid;
        self.resolution = Some((horz_res, vert_res));
        Ok(self)
    }

    pub fn with_nodata(mut self, nodata: Pixel) -> Rl2Result<Self> {
        if nodata.spec() != self.spec {
            return Err(Rl2Error::type_mismatch(format!(
                "{:?} NODATA pixel for a {:?} coverage",
                nodata.spec(),
                self.spec
            )));
        }
        self.nodata = Some(nodata);
        Ok(self)
    }

    /// Palette shared by every tile of a palette coverage
    pub fn with_palette(mut self, palette: impl Into<Arc<Palette>>) -> Rl2Result<Self> {
        if self.spec.pixel_type() != PixelType::Palette {
            return Err(Rl2Error::type_mismatch(format!(
                "{:?} coverages do not carry a palette",
                self.spec.pixel_type()
            )));
        }
        let palette = palette.into();
        let capacity = 1usize << self.spec.sample_type().bits();
        if palette.len() > capacity {
            return Err(Rl2Error::out_of_range(format!(
                "{} palette entries do not fit {:?} indices",
                palette.len(),
                self.spec.sample_type()
            )));
        }
        self.palette = Some(palette);
        Ok(self)
    }

    #[must_use] pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use] pub fn spec(&self) -> PixelSpec {
        self.spec
    }

    #[must_use] pub fn quality(&self) -> u8 {
        self.quality
    }

    #[must_use] pub fn srid(&self) -> i32 {
        self.srid
    }

    #[must_use] pub fn resolution(&self) -> Option<(f64, f64)> {
        self.resolution
    }

    #[must_use] pub fn nodata(&self) -> Option<&Pixel> {
        self.nodata.as_ref()
    }

    #[must_use] pub fn palette(&self) -> Option<&Arc<Palette>> {
        self.palette.as_ref()
    }

    /// Blank pixel of the coverage's spec, e.g. to fill in a NODATA value
    #[must_use] pub fn create_pixel(&self) -> Pixel {
        Pixel::from_spec(self.spec)
    }

    /// Spec and compression of tiles stored at pyramid `level`
    pub fn pyramid_tile_spec(&self, level: u32) -> Rl2Result<(PixelSpec, Compression)> {
        pyramid_spec(level, self.spec, self.compression)
    }

    /// Placement of a tile at pyramid `level` whose upper-left corner is
    /// `upper_left`; fails when the coverage is not georeferenced.
    pub fn tile_georeference(&self, level: u32, upper_left: Point) -> Rl2Result<Georeference> {
        let (horz_res, vert_res) = self
            .resolution
            .ok_or_else(|| Rl2Error::type_mismatch(format!("coverage {} is not georeferenced", self.name)))?;
        let factor = 1u32
            .checked_shl(level)
            .ok_or_else(|| Rl2Error::out_of_range(format!("pyramid level {level}")))?;
        Ok(Georeference::new(self.srid, horz_res, vert_res, upper_left)?.scaled(factor))
    }

    pub fn validate_tile(&self, level: u32, odd: &[u8], even: Option<&[u8]>) -> Rl2Result<()> {
        codec::validate_tile(
            level,
            self.tile_width,
            self.tile_height,
            odd,
            even,
            self.spec,
            self.compression,
        )
    }

    /// Encode a tile-sized raster for pyramid `level`
    pub fn encode_tile(&self, level: u32, raster: &Raster) -> Rl2Result<EncodedTile> {
        let (spec, compression) = self.pyramid_tile_spec(level)?;
        if raster.width() != self.tile_width || raster.height() != self.tile_height {
            return Err(Rl2Error::type_mismatch(format!(
                "{}x{} raster for {}x{} tiles",
                raster.width(),
                raster.height(),
                self.tile_width,
                self.tile_height
            )));
        }
        if raster.spec() != spec {
            return Err(Rl2Error::type_mismatch(format!(
                "{:?} raster for level {level} of a {:?} coverage",
                raster.spec(),
                spec
            )));
        }
        if let (Some(own), Some(tile)) = (&self.palette, raster.palette())
            && own != tile
        {
            return Err(Rl2Error::type_mismatch("raster palette differs from the coverage palette"));
        }
        debug!(coverage = %self.name, level, ?compression, "encoding coverage tile");
        let options = EncodeOptions::default()
            .with_compression(compression)
            .with_quality(i32::from(self.quality));
        codec::encode_with(raster, &options)
    }

    /// Check and decode a stored tile of pyramid `level` at `scale`
    pub fn decode_tile(
        &self,
        level: u32,
        scale: Scale,
        odd: &[u8],
        even: Option<&[u8]>,
    ) -> Rl2Result<Raster> {
        self.validate_tile(level, odd, even)?;
        codec::decode(scale, odd, even, self.level_palette(level))
    }

    /// Statistics of one stored base-level tile, honouring the coverage's
    /// NODATA pixel
    pub fn tile_statistics(&self, odd: &[u8], even: Option<&[u8]>) -> Rl2Result<RasterStatistics> {
        self.validate_tile(0, odd, even)?;
        RasterStatistics::from_tile(odd, even, self.level_palette(0), self.nodata.as_ref())
    }

    fn level_palette(&self, level: u32) -> Option<Arc<Palette>> {
        if level == 0 { self.palette.clone() } else { None }
    }
}

impl TileSpec for Coverage {
    fn tile_width(&self) -> u32 {
        self.tile_width
    }

    fn tile_height(&self) -> u32 {
        self.tile_height
    }

    fn pixel_spec(&self) -> PixelSpec {
        self.spec
    }

    fn compression(&self) -> Compression {
        self.compression
    }
}
