//! In-memory decoded images.
//!
//! [`RasterSource`] is the read-only view the statistics engine scans; it
//! is implemented by [`Raster`] and by the codec's internal decode buffer,
//! so statistics can be built straight from a tile BLOB.

use std::sync::Arc;

use crate::error::{Rl2Error, Rl2Result};
use crate::geometry::{Corner, Extent, GEOREFERENCING_NONE, Georeference, Point};
use crate::palette::Palette;
use crate::pixel::Pixel;
use crate::sample::{PixelSpec, PixelType, SampleType, mask_size};

/// Read access to a decoded pixel grid
pub trait RasterSource: Send + Sync {
    fn spec(&self) -> PixelSpec;
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Host-order bytes of pixel `(x, y)`, `None` outside the grid
    fn pixel_bytes(&self, x: usize, y: usize) -> Option<&[u8]>;

    /// Whether the transparency mask marks `(x, y)`
    fn is_transparent(&self, x: usize, y: usize) -> bool;

    fn bands(&self) -> usize {
        self.spec().bands()
    }

    fn sample(&self, band: usize, x: usize, y: usize) -> Option<f64> {
        let spec = self.spec();
        if band >= spec.bands() {
            return None;
        }
        let bps = spec.sample_type().bytes_per_sample();
        let bytes = self.pixel_bytes(x, y)?;
        Some(spec.sample_type().read_f64(&bytes[band * bps..]))
    }
}

#[inline]
pub(crate) fn mask_bit(mask: &[u8], index: usize) -> bool {
    mask[index / 8] & (0x80 >> (index % 8)) != 0
}

#[inline]
pub(crate) fn set_mask_bit(mask: &mut [u8], index: usize, transparent: bool) {
    let bit = 0x80 >> (index % 8);
    if transparent {
        mask[index / 8] |= bit;
    } else {
        mask[index / 8] &= !bit;
    }
}

/// A width x height pixel grid with its optional mask, palette, NODATA
/// pixel and georeference.
///
/// Samples are stored row-major with bands interleaved, one byte per
/// sample for 1/2/4-bit types and host byte order for wider types.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: u32,
    height: u32,
    spec: PixelSpec,
    buffer: Vec<u8>,
    mask: Option<Vec<u8>>,
    palette: Option<Arc<Palette>>,
    nodata: Option<Pixel>,
    georef: Option<Georeference>,
}

impl Raster {
    /// Wrap `buffer` as a raster of the given geometry.
    ///
    /// Palette-indexed rasters must be built with [`Raster::with_palette`].
    pub fn new(width: u32, height: u32, spec: PixelSpec, buffer: Vec<u8>) -> Rl2Result<Self> {
        if spec.pixel_type() == PixelType::Palette {
            return Err(Rl2Error::type_mismatch(
                "a palette raster needs a palette (use Raster::with_palette)",
            ));
        }
        Self::build(width, height, spec, buffer, None)
    }

    /// Wrap `buffer` as a palette-indexed raster; every index must address
    /// an entry of `palette`.
    pub fn with_palette(
        width: u32,
        height: u32,
        spec: PixelSpec,
        buffer: Vec<u8>,
        palette: impl Into<Arc<Palette>>,
    ) -> Rl2Result<Self> {
        if spec.pixel_type() != PixelType::Palette {
            return Err(Rl2Error::type_mismatch(format!(
                "{:?} rasters do not carry a palette",
                spec.pixel_type()
            )));
        }
        let palette = palette.into();
        check_indices(&buffer, &palette)?;
        Self::build(width, height, spec, buffer, Some(palette))
    }

    fn build(
        width: u32,
        height: u32,
        spec: PixelSpec,
        buffer: Vec<u8>,
        palette: Option<Arc<Palette>>,
    ) -> Rl2Result<Self> {
        if width == 0 || height == 0 {
            return Err(Rl2Error::out_of_range(format!("raster of {width}x{height} pixels")));
        }
        let expected = spec.buffer_size(width as usize, height as usize);
        if buffer.len() != expected {
            return Err(Rl2Error::type_mismatch(format!(
                "pixel buffer holds {} bytes, {width}x{height} {spec:?} needs {expected}",
                buffer.len()
            )));
        }
        if let Some(max) = spec.sample_type().packed_max()
            && let Some(bad) = buffer.iter().find(|&&v| v > max)
        {
            return Err(Rl2Error::out_of_range(format!(
                "sample value {bad} exceeds {max} for {:?}",
                spec.sample_type()
            )));
        }
        Ok(Self {
            width,
            height,
            spec,
            buffer,
            mask: None,
            palette,
            nodata: None,
            georef: None,
        })
    }

    /// 8-bit RGB raster from interleaved `r, g, b` bytes
    pub fn from_rgb(width: u32, height: u32, rgb: Vec<u8>) -> Rl2Result<Self> {
        let spec = PixelSpec::new(SampleType::UInt8, PixelType::Rgb, 3)?;
        Self::new(width, height, spec, rgb)
    }

    /// 8-bit RGB raster from interleaved `r, g, b, a` bytes; an alpha
    /// below 128 marks the pixel transparent.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Rl2Result<Self> {
        let pixels = width as usize * height as usize;
        if rgba.len() != pixels * 4 {
            return Err(Rl2Error::type_mismatch(format!(
                "RGBA buffer holds {} bytes, {width}x{height} needs {}",
                rgba.len(),
                pixels * 4
            )));
        }
        let mut rgb = Vec::with_capacity(pixels * 3);
        let mut mask = vec![0u8; mask_size(width as usize, height as usize)];
        let mut any_transparent = false;
        for (i, px) in rgba.chunks_exact(4).enumerate() {
            rgb.extend_from_slice(&px[..3]);
            if px[3] < 128 {
                set_mask_bit(&mut mask, i, true);
                any_transparent = true;
            }
        }
        let mut raster = Self::from_rgb(width, height, rgb)?;
        if any_transparent {
            raster.mask = Some(mask);
        }
        Ok(raster)
    }

    /// Attach a transparency mask (`ceil(w*h/8)` bytes, set bit = transparent)
    pub fn with_mask(mut self, mask: Vec<u8>) -> Rl2Result<Self> {
        self.set_mask(Some(mask))?;
        Ok(self)
    }

    pub fn with_nodata(mut self, nodata: Pixel) -> Rl2Result<Self> {
        self.set_nodata(Some(nodata))?;
        Ok(self)
    }

    #[must_use] pub fn with_georeference(mut self, georef: Georeference) -> Self {
        self.georef = Some(georef);
        self
    }

    pub fn set_mask(&mut self, mask: Option<Vec<u8>>) -> Rl2Result<()> {
        if let Some(mask) = &mask {
            let expected = mask_size(self.width as usize, self.height as usize);
            if mask.len() != expected {
                return Err(Rl2Error::type_mismatch(format!(
                    "mask holds {} bytes, {}x{} needs {expected}",
                    mask.len(),
                    self.width,
                    self.height
                )));
            }
        }
        self.mask = mask;
        Ok(())
    }

    pub fn set_nodata(&mut self, nodata: Option<Pixel>) -> Rl2Result<()> {
        if let Some(pixel) = &nodata {
            self.check_pixel_spec(pixel)?;
            self.check_palette_index(pixel)?;
        }
        self.nodata = nodata;
        Ok(())
    }

    /// Replace the palette of a palette-indexed raster
    pub fn set_palette(&mut self, palette: impl Into<Arc<Palette>>) -> Rl2Result<()> {
        if self.spec.pixel_type() != PixelType::Palette {
            return Err(Rl2Error::type_mismatch(format!(
                "{:?} rasters do not carry a palette",
                self.spec.pixel_type()
            )));
        }
        let palette = palette.into();
        check_indices(&self.buffer, &palette)?;
        self.palette = Some(palette);
        Ok(())
    }

    #[must_use] pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use] pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use] pub fn spec(&self) -> PixelSpec {
        self.spec
    }

    #[must_use] pub fn sample_type(&self) -> SampleType {
        self.spec.sample_type()
    }

    #[must_use] pub fn pixel_type(&self) -> PixelType {
        self.spec.pixel_type()
    }

    #[must_use] pub fn num_bands(&self) -> u8 {
        self.spec.num_bands()
    }

    #[must_use] pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    #[must_use] pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }

    #[must_use] pub fn mask(&self) -> Option<&[u8]> {
        self.mask.as_deref()
    }

    #[must_use] pub fn palette(&self) -> Option<&Arc<Palette>> {
        self.palette.as_ref()
    }

    #[must_use] pub fn nodata(&self) -> Option<&Pixel> {
        self.nodata.as_ref()
    }

    // ------------------------------------------------------------------
    // Georeferencing
    // ------------------------------------------------------------------

    #[must_use] pub fn georeference(&self) -> Option<&Georeference> {
        self.georef.as_ref()
    }

    /// SRID, or [`GEOREFERENCING_NONE`] when the raster is not georeferenced
    #[must_use] pub fn srid(&self) -> i32 {
        self.georef.map_or(GEOREFERENCING_NONE, |g| g.srid)
    }

    pub fn clear_georeference(&mut self) {
        self.georef = None;
    }

    pub fn set_georeference_center(
        &mut self,
        srid: i32,
        horz_res: f64,
        vert_res: f64,
        center: Point,
    ) -> Rl2Result<()> {
        self.georef = Some(Georeference::from_center(
            srid,
            horz_res,
            vert_res,
            center,
            self.width as usize,
            self.height as usize,
        )?);
        Ok(())
    }

    pub fn set_georeference_corner(
        &mut self,
        srid: i32,
        horz_res: f64,
        vert_res: f64,
        corner: Corner,
        point: Point,
    ) -> Rl2Result<()> {
        self.georef = Some(Georeference::from_corner(
            srid,
            horz_res,
            vert_res,
            corner,
            point,
            self.width as usize,
            self.height as usize,
        )?);
        Ok(())
    }

    pub fn set_georeference_frame(&mut self, srid: i32, frame: Extent) -> Rl2Result<()> {
        self.georef = Some(Georeference::from_frame(
            srid,
            frame,
            self.width as usize,
            self.height as usize,
        )?);
        Ok(())
    }

    #[must_use] pub fn extent(&self) -> Option<Extent> {
        self.georef
            .map(|g| g.extent(self.width as usize, self.height as usize))
    }

    #[must_use] pub fn pixel_to_world(&self, col: f64, row: f64) -> Option<Point> {
        self.georef.map(|g| g.pixel_to_world(col, row))
    }

    #[must_use] pub fn world_to_pixel(&self, p: Point) -> Option<(f64, f64)> {
        self.georef.map(|g| g.world_to_pixel(p))
    }

    // ------------------------------------------------------------------
    // Pixel access
    // ------------------------------------------------------------------

    /// Blank opaque pixel of this raster's spec
    #[must_use] pub fn create_pixel(&self) -> Pixel {
        Pixel::from_spec(self.spec)
    }

    fn check_position(&self, row: u32, col: u32) -> Rl2Result<usize> {
        if row >= self.height || col >= self.width {
            return Err(Rl2Error::out_of_range(format!(
                "pixel ({row}, {col}) outside {}x{}",
                self.width, self.height
            )));
        }
        Ok(row as usize * self.width as usize + col as usize)
    }

    fn check_pixel_spec(&self, pixel: &Pixel) -> Rl2Result<()> {
        if pixel.spec() != self.spec {
            return Err(Rl2Error::type_mismatch(format!(
                "{:?} pixel used with a {:?} raster",
                pixel.spec(),
                self.spec
            )));
        }
        Ok(())
    }

    fn check_palette_index(&self, pixel: &Pixel) -> Rl2Result<()> {
        if let Some(palette) = &self.palette {
            let index = pixel.sample(0)?.as_f64() as usize;
            if index >= palette.len() {
                return Err(Rl2Error::out_of_range(format!(
                    "palette index {index} outside 0..{}",
                    palette.len()
                )));
            }
        }
        Ok(())
    }

    /// Copy pixel `(row, col)` into `pixel`, whose spec must match.
    pub fn get_pixel(&self, row: u32, col: u32, pixel: &mut Pixel) -> Rl2Result<()> {
        let index = self.check_position(row, col)?;
        self.check_pixel_spec(pixel)?;
        let bpp = self.spec.bytes_per_pixel();
        let transparent = self.mask.as_deref().is_some_and(|m| mask_bit(m, index));
        pixel.load_native(&self.buffer[index * bpp..(index + 1) * bpp], transparent);
        Ok(())
    }

    /// Fresh copy of pixel `(row, col)`
    pub fn pixel(&self, row: u32, col: u32) -> Rl2Result<Pixel> {
        let mut pixel = self.create_pixel();
        self.get_pixel(row, col, &mut pixel)?;
        Ok(pixel)
    }

    /// Store `pixel` at `(row, col)`; a transparent pixel sets the mask
    /// bit, creating the mask on first use.
    pub fn set_pixel(&mut self, row: u32, col: u32, pixel: &Pixel) -> Rl2Result<()> {
        let index = self.check_position(row, col)?;
        self.check_pixel_spec(pixel)?;
        self.check_palette_index(pixel)?;

        let bpp = self.spec.bytes_per_pixel();
        self.buffer[index * bpp..(index + 1) * bpp].copy_from_slice(&pixel.native_bytes());
        if pixel.is_transparent() && self.mask.is_none() {
            self.mask = Some(vec![0u8; mask_size(self.width as usize, self.height as usize)]);
        }
        if let Some(mask) = &mut self.mask {
            set_mask_bit(mask, index, pixel.is_transparent());
        }
        Ok(())
    }

    /// Whether `(row, col)` is masked out or equal to the NODATA pixel
    pub fn is_nodata_at(&self, row: u32, col: u32) -> Rl2Result<bool> {
        let index = self.check_position(row, col)?;
        if self.mask.as_deref().is_some_and(|m| mask_bit(m, index)) {
            return Ok(true);
        }
        Ok(self.nodata.as_ref().is_some_and(|nodata| {
            let bpp = self.spec.bytes_per_pixel();
            nodata.native_bytes() == self.buffer[index * bpp..(index + 1) * bpp]
        }))
    }
}

fn check_indices(buffer: &[u8], palette: &Palette) -> Rl2Result<()> {
    if let Some(&bad) = buffer.iter().find(|&&v| usize::from(v) >= palette.len()) {
        return Err(Rl2Error::out_of_range(format!(
            "palette index {bad} outside 0..{}",
            palette.len()
        )));
    }
    Ok(())
}

impl RasterSource for Raster {
    fn spec(&self) -> PixelSpec {
        self.spec
    }

    fn width(&self) -> usize {
        self.width as usize
    }

    fn height(&self) -> usize {
        self.height as usize
    }

    fn pixel_bytes(&self, x: usize, y: usize) -> Option<&[u8]> {
        if x >= self.width as usize || y >= self.height as usize {
            return None;
        }
        let bpp = self.spec.bytes_per_pixel();
        let start = (y * self.width as usize + x) * bpp;
        Some(&self.buffer[start..start + bpp])
    }

    fn is_transparent(&self, x: usize, y: usize) -> bool {
        self.mask
            .as_deref()
            .is_some_and(|m| mask_bit(m, y * self.width as usize + x))
    }
}
