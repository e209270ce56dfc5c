//! Channel conversions: interleaved 8-bit color exports, raw per-type
//! sample arrays and band extraction.
//!
//! Every export allocates a fresh, tightly packed array; the raster is
//! never modified.

use crate::error::{Rl2Error, Rl2Result};
use crate::pixel::Pixel;
use crate::raster::{Raster, RasterSource};
use crate::sample::{PixelType, SampleType};

/// Pack one-byte-per-sample rows into row-padded, MSB-first packed rows
pub(crate) fn pack_rows(samples: &[u8], samples_per_row: usize, bits: u32) -> Vec<u8> {
    let bits = bits as usize;
    let row_bytes = (samples_per_row * bits).div_ceil(8);
    let rows = samples.len().checked_div(samples_per_row).unwrap_or(0);
    let mut out = vec![0u8; row_bytes * rows];
    for (row, packed) in samples
        .chunks_exact(samples_per_row)
        .zip(out.chunks_exact_mut(row_bytes))
    {
        for (i, &value) in row.iter().enumerate() {
            let bit = i * bits;
            packed[bit / 8] |= value << (8 - bits - bit % 8);
        }
    }
    out
}

/// Inverse of [`pack_rows`]
pub(crate) fn unpack_rows(packed: &[u8], samples_per_row: usize, rows: usize, bits: u32) -> Vec<u8> {
    let bits = bits as usize;
    let row_bytes = (samples_per_row * bits).div_ceil(8);
    let mask = ((1u16 << bits) - 1) as u8;
    let mut out = Vec::with_capacity(samples_per_row * rows);
    for row in packed.chunks_exact(row_bytes).take(rows) {
        for i in 0..samples_per_row {
            let bit = i * bits;
            out.push((row[bit / 8] >> (8 - bits - bit % 8)) & mask);
        }
    }
    out
}

#[derive(Clone, Copy)]
enum ColorOrder {
    Rgb,
    Rgba,
    Argb,
    Bgr,
    Bgra,
}

impl ColorOrder {
    fn channels(self) -> usize {
        match self {
            ColorOrder::Rgb | ColorOrder::Bgr => 3,
            ColorOrder::Rgba | ColorOrder::Argb | ColorOrder::Bgra => 4,
        }
    }
}

impl Raster {
    /// Map pixel `index` to an 8-bit color
    fn color_at(&self, index: usize) -> (u8, u8, u8) {
        let spec = self.spec();
        let buffer = self.buffer();
        match (spec.pixel_type(), spec.sample_type()) {
            (PixelType::Monochrome, _) => {
                if buffer[index] == 0 {
                    (255, 255, 255)
                } else {
                    (0, 0, 0)
                }
            }
            (PixelType::Palette, _) => {
                let entry = self
                    .palette()
                    .and_then(|p| p.entries().get(usize::from(buffer[index])).copied())
                    .unwrap_or_default();
                (entry.red, entry.green, entry.blue)
            }
            (PixelType::Grayscale, SampleType::UInt16) => {
                let v = gray16_to_8(buffer, index);
                (v, v, v)
            }
            (PixelType::Grayscale, sample) => {
                let max = u16::from(sample.packed_max().unwrap_or(255));
                let v = (u16::from(buffer[index]) * 255 / max) as u8;
                (v, v, v)
            }
            (PixelType::Rgb, SampleType::UInt16) => (
                gray16_to_8(buffer, index * 3),
                gray16_to_8(buffer, index * 3 + 1),
                gray16_to_8(buffer, index * 3 + 2),
            ),
            _ => (buffer[index * 3], buffer[index * 3 + 1], buffer[index * 3 + 2]),
        }
    }

    fn export_color(&self, order: ColorOrder) -> Rl2Result<Vec<u8>> {
        if matches!(self.pixel_type(), PixelType::DataGrid | PixelType::Multiband) {
            return Err(Rl2Error::type_mismatch(format!(
                "{:?} rasters have no color interpretation",
                self.pixel_type()
            )));
        }
        let (w, h) = (RasterSource::width(self), RasterSource::height(self));
        let nodata = self.nodata().map(Pixel::native_bytes);
        let mut out = Vec::with_capacity(w * h * order.channels());
        for y in 0..h {
            for x in 0..w {
                let index = y * w + x;
                let (r, g, b) = self.color_at(index);
                let is_nodata = nodata
                    .as_deref()
                    .is_some_and(|nd| self.pixel_bytes(x, y) == Some(nd));
                let a = if self.is_transparent(x, y) || is_nodata {
                    0
                } else {
                    255
                };
                match order {
                    ColorOrder::Rgb => out.extend_from_slice(&[r, g, b]),
                    ColorOrder::Rgba => out.extend_from_slice(&[r, g, b, a]),
                    ColorOrder::Argb => out.extend_from_slice(&[a, r, g, b]),
                    ColorOrder::Bgr => out.extend_from_slice(&[b, g, r]),
                    ColorOrder::Bgra => out.extend_from_slice(&[b, g, r, a]),
                }
            }
        }
        Ok(out)
    }

    /// Interleaved 8-bit `r, g, b`
    pub fn to_rgb(&self) -> Rl2Result<Vec<u8>> {
        self.export_color(ColorOrder::Rgb)
    }

    /// Interleaved 8-bit `r, g, b, a`; masked and NODATA pixels get alpha 0
    pub fn to_rgba(&self) -> Rl2Result<Vec<u8>> {
        self.export_color(ColorOrder::Rgba)
    }

    pub fn to_argb(&self) -> Rl2Result<Vec<u8>> {
        self.export_color(ColorOrder::Argb)
    }

    pub fn to_bgr(&self) -> Rl2Result<Vec<u8>> {
        self.export_color(ColorOrder::Bgr)
    }

    pub fn to_bgra(&self) -> Rl2Result<Vec<u8>> {
        self.export_color(ColorOrder::Bgra)
    }

    fn expect_sample(&self, expected: SampleType) -> Rl2Result<()> {
        if self.sample_type() != expected {
            return Err(Rl2Error::type_mismatch(format!(
                "{expected:?} export from a {:?} raster",
                self.sample_type()
            )));
        }
        Ok(())
    }

    fn export_packed(&self, expected: SampleType) -> Rl2Result<Vec<u8>> {
        self.expect_sample(expected)?;
        Ok(pack_rows(
            self.buffer(),
            self.width() as usize,
            expected.bits(),
        ))
    }

    fn export_typed<T, const N: usize>(
        &self,
        expected: SampleType,
        from_ne: fn([u8; N]) -> T,
    ) -> Rl2Result<Vec<T>> {
        self.expect_sample(expected)?;
        Ok(self
            .buffer()
            .chunks_exact(N)
            .map(|chunk| {
                let mut raw = [0u8; N];
                raw.copy_from_slice(chunk);
                from_ne(raw)
            })
            .collect())
    }

    /// Packed 1-bit rows, each padded to a whole byte
    pub fn to_1bit(&self) -> Rl2Result<Vec<u8>> {
        self.export_packed(SampleType::Bit1)
    }

    /// Packed 2-bit rows, each padded to a whole byte
    pub fn to_2bit(&self) -> Rl2Result<Vec<u8>> {
        self.export_packed(SampleType::Bit2)
    }

    /// Packed 4-bit rows (high nibble first), each padded to a whole byte
    pub fn to_4bit(&self) -> Rl2Result<Vec<u8>> {
        self.export_packed(SampleType::Bit4)
    }

    pub fn to_int8(&self) -> Rl2Result<Vec<i8>> {
        self.export_typed(SampleType::Int8, i8::from_ne_bytes)
    }

    /// All bands interleaved
    pub fn to_uint8(&self) -> Rl2Result<Vec<u8>> {
        self.export_typed(SampleType::UInt8, u8::from_ne_bytes)
    }

    pub fn to_int16(&self) -> Rl2Result<Vec<i16>> {
        self.export_typed(SampleType::Int16, i16::from_ne_bytes)
    }

    /// All bands interleaved
    pub fn to_uint16(&self) -> Rl2Result<Vec<u16>> {
        self.export_typed(SampleType::UInt16, u16::from_ne_bytes)
    }

    pub fn to_int32(&self) -> Rl2Result<Vec<i32>> {
        self.export_typed(SampleType::Int32, i32::from_ne_bytes)
    }

    pub fn to_uint32(&self) -> Rl2Result<Vec<u32>> {
        self.export_typed(SampleType::UInt32, u32::from_ne_bytes)
    }

    pub fn to_float(&self) -> Rl2Result<Vec<f32>> {
        self.export_typed(SampleType::Float32, f32::from_ne_bytes)
    }

    pub fn to_double(&self) -> Rl2Result<Vec<f64>> {
        self.export_typed(SampleType::Float64, f64::from_ne_bytes)
    }

    fn check_band_source(&self, expected: SampleType, bands: &[usize]) -> Rl2Result<()> {
        if !matches!(self.pixel_type(), PixelType::Rgb | PixelType::Multiband) {
            return Err(Rl2Error::type_mismatch(format!(
                "band extraction from a {:?} raster",
                self.pixel_type()
            )));
        }
        self.expect_sample(expected)?;
        let num_bands = usize::from(self.num_bands());
        if let Some(&bad) = bands.iter().find(|&&b| b >= num_bands) {
            return Err(Rl2Error::out_of_range(format!(
                "band {bad} of a {num_bands}-band raster"
            )));
        }
        Ok(())
    }

    /// One band of an 8-bit RGB or multiband raster
    pub fn band_to_uint8(&self, band: usize) -> Rl2Result<Vec<u8>> {
        self.check_band_source(SampleType::UInt8, &[band])?;
        let num_bands = usize::from(self.num_bands());
        Ok(self
            .buffer()
            .chunks_exact(num_bands)
            .map(|px| px[band])
            .collect())
    }

    /// One band of a 16-bit RGB or multiband raster
    pub fn band_to_uint16(&self, band: usize) -> Rl2Result<Vec<u16>> {
        self.check_band_source(SampleType::UInt16, &[band])?;
        let stride = usize::from(self.num_bands()) * 2;
        Ok(self
            .buffer()
            .chunks_exact(stride)
            .map(|px| u16::from_ne_bytes([px[band * 2], px[band * 2 + 1]]))
            .collect())
    }

    /// Interleaved `r, g, b` assembled from three bands of an 8-bit raster
    pub fn bands_to_rgb(&self, red: usize, green: usize, blue: usize) -> Rl2Result<Vec<u8>> {
        self.check_band_source(SampleType::UInt8, &[red, green, blue])?;
        let num_bands = usize::from(self.num_bands());
        let mut out = Vec::with_capacity(self.buffer().len() / num_bands * 3);
        for px in self.buffer().chunks_exact(num_bands) {
            out.extend_from_slice(&[px[red], px[green], px[blue]]);
        }
        Ok(out)
    }

    /// Interleaved 16-bit `r, g, b` assembled from three bands
    pub fn bands_to_rgb_uint16(&self, red: usize, green: usize, blue: usize) -> Rl2Result<Vec<u16>> {
        self.check_band_source(SampleType::UInt16, &[red, green, blue])?;
        let stride = usize::from(self.num_bands()) * 2;
        let mut out = Vec::with_capacity(self.buffer().len() / stride * 3);
        for px in self.buffer().chunks_exact(stride) {
            for band in [red, green, blue] {
                out.push(u16::from_ne_bytes([px[band * 2], px[band * 2 + 1]]));
            }
        }
        Ok(out)
    }
}

fn gray16_to_8(buffer: &[u8], sample: usize) -> u8 {
    (u16::from_ne_bytes([buffer[sample * 2], buffer[sample * 2 + 1]]) >> 8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::Palette;
    use crate::sample::PixelSpec;

    #[test]
    fn test_pack_unpack_rows() {
        // 3 x 2 grid of 4-bit samples: each row pads to 2 bytes
        let samples = [1, 2, 3, 4, 5, 6];
        let packed = pack_rows(&samples, 3, 4);
        assert_eq!(packed, vec![0x12, 0x30, 0x45, 0x60]);
        assert_eq!(unpack_rows(&packed, 3, 2, 4), samples);

        let bits = [1, 0, 1, 1, 0, 0, 0, 0, 1];
        let packed = pack_rows(&bits, 9, 1);
        assert_eq!(packed, vec![0b1011_0000, 0b1000_0000]);
        assert_eq!(unpack_rows(&packed, 9, 1, 1), bits);
    }

    #[test]
    fn test_rgb_exports_order() {
        let raster = Raster::from_rgb(1, 1, vec![10, 20, 30]).unwrap();
        assert_eq!(raster.to_rgb().unwrap(), vec![10, 20, 30]);
        assert_eq!(raster.to_rgba().unwrap(), vec![10, 20, 30, 255]);
        assert_eq!(raster.to_argb().unwrap(), vec![255, 10, 20, 30]);
        assert_eq!(raster.to_bgr().unwrap(), vec![30, 20, 10]);
        assert_eq!(raster.to_bgra().unwrap(), vec![30, 20, 10, 255]);
    }

    #[test]
    fn test_rgba_alpha_from_mask() {
        let raster = Raster::from_rgba(2, 1, &[1, 1, 1, 255, 2, 2, 2, 10]).unwrap();
        assert_eq!(raster.to_rgba().unwrap(), vec![1, 1, 1, 255, 2, 2, 2, 0]);
    }

    #[test]
    fn test_monochrome_and_palette_colors() {
        let mono = PixelSpec::new(SampleType::Bit1, PixelType::Monochrome, 1).unwrap();
        let raster = Raster::new(2, 1, mono, vec![0, 1]).unwrap();
        assert_eq!(raster.to_rgb().unwrap(), vec![255, 255, 255, 0, 0, 0]);

        let mut palette = Palette::new(2).unwrap();
        palette.set_color(1, 200, 100, 0).unwrap();
        let spec = PixelSpec::new(SampleType::Bit1, PixelType::Palette, 1).unwrap();
        let raster = Raster::with_palette(2, 1, spec, vec![1, 0], palette).unwrap();
        assert_eq!(raster.to_rgb().unwrap(), vec![200, 100, 0, 0, 0, 0]);
    }

    #[test]
    fn test_gray_scaling() {
        let spec = PixelSpec::new(SampleType::Bit2, PixelType::Grayscale, 1).unwrap();
        let raster = Raster::new(2, 1, spec, vec![3, 1]).unwrap();
        assert_eq!(raster.to_rgb().unwrap(), vec![255, 255, 255, 85, 85, 85]);

        let spec = PixelSpec::new(SampleType::UInt16, PixelType::Grayscale, 1).unwrap();
        let raster = Raster::new(1, 1, spec, 0xAB12u16.to_ne_bytes().to_vec()).unwrap();
        assert_eq!(raster.to_rgb().unwrap(), vec![0xAB, 0xAB, 0xAB]);
    }

    #[test]
    fn test_nodata_alpha() {
        let spec = PixelSpec::new(SampleType::UInt8, PixelType::Grayscale, 1).unwrap();
        let nodata = Pixel::from_spec(spec);
        let raster = Raster::new(2, 1, spec, vec![0, 9])
            .unwrap()
            .with_nodata(nodata)
            .unwrap();
        assert_eq!(raster.to_rgba().unwrap(), vec![0, 0, 0, 0, 9, 9, 9, 255]);
    }

    #[test]
    fn test_datagrid_rejects_color() {
        let spec = PixelSpec::new(SampleType::Float32, PixelType::DataGrid, 1).unwrap();
        let raster = Raster::new(1, 1, spec, 1.0f32.to_ne_bytes().to_vec()).unwrap();
        assert!(matches!(raster.to_rgb(), Err(Rl2Error::TypeMismatch(_))));
        assert_eq!(raster.to_float().unwrap(), vec![1.0]);
        assert!(matches!(raster.to_double(), Err(Rl2Error::TypeMismatch(_))));
    }

    #[test]
    fn test_typed_exports() {
        let spec = PixelSpec::new(SampleType::Int16, PixelType::DataGrid, 1).unwrap();
        let mut buffer = Vec::new();
        for v in [-5i16, 300] {
            buffer.extend_from_slice(&v.to_ne_bytes());
        }
        let raster = Raster::new(2, 1, spec, buffer).unwrap();
        assert_eq!(raster.to_int16().unwrap(), vec![-5, 300]);

        let spec = PixelSpec::new(SampleType::Bit4, PixelType::Grayscale, 1).unwrap();
        let raster = Raster::new(3, 1, spec, vec![0xA, 0xB, 0xC]).unwrap();
        assert_eq!(raster.to_4bit().unwrap(), vec![0xAB, 0xC0]);
        assert!(raster.to_1bit().is_err());
    }

    #[test]
    fn test_band_extraction() {
        let spec = PixelSpec::new(SampleType::UInt8, PixelType::Multiband, 4).unwrap();
        let raster = Raster::new(2, 1, spec, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(raster.band_to_uint8(2).unwrap(), vec![3, 7]);
        assert_eq!(raster.bands_to_rgb(3, 1, 0).unwrap(), vec![4, 2, 1, 8, 6, 5]);
        assert!(matches!(raster.band_to_uint8(4), Err(Rl2Error::OutOfRange(_))));
        assert!(matches!(raster.band_to_uint16(0), Err(Rl2Error::TypeMismatch(_))));

        let spec = PixelSpec::new(SampleType::UInt16, PixelType::Multiband, 2).unwrap();
        let mut buffer = Vec::new();
        for v in [100u16, 200, 300, 400] {
            buffer.extend_from_slice(&v.to_ne_bytes());
        }
        let raster = Raster::new(2, 1, spec, buffer).unwrap();
        assert_eq!(raster.band_to_uint16(1).unwrap(), vec![200, 400]);
        assert_eq!(
            raster.bands_to_rgb_uint16(1, 0, 1).unwrap(),
            vec![200, 100, 200, 400, 300, 400]
        );

        let gray = PixelSpec::new(SampleType::UInt8, PixelType::Grayscale, 1).unwrap();
        let raster = Raster::new(1, 1, gray, vec![0]).unwrap();
        assert!(matches!(raster.band_to_uint8(0), Err(Rl2Error::TypeMismatch(_))));
    }
}
