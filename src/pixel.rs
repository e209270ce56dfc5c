//! Single sample-tuple values.
//!
//! A [`Pixel`] stores its samples as the tagged [`Sample`] variant, so a
//! typed accessor can only ever read back the encoding it was created
//! with: asking a `UInt16` pixel for an 8-bit sample is a
//! [`Rl2Error::TypeMismatch`], never a byte reinterpretation.

use crate::blob::{BlobReader, BlobWriter, verify_trailing_crc};
use crate::error::{Rl2Error, Rl2Result};
use crate::sample::{Endianness, PixelSpec, PixelType, SampleType};

const PIXEL_START: u8 = 0x03;

/// One sample value tagged with its storage encoding
#[derive(Debug, Clone, Copy)]
pub enum Sample {
    Bit1(u8),
    Bit2(u8),
    Bit4(u8),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float32(f32),
    Float64(f64),
}

impl Sample {
    /// Zero value of the given encoding
    #[must_use] pub fn zero(sample_type: SampleType) -> Self {
        match sample_type {
            SampleType::Bit1 => Sample::Bit1(0),
            SampleType::Bit2 => Sample::Bit2(0),
            SampleType::Bit4 => Sample::Bit4(0),
            SampleType::Int8 => Sample::Int8(0),
            SampleType::UInt8 => Sample::UInt8(0),
            SampleType::Int16 => Sample::Int16(0),
            SampleType::UInt16 => Sample::UInt16(0),
            SampleType::Int32 => Sample::Int32(0),
            SampleType::UInt32 => Sample::UInt32(0),
            SampleType::Float32 => Sample::Float32(0.0),
            SampleType::Float64 => Sample::Float64(0.0),
        }
    }

    #[must_use] pub fn sample_type(&self) -> SampleType {
        match self {
            Sample::Bit1(_) => SampleType::Bit1,
            Sample::Bit2(_) => SampleType::Bit2,
            Sample::Bit4(_) => SampleType::Bit4,
            Sample::Int8(_) => SampleType::Int8,
            Sample::UInt8(_) => SampleType::UInt8,
            Sample::Int16(_) => SampleType::Int16,
            Sample::UInt16(_) => SampleType::UInt16,
            Sample::Int32(_) => SampleType::Int32,
            Sample::UInt32(_) => SampleType::UInt32,
            Sample::Float32(_) => SampleType::Float32,
            Sample::Float64(_) => SampleType::Float64,
        }
    }

    #[must_use] pub fn as_f64(&self) -> f64 {
        match *self {
            Sample::Bit1(v) | Sample::Bit2(v) | Sample::Bit4(v) | Sample::UInt8(v) => f64::from(v),
            Sample::Int8(v) => f64::from(v),
            Sample::Int16(v) => f64::from(v),
            Sample::UInt16(v) => f64::from(v),
            Sample::Int32(v) => f64::from(v),
            Sample::UInt32(v) => f64::from(v),
            Sample::Float32(v) => f64::from(v),
            Sample::Float64(v) => v,
        }
    }

    /// Reject packed values that do not fit their bit width
    pub fn validate(&self) -> Rl2Result<()> {
        let (value, max) = match *self {
            Sample::Bit1(v) => (v, 1),
            Sample::Bit2(v) => (v, 3),
            Sample::Bit4(v) => (v, 15),
            _ => return Ok(()),
        };
        if value > max {
            return Err(Rl2Error::out_of_range(format!(
                "{value} does not fit a {:?} sample (0..={max})",
                self.sample_type()
            )));
        }
        Ok(())
    }

    /// Write the sample in host byte order into `out`
    pub(crate) fn write_ne(&self, out: &mut [u8]) {
        match *self {
            Sample::Bit1(v) | Sample::Bit2(v) | Sample::Bit4(v) | Sample::UInt8(v) => out[0] = v,
            Sample::Int8(v) => out[0] = v as u8,
            Sample::Int16(v) => out[..2].copy_from_slice(&v.to_ne_bytes()),
            Sample::UInt16(v) => out[..2].copy_from_slice(&v.to_ne_bytes()),
            Sample::Int32(v) => out[..4].copy_from_slice(&v.to_ne_bytes()),
            Sample::UInt32(v) => out[..4].copy_from_slice(&v.to_ne_bytes()),
            Sample::Float32(v) => out[..4].copy_from_slice(&v.to_ne_bytes()),
            Sample::Float64(v) => out[..8].copy_from_slice(&v.to_ne_bytes()),
        }
    }

    /// Read one host-order sample of type `sample_type` from `bytes`
    pub(crate) fn read_ne(sample_type: SampleType, bytes: &[u8]) -> Self {
        match sample_type {
            SampleType::Bit1 => Sample::Bit1(bytes[0]),
            SampleType::Bit2 => Sample::Bit2(bytes[0]),
            SampleType::Bit4 => Sample::Bit4(bytes[0]),
            SampleType::Int8 => Sample::Int8(bytes[0] as i8),
            SampleType::UInt8 => Sample::UInt8(bytes[0]),
            SampleType::Int16 => Sample::Int16(i16::from_ne_bytes([bytes[0], bytes[1]])),
            SampleType::UInt16 => Sample::UInt16(u16::from_ne_bytes([bytes[0], bytes[1]])),
            SampleType::Int32 => {
                Sample::Int32(i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            SampleType::UInt32 => {
                Sample::UInt32(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            SampleType::Float32 => {
                Sample::Float32(f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            SampleType::Float64 => Sample::Float64(f64::from_ne_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ])),
        }
    }

    /// Raw bit pattern, widened to u64 (floats compare by bits)
    fn bits(&self) -> u64 {
        match *self {
            Sample::Bit1(v) | Sample::Bit2(v) | Sample::Bit4(v) | Sample::UInt8(v) => u64::from(v),
            Sample::Int8(v) => u64::from(v as u8),
            Sample::Int16(v) => u64::from(v as u16),
            Sample::UInt16(v) => u64::from(v),
            Sample::Int32(v) => u64::from(v as u32),
            Sample::UInt32(v) => u64::from(v),
            Sample::Float32(v) => u64::from(v.to_bits()),
            Sample::Float64(v) => v.to_bits(),
        }
    }
}

// Bitwise equality keeps NaN NODATA values matchable.
impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.sample_type() == other.sample_type() && self.bits() == other.bits()
    }
}

impl Eq for Sample {}

/// A single pixel: one sample per band plus a transparency flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pixel {
    spec: PixelSpec,
    samples: Vec<Sample>,
    transparent: bool,
}

impl Pixel {
    /// Create a zero-valued opaque pixel
    pub fn new(sample_type: SampleType, pixel_type: PixelType, num_bands: u8) -> Rl2Result<Self> {
        Ok(Self::from_spec(PixelSpec::new(sample_type, pixel_type, num_bands)?))
    }

    #[must_use] pub fn from_spec(spec: PixelSpec) -> Self {
        Self {
            spec,
            samples: vec![Sample::zero(spec.sample_type()); spec.bands()],
            transparent: false,
        }
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

    #[must_use] pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[must_use] pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    pub fn set_transparent(&mut self, transparent: bool) {
        self.transparent = transparent;
    }

    /// Structural equality: spec, every sample and the transparency flag
    #[must_use] pub fn compare(&self, other: &Pixel) -> bool {
        self == other
    }

    /// Same spec and samples, ignoring transparency
    #[must_use] pub fn same_samples(&self, other: &Pixel) -> bool {
        self.spec == other.spec && self.samples == other.samples
    }

    fn check_band(&self, band: usize) -> Rl2Result<()> {
        if band >= self.samples.len() {
            return Err(Rl2Error::out_of_range(format!(
                "band {band} of a {}-band pixel",
                self.samples.len()
            )));
        }
        Ok(())
    }

    fn check_type(&self, expected: SampleType) -> Rl2Result<()> {
        if self.sample_type() != expected {
            return Err(Rl2Error::type_mismatch(format!(
                "{expected:?} access on a {:?} pixel",
                self.sample_type()
            )));
        }
        Ok(())
    }

    /// Sample of `band`, whatever its encoding
    pub fn sample(&self, band: usize) -> Rl2Result<Sample> {
        self.check_band(band)?;
        Ok(self.samples[band])
    }

    /// Replace the sample of `band`; the variant must match the pixel's
    /// sample type and packed values must fit their bit width.
    pub fn set_sample(&mut self, band: usize, sample: Sample) -> Rl2Result<()> {
        self.check_band(band)?;
        self.check_type(sample.sample_type())?;
        sample.validate()?;
        self.samples[band] = sample;
        Ok(())
    }

    pub fn sample_1bit(&self) -> Rl2Result<u8> {
        match self.typed(SampleType::Bit1, 0)? {
            Sample::Bit1(v) => Ok(v),
            _ => unreachable!("checked by typed()"),
        }
    }

    pub fn set_sample_1bit(&mut self, value: u8) -> Rl2Result<()> {
        self.set_sample(0, Sample::Bit1(value))
    }

    pub fn sample_2bit(&self) -> Rl2Result<u8> {
        match self.typed(SampleType::Bit2, 0)? {
            Sample::Bit2(v) => Ok(v),
            _ => unreachable!("checked by typed()"),
        }
    }

    pub fn set_sample_2bit(&mut self, value: u8) -> Rl2Result<()> {
        self.set_sample(0, Sample::Bit2(value))
    }

    pub fn sample_4bit(&self) -> Rl2Result<u8> {
        match self.typed(SampleType::Bit4, 0)? {
            Sample::Bit4(v) => Ok(v),
            _ => unreachable!("checked by typed()"),
        }
    }

    pub fn set_sample_4bit(&mut self, value: u8) -> Rl2Result<()> {
        self.set_sample(0, Sample::Bit4(value))
    }

    pub fn sample_int8(&self) -> Rl2Result<i8> {
        match self.typed(SampleType::Int8, 0)? {
            Sample::Int8(v) => Ok(v),
            _ => unreachable!("checked by typed()"),
        }
    }

    pub fn set_sample_int8(&mut self, value: i8) -> Rl2Result<()> {
        self.set_sample(0, Sample::Int8(value))
    }

    pub fn sample_uint8(&self, band: usize) -> Rl2Result<u8> {
        match self.typed(SampleType::UInt8, band)? {
            Sample::UInt8(v) => Ok(v),
            _ => unreachable!("checked by typed()"),
        }
    }

    pub fn set_sample_uint8(&mut self, band: usize, value: u8) -> Rl2Result<()> {
        self.set_sample(band, Sample::UInt8(value))
    }

    pub fn sample_int16(&self) -> Rl2Result<i16> {
        match self.typed(SampleType::Int16, 0)? {
            Sample::Int16(v) => Ok(v),
            _ => unreachable!("checked by typed()"),
        }
    }

    pub fn set_sample_int16(&mut self, value: i16) -> Rl2Result<()> {
        self.set_sample(0, Sample::Int16(value))
    }

    pub fn sample_uint16(&self, band: usize) -> Rl2Result<u16> {
        match self.typed(SampleType::UInt16, band)? {
            Sample::UInt16(v) => Ok(v),
            _ => unreachable!("checked by typed()"),
        }
    }

    pub fn set_sample_uint16(&mut self, band: usize, value: u16) -> Rl2Result<()> {
        self.set_sample(band, Sample::UInt16(value))
    }

    pub fn sample_int32(&self) -> Rl2Result<i32> {
        match self.typed(SampleType::Int32, 0)? {
            Sample::Int32(v) => Ok(v),
            _ => unreachable!("checked by typed()"),
        }
    }

    pub fn set_sample_int32(&mut self, value: i32) -> Rl2Result<()> {
        self.set_sample(0, Sample::Int32(value))
    }

    pub fn sample_uint32(&self) -> Rl2Result<u32> {
        match self.typed(SampleType::UInt32, 0)? {
            Sample::UInt32(v) => Ok(v),
            _ => unreachable!("checked by typed()"),
        }
    }

    pub fn set_sample_uint32(&mut self, value: u32) -> Rl2Result<()> {
        self.set_sample(0, Sample::UInt32(value))
    }

    pub fn sample_float(&self) -> Rl2Result<f32> {
        match self.typed(SampleType::Float32, 0)? {
            Sample::Float32(v) => Ok(v),
            _ => unreachable!("checked by typed()"),
        }
    }

    pub fn set_sample_float(&mut self, value: f32) -> Rl2Result<()> {
        self.set_sample(0, Sample::Float32(value))
    }

    pub fn sample_double(&self) -> Rl2Result<f64> {
        match self.typed(SampleType::Float64, 0)? {
            Sample::Float64(v) => Ok(v),
            _ => unreachable!("checked by typed()"),
        }
    }

    pub fn set_sample_double(&mut self, value: f64) -> Rl2Result<()> {
        self.set_sample(0, Sample::Float64(value))
    }

    fn typed(&self, expected: SampleType, band: usize) -> Rl2Result<Sample> {
        self.check_type(expected)?;
        self.sample(band)
    }

    /// Single-band grayscale pixel holding `band` of an RGB or multiband pixel
    pub fn mono_band(&self, band: usize) -> Rl2Result<Pixel> {
        self.check_multiband_source()?;
        self.check_band(band)?;
        let spec = PixelSpec::new(self.sample_type(), PixelType::Grayscale, 1)?;
        Ok(Pixel {
            spec,
            samples: vec![self.samples[band]],
            transparent: self.transparent,
        })
    }

    /// RGB pixel assembled from three bands of an RGB or multiband pixel
    pub fn triple_band(&self, red: usize, green: usize, blue: usize) -> Rl2Result<Pixel> {
        self.check_multiband_source()?;
        for band in [red, green, blue] {
            self.check_band(band)?;
        }
        let spec = PixelSpec::new(self.sample_type(), PixelType::Rgb, 3)?;
        Ok(Pixel {
            spec,
            samples: vec![self.samples[red], self.samples[green], self.samples[blue]],
            transparent: self.transparent,
        })
    }

    fn check_multiband_source(&self) -> Rl2Result<()> {
        match self.pixel_type() {
            PixelType::Rgb | PixelType::Multiband => Ok(()),
            other => Err(Rl2Error::type_mismatch(format!(
                "band selection needs an RGB or multiband pixel, not {other:?}"
            ))),
        }
    }

    /// Samples in host byte order, laid out like one raster pixel
    pub(crate) fn native_bytes(&self) -> Vec<u8> {
        let bps = self.sample_type().bytes_per_sample();
        let mut out = vec![0u8; bps * self.samples.len()];
        for (sample, chunk) in self.samples.iter().zip(out.chunks_exact_mut(bps)) {
            sample.write_ne(chunk);
        }
        out
    }

    /// Overwrite samples and transparency from one raster pixel's bytes
    pub(crate) fn load_native(&mut self, bytes: &[u8], transparent: bool) {
        let sample_type = self.sample_type();
        let bps = sample_type.bytes_per_sample();
        for (sample, chunk) in self.samples.iter_mut().zip(bytes.chunks_exact(bps)) {
            *sample = Sample::read_ne(sample_type, chunk);
        }
        self.transparent = transparent;
    }

    /// Build from one raster pixel's host-order bytes
    pub(crate) fn from_native_bytes(spec: PixelSpec, bytes: &[u8]) -> Self {
        let bps = spec.sample_type().bytes_per_sample();
        let samples = bytes
            .chunks_exact(bps)
            .take(spec.bands())
            .map(|chunk| Sample::read_ne(spec.sample_type(), chunk))
            .collect();
        Self {
            spec,
            samples,
            transparent: false,
        }
    }

    /// Serialize for persistence (e.g. as a coverage NODATA value)
    #[must_use] pub fn to_blob(&self) -> Vec<u8> {
        let order = Endianness::native();
        let mut writer = BlobWriter::new(order);
        writer.u8(PIXEL_START);
        writer.u8(order.flag());
        writer.u8(self.sample_type().code());
        writer.u8(self.pixel_type().code());
        writer.u8(self.num_bands());
        writer.u8(u8::from(self.transparent));
        for sample in &self.samples {
            match *sample {
                Sample::Bit1(v) | Sample::Bit2(v) | Sample::Bit4(v) | Sample::UInt8(v) => {
                    writer.u8(v);
                }
                Sample::Int8(v) => writer.u8(v as u8),
                Sample::Int16(v) => writer.u16(v as u16),
                Sample::UInt16(v) => writer.u16(v),
                Sample::Int32(v) => writer.u32(v as u32),
                Sample::UInt32(v) => writer.u32(v),
                Sample::Float32(v) => writer.u32(v.to_bits()),
                Sample::Float64(v) => writer.f64(v),
            }
        }
        writer.push_crc();
        writer.into_inner()
    }

    pub fn from_blob(blob: &[u8]) -> Rl2Result<Self> {
        if blob.len() < 2 || blob[0] != PIXEL_START {
            return Err(Rl2Error::malformed("not a serialized pixel"));
        }
        let order = Endianness::from_flag(blob[1])?;
        let body = verify_trailing_crc(blob, order)?;
        let mut reader = BlobReader::at(body, 2, order);
        let spec = PixelSpec::from_codes(reader.u8()?, reader.u8()?, reader.u8()?)?;
        let transparent = reader.u8()? != 0;
        let mut samples = Vec::with_capacity(spec.bands());
        for _ in 0..spec.bands() {
            let sample = match spec.sample_type() {
                SampleType::Bit1 => Sample::Bit1(reader.u8()?),
                SampleType::Bit2 => Sample::Bit2(reader.u8()?),
                SampleType::Bit4 => Sample::Bit4(reader.u8()?),
                SampleType::Int8 => Sample::Int8(reader.u8()? as i8),
                SampleType::UInt8 => Sample::UInt8(reader.u8()?),
                SampleType::Int16 => Sample::Int16(reader.u16()? as i16),
                SampleType::UInt16 => Sample::UInt16(reader.u16()?),
                SampleType::Int32 => Sample::Int32(reader.u32()? as i32),
                SampleType::UInt32 => Sample::UInt32(reader.u32()?),
                SampleType::Float32 => Sample::Float32(f32::from_bits(reader.u32()?)),
                SampleType::Float64 => Sample::Float64(reader.f64()?),
            };
            sample
                .validate()
                .map_err(|e| Rl2Error::malformed(format!("serialized pixel: {e}")))?;
            samples.push(sample);
        }
        if reader.position() != body.len() {
            return Err(Rl2Error::malformed("trailing bytes after serialized pixel"));
        }
        Ok(Self {
            spec,
            samples,
            transparent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pixel_is_zeroed() {
        let pixel = Pixel::new(SampleType::UInt8, PixelType::Rgb, 3).unwrap();
        assert_eq!(pixel.num_bands(), 3);
        assert!(!pixel.is_transparent());
        for band in 0..3 {
            assert_eq!(pixel.sample_uint8(band).unwrap(), 0);
        }
    }

    #[test]
    fn test_incoherent_pixel_rejected() {
        let err = Pixel::new(SampleType::Float32, PixelType::Palette, 1).unwrap_err();
        assert!(matches!(err, Rl2Error::TypeMismatch(_)));
    }

    #[test]
    fn test_4bit_bounds() {
        let mut pixel = Pixel::new(SampleType::Bit4, PixelType::Palette, 1).unwrap();
        for value in 0..=15 {
            pixel.set_sample_4bit(value).unwrap();
            assert_eq!(pixel.sample_4bit().unwrap(), value);
        }
        let err = pixel.set_sample_4bit(16).unwrap_err();
        assert!(matches!(err, Rl2Error::OutOfRange(_)));
        assert_eq!(pixel.sample_4bit().unwrap(), 15, "failed set must not mutate");
    }

    #[test]
    fn test_1bit_and_2bit_bounds() {
        let mut mono = Pixel::new(SampleType::Bit1, PixelType::Monochrome, 1).unwrap();
        mono.set_sample_1bit(0).unwrap();
        mono.set_sample_1bit(1).unwrap();
        assert!(matches!(mono.set_sample_1bit(2), Err(Rl2Error::OutOfRange(_))));
        assert_eq!(mono.sample_1bit().unwrap(), 1);

        let mut gray = Pixel::new(SampleType::Bit2, PixelType::Grayscale, 1).unwrap();
        gray.set_sample_2bit(3).unwrap();
        assert!(gray.set_sample_2bit(4).is_err());
    }

    #[test]
    fn test_type_mismatch_access() {
        let mut pixel = Pixel::new(SampleType::UInt16, PixelType::DataGrid, 1).unwrap();
        pixel.set_sample_uint16(0, 4000).unwrap();

        assert!(matches!(pixel.sample_uint8(0), Err(Rl2Error::TypeMismatch(_))));
        assert!(matches!(pixel.set_sample_int16(5), Err(Rl2Error::TypeMismatch(_))));
        assert!(matches!(pixel.sample_double(), Err(Rl2Error::TypeMismatch(_))));
        assert_eq!(pixel.sample_uint16(0).unwrap(), 4000);
    }

    #[test]
    fn test_band_out_of_range() {
        let mut pixel = Pixel::new(SampleType::UInt8, PixelType::Multiband, 4).unwrap();
        pixel.set_sample_uint8(3, 9).unwrap();
        assert!(matches!(pixel.set_sample_uint8(4, 1), Err(Rl2Error::OutOfRange(_))));
        assert!(matches!(pixel.sample_uint8(4), Err(Rl2Error::OutOfRange(_))));
    }

    #[test]
    fn test_compare() {
        let mut a = Pixel::new(SampleType::Float32, PixelType::DataGrid, 1).unwrap();
        let mut b = a.clone();
        a.set_sample_float(1.5).unwrap();
        assert!(!a.compare(&b));
        b.set_sample_float(1.5).unwrap();
        assert!(a.compare(&b));
        b.set_transparent(true);
        assert!(!a.compare(&b), "transparency is part of equality");
        assert!(a.same_samples(&b));

        let other = Pixel::new(SampleType::Float64, PixelType::DataGrid, 1).unwrap();
        assert!(!a.compare(&other));
    }

    #[test]
    fn test_nan_samples_compare_equal() {
        let mut a = Pixel::new(SampleType::Float64, PixelType::DataGrid, 1).unwrap();
        a.set_sample_double(f64::NAN).unwrap();
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn test_band_views() {
        let mut pixel = Pixel::new(SampleType::UInt16, PixelType::Multiband, 5).unwrap();
        for band in 0..5 {
            pixel.set_sample_uint16(band, (band as u16 + 1) * 100).unwrap();
        }

        let mono = pixel.mono_band(3).unwrap();
        assert_eq!(mono.pixel_type(), PixelType::Grayscale);
        assert_eq!(mono.sample_uint16(0).unwrap(), 400);

        let rgb = pixel.triple_band(4, 2, 0).unwrap();
        assert_eq!(rgb.pixel_type(), PixelType::Rgb);
        assert_eq!(rgb.sample_uint16(0).unwrap(), 500);
        assert_eq!(rgb.sample_uint16(1).unwrap(), 300);
        assert_eq!(rgb.sample_uint16(2).unwrap(), 100);

        assert!(matches!(pixel.triple_band(0, 1, 5), Err(Rl2Error::OutOfRange(_))));

        let gray = Pixel::new(SampleType::UInt8, PixelType::Grayscale, 1).unwrap();
        assert!(matches!(gray.mono_band(0), Err(Rl2Error::TypeMismatch(_))));
    }

    #[test]
    fn test_blob_roundtrip() {
        let mut pixel = Pixel::new(SampleType::Int32, PixelType::DataGrid, 1).unwrap();
        pixel.set_sample_int32(-9999).unwrap();
        pixel.set_transparent(true);

        let blob = pixel.to_blob();
        let restored = Pixel::from_blob(&blob).unwrap();
        assert_eq!(restored, pixel);
    }

    #[test]
    fn test_blob_rejects_corruption() {
        let pixel = Pixel::new(SampleType::UInt8, PixelType::Rgb, 3).unwrap();
        let mut blob = pixel.to_blob();
        blob[6] = 7;
        assert!(matches!(Pixel::from_blob(&blob), Err(Rl2Error::MalformedBlob(_))));
        assert!(Pixel::from_blob(&blob[..3]).is_err());
    }

    #[test]
    fn test_native_bytes() {
        let mut pixel = Pixel::new(SampleType::UInt16, PixelType::Rgb, 3).unwrap();
        pixel.set_sample_uint16(1, 0x0102).unwrap();
        let bytes = pixel.native_bytes();
        assert_eq!(bytes.len(), 6);
        let back = Pixel::from_native_bytes(pixel.spec(), &bytes);
        assert_eq!(back, pixel);
    }
}
