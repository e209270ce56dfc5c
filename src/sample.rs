//! Sample encodings, pixel semantics and the (sample, pixel, bands) triple
//! that fixes the byte layout of every pixel, raster and tile.

use crate::error::{Rl2Error, Rl2Result};

// Wire codes
const SAMPLE_1_BIT: u8 = 0xA1;
const SAMPLE_2_BIT: u8 = 0xA2;
const SAMPLE_4_BIT: u8 = 0xA3;
const SAMPLE_INT8: u8 = 0xA4;
const SAMPLE_UINT8: u8 = 0xA5;
const SAMPLE_INT16: u8 = 0xA6;
const SAMPLE_UINT16: u8 = 0xA7;
const SAMPLE_INT32: u8 = 0xA8;
const SAMPLE_UINT32: u8 = 0xA9;
const SAMPLE_FLOAT: u8 = 0xAA;
const SAMPLE_DOUBLE: u8 = 0xAB;

const PIXEL_MONOCHROME: u8 = 0x11;
const PIXEL_PALETTE: u8 = 0x12;
const PIXEL_GRAYSCALE: u8 = 0x13;
const PIXEL_RGB: u8 = 0x14;
const PIXEL_MULTIBAND: u8 = 0x15;
const PIXEL_DATAGRID: u8 = 0x16;

const ENDIAN_LITTLE: u8 = 0x01;
const ENDIAN_BIG: u8 = 0x00;

/// Storage encoding of a single sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    Bit1,
    Bit2,
    Bit4,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl SampleType {
    #[must_use] pub fn code(self) -> u8 {
        match self {
            SampleType::Bit1 => SAMPLE_1_BIT,
            SampleType::Bit2 => SAMPLE_2_BIT,
            SampleType::Bit4 => SAMPLE_4_BIT,
            SampleType::Int8 => SAMPLE_INT8,
            SampleType::UInt8 => SAMPLE_UINT8,
            SampleType::Int16 => SAMPLE_INT16,
            SampleType::UInt16 => SAMPLE_UINT16,
            SampleType::Int32 => SAMPLE_INT32,
            SampleType::UInt32 => SAMPLE_UINT32,
            SampleType::Float32 => SAMPLE_FLOAT,
            SampleType::Float64 => SAMPLE_DOUBLE,
        }
    }

    pub fn from_code(code: u8) -> Rl2Result<Self> {
        match code {
            SAMPLE_1_BIT => Ok(SampleType::Bit1),
            SAMPLE_2_BIT => Ok(SampleType::Bit2),
            SAMPLE_4_BIT => Ok(SampleType::Bit4),
            SAMPLE_INT8 => Ok(SampleType::Int8),
            SAMPLE_UINT8 => Ok(SampleType::UInt8),
            SAMPLE_INT16 => Ok(SampleType::Int16),
            SAMPLE_UINT16 => Ok(SampleType::UInt16),
            SAMPLE_INT32 => Ok(SampleType::Int32),
            SAMPLE_UINT32 => Ok(SampleType::UInt32),
            SAMPLE_FLOAT => Ok(SampleType::Float32),
            SAMPLE_DOUBLE => Ok(SampleType::Float64),
            _ => Err(Rl2Error::malformed(format!("unknown sample type code {code:#04x}"))),
        }
    }

    /// Significant bits per sample
    #[must_use] pub fn bits(self) -> u32 {
        match self {
            SampleType::Bit1 => 1,
            SampleType::Bit2 => 2,
            SampleType::Bit4 => 4,
            SampleType::Int8 | SampleType::UInt8 => 8,
            SampleType::Int16 | SampleType::UInt16 => 16,
            SampleType::Int32 | SampleType::UInt32 | SampleType::Float32 => 32,
            SampleType::Float64 => 64,
        }
    }

    /// Bytes one sample occupies in an in-memory buffer.
    ///
    /// Packed types are held one sample per byte in memory and only packed
    /// when exported or encoded.
    #[must_use] pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleType::Bit1
            | SampleType::Bit2
            | SampleType::Bit4
            | SampleType::Int8
            | SampleType::UInt8 => 1,
            SampleType::Int16 | SampleType::UInt16 => 2,
            SampleType::Int32 | SampleType::UInt32 | SampleType::Float32 => 4,
            SampleType::Float64 => 8,
        }
    }

    #[must_use] pub fn is_packed(self) -> bool {
        matches!(self, SampleType::Bit1 | SampleType::Bit2 | SampleType::Bit4)
    }

    /// Largest legal value for a packed sample, `None` for byte-wide types
    #[must_use] pub fn packed_max(self) -> Option<u8> {
        match self {
            SampleType::Bit1 => Some(1),
            SampleType::Bit2 => Some(3),
            SampleType::Bit4 => Some(15),
            _ => None,
        }
    }

    /// Bytes needed by one packed row of `samples` samples
    #[must_use] pub fn packed_row_bytes(self, samples: usize) -> usize {
        (samples * self.bits() as usize).div_ceil(8)
    }

    /// Number of histogram bins kept by the statistics engine
    #[must_use] pub fn histogram_bins(self) -> usize {
        match self {
            SampleType::Bit1 => 2,
            SampleType::Bit2 => 4,
            SampleType::Bit4 => 16,
            SampleType::Int8 | SampleType::UInt8 => 256,
            _ => 0,
        }
    }

    /// Read one native-endian sample from `bytes` as f64
    #[must_use] pub fn read_f64(self, bytes: &[u8]) -> f64 {
        match self {
            SampleType::Bit1 | SampleType::Bit2 | SampleType::Bit4 | SampleType::UInt8 => {
                f64::from(bytes[0])
            }
            SampleType::Int8 => f64::from(bytes[0] as i8),
            SampleType::Int16 => f64::from(i16::from_ne_bytes([bytes[0], bytes[1]])),
            SampleType::UInt16 => f64::from(u16::from_ne_bytes([bytes[0], bytes[1]])),
            SampleType::Int32 => {
                f64::from(i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            SampleType::UInt32 => {
                f64::from(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            SampleType::Float32 => {
                f64::from(f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            SampleType::Float64 => f64::from_ne_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
        }
    }
}

/// Semantic role of a pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    Monochrome,
    Palette,
    Grayscale,
    Rgb,
    Multiband,
    DataGrid,
}

impl PixelType {
    #[must_use] pub fn code(self) -> u8 {
        match self {
            PixelType::Monochrome => PIXEL_MONOCHROME,
            PixelType::Palette => PIXEL_PALETTE,
            PixelType::Grayscale => PIXEL_GRAYSCALE,
            PixelType::Rgb => PIXEL_RGB,
            PixelType::Multiband => PIXEL_MULTIBAND,
            PixelType::DataGrid => PIXEL_DATAGRID,
        }
    }

    pub fn from_code(code: u8) -> Rl2Result<Self> {
        match code {
            PIXEL_MONOCHROME => Ok(PixelType::Monochrome),
            PIXEL_PALETTE => Ok(PixelType::Palette),
            PIXEL_GRAYSCALE => Ok(PixelType::Grayscale),
            PIXEL_RGB => Ok(PixelType::Rgb),
            PIXEL_MULTIBAND => Ok(PixelType::Multiband),
            PIXEL_DATAGRID => Ok(PixelType::DataGrid),
            _ => Err(Rl2Error::malformed(format!("unknown pixel type code {code:#04x}"))),
        }
    }
}

/// Byte order declared by an encoded BLOB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the running host
    #[must_use] pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }

    #[must_use] pub fn flag(self) -> u8 {
        match self {
            Endianness::Little => ENDIAN_LITTLE,
            Endianness::Big => ENDIAN_BIG,
        }
    }

    pub fn from_flag(flag: u8) -> Rl2Result<Self> {
        match flag {
            ENDIAN_LITTLE => Ok(Endianness::Little),
            ENDIAN_BIG => Ok(Endianness::Big),
            _ => Err(Rl2Error::malformed(format!("invalid endianness flag {flag:#04x}"))),
        }
    }
}

/// The (sample type, pixel type, band count) triple.
///
/// A `PixelSpec` can only be built for coherent combinations, so every
/// value in circulation describes a layout the codec knows how to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelSpec {
    sample_type: SampleType,
    pixel_type: PixelType,
    num_bands: u8,
}

impl PixelSpec {
    /// Validate and build a pixel spec
    ///
    /// | pixel type | sample types | bands |
    /// |---|---|---|
    /// | monochrome | 1-bit | 1 |
    /// | palette | 1/2/4-bit, uint8 | 1 |
    /// | grayscale | 2/4-bit, uint8, uint16 | 1 |
    /// | RGB | uint8, uint16 | 3 |
    /// | multiband | uint8, uint16 | 2..=255 |
    /// | data-grid | any byte-wide type | 1 |
    pub fn new(sample_type: SampleType, pixel_type: PixelType, num_bands: u8) -> Rl2Result<Self> {
        use SampleType as S;

        let sample_ok = match pixel_type {
            PixelType::Monochrome => sample_type == S::Bit1,
            PixelType::Palette => matches!(sample_type, S::Bit1 | S::Bit2 | S::Bit4 | S::UInt8),
            PixelType::Grayscale => {
                matches!(sample_type, S::Bit2 | S::Bit4 | S::UInt8 | S::UInt16)
            }
            PixelType::Rgb | PixelType::Multiband => matches!(sample_type, S::UInt8 | S::UInt16),
            PixelType::DataGrid => !sample_type.is_packed(),
        };
        if !sample_ok {
            return Err(Rl2Error::type_mismatch(format!(
                "{sample_type:?} samples are not valid for {pixel_type:?} pixels"
            )));
        }

        let bands_ok = match pixel_type {
            PixelType::Rgb => num_bands == 3,
            PixelType::Multiband => num_bands >= 2,
            _ => num_bands == 1,
        };
        if !bands_ok {
            return Err(Rl2Error::type_mismatch(format!(
                "{num_bands} bands are not valid for {pixel_type:?} pixels"
            )));
        }

        Ok(Self {
            sample_type,
            pixel_type,
            num_bands,
        })
    }

    /// Parse the three header codes
    pub fn from_codes(sample: u8, pixel: u8, bands: u8) -> Rl2Result<Self> {
        let sample_type = SampleType::from_code(sample)?;
        let pixel_type = PixelType::from_code(pixel)?;
        Self::new(sample_type, pixel_type, bands)
            .map_err(|e| Rl2Error::malformed(format!("incoherent pixel spec: {e}")))
    }

    #[must_use] pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    #[must_use] pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    #[must_use] pub fn num_bands(&self) -> u8 {
        self.num_bands
    }

    #[must_use] pub fn bands(&self) -> usize {
        usize::from(self.num_bands)
    }

    /// In-memory bytes per pixel
    #[must_use] pub fn bytes_per_pixel(&self) -> usize {
        self.sample_type.bytes_per_sample() * self.bands()
    }

    /// In-memory size of a `width` x `height` pixel buffer
    #[must_use] pub fn buffer_size(&self, width: usize, height: usize) -> usize {
        width * height * self.bytes_per_pixel()
    }
}

/// Size of a 1-bit mask covering `width` x `height` pixels
#[must_use] pub fn mask_size(width: usize, height: usize) -> usize {
    (width * height).div_ceil(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_type_codes() {
        for sample in [
            SampleType::Bit1,
            SampleType::Bit2,
            SampleType::Bit4,
            SampleType::Int8,
            SampleType::UInt8,
            SampleType::Int16,
            SampleType::UInt16,
            SampleType::Int32,
            SampleType::UInt32,
            SampleType::Float32,
            SampleType::Float64,
        ] {
            assert_eq!(SampleType::from_code(sample.code()).unwrap(), sample);
        }
        assert!(SampleType::from_code(0x00).is_err());
    }

    #[test]
    fn test_coherent_specs() {
        assert!(PixelSpec::new(SampleType::Bit1, PixelType::Monochrome, 1).is_ok());
        assert!(PixelSpec::new(SampleType::Bit4, PixelType::Palette, 1).is_ok());
        assert!(PixelSpec::new(SampleType::UInt16, PixelType::Rgb, 3).is_ok());
        assert!(PixelSpec::new(SampleType::UInt8, PixelType::Multiband, 7).is_ok());
        assert!(PixelSpec::new(SampleType::Float64, PixelType::DataGrid, 1).is_ok());
    }

    #[test]
    fn test_incoherent_specs() {
        let err = PixelSpec::new(SampleType::UInt8, PixelType::Monochrome, 1).unwrap_err();
        assert!(matches!(err, Rl2Error::TypeMismatch(_)));
        assert!(PixelSpec::new(SampleType::Float32, PixelType::Rgb, 3).is_err());
        assert!(PixelSpec::new(SampleType::UInt8, PixelType::Rgb, 4).is_err());
        assert!(PixelSpec::new(SampleType::UInt8, PixelType::Multiband, 1).is_err());
        assert!(PixelSpec::new(SampleType::Bit4, PixelType::DataGrid, 1).is_err());
        assert!(PixelSpec::new(SampleType::UInt8, PixelType::Grayscale, 0).is_err());
    }

    #[test]
    fn test_layout_sizes() {
        let rgb = PixelSpec::new(SampleType::UInt16, PixelType::Rgb, 3).unwrap();
        assert_eq!(rgb.bytes_per_pixel(), 6);
        assert_eq!(rgb.buffer_size(4, 2), 48);

        let mono = PixelSpec::new(SampleType::Bit1, PixelType::Monochrome, 1).unwrap();
        assert_eq!(mono.bytes_per_pixel(), 1);
        assert_eq!(SampleType::Bit1.packed_row_bytes(9), 2);
        assert_eq!(SampleType::Bit4.packed_row_bytes(3), 2);
        assert_eq!(mask_size(3, 3), 2);
    }

    #[test]
    fn test_read_native_samples() {
        let bytes = (-1234i16).to_ne_bytes();
        assert_eq!(SampleType::Int16.read_f64(&bytes), -1234.0);

        let bytes = 2.5f32.to_ne_bytes();
        assert_eq!(SampleType::Float32.read_f64(&bytes), 2.5);

        assert_eq!(SampleType::Int8.read_f64(&[0xFF]), -1.0);
    }

    #[test]
    fn test_endianness_flag() {
        assert_eq!(Endianness::from_flag(0x01).unwrap(), Endianness::Little);
        assert_eq!(Endianness::from_flag(0x00).unwrap(), Endianness::Big);
        assert!(Endianness::from_flag(0x02).is_err());
    }
}
