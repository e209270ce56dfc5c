//! Tile compression codes, the compression/pixel-spec compatibility matrix
//! and the general-purpose byte codecs (DEFLATE, LZMA, LZW, ZSTD).
//!
//! Image-container codecs (PNG, JPEG, GIF, WEBP) live in
//! [`crate::container`], the CCITT bi-level codecs in [`crate::ccitt`].

use std::io::{Read, Write};

use crate::error::{Rl2Error, Rl2Result};
use crate::sample::{PixelSpec, PixelType, SampleType};

// Wire codes
const COMPRESSION_NONE: u8 = 0x21;
const COMPRESSION_DEFLATE: u8 = 0x22;
const COMPRESSION_LZMA: u8 = 0x23;
const COMPRESSION_GIF: u8 = 0x24;
const COMPRESSION_PNG: u8 = 0x25;
const COMPRESSION_JPEG: u8 = 0x26;
const COMPRESSION_LOSSY_WEBP: u8 = 0x27;
const COMPRESSION_LOSSLESS_WEBP: u8 = 0x28;
const COMPRESSION_CCITTFAX3: u8 = 0x29;
const COMPRESSION_CCITTFAX4: u8 = 0x30;
const COMPRESSION_LZW: u8 = 0x2A;
const COMPRESSION_ZSTD: u8 = 0x2B;

const ZSTD_LEVEL: i32 = 3;

/// Tile payload compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    #[default]
    None,
    Deflate,
    Lzma,
    Gif,
    Png,
    Jpeg,
    LossyWebp,
    LosslessWebp,
    CcittFax3,
    CcittFax4,
    Lzw,
    Zstd,
}

impl Compression {
    #[must_use] pub fn code(self) -> u8 {
        match self {
            Compression::None => COMPRESSION_NONE,
            Compression::Deflate => COMPRESSION_DEFLATE,
            Compression::Lzma => COMPRESSION_LZMA,
            Compression::Gif => COMPRESSION_GIF,
            Compression::Png => COMPRESSION_PNG,
            Compression::Jpeg => COMPRESSION_JPEG,
            Compression::LossyWebp => COMPRESSION_LOSSY_WEBP,
            Compression::LosslessWebp => COMPRESSION_LOSSLESS_WEBP,
            Compression::CcittFax3 => COMPRESSION_CCITTFAX3,
            Compression::CcittFax4 => COMPRESSION_CCITTFAX4,
            Compression::Lzw => COMPRESSION_LZW,
            Compression::Zstd => COMPRESSION_ZSTD,
        }
    }

    pub fn from_code(code: u8) -> Rl2Result<Self> {
        match code {
            COMPRESSION_NONE => Ok(Compression::None),
            COMPRESSION_DEFLATE => Ok(Compression::Deflate),
            COMPRESSION_LZMA => Ok(Compression::Lzma),
            COMPRESSION_GIF => Ok(Compression::Gif),
            COMPRESSION_PNG => Ok(Compression::Png),
            COMPRESSION_JPEG => Ok(Compression::Jpeg),
            COMPRESSION_LOSSY_WEBP => Ok(Compression::LossyWebp),
            COMPRESSION_LOSSLESS_WEBP => Ok(Compression::LosslessWebp),
            COMPRESSION_CCITTFAX3 => Ok(Compression::CcittFax3),
            COMPRESSION_CCITTFAX4 => Ok(Compression::CcittFax4),
            COMPRESSION_LZW => Ok(Compression::Lzw),
            COMPRESSION_ZSTD => Ok(Compression::Zstd),
            _ => Err(Rl2Error::malformed(format!("unknown compression code {code:#04x}"))),
        }
    }

    /// Decoded samples may differ from the encoded ones
    #[must_use] pub fn is_lossy(self) -> bool {
        matches!(self, Compression::Jpeg | Compression::LossyWebp)
    }

    /// General-purpose byte codec working on the raw sample planes
    #[must_use] pub fn is_byte_codec(self) -> bool {
        matches!(
            self,
            Compression::None
                | Compression::Deflate
                | Compression::Lzma
                | Compression::Lzw
                | Compression::Zstd
        )
    }

    /// Whether the byte-delta predictor runs before compressing
    pub(crate) fn uses_predictor(self) -> bool {
        self.is_byte_codec() && self != Compression::None
    }

    /// Check this compression can carry `spec` losslessly (lossy codecs:
    /// at least without changing the pixel layout).
    pub fn check_compatible(self, spec: &PixelSpec) -> Rl2Result<()> {
        use SampleType as S;

        let sample = spec.sample_type();
        let ok = match self {
            Compression::None
            | Compression::Deflate
            | Compression::Lzma
            | Compression::Lzw
            | Compression::Zstd => true,
            Compression::Png => match spec.pixel_type() {
                PixelType::Monochrome | PixelType::Palette | PixelType::Grayscale => true,
                PixelType::Rgb => true,
                PixelType::DataGrid => matches!(sample, S::UInt8 | S::UInt16),
                PixelType::Multiband => false,
            },
            Compression::Gif => {
                sample == S::UInt8
                    && matches!(spec.pixel_type(), PixelType::Palette | PixelType::Grayscale)
            }
            Compression::Jpeg | Compression::LossyWebp | Compression::LosslessWebp => {
                sample == S::UInt8
                    && matches!(spec.pixel_type(), PixelType::Grayscale | PixelType::Rgb)
            }
            Compression::CcittFax3 | Compression::CcittFax4 => {
                spec.pixel_type() == PixelType::Monochrome
            }
        };
        if ok {
            Ok(())
        } else {
            Err(Rl2Error::unsupported(format!(
                "{self:?} cannot encode {sample:?} {:?} tiles with {} band(s)",
                spec.pixel_type(),
                spec.num_bands()
            )))
        }
    }
}

/// Compress `data` with a byte codec
pub(crate) fn compress(compression: Compression, data: &[u8]) -> Rl2Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Deflate => {
            let mut encoder =
                flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data).map_err(codec_error("DEFLATE"))?;
            encoder.finish().map_err(codec_error("DEFLATE"))
        }
        Compression::Lzma => {
            let mut output = Vec::new();
            lzma_rs::xz_compress(&mut &data[..], &mut output).map_err(codec_error("LZMA"))?;
            Ok(output)
        }
        Compression::Lzw => weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
            .encode(data)
            .map_err(codec_error("LZW")),
        Compression::Zstd => zstd::stream::encode_all(data, ZSTD_LEVEL).map_err(codec_error("ZSTD")),
        other => Err(Rl2Error::unsupported(format!("{other:?} is not a byte codec"))),
    }
}

/// Decompress a byte-codec payload that must expand to exactly `expected` bytes
pub(crate) fn decompress(compression: Compression, data: &[u8], expected: usize) -> Rl2Result<Vec<u8>> {
    let mut output = Vec::new();
    output
        .try_reserve_exact(expected)
        .map_err(|e| Rl2Error::AllocationFailure(format!("{expected} bytes: {e}")))?;

    // Bounded reads stop a corrupt stream from inflating past the declared size
    let limit = expected as u64 + 1;
    match compression {
        Compression::None => output.extend_from_slice(data),
        Compression::Deflate => {
            flate2::read::ZlibDecoder::new(data)
                .take(limit)
                .read_to_end(&mut output)
                .map_err(codec_error("DEFLATE"))?;
        }
        Compression::Lzma => {
            let mut sink = BoundedWriter::new(&mut output, limit);
            let result = lzma_rs::xz_decompress(&mut &data[..], &mut sink);
            if !sink.overflowed {
                result.map_err(codec_error("LZMA"))?;
            }
        }
        Compression::Lzw => {
            let mut decoder =
                weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
            let mut sink = BoundedWriter::new(&mut output, limit);
            let result = decoder.into_stream(&mut sink).decode_all(data);
            if !sink.overflowed {
                result.status.map_err(codec_error("LZW"))?;
            }
        }
        Compression::Zstd => {
            zstd::stream::read::Decoder::new(data)
                .map_err(codec_error("ZSTD"))?
                .take(limit)
                .read_to_end(&mut output)
                .map_err(codec_error("ZSTD"))?;
        }
        other => {
            return Err(Rl2Error::unsupported(format!("{other:?} is not a byte codec")));
        }
    }

    if output.len() != expected {
        return Err(Rl2Error::malformed(format!(
            "{compression:?} payload expands to {} bytes, header declares {expected}",
            output.len()
        )));
    }
    Ok(output)
}

/// Writer that refuses to grow `inner` beyond `limit` bytes
struct BoundedWriter<'a> {
    inner: &'a mut Vec<u8>,
    limit: usize,
    overflowed: bool,
}

impl<'a> BoundedWriter<'a> {
    fn new(inner: &'a mut Vec<u8>, limit: u64) -> Self {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Self { inner, limit, overflowed: false }
    }
}

impl Write for BoundedWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let room = self.limit - self.inner.len();
        if room == 0 && !buf.is_empty() {
            self.overflowed = true;
            return Err(std::io::Error::other("decompressed data exceeds the declared size"));
        }
        let n = buf.len().min(room);
        self.inner.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn codec_error<E: std::fmt::Display>(codec: &'static str) -> impl Fn(E) -> Rl2Error {
    move |e| Rl2Error::codec(format!("{codec}: {e}"))
}

/// Horizontal byte differencing, applied in place to each `row_len`-byte
/// row with a lag of `distance` bytes.
///
/// Rows are independent: the first `distance` bytes of every row are kept
/// as-is.
pub(crate) fn delta_encode(data: &mut [u8], row_len: usize, distance: usize) {
    for row in data.chunks_mut(row_len) {
        for i in (distance..row.len()).rev() {
            row[i] = row[i].wrapping_sub(row[i - distance]);
        }
    }
}

/// Inverse of [`delta_encode`]
pub(crate) fn delta_decode(data: &mut [u8], row_len: usize, distance: usize) {
    for row in data.chunks_mut(row_len) {
        for i in distance..row.len() {
            row[i] = row[i].wrapping_add(row[i - distance]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> Vec<u8> {
        (0..4096u32).map(|i| ((i * 7) % 251) as u8).collect()
    }

    #[test]
    fn test_compression_codes() {
        for compression in [
            Compression::None,
            Compression::Deflate,
            Compression::Lzma,
            Compression::Gif,
            Compression::Png,
            Compression::Jpeg,
            Compression::LossyWebp,
            Compression::LosslessWebp,
            Compression::CcittFax3,
            Compression::CcittFax4,
            Compression::Lzw,
            Compression::Zstd,
        ] {
            assert_eq!(Compression::from_code(compression.code()).unwrap(), compression);
        }
        assert!(matches!(Compression::from_code(0x99), Err(Rl2Error::MalformedBlob(_))));
    }

    #[test]
    fn test_byte_codecs_roundtrip() {
        let data = sample_payload();
        for compression in [
            Compression::None,
            Compression::Deflate,
            Compression::Lzma,
            Compression::Lzw,
            Compression::Zstd,
        ] {
            let packed = compress(compression, &data).unwrap();
            let unpacked = decompress(compression, &packed, data.len()).unwrap();
            assert_eq!(unpacked, data, "{compression:?} must round-trip");
        }
    }

    #[test]
    fn test_decompress_length_mismatch() {
        let data = sample_payload();
        let packed = compress(Compression::Deflate, &data).unwrap();
        let err = decompress(Compression::Deflate, &packed, data.len() - 1).unwrap_err();
        assert!(matches!(err, Rl2Error::MalformedBlob(_)));

        let err = decompress(Compression::Zstd, b"not zstd", 10).unwrap_err();
        assert!(matches!(err, Rl2Error::Codec(_)));
    }

    #[test]
    fn test_decompress_stops_at_declared_size() {
        let zeros = vec![0u8; 1 << 20];
        for compression in [Compression::Lzma, Compression::Lzw, Compression::Deflate, Compression::Zstd] {
            let packed = compress(compression, &zeros).unwrap();
            let err = decompress(compression, &packed, 16).unwrap_err();
            assert!(
                matches!(err, Rl2Error::MalformedBlob(_)),
                "{compression:?} should reject an oversized stream, got {err:?}"
            );
        }
    }

    #[test]
    fn test_bounded_writer_caps_output() {
        let mut output = Vec::new();
        let mut sink = BoundedWriter::new(&mut output, 17);
        let err = sink.write_all(&[7u8; 64]).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Other);
        assert!(sink.overflowed);
        assert_eq!(output.len(), 17, "output never grows past the limit");
    }

    #[test]
    fn test_container_codecs_are_not_byte_codecs() {
        assert!(compress(Compression::Png, b"x").is_err());
        assert!(!Compression::Jpeg.is_byte_codec());
        assert!(Compression::Zstd.uses_predictor());
        assert!(!Compression::None.uses_predictor());
    }

    #[test]
    fn test_delta_roundtrip() {
        let original: Vec<u8> = vec![10, 20, 30, 12, 22, 32, 200, 5, 90, 1, 2, 3];
        let mut data = original.clone();
        delta_encode(&mut data, 6, 3);
        assert_eq!(&data[..6], &[10, 20, 30, 2, 2, 2]);
        delta_decode(&mut data, 6, 3);
        assert_eq!(data, original);
    }

    #[test]
    fn test_compatibility_matrix() {
        let palette4 = PixelSpec::new(SampleType::Bit4, PixelType::Palette, 1).unwrap();
        let palette8 = PixelSpec::new(SampleType::UInt8, PixelType::Palette, 1).unwrap();
        let rgb8 = PixelSpec::new(SampleType::UInt8, PixelType::Rgb, 3).unwrap();
        let rgb16 = PixelSpec::new(SampleType::UInt16, PixelType::Rgb, 3).unwrap();
        let mono = PixelSpec::new(SampleType::Bit1, PixelType::Monochrome, 1).unwrap();
        let float = PixelSpec::new(SampleType::Float32, PixelType::DataGrid, 1).unwrap();
        let multi = PixelSpec::new(SampleType::UInt8, PixelType::Multiband, 4).unwrap();

        let err = Compression::Gif.check_compatible(&palette4).unwrap_err();
        assert!(matches!(err, Rl2Error::UnsupportedEncoding(_)));
        assert!(Compression::Gif.check_compatible(&palette8).is_ok());
        assert!(Compression::Gif.check_compatible(&rgb8).is_err());

        assert!(Compression::Jpeg.check_compatible(&rgb8).is_ok());
        assert!(Compression::Jpeg.check_compatible(&rgb16).is_err());
        assert!(Compression::LossyWebp.check_compatible(&mono).is_err());

        assert!(Compression::Png.check_compatible(&rgb16).is_ok());
        assert!(Compression::Png.check_compatible(&float).is_err());
        assert!(Compression::Png.check_compatible(&multi).is_err());

        assert!(Compression::CcittFax4.check_compatible(&mono).is_ok());
        assert!(Compression::CcittFax3.check_compatible(&palette4).is_err());

        for spec in [palette4, rgb16, mono, float, multi] {
            assert!(Compression::Lzma.check_compatible(&spec).is_ok());
        }
    }
}
