use tracing::debug;

use super::header::{
    EVEN_MARKER, FLAG_MASK, FLAG_NODATA, FLAG_PALETTE, FLAG_PLANES, ODD_MARKER, TileHeader,
};
use crate::blob::{BlobWriter, crc32};
use crate::compression::{self, Compression, delta_encode};
use crate::container;
use crate::convert::pack_rows;
use crate::error::{Rl2Error, Rl2Result};
use crate::raster::Raster;
use crate::sample::Endianness;

pub(crate) const DEFAULT_QUALITY: u8 = 80;

/// Settings applied when a raster is encoded into a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub compression: Compression,
    /// Quality for JPEG and lossy WEBP, 0-100
    pub quality: u8,
    /// Store the raster's palette inside the odd BLOB
    pub embed_palette: bool,
    pub byte_order: Endianness,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            quality: DEFAULT_QUALITY,
            embed_palette: true,
            byte_order: Endianness::native(),
        }
    }
}

impl EncodeOptions {
    #[must_use] pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the lossy quality, clamped to 0-100
    #[must_use] pub fn with_quality(mut self, quality: i32) -> Self {
        self.quality = quality.clamp(0, 100) as u8;
        self
    }

    #[must_use] pub fn with_embed_palette(mut self, embed: bool) -> Self {
        self.embed_palette = embed;
        self
    }

    #[must_use] pub fn with_byte_order(mut self, order: Endianness) -> Self {
        self.byte_order = order;
        self
    }
}

/// The odd/even BLOB pair produced for one tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTile {
    pub odd: Vec<u8>,
    pub even: Option<Vec<u8>>,
}

impl EncodedTile {
    #[must_use] pub fn even(&self) -> Option<&[u8]> {
        self.even.as_deref()
    }
}

struct Section {
    raw_len: usize,
    stored: Vec<u8>,
}

impl Section {
    fn plain(data: Vec<u8>) -> Self {
        Self {
            raw_len: data.len(),
            stored: data,
        }
    }

    fn compressed(compression: Compression, data: &[u8]) -> Rl2Result<Self> {
        Ok(Self {
            raw_len: data.len(),
            stored: compression::compress(compression, data)?,
        })
    }

    fn predicted(compression: Compression, planes: &[u8], row_len: usize, distance: usize) -> Rl2Result<Self> {
        let mut data = planes.to_vec();
        if compression.uses_predictor() {
            delta_encode(&mut data, row_len, distance);
        }
        Self::compressed(compression, &data)
    }
}

/// Encode `raster` with the given compression and quality, embedding its
/// palette and using host byte order.
pub fn encode(raster: &Raster, compression: Compression, quality: i32) -> Rl2Result<EncodedTile> {
    let options = EncodeOptions::default()
        .with_compression(compression)
        .with_quality(quality);
    encode_with(raster, &options)
}

/// Encode `raster` into an odd BLOB and, when a mask or split byte planes
/// need one, an even BLOB.
pub fn encode_with(raster: &Raster, options: &EncodeOptions) -> Rl2Result<EncodedTile> {
    let spec = raster.spec();
    let compression = options.compression;
    let width = u16::try_from(raster.width())
        .map_err(|_| Rl2Error::out_of_range(format!("tile width {} exceeds 65535", raster.width())))?;
    let height = u16::try_from(raster.height())
        .map_err(|_| Rl2Error::out_of_range(format!("tile height {} exceeds 65535", raster.height())))?;

    compression.check_compatible(&spec)?;
    if compression.is_lossy() && (raster.mask().is_some() || raster.nodata().is_some()) {
        return Err(Rl2Error::unsupported(format!(
            "{compression:?} cannot preserve a transparency mask or NODATA pixel"
        )));
    }

    debug!(
        width,
        height,
        ?compression,
        sample_type = ?spec.sample_type(),
        pixel_type = ?spec.pixel_type(),
        bands = spec.num_bands(),
        "encoding tile"
    );

    let (payload, low_planes) = encode_payload(raster, options)?;
    let palette = raster.palette().filter(|_| options.embed_palette);

    let mut flags = 0;
    if palette.is_some() {
        flags |= FLAG_PALETTE;
    }
    if raster.nodata().is_some() {
        flags |= FLAG_NODATA;
    }
    if raster.mask().is_some() {
        flags |= FLAG_MASK;
    }
    if low_planes.is_some() {
        flags |= FLAG_PLANES;
    }
    let header = TileHeader::new(compression, spec, width, height, options.byte_order, flags);

    let mut writer = BlobWriter::new(options.byte_order);
    header.write(&mut writer, ODD_MARKER);
    writer.section(payload.raw_len, &payload.stored)?;
    if let Some(palette) = palette {
        palette.write_entries(&mut writer);
    }
    if let Some(nodata) = raster.nodata() {
        let blob = nodata.to_blob();
        let len = u16::try_from(blob.len())
            .map_err(|_| Rl2Error::out_of_range("NODATA pixel too large to embed"))?;
        writer.u16(len);
        writer.bytes(&blob);
    }
    writer.push_crc();
    let odd = writer.into_inner();

    let even = if header.needs_even() {
        let mut writer = BlobWriter::new(options.byte_order);
        header.write(&mut writer, EVEN_MARKER);
        writer.u32(crc32(&odd));
        if let Some(low) = &low_planes {
            writer.section(low.raw_len, &low.stored)?;
        }
        if let Some(mask) = raster.mask() {
            let section = Section::compressed(Compression::Deflate, mask)?;
            writer.section(section.raw_len, &section.stored)?;
        }
        writer.push_crc();
        Some(writer.into_inner())
    } else {
        None
    };

    Ok(EncodedTile { odd, even })
}

/// Build the odd payload and, for split multi-byte samples, the low-plane
/// section of the even BLOB.
fn encode_payload(raster: &Raster, options: &EncodeOptions) -> Rl2Result<(Section, Option<Section>)> {
    let spec = raster.spec();
    let compression = options.compression;
    let sample_type = spec.sample_type();
    let (width, height) = (raster.width() as usize, raster.height() as usize);

    if !compression.is_byte_codec() {
        let palette = raster.palette().map(|p| p.as_ref());
        let stored = container::encode(
            compression,
            &spec,
            raster.width(),
            raster.height(),
            raster.buffer(),
            palette,
            options.quality,
        )?;
        let raw_len = spec.buffer_size(width, height);
        return Ok((Section { raw_len, stored }, None));
    }

    let bands = spec.bands();
    let row_len = width * bands;
    if sample_type.is_packed() {
        let packed = pack_rows(raster.buffer(), row_len, sample_type.bits());
        return Ok((Section::compressed(compression, &packed)?, None));
    }

    let bps = sample_type.bytes_per_sample();
    if compression == Compression::None {
        let mut raw = raster.buffer().to_vec();
        if bps > 1 && options.byte_order != Endianness::native() {
            for sample in raw.chunks_exact_mut(bps) {
                sample.reverse();
            }
        }
        return Ok((Section::plain(raw), None));
    }

    let planes = byte_planes(raster.buffer(), bps);
    let count = raster.buffer().len() / bps;
    let split = if bps == 1 { count } else { bps / 2 * count };
    let (high, low) = planes.split_at(split);
    let odd = Section::predicted(compression, high, row_len, bands)?;
    let even = if low.is_empty() {
        None
    } else {
        Some(Section::predicted(compression, low, row_len, bands)?)
    };
    Ok((odd, even))
}

/// Rearrange host-order samples into big-endian byte planes
fn byte_planes(buffer: &[u8], bps: usize) -> Vec<u8> {
    let count = buffer.len() / bps;
    let mut planes = vec![0u8; buffer.len()];
    for (i, sample) in buffer.chunks_exact(bps).enumerate() {
        for k in 0..bps {
            let byte = if cfg!(target_endian = "little") {
                sample[bps - 1 - k]
            } else {
                sample[k]
            };
            planes[k * count + i] = byte;
        }
    }
    planes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::peek_header;
    use crate::pixel::Pixel;
    use crate::sample::{PixelSpec, PixelType, SampleType};

    fn gray8(width: u32, height: u32, buffer: Vec<u8>) -> Raster {
        let spec = PixelSpec::new(SampleType::UInt8, PixelType::Grayscale, 1).unwrap();
        Raster::new(width, height, spec, buffer).unwrap()
    }

    #[test]
    fn test_byte_planes_big_endian_order() {
        let samples: Vec<u8> = [0x0102u16, 0x0304].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(byte_planes(&samples, 2), vec![0x01, 0x03, 0x02, 0x04]);
    }

    #[test]
    fn test_options_builder() {
        let options = EncodeOptions::default()
            .with_compression(Compression::Jpeg)
            .with_quality(140);
        assert_eq!(options.quality, 100, "quality must be clamped");
        assert_eq!(EncodeOptions::default().with_quality(-3).quality, 0);
        assert!(options.embed_palette);
        assert_eq!(options.byte_order, Endianness::native());
    }

    #[test]
    fn test_uncompressed_layout() {
        let tile = encode(&gray8(2, 2, vec![10, 20, 30, 40]), Compression::None, 80).unwrap();
        assert!(tile.even.is_none(), "no mask and no split: odd BLOB only");
        // header(11) + section lengths(8) + payload(4) + crc(4)
        assert_eq!(tile.odd.len(), 27);
        assert_eq!(&tile.odd[19..23], &[10, 20, 30, 40]);
        assert_eq!(tile.odd[10], 0, "no optional sections");
    }

    #[test]
    fn test_uncompressed_declared_byte_order() {
        let spec = PixelSpec::new(SampleType::UInt16, PixelType::DataGrid, 1).unwrap();
        let buffer = 0x1234u16.to_ne_bytes().to_vec();
        let raster = Raster::new(1, 1, spec, buffer).unwrap();
        let options = EncodeOptions::default().with_byte_order(Endianness::Big);
        let tile = encode_with(&raster, &options).unwrap();
        assert_eq!(&tile.odd[19..21], &[0x12, 0x34]);
    }

    #[test]
    fn test_split_planes_need_even() {
        let spec = PixelSpec::new(SampleType::Int32, PixelType::DataGrid, 1).unwrap();
        let buffer: Vec<u8> = (0..64i32).flat_map(|v| (v * 1000).to_ne_bytes()).collect();
        let raster = Raster::new(8, 8, spec, buffer).unwrap();
        let tile = encode(&raster, Compression::Deflate, 80).unwrap();
        let header = peek_header(&tile.odd).unwrap();
        assert!(header.is_split());
        assert!(!header.has_mask());
        assert!(tile.even.is_some(), "low planes live in the even BLOB");
    }

    #[test]
    fn test_mask_goes_to_even() {
        let raster = gray8(4, 2, vec![1; 8]).with_mask(vec![0b1000_0001]).unwrap();
        let tile = encode(&raster, Compression::Zstd, 80).unwrap();
        let header = peek_header(&tile.odd).unwrap();
        assert!(header.has_mask());
        let even = tile.even().expect("mask requires an even BLOB");
        assert_eq!(even[9], EVEN_MARKER);
        assert_eq!(&even[..9], &tile.odd[..9], "even header mirrors the odd header");
    }

    #[test]
    fn test_lossy_rejects_mask_and_nodata() {
        let masked = gray8(2, 2, vec![5; 4]).with_mask(vec![0x80]).unwrap();
        let err = encode(&masked, Compression::Jpeg, 80).unwrap_err();
        assert!(matches!(err, Rl2Error::UnsupportedEncoding(_)));

        let mut nodata = Pixel::new(SampleType::UInt8, PixelType::Grayscale, 1).unwrap();
        nodata.set_sample_uint8(0, 5).unwrap();
        let raster = gray8(2, 2, vec![5; 4]).with_nodata(nodata).unwrap();
        assert!(encode(&raster, Compression::LossyWebp, 80).is_err());
        assert!(encode(&raster, Compression::Png, 80).is_ok(), "lossless codecs keep NODATA");
    }

    #[test]
    fn test_incompatible_compression() {
        let err = encode(&gray8(2, 2, vec![0; 4]), Compression::CcittFax4, 80).unwrap_err();
        assert!(matches!(err, Rl2Error::UnsupportedEncoding(_)));
    }
}
