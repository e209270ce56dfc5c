use std::sync::Arc;

use tracing::{debug, warn};

use super::Scale;
use super::encode::{DEFAULT_QUALITY, EncodeOptions, EncodedTile, encode_with};
use super::header::{EVEN_MARKER, ODD_MARKER, TileHeader, peek_header};
use crate::blob::{BlobReader, crc32};
use crate::compression::{self, Compression, delta_decode};
use crate::container;
use crate::error::{Rl2Error, Rl2Result, try_alloc};
use crate::palette::Palette;
use crate::pixel::Pixel;
use crate::raster::{Raster, RasterSource, mask_bit, set_mask_bit};
use crate::sample::{Endianness, PixelSpec, PixelType, SampleType, mask_size};

/// A decoded tile before it is wrapped into a [`Raster`]
pub(crate) struct DecodedTile {
    spec: PixelSpec,
    width: usize,
    height: usize,
    buffer: Vec<u8>,
    mask: Option<Vec<u8>>,
    palette: Option<Arc<Palette>>,
    nodata: Option<Pixel>,
}

impl DecodedTile {
    pub(crate) fn nodata(&self) -> Option<&Pixel> {
        self.nodata.as_ref()
    }

    pub(crate) fn into_raster(self) -> Rl2Result<Raster> {
        // dimensions come from u16 header fields
        let (width, height) = (self.width as u32, self.height as u32);
        let mut raster = match self.palette {
            Some(palette) => Raster::with_palette(width, height, self.spec, self.buffer, palette)?,
            None => Raster::new(width, height, self.spec, self.buffer)?,
        };
        raster.set_mask(self.mask)?;
        raster.set_nodata(self.nodata)?;
        Ok(raster)
    }
}

impl RasterSource for DecodedTile {
    fn spec(&self) -> PixelSpec {
        self.spec
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn pixel_bytes(&self, x: usize, y: usize) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.spec.bytes_per_pixel();
        let start = (y * self.width + x) * bpp;
        self.buffer.get(start..start + bpp)
    }

    fn is_transparent(&self, x: usize, y: usize) -> bool {
        self.mask
            .as_deref()
            .is_some_and(|m| mask_bit(m, y * self.width + x))
    }
}

/// Borrowed sections of a parsed odd/even BLOB pair
struct ParsedTile<'a> {
    header: TileHeader,
    payload: (usize, &'a [u8]),
    low_planes: Option<(usize, &'a [u8])>,
    mask: Option<(usize, &'a [u8])>,
    palette: Option<Palette>,
    nodata: Option<Pixel>,
}

impl<'a> ParsedTile<'a> {
    fn parse(odd: &'a [u8], even: Option<&'a [u8]>) -> Rl2Result<Self> {
        let (header, mut reader) = TileHeader::parse(odd, ODD_MARKER)?;
        let spec = header.spec;

        let payload = reader.section()?;
        let palette = if header.has_palette() {
            if spec.pixel_type() != PixelType::Palette {
                return Err(Rl2Error::malformed(format!(
                    "{:?} tile carries a palette section",
                    spec.pixel_type()
                )));
            }
            Some(Palette::read_entries(&mut reader)?)
        } else {
            None
        };
        let nodata = if header.has_nodata() {
            let len = reader.u16()? as usize;
            let pixel = Pixel::from_blob(reader.bytes(len)?)?;
            if pixel.spec() != spec {
                return Err(Rl2Error::malformed("NODATA pixel does not match the tile's pixel spec"));
            }
            Some(pixel)
        } else {
            None
        };
        if reader.position() != odd.len() - 4 {
            return Err(Rl2Error::malformed("trailing bytes in odd tile BLOB"));
        }

        let splits = header.compression.uses_predictor() && spec.sample_type().bytes_per_sample() > 1;
        if header.is_split() != splits {
            return Err(Rl2Error::malformed(format!(
                "byte-plane split flag inconsistent with {:?} {:?}",
                header.compression,
                spec.sample_type()
            )));
        }

        let (low_planes, mask) = match even {
            Some(even) if header.needs_even() => {
                let mut reader = paired_even(&header, odd, even)?;
                let low = if header.is_split() { Some(reader.section()?) } else { None };
                let mask = if header.has_mask() { Some(reader.section()?) } else { None };
                if reader.position() != even.len() - 4 {
                    return Err(Rl2Error::malformed("trailing bytes in even tile BLOB"));
                }
                (low, mask)
            }
            None if header.needs_even() => {
                return Err(Rl2Error::malformed("tile requires its even BLOB"));
            }
            Some(_) => {
                debug!("ignoring even BLOB of a tile that does not use one");
                (None, None)
            }
            None => (None, None),
        };

        Ok(Self {
            header,
            payload,
            low_planes,
            mask,
            palette,
            nodata,
        })
    }
}

/// Parse an even BLOB and check it belongs to `odd`
fn paired_even<'a>(
    header: &TileHeader,
    odd: &[u8],
    even: &'a [u8],
) -> Rl2Result<BlobReader<'a>> {
    let (even_header, mut reader) = TileHeader::parse(even, EVEN_MARKER)?;
    if even_header != *header {
        return Err(Rl2Error::malformed("even BLOB header does not match the odd BLOB"));
    }
    if reader.u32()? != crc32(odd) {
        return Err(Rl2Error::malformed("even BLOB belongs to a different odd BLOB"));
    }
    Ok(reader)
}

/// Decode a tile at `scale`.
///
/// `palette` is required for palette tiles stored without an embedded
/// palette, and must equal the embedded one otherwise. It is ignored for
/// other pixel types.
pub fn decode(
    scale: Scale,
    odd: &[u8],
    even: Option<&[u8]>,
    palette: Option<Arc<Palette>>,
) -> Rl2Result<Raster> {
    decode_tile(scale, odd, even, palette)?.into_raster()
}

pub(crate) fn decode_tile(
    scale: Scale,
    odd: &[u8],
    even: Option<&[u8]>,
    palette: Option<Arc<Palette>>,
) -> Rl2Result<DecodedTile> {
    let mut parsed = ParsedTile::parse(odd, even)?;
    let palette = resolve_palette(&parsed.header, parsed.palette.take(), palette)?;
    decode_parsed(&parsed, scale, palette)
}

fn resolve_palette(
    header: &TileHeader,
    embedded: Option<Palette>,
    supplied: Option<Arc<Palette>>,
) -> Rl2Result<Option<Arc<Palette>>> {
    if header.spec.pixel_type() != PixelType::Palette {
        if supplied.is_some() {
            debug!(pixel_type = ?header.spec.pixel_type(), "ignoring palette supplied for a non-palette tile");
        }
        return Ok(None);
    }
    match (embedded, supplied) {
        (Some(embedded), Some(supplied)) => {
            if embedded == *supplied {
                Ok(Some(supplied))
            } else {
                Err(Rl2Error::type_mismatch(
                    "supplied palette differs from the palette embedded in the tile",
                ))
            }
        }
        (Some(embedded), None) => Ok(Some(Arc::new(embedded))),
        (None, Some(supplied)) => Ok(Some(supplied)),
        (None, None) => Err(Rl2Error::type_mismatch(
            "palette tile has no embedded palette and none was supplied",
        )),
    }
}

fn decode_parsed(
    parsed: &ParsedTile<'_>,
    scale: Scale,
    palette: Option<Arc<Palette>>,
) -> Rl2Result<DecodedTile> {
    let header = &parsed.header;
    if matches!(header.compression, Compression::CcittFax3 | Compression::CcittFax4)
        && scale != Scale::Full
    {
        return Err(Rl2Error::unsupported(format!(
            "{:?} tiles decode at 1:1 only",
            header.compression
        )));
    }

    let (width, height) = (usize::from(header.width), usize::from(header.height));
    let (out_width, out_height) = scale.reduce(width, height);
    debug!(
        width,
        height,
        factor = scale.factor(),
        compression = ?header.compression,
        "decoding tile"
    );

    let buffer = decode_payload(parsed, scale)?;
    let mask = match parsed.mask {
        Some(section) => Some(decode_mask(section, width, height, scale)?),
        None => None,
    };

    Ok(DecodedTile {
        spec: header.spec,
        width: out_width,
        height: out_height,
        buffer,
        mask,
        palette,
        nodata: parsed.nodata.clone(),
    })
}

fn check_raw_len(raw_len: usize, expected: usize, what: &str) -> Rl2Result<()> {
    if raw_len == expected {
        Ok(())
    } else {
        Err(Rl2Error::malformed(format!(
            "{what} declares {raw_len} raw bytes, tile geometry needs {expected}"
        )))
    }
}

fn decode_payload(parsed: &ParsedTile<'_>, scale: Scale) -> Rl2Result<Vec<u8>> {
    let header = &parsed.header;
    let spec = header.spec;
    let sample_type = spec.sample_type();
    let compression = header.compression;
    let (width, height) = (usize::from(header.width), usize::from(header.height));
    let bands = spec.bands();
    let row_len = width * bands;
    let (raw_len, stored) = parsed.payload;

    if !compression.is_byte_codec() {
        check_raw_len(raw_len, spec.buffer_size(width, height), "payload")?;
        let full = container::decode(
            compression,
            &spec,
            u32::from(header.width),
            u32::from(header.height),
            stored,
        )?;
        if scale == Scale::Full {
            return Ok(full);
        }
        return resample(&full, width, height, spec.bytes_per_pixel(), scale);
    }

    if sample_type.is_packed() {
        let expected = sample_type.packed_row_bytes(row_len) * height;
        check_raw_len(raw_len, expected, "packed payload")?;
        let packed = compression::decompress(compression, stored, expected)?;
        return resample_packed(&packed, width, height, bands, sample_type, scale);
    }

    let bps = sample_type.bytes_per_sample();
    let count = width * height * bands;
    if compression == Compression::None {
        check_raw_len(raw_len, count * bps, "payload")?;
        if stored.len() != raw_len {
            return Err(Rl2Error::malformed("uncompressed payload length mismatch"));
        }
        let mut out = resample(stored, width, height, spec.bytes_per_pixel(), scale)?;
        if bps > 1 && header.byte_order != Endianness::native() {
            for sample in out.chunks_exact_mut(bps) {
                sample.reverse();
            }
        }
        return Ok(out);
    }

    let high_planes = if bps == 1 { 1 } else { bps / 2 };
    let high = inflate_planes(compression, parsed.payload, high_planes * count, row_len, bands)?;
    let low = match parsed.low_planes {
        Some(section) => inflate_planes(
            compression,
            section,
            (bps - high_planes) * count,
            row_len,
            bands,
        )?,
        None if bps > 1 => return Err(Rl2Error::malformed("missing low byte planes")),
        None => Vec::new(),
    };

    let factor = scale.factor();
    let (out_width, out_height) = scale.reduce(width, height);
    let mut out = try_alloc(out_width * out_height * bands * bps)?;
    let mut offset = 0;
    for row in 0..out_height {
        for col in 0..out_width {
            let pixel = row * factor * width + col * factor;
            for band in 0..bands {
                let i = pixel * bands + band;
                for k in 0..bps {
                    let byte = if k < high_planes {
                        high[k * count + i]
                    } else {
                        low[(k - high_planes) * count + i]
                    };
                    let dst = if cfg!(target_endian = "little") { bps - 1 - k } else { k };
                    out[offset + dst] = byte;
                }
                offset += bps;
            }
        }
    }
    Ok(out)
}

fn inflate_planes(
    compression: Compression,
    (raw_len, stored): (usize, &[u8]),
    expected: usize,
    row_len: usize,
    distance: usize,
) -> Rl2Result<Vec<u8>> {
    check_raw_len(raw_len, expected, "byte planes")?;
    let mut planes = compression::decompress(compression, stored, expected)?;
    delta_decode(&mut planes, row_len, distance);
    Ok(planes)
}

/// Nearest-sample selection of whole pixels: output `(r, c)` takes source
/// `(r * factor, c * factor)`.
fn resample(src: &[u8], width: usize, height: usize, bpp: usize, scale: Scale) -> Rl2Result<Vec<u8>> {
    let factor = scale.factor();
    let (out_width, out_height) = scale.reduce(width, height);
    let mut out = try_alloc(out_width * out_height * bpp)?;
    for (row, dst_row) in out.chunks_exact_mut(out_width * bpp).enumerate() {
        let src_row = row * factor * width;
        for (col, dst) in dst_row.chunks_exact_mut(bpp).enumerate() {
            let start = (src_row + col * factor) * bpp;
            dst.copy_from_slice(&src[start..start + bpp]);
        }
    }
    Ok(out)
}

/// Pick samples straight out of row-padded packed rows
fn resample_packed(
    packed: &[u8],
    width: usize,
    height: usize,
    bands: usize,
    sample_type: SampleType,
    scale: Scale,
) -> Rl2Result<Vec<u8>> {
    let bits = sample_type.bits() as usize;
    let row_bytes = sample_type.packed_row_bytes(width * bands);
    let value_mask = ((1u16 << bits) - 1) as u8;
    let factor = scale.factor();
    let (out_width, out_height) = scale.reduce(width, height);
    let mut out = try_alloc(out_width * out_height * bands)?;
    let mut offset = 0;
    for row in 0..out_height {
        let src_row = &packed[row * factor * row_bytes..][..row_bytes];
        for col in 0..out_width {
            for band in 0..bands {
                let bit = ((col * factor) * bands + band) * bits;
                out[offset] = (src_row[bit / 8] >> (8 - bits - bit % 8)) & value_mask;
                offset += 1;
            }
        }
    }
    Ok(out)
}

fn decode_mask(
    (raw_len, stored): (usize, &[u8]),
    width: usize,
    height: usize,
    scale: Scale,
) -> Rl2Result<Vec<u8>> {
    let expected = mask_size(width, height);
    check_raw_len(raw_len, expected, "mask")?;
    let full = compression::decompress(Compression::Deflate, stored, expected)?;
    if scale == Scale::Full {
        return Ok(full);
    }
    let factor = scale.factor();
    let (out_width, out_height) = scale.reduce(width, height);
    let mut mask = try_alloc(mask_size(out_width, out_height))?;
    for row in 0..out_height {
        for col in 0..out_width {
            if mask_bit(&full, row * factor * width + col * factor) {
                set_mask_bit(&mut mask, row * out_width + col, true);
            }
        }
    }
    Ok(mask)
}

/// Sample spec and compression of tiles stored at pyramid `level`.
///
/// Reduced levels hold resampled colors: monochrome promotes to 8-bit
/// grayscale and palette to 8-bit RGB, and a compression that cannot carry
/// the promoted spec falls back to DEFLATE.
pub fn pyramid_spec(
    level: u32,
    spec: PixelSpec,
    compression: Compression,
) -> Rl2Result<(PixelSpec, Compression)> {
    let promoted = match (level, spec.pixel_type()) {
        (0, _) => return Ok((spec, compression)),
        (_, PixelType::Monochrome) => PixelSpec::new(SampleType::UInt8, PixelType::Grayscale, 1)?,
        (_, PixelType::Palette) => PixelSpec::new(SampleType::UInt8, PixelType::Rgb, 3)?,
        _ => return Ok((spec, compression)),
    };
    let compression = if compression.check_compatible(&promoted).is_ok() {
        compression
    } else {
        Compression::Deflate
    };
    Ok((promoted, compression))
}

/// Check that a stored BLOB pair is a `tile_width` x `tile_height` tile of
/// the given spec and compression at pyramid `level`, without decoding the
/// payload.
pub fn validate_tile(
    level: u32,
    tile_width: u32,
    tile_height: u32,
    odd: &[u8],
    even: Option<&[u8]>,
    spec: PixelSpec,
    compression: Compression,
) -> Rl2Result<()> {
    let (spec, compression) = pyramid_spec(level, spec, compression)?;
    let header = peek_header(odd)?;
    if u32::from(header.width) != tile_width || u32::from(header.height) != tile_height {
        return Err(Rl2Error::malformed(format!(
            "tile is {}x{}, expected {tile_width}x{tile_height}",
            header.width, header.height
        )));
    }
    if header.spec != spec {
        return Err(Rl2Error::malformed(format!(
            "tile holds {:?} {:?} x{}, expected {:?} {:?} x{}",
            header.spec.sample_type(),
            header.spec.pixel_type(),
            header.spec.num_bands(),
            spec.sample_type(),
            spec.pixel_type(),
            spec.num_bands()
        )));
    }
    if header.compression != compression {
        return Err(Rl2Error::malformed(format!(
            "tile compressed with {:?}, expected {compression:?}",
            header.compression
        )));
    }
    match (header.needs_even(), even) {
        (true, Some(even)) => paired_even(&header, odd, even).map(|_| ()),
        (true, None) => Err(Rl2Error::malformed("tile requires its even BLOB")),
        (false, Some(_)) => Err(Rl2Error::malformed("unexpected even BLOB")),
        (false, None) => Ok(()),
    }
}

/// Boolean form of [`validate_tile`]; rejections are logged.
pub fn is_valid_dbms_raster_tile(
    level: u32,
    tile_width: u32,
    tile_height: u32,
    odd: &[u8],
    even: Option<&[u8]>,
    spec: PixelSpec,
    compression: Compression,
) -> bool {
    match validate_tile(level, tile_width, tile_height, odd, even, spec, compression) {
        Ok(()) => true,
        Err(e) => {
            warn!(level, tile_width, tile_height, error = %e, "rejecting stored tile");
            false
        }
    }
}

/// Re-encode a palette tile with `palette` in place of its own.
///
/// Indices are kept as stored, so every index must address an entry of
/// the new palette. Compression and byte order are preserved.
pub fn rewrite_palette(
    odd: &[u8],
    even: Option<&[u8]>,
    palette: impl Into<Arc<Palette>>,
) -> Rl2Result<EncodedTile> {
    let parsed = ParsedTile::parse(odd, even)?;
    let header = parsed.header;
    if header.spec.pixel_type() != PixelType::Palette {
        return Err(Rl2Error::type_mismatch(format!(
            "cannot replace the palette of a {:?} tile",
            header.spec.pixel_type()
        )));
    }
    let raster = decode_parsed(&parsed, Scale::Full, Some(palette.into()))?.into_raster()?;
    let options = EncodeOptions {
        compression: header.compression,
        quality: DEFAULT_QUALITY,
        embed_palette: true,
        byte_order: header.byte_order,
    };
    encode_with(&raster, &options)
}
