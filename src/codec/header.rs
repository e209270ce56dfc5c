//! Fixed tile header shared by the odd and even BLOBs.

use crate::blob::{BlobReader, BlobWriter, verify_trailing_crc};
use crate::compression::Compression;
use crate::error::{Rl2Error, Rl2Result};
use crate::sample::{Endianness, PixelSpec};

pub(crate) const ODD_MARKER: u8 = 0xC8;
pub(crate) const EVEN_MARKER: u8 = 0xC9;

pub(crate) const FLAG_PALETTE: u8 = 0x01;
pub(crate) const FLAG_NODATA: u8 = 0x02;
pub(crate) const FLAG_MASK: u8 = 0x04;
pub(crate) const FLAG_PLANES: u8 = 0x08;
const KNOWN_FLAGS: u8 = FLAG_PALETTE | FLAG_NODATA | FLAG_MASK | FLAG_PLANES;

const ENDIAN_OFFSET: usize = 8;
const MARKER_OFFSET: usize = 9;

/// Parsed header of an encoded tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHeader {
    pub compression: Compression,
    pub spec: PixelSpec,
    pub width: u16,
    pub height: u16,
    pub byte_order: Endianness,
    flags: u8,
}

impl TileHeader {
    pub(crate) fn new(
        compression: Compression,
        spec: PixelSpec,
        width: u16,
        height: u16,
        byte_order: Endianness,
        flags: u8,
    ) -> Self {
        Self {
            compression,
            spec,
            width,
            height,
            byte_order,
            flags,
        }
    }

    #[must_use] pub fn has_palette(&self) -> bool {
        self.flags & FLAG_PALETTE != 0
    }

    #[must_use] pub fn has_nodata(&self) -> bool {
        self.flags & FLAG_NODATA != 0
    }

    #[must_use] pub fn has_mask(&self) -> bool {
        self.flags & FLAG_MASK != 0
    }

    /// Low byte planes of multi-byte samples live in the even BLOB
    #[must_use] pub fn is_split(&self) -> bool {
        self.flags & FLAG_PLANES != 0
    }

    /// Whether an even BLOB must accompany the odd one
    #[must_use] pub fn needs_even(&self) -> bool {
        self.flags & (FLAG_MASK | FLAG_PLANES) != 0
    }

    pub(crate) fn write(&self, writer: &mut BlobWriter, marker: u8) {
        writer.u8(self.compression.code());
        writer.u8(self.spec.sample_type().code());
        writer.u8(self.spec.pixel_type().code());
        writer.u8(self.spec.num_bands());
        writer.u16(self.width);
        writer.u16(self.height);
        writer.u8(self.byte_order.flag());
        writer.u8(marker);
        writer.u8(self.flags);
    }

    /// Check the trailing CRC, parse the header and return a reader
    /// positioned just past the flags byte.
    pub(crate) fn parse(blob: &[u8], marker: u8) -> Rl2Result<(Self, BlobReader<'_>)> {
        if blob.len() <= MARKER_OFFSET + 1 {
            return Err(Rl2Error::malformed(format!("tile BLOB of {} bytes", blob.len())));
        }
        let byte_order = Endianness::from_flag(blob[ENDIAN_OFFSET])?;
        let body = verify_trailing_crc(blob, byte_order)?;
        let mut reader = BlobReader::new(body, byte_order);

        let compression = Compression::from_code(reader.u8()?)?;
        let spec = PixelSpec::from_codes(reader.u8()?, reader.u8()?, reader.u8()?)?;
        let width = reader.u16()?;
        let height = reader.u16()?;
        if width == 0 || height == 0 {
            return Err(Rl2Error::malformed(format!("tile of {width}x{height} pixels")));
        }
        reader.u8()?;
        let what = if marker == ODD_MARKER { "odd tile" } else { "even tile" };
        reader.expect_marker(marker, what)?;
        let flags = reader.u8()?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(Rl2Error::malformed(format!("unknown tile flags {flags:#04x}")));
        }
        compression
            .check_compatible(&spec)
            .map_err(|e| Rl2Error::malformed(format!("incoherent tile header: {e}")))?;

        let header = Self::new(compression, spec, width, height, byte_order, flags);
        Ok((header, reader))
    }
}

/// Parse the header of an odd tile BLOB without decoding its payload
pub fn peek_header(odd: &[u8]) -> Rl2Result<TileHeader> {
    TileHeader::parse(odd, ODD_MARKER).map(|(header, _)| header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{PixelType, SampleType};

    fn header_blob(order: Endianness, flags: u8) -> Vec<u8> {
        let spec = PixelSpec::new(SampleType::UInt16, PixelType::DataGrid, 1).unwrap();
        let header = TileHeader::new(Compression::Deflate, spec, 300, 2, order, flags);
        let mut writer = BlobWriter::new(order);
        header.write(&mut writer, ODD_MARKER);
        writer.push_crc();
        writer.into_inner()
    }

    #[test]
    fn test_header_layout() {
        let blob = header_blob(Endianness::Big, FLAG_PLANES);
        assert_eq!(&blob[..11], &[0x22, 0xA7, 0x16, 1, 0x01, 0x2C, 0x00, 0x02, 0x00, 0xC8, 0x08]);

        let header = peek_header(&blob).unwrap();
        assert_eq!(header.width, 300);
        assert_eq!(header.height, 2);
        assert!(header.is_split());
        assert!(header.needs_even());
        assert!(!header.has_mask());
    }

    #[test]
    fn test_header_little_endian() {
        let blob = header_blob(Endianness::Little, 0);
        assert_eq!(&blob[4..6], &[0x2C, 0x01]);
        let header = peek_header(&blob).unwrap();
        assert_eq!(header.byte_order, Endianness::Little);
        assert!(!header.needs_even());
    }

    #[test]
    fn test_header_rejects_corruption() {
        let mut blob = header_blob(Endianness::Little, 0);
        blob[9] = EVEN_MARKER;
        assert!(matches!(peek_header(&blob), Err(Rl2Error::MalformedBlob(_))));

        assert!(peek_header(&[0x21, 0xA5]).is_err());

        let blob = header_blob(Endianness::Little, 0x40);
        assert!(peek_header(&blob).is_err(), "unknown flags must be rejected");
    }
}
