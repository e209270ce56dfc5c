//! Indexed color tables.

use crate::blob::{BlobReader, BlobWriter, verify_trailing_crc};
use crate::error::{Rl2Error, Rl2Result};
use crate::sample::{Endianness, PixelType, SampleType};

const PALETTE_START: u8 = 0x04;

/// Maximum number of entries a palette may hold
pub const MAX_PALETTE_ENTRIES: usize = 256;

/// One RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PaletteEntry {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl PaletteEntry {
    #[must_use] pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Parse a `#rrggbb` color
    pub fn from_hex(hex: &str) -> Rl2Result<Self> {
        let digits = hex
            .strip_prefix('#')
            .filter(|d| d.len() == 6 && d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| Rl2Error::out_of_range(format!("malformed hex color {hex:?}")))?;
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| Rl2Error::out_of_range(format!("malformed hex color {hex:?}: {e}")))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    #[must_use] pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }

    #[must_use] pub fn is_gray(&self) -> bool {
        self.red == self.green && self.green == self.blue
    }
}

/// An ordered, bounded list of RGB colors addressed by sample index.
///
/// All entries start black. The size is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Palette {
    /// Create a palette of `num_entries` black entries (1..=256)
    pub fn new(num_entries: usize) -> Rl2Result<Self> {
        if !(1..=MAX_PALETTE_ENTRIES).contains(&num_entries) {
            return Err(Rl2Error::out_of_range(format!(
                "palette size {num_entries} outside 1..={MAX_PALETTE_ENTRIES}"
            )));
        }
        Ok(Self {
            entries: vec![PaletteEntry::default(); num_entries],
        })
    }

    /// Build from an explicit list of colors
    pub fn from_entries(entries: Vec<PaletteEntry>) -> Rl2Result<Self> {
        let mut palette = Self::new(entries.len())?;
        palette.entries = entries;
        Ok(palette)
    }

    #[must_use] pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a palette holds at least one entry
    #[must_use] pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use] pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    fn check_index(&self, index: usize) -> Rl2Result<()> {
        if index >= self.entries.len() {
            return Err(Rl2Error::out_of_range(format!(
                "palette index {index} outside 0..{}",
                self.entries.len()
            )));
        }
        Ok(())
    }

    pub fn set_color(&mut self, index: usize, red: u8, green: u8, blue: u8) -> Rl2Result<()> {
        self.check_index(index)?;
        self.entries[index] = PaletteEntry::new(red, green, blue);
        Ok(())
    }

    /// Set an entry from a `#rrggbb` string
    pub fn set_color_hex(&mut self, index: usize, hex: &str) -> Rl2Result<()> {
        self.check_index(index)?;
        self.entries[index] = PaletteEntry::from_hex(hex)?;
        Ok(())
    }

    pub fn color(&self, index: usize) -> Rl2Result<PaletteEntry> {
        self.check_index(index)?;
        Ok(self.entries[index])
    }

    /// Exact-match reverse lookup; the first matching index wins
    pub fn find_index(&self, red: u8, green: u8, blue: u8) -> Rl2Result<usize> {
        let wanted = PaletteEntry::new(red, green, blue);
        self.entries
            .iter()
            .position(|e| *e == wanted)
            .ok_or_else(|| {
                Rl2Error::out_of_range(format!("no palette entry matches {}", wanted.to_hex()))
            })
    }

    /// All colors as three parallel component vectors (red, green, blue)
    #[must_use] pub fn colors(&self) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let red = self.entries.iter().map(|e| e.red).collect();
        let green = self.entries.iter().map(|e| e.green).collect();
        let blue = self.entries.iter().map(|e| e.blue).collect();
        (red, green, blue)
    }

    /// Smallest sample type and best pixel type able to represent this palette.
    ///
    /// A white/black pair maps to monochrome (index 0 white, 1 black), a
    /// linear gray ramp of 4, 16 or 256 levels maps to grayscale, anything
    /// else stays palette-indexed with the narrowest index width.
    #[must_use] pub fn best_fit(&self) -> (SampleType, PixelType) {
        let white = PaletteEntry::new(255, 255, 255);
        let black = PaletteEntry::new(0, 0, 0);
        if self.entries.as_slice() == [white, black] {
            return (SampleType::Bit1, PixelType::Monochrome);
        }

        let n = self.entries.len();
        let gray_sample = match n {
            4 => Some(SampleType::Bit2),
            16 => Some(SampleType::Bit4),
            256 => Some(SampleType::UInt8),
            _ => None,
        };
        if let Some(sample) = gray_sample
            && self.is_gray_ramp()
        {
            return (sample, PixelType::Grayscale);
        }

        let sample = match n {
            0..=2 => SampleType::Bit1,
            3..=4 => SampleType::Bit2,
            5..=16 => SampleType::Bit4,
            _ => SampleType::UInt8,
        };
        (sample, PixelType::Palette)
    }

    fn is_gray_ramp(&self) -> bool {
        let last = self.entries.len() - 1;
        self.entries.iter().enumerate().all(|(i, entry)| {
            entry.is_gray() && usize::from(entry.red) == i * 255 / last
        })
    }

    pub(crate) fn write_entries(&self, writer: &mut BlobWriter) {
        // len() <= 256 always fits
        writer.u16(self.entries.len() as u16);
        for entry in &self.entries {
            writer.bytes(&[entry.red, entry.green, entry.blue]);
        }
    }

    pub(crate) fn read_entries(reader: &mut BlobReader<'_>) -> Rl2Result<Self> {
        let count = usize::from(reader.u16()?);
        if !(1..=MAX_PALETTE_ENTRIES).contains(&count) {
            return Err(Rl2Error::malformed(format!("palette of {count} entries")));
        }
        let raw = reader.bytes(count * 3)?;
        let entries = raw
            .chunks_exact(3)
            .map(|rgb| PaletteEntry::new(rgb[0], rgb[1], rgb[2]))
            .collect();
        Ok(Self { entries })
    }

    #[must_use] pub fn to_blob(&self) -> Vec<u8> {
        let order = Endianness::native();
        let mut writer = BlobWriter::new(order);
        writer.u8(PALETTE_START);
        writer.u8(order.flag());
        self.write_entries(&mut writer);
        writer.push_crc();
        writer.into_inner()
    }

    pub fn from_blob(blob: &[u8]) -> Rl2Result<Self> {
        if blob.len() < 2 || blob[0] != PALETTE_START {
            return Err(Rl2Error::malformed("not a serialized palette"));
        }
        let order = Endianness::from_flag(blob[1])?;
        let body = verify_trailing_crc(blob, order)?;
        let mut reader = BlobReader::at(body, 2, order);
        let palette = Self::read_entries(&mut reader)?;
        if reader.position() != body.len() {
            return Err(Rl2Error::malformed("trailing bytes after serialized palette"));
        }
        Ok(palette)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_bounds() {
        let mut palette = Palette::new(256).unwrap();
        palette.set_color(255, 1, 2, 3).unwrap();
        let err = palette.set_color(256, 1, 2, 3).unwrap_err();
        assert!(matches!(err, Rl2Error::OutOfRange(_)));
        assert!(palette.color(256).is_err());

        assert!(Palette::new(0).is_err());
        assert!(Palette::new(257).is_err());
    }

    #[test]
    fn test_hex_colors() {
        let mut palette = Palette::new(2).unwrap();
        palette.set_color_hex(1, "#FF8000").unwrap();
        assert_eq!(palette.color(1).unwrap(), PaletteEntry::new(255, 128, 0));
        assert_eq!(palette.color(1).unwrap().to_hex(), "#ff8000");

        for bad in ["ff8000", "#ff800", "#gg8000", "#ff80000", ""] {
            assert!(palette.set_color_hex(0, bad).is_err(), "{bad:?} must be rejected");
        }
        assert_eq!(palette.color(0).unwrap(), PaletteEntry::default());
    }

    #[test]
    fn test_find_index() {
        let mut palette = Palette::new(3).unwrap();
        palette.set_color(0, 10, 20, 30).unwrap();
        palette.set_color(2, 200, 100, 50).unwrap();
        assert_eq!(palette.find_index(200, 100, 50).unwrap(), 2);
        assert!(matches!(palette.find_index(1, 1, 1), Err(Rl2Error::OutOfRange(_))));
    }

    #[test]
    fn test_colors_export() {
        let palette = Palette::from_entries(vec![
            PaletteEntry::new(1, 2, 3),
            PaletteEntry::new(4, 5, 6),
        ])
        .unwrap();
        let (r, g, b) = palette.colors();
        assert_eq!(r, vec![1, 4]);
        assert_eq!(g, vec![2, 5]);
        assert_eq!(b, vec![3, 6]);
    }

    #[test]
    fn test_best_fit() {
        let mono = Palette::from_entries(vec![
            PaletteEntry::new(255, 255, 255),
            PaletteEntry::new(0, 0, 0),
        ])
        .unwrap();
        assert_eq!(mono.best_fit(), (SampleType::Bit1, PixelType::Monochrome));

        let ramp: Vec<_> = (0..16u8).map(|i| PaletteEntry::new(i * 17, i * 17, i * 17)).collect();
        let gray = Palette::from_entries(ramp).unwrap();
        assert_eq!(gray.best_fit(), (SampleType::Bit4, PixelType::Grayscale));

        let mut colored = Palette::new(5).unwrap();
        colored.set_color(4, 255, 0, 0).unwrap();
        assert_eq!(colored.best_fit(), (SampleType::Bit4, PixelType::Palette));

        let wide = Palette::new(17).unwrap();
        assert_eq!(wide.best_fit(), (SampleType::UInt8, PixelType::Palette));

        let pair = Palette::new(2).unwrap();
        assert_eq!(pair.best_fit(), (SampleType::Bit1, PixelType::Palette));
    }

    #[test]
    fn test_blob_roundtrip() {
        let mut palette = Palette::new(4).unwrap();
        palette.set_color_hex(3, "#102030").unwrap();
        let blob = palette.to_blob();
        assert_eq!(Palette::from_blob(&blob).unwrap(), palette);

        let mut corrupt = blob.clone();
        corrupt[5] ^= 0x01;
        assert!(matches!(Palette::from_blob(&corrupt), Err(Rl2Error::MalformedBlob(_))));
    }
}
