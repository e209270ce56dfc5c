//! CCITT bi-level codecs for monochrome tiles.
//!
//! Group 3 is T.4 one-dimensional coding (modified Huffman): every row
//! starts with an EOL code and is coded as alternating white/black runs,
//! and the stream ends with six EOLs (RTC). Group 4 is T.6 two-dimensional
//! coding against the previous row (an all-white row above the first),
//! closed by EOFB. Bits are written MSB-first; pixel 0 is white, 1 black.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{Rl2Error, Rl2Result};

const WHITE: u8 = 0;

// runs 0..=63
const WHITE_TERMINATING: [&str; 64] = [
    "00110101", "000111", "0111", "1000", "1011", "1100", "1110", "1111", "10011", "10100",
    "00111", "01000", "001000", "000011", "110100", "110101", "101010", "101011", "0100111",
    "0001100", "0001000", "0010111", "0000011", "0000100", "0101000", "0101011", "0010011",
    "0100100", "0011000", "00000010", "00000011", "00011010", "00011011", "00010010",
    "00010011", "00010100", "00010101", "00010110", "00010111", "00101000", "00101001",
    "00101010", "00101011", "00101100", "00101101", "00000100", "00000101", "00001010",
    "00001011", "01010010", "01010011", "01010100", "01010101", "00100100", "00100101",
    "01011000", "01011001", "01011010", "01011011", "01001010", "01001011", "00110010",
    "00110011", "00110100",
];

// runs 64..=1728, step 64
const WHITE_MAKEUP: [&str; 27] = [
    "11011", "10010", "010111", "0110111", "00110110", "00110111", "01100100", "01100101",
    "01101000", "01100111", "011001100", "011001101", "011010010", "011010011", "011010100",
    "011010101", "011010110", "011010111", "011011000", "011011001", "011011010", "011011011",
    "010011000", "010011001", "010011010", "011000", "010011011",
];

// runs 0..=63
const BLACK_TERMINATING: [&str; 64] = [
    "0000110111", "010", "11", "10", "011", "0011", "0010", "00011", "000101", "000100",
    "0000100", "0000101", "0000111", "00000100", "00000111", "000011000", "0000010111",
    "0000011000", "0000001000", "00001100111", "00001101000", "00001101100", "00000110111",
    "00000101000", "00000010111", "00000011000", "000011001010", "000011001011", "000011001100",
    "000011001101", "000001101000", "000001101001", "000001101010", "000001101011",
    "000011010010", "000011010011", "000011010100", "000011010101", "000011010110",
    "000011010111", "000001101100", "000001101101", "000011011010", "000011011011",
    "000001010100", "000001010101", "000001010110", "000001010111", "000001100100",
    "000001100101", "000001010010", "000001010011", "000000100100", "000000110111",
    "000000111000", "000000100111", "000000101000", "000001011000", "000001011001",
    "000000101011", "000000101100", "000001011010", "000001100110", "000001100111",
];

// runs 64..=1728, step 64
const BLACK_MAKEUP: [&str; 27] = [
    "0000001111", "000011001000", "000011001001", "000001011011", "000000110011",
    "000000110100", "000000110101", "0000001101100", "0000001101101", "0000001001010",
    "0000001001011", "0000001001100", "0000001001101", "0000001110010", "0000001110011",
    "0000001110100", "0000001110101", "0000001110110", "0000001110111", "0000001010010",
    "0000001010011", "0000001010100", "0000001010101", "0000001011010", "0000001011011",
    "0000001100100", "0000001100101",
];

// runs 1792..=2560, step 64, shared by both colors
const EXTENDED_MAKEUP: [&str; 13] = [
    "00000001000", "00000001100", "00000001101", "000000010010", "000000010011", "000000010100",
    "000000010101", "000000010110", "000000010111", "000000011100", "000000011101",
    "000000011110", "000000011111",
];

const MAX_CODE_LEN: u8 = 13;
const MAX_MODE_LEN: u8 = 7;
const LONGEST_MAKEUP: usize = 2560;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Code {
    bits: u16,
    len: u8,
}

impl Code {
    const fn new(bits: u16, len: u8) -> Self {
        Self { bits, len }
    }

    fn parse(pattern: &str) -> Self {
        let bits = pattern
            .bytes()
            .fold(0u16, |acc, b| (acc << 1) | u16::from(b == b'1'));
        Self::new(bits, pattern.len() as u8)
    }
}

const EOL: Code = Code::new(0b0000_0000_0001, 12);
const MODE_PASS: Code = Code::new(0b0001, 4);
const MODE_HORIZONTAL: Code = Code::new(0b001, 3);
const MODE_VERTICAL: [Code; 7] = [
    Code::new(0b0000010, 7), // VL3
    Code::new(0b000010, 6),  // VL2
    Code::new(0b010, 3),     // VL1
    Code::new(0b1, 1),       // V0
    Code::new(0b011, 3),     // VR1
    Code::new(0b000011, 6),  // VR2
    Code::new(0b0000011, 7), // VR3
];

struct RunTable {
    terminating: Vec<Code>,
    makeup: Vec<Code>,
    decode: HashMap<(u8, u16), usize>,
}

struct Tables {
    white: RunTable,
    black: RunTable,
    extended: Vec<Code>,
}

impl RunTable {
    fn build(terminating: &[&str], makeup: &[&str]) -> Self {
        let terminating: Vec<Code> = terminating.iter().map(|p| Code::parse(p)).collect();
        let makeup: Vec<Code> = makeup.iter().map(|p| Code::parse(p)).collect();
        let mut decode = HashMap::new();
        for (run, code) in terminating.iter().enumerate() {
            decode.insert((code.len, code.bits), run);
        }
        for (i, code) in makeup.iter().enumerate() {
            decode.insert((code.len, code.bits), (i + 1) * 64);
        }
        for (i, pattern) in EXTENDED_MAKEUP.iter().enumerate() {
            let code = Code::parse(pattern);
            decode.insert((code.len, code.bits), 1792 + i * 64);
        }
        Self {
            terminating,
            makeup,
            decode,
        }
    }
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(|| Tables {
        white: RunTable::build(&WHITE_TERMINATING, &WHITE_MAKEUP),
        black: RunTable::build(&BLACK_TERMINATING, &BLACK_MAKEUP),
        extended: EXTENDED_MAKEUP.iter().map(|p| Code::parse(p)).collect(),
    })
}

fn run_table(color: u8) -> &'static RunTable {
    if color == WHITE {
        &tables().white
    } else {
        &tables().black
    }
}

#[derive(Default)]
struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    pending: u32,
}

impl BitWriter {
    fn put(&mut self, code: Code) {
        self.acc = (self.acc << code.len) | u32::from(code.bits);
        self.pending += u32::from(code.len);
        while self.pending >= 8 {
            self.pending -= 8;
            self.out.push((self.acc >> self.pending) as u8);
        }
        self.acc &= (1 << self.pending) - 1;
    }

    fn put_run(&mut self, mut run: usize, color: u8) {
        let table = run_table(color);
        let extended = &tables().extended;
        while run >= LONGEST_MAKEUP + 64 {
            self.put(extended[extended.len() - 1]);
            run -= LONGEST_MAKEUP;
        }
        if run >= 64 {
            let makeup = run / 64;
            if makeup <= table.makeup.len() {
                self.put(table.makeup[makeup - 1]);
            } else {
                self.put(extended[makeup - table.makeup.len() - 1]);
            }
            run %= 64;
        }
        self.put(table.terminating[run]);
    }

    fn finish(mut self) -> Vec<u8> {
        if self.pending > 0 {
            self.out.push((self.acc << (8 - self.pending)) as u8);
        }
        self.out
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bit(&mut self) -> Rl2Result<u16> {
        let byte = self
            .data
            .get(self.pos / 8)
            .ok_or_else(|| Rl2Error::malformed("CCITT stream ends early"))?;
        let bit = (byte >> (7 - self.pos % 8)) & 1;
        self.pos += 1;
        Ok(u16::from(bit))
    }

    fn bits(&mut self, len: u8) -> Rl2Result<u16> {
        let mut value = 0u16;
        for _ in 0..len {
            value = (value << 1) | self.bit()?;
        }
        Ok(value)
    }

    fn run(&mut self, color: u8) -> Rl2Result<usize> {
        let table = run_table(color);
        let mut total = 0usize;
        loop {
            let mut bits = 0u16;
            let mut value = None;
            for len in 1..=MAX_CODE_LEN {
                bits = (bits << 1) | self.bit()?;
                if let Some(&v) = table.decode.get(&(len, bits)) {
                    value = Some(v);
                    break;
                }
            }
            let value = value.ok_or_else(|| Rl2Error::malformed("invalid CCITT run code"))?;
            total += value;
            if value < 64 {
                return Ok(total);
            }
        }
    }

    fn mode(&mut self) -> Rl2Result<Mode> {
        let mut bits = 0u16;
        for len in 1..=MAX_MODE_LEN {
            bits = (bits << 1) | self.bit()?;
            let code = Code::new(bits, len);
            if code == MODE_PASS {
                return Ok(Mode::Pass);
            }
            if code == MODE_HORIZONTAL {
                return Ok(Mode::Horizontal);
            }
            if let Some(i) = MODE_VERTICAL.iter().position(|&v| v == code) {
                return Ok(Mode::Vertical(i as isize - 3));
            }
        }
        Err(Rl2Error::malformed("invalid CCITT coding mode"))
    }
}

enum Mode {
    Pass,
    Horizontal,
    Vertical(isize),
}

fn check_geometry(pixels: usize, width: usize, height: usize) -> Rl2Result<()> {
    if width == 0 || height == 0 || pixels != width * height {
        return Err(Rl2Error::type_mismatch(format!(
            "{pixels} pixels do not form a {width}x{height} bi-level image"
        )));
    }
    Ok(())
}

/// T.4 one-dimensional (modified Huffman) encoding
pub(crate) fn encode_fax3(pixels: &[u8], width: usize, height: usize) -> Rl2Result<Vec<u8>> {
    check_geometry(pixels.len(), width, height)?;
    let mut writer = BitWriter::default();
    for row in pixels.chunks_exact(width) {
        writer.put(EOL);
        let mut color = WHITE;
        let mut pos = 0;
        while pos < width {
            let end = row[pos..]
                .iter()
                .position(|&p| p != color)
                .map_or(width, |n| pos + n);
            writer.put_run(end - pos, color);
            pos = end;
            color ^= 1;
        }
    }
    for _ in 0..6 {
        writer.put(EOL);
    }
    Ok(writer.finish())
}

pub(crate) fn decode_fax3(data: &[u8], width: usize, height: usize) -> Rl2Result<Vec<u8>> {
    check_geometry(width * height, width, height)?;
    let mut pixels = vec![WHITE; width * height];
    let mut reader = BitReader::new(data);
    for row in pixels.chunks_exact_mut(width) {
        if reader.bits(EOL.len)? != EOL.bits {
            return Err(Rl2Error::malformed("missing CCITT EOL"));
        }
        let mut color = WHITE;
        let mut pos = 0;
        while pos < width {
            let run = reader.run(color)?;
            if pos + run > width {
                return Err(Rl2Error::malformed("CCITT run overflows the row"));
            }
            row[pos..pos + run].fill(color);
            pos += run;
            color ^= 1;
        }
    }
    Ok(pixels)
}

#[inline]
fn pixel_at(line: &[u8], i: isize) -> u8 {
    if i < 0 { WHITE } else { line[i as usize] }
}

/// First changing element strictly right of `a0`, or `line.len()`
fn next_change(line: &[u8], a0: isize) -> usize {
    let start = (a0 + 1).max(0) as usize;
    (start..line.len())
        .find(|&i| line[i] != pixel_at(line, i as isize - 1))
        .unwrap_or(line.len())
}

/// `b1`: first changing element on the reference line right of `a0`
/// whose color is opposite to `color`
fn find_b1(reference: &[u8], a0: isize, color: u8) -> usize {
    let start = (a0 + 1).max(0) as usize;
    (start..reference.len())
        .find(|&i| reference[i] != color && pixel_at(reference, i as isize - 1) == color)
        .unwrap_or(reference.len())
}

fn find_b2(reference: &[u8], b1: usize) -> usize {
    if b1 >= reference.len() {
        reference.len()
    } else {
        next_change(reference, b1 as isize)
    }
}

/// T.6 two-dimensional encoding
pub(crate) fn encode_fax4(pixels: &[u8], width: usize, height: usize) -> Rl2Result<Vec<u8>> {
    check_geometry(pixels.len(), width, height)?;
    let mut writer = BitWriter::default();
    let white_line = vec![WHITE; width];
    let mut reference: &[u8] = &white_line;
    for line in pixels.chunks_exact(width) {
        let mut a0: isize = -1;
        let mut color = WHITE;
        while a0 < width as isize {
            let b1 = find_b1(reference, a0, color);
            let b2 = find_b2(reference, b1);
            let a1 = next_change(line, a0);
            if b2 < a1 {
                writer.put(MODE_PASS);
                a0 = b2 as isize;
            } else if a1.abs_diff(b1) <= 3 {
                let delta = a1 as isize - b1 as isize;
                writer.put(MODE_VERTICAL[(delta + 3) as usize]);
                a0 = a1 as isize;
                color ^= 1;
            } else {
                let a2 = if a1 < width { next_change(line, a1 as isize) } else { width };
                let start = a0.max(0) as usize;
                writer.put(MODE_HORIZONTAL);
                writer.put_run(a1 - start, color);
                writer.put_run(a2 - a1, color ^ 1);
                a0 = a2 as isize;
            }
        }
        reference = line;
    }
    writer.put(EOL);
    writer.put(EOL);
    Ok(writer.finish())
}

pub(crate) fn decode_fax4(data: &[u8], width: usize, height: usize) -> Rl2Result<Vec<u8>> {
    check_geometry(width * height, width, height)?;
    let mut pixels = vec![WHITE; width * height];
    let mut reader = BitReader::new(data);
    let mut reference = vec![WHITE; width];
    for line in pixels.chunks_exact_mut(width) {
        let mut a0: isize = -1;
        let mut color = WHITE;
        while a0 < width as isize {
            let b1 = find_b1(&reference, a0, color);
            let b2 = find_b2(&reference, b1);
            let start = a0.max(0) as usize;
            match reader.mode()? {
                Mode::Pass => {
                    line[start..b2].fill(color);
                    a0 = b2 as isize;
                }
                Mode::Horizontal => {
                    let first = reader.run(color)?;
                    let second = reader.run(color ^ 1)?;
                    let end = start + first + second;
                    if end > width {
                        return Err(Rl2Error::malformed("CCITT run overflows the row"));
                    }
                    line[start..start + first].fill(color);
                    line[start + first..end].fill(color ^ 1);
                    a0 = end as isize;
                }
                Mode::Vertical(delta) => {
                    let a1 = b1 as isize + delta;
                    if a1 < start as isize || a1 > width as isize {
                        return Err(Rl2Error::malformed("CCITT vertical code leaves the row"));
                    }
                    line[start..a1 as usize].fill(color);
                    a0 = a1;
                    color ^= 1;
                }
            }
        }
        reference.copy_from_slice(line);
    }
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic bi-level test pattern mixing short and long runs
    fn pattern(width: usize, height: usize) -> Vec<u8> {
        let mut state = 0x2545_F491u32;
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            let mut color = (y % 2) as u8;
            while pixels.len() < (y + 1) * width {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                let run = if state % 7 == 0 { state % 3000 } else { state % 12 };
                let run = run as usize + 1;
                let take = run.min((y + 1) * width - pixels.len());
                pixels.extend(std::iter::repeat_n(color, take));
                color ^= 1;
            }
        }
        pixels
    }

    #[test]
    fn test_code_tables_are_prefix_free() {
        for table in [&tables().white, &tables().black] {
            let codes: Vec<Code> = table
                .terminating
                .iter()
                .chain(table.makeup.iter())
                .chain(tables().extended.iter())
                .copied()
                .collect();
            for (i, a) in codes.iter().enumerate() {
                for (j, b) in codes.iter().enumerate() {
                    if i != j && a.len <= b.len {
                        assert_ne!(b.bits >> (b.len - a.len), a.bits, "code {i} prefixes code {j}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_fax3_roundtrip() {
        for (width, height) in [(1, 1), (7, 3), (256, 16), (3000, 2)] {
            let pixels = pattern(width, height);
            let encoded = encode_fax3(&pixels, width, height).unwrap();
            assert_eq!(decode_fax3(&encoded, width, height).unwrap(), pixels, "{width}x{height}");
        }
    }

    #[test]
    fn test_fax4_roundtrip() {
        for (width, height) in [(1, 1), (9, 5), (256, 32), (6000, 3)] {
            let pixels = pattern(width, height);
            let encoded = encode_fax4(&pixels, width, height).unwrap();
            assert_eq!(decode_fax4(&encoded, width, height).unwrap(), pixels, "{width}x{height}");
        }
    }

    #[test]
    fn test_fax4_compresses_uniform_rows() {
        let pixels = vec![WHITE; 256 * 256];
        let encoded = encode_fax4(&pixels, 256, 256).unwrap();
        assert!(encoded.len() < 64, "all-white tile coded in {} bytes", encoded.len());
        assert_eq!(decode_fax4(&encoded, 256, 256).unwrap(), pixels);
    }

    #[test]
    fn test_known_fax3_row() {
        // EOL, white 2 (0111), black 1 (010)
        let encoded = encode_fax3(&[0, 0, 1], 3, 1).unwrap();
        let mut reader = BitReader::new(&encoded);
        assert_eq!(reader.bits(12).unwrap(), 1);
        assert_eq!(reader.bits(4).unwrap(), 0b0111);
        assert_eq!(reader.bits(3).unwrap(), 0b010);
        assert_eq!(reader.bits(12).unwrap(), 1, "row ends after the black run");
    }

    #[test]
    fn test_truncated_streams() {
        let pixels = pattern(64, 8);
        let fax3 = encode_fax3(&pixels, 64, 8).unwrap();
        assert!(decode_fax3(&fax3[..fax3.len() / 2], 64, 8).is_err());
        let fax4 = encode_fax4(&pixels, 64, 8).unwrap();
        assert!(decode_fax4(&fax4[..2], 64, 8).is_err());
        assert!(encode_fax4(&pixels, 63, 8).is_err());
    }
}
