//! Fixed-endianness BLOB writer/reader with CRC32 framing.
//!
//! Every BLOB this crate produces declares its byte order in a flag byte;
//! the writer and reader below carry that order as data and dispatch to
//! the matching `byteorder` primitive on each call.

use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};

use crate::error::{Rl2Error, Rl2Result};
use crate::sample::Endianness;

/// CRC32 (IEEE) of `bytes`
#[must_use] pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(bytes);
    crc.sum()
}

pub(crate) struct BlobWriter {
    buf: Vec<u8>,
    order: Endianness,
}

impl BlobWriter {
    pub(crate) fn new(order: Endianness) -> Self {
        Self {
            buf: Vec::new(),
            order,
        }
    }

    pub(crate) fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub(crate) fn u16(&mut self, value: u16) {
        let mut raw = [0u8; 2];
        match self.order {
            Endianness::Little => LittleEndian::write_u16(&mut raw, value),
            Endianness::Big => BigEndian::write_u16(&mut raw, value),
        }
        self.buf.extend_from_slice(&raw);
    }

    pub(crate) fn u32(&mut self, value: u32) {
        let mut raw = [0u8; 4];
        match self.order {
            Endianness::Little => LittleEndian::write_u32(&mut raw, value),
            Endianness::Big => BigEndian::write_u32(&mut raw, value),
        }
        self.buf.extend_from_slice(&raw);
    }

    pub(crate) fn u64(&mut self, value: u64) {
        let mut raw = [0u8; 8];
        match self.order {
            Endianness::Little => LittleEndian::write_u64(&mut raw, value),
            Endianness::Big => BigEndian::write_u64(&mut raw, value),
        }
        self.buf.extend_from_slice(&raw);
    }

    pub(crate) fn f64(&mut self, value: f64) {
        let mut raw = [0u8; 8];
        match self.order {
            Endianness::Little => LittleEndian::write_f64(&mut raw, value),
            Endianness::Big => BigEndian::write_f64(&mut raw, value),
        }
        self.buf.extend_from_slice(&raw);
    }

    pub(crate) fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Length-prefixed section: raw length, stored length, stored bytes
    pub(crate) fn section(&mut self, raw_len: usize, stored: &[u8]) -> Rl2Result<()> {
        self.u32(section_len(raw_len)?);
        self.u32(section_len(stored.len())?);
        self.bytes(stored);
        Ok(())
    }

    /// Append the CRC32 of everything written so far
    pub(crate) fn push_crc(&mut self) {
        let crc = crc32(&self.buf);
        self.u32(crc);
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

fn section_len(len: usize) -> Rl2Result<u32> {
    u32::try_from(len)
        .map_err(|_| Rl2Error::out_of_range(format!("section of {len} bytes exceeds 4 GiB")))
}

pub(crate) struct BlobReader<'a> {
    cursor: Cursor<&'a [u8]>,
    order: Endianness,
}

impl<'a> BlobReader<'a> {
    pub(crate) fn new(bytes: &'a [u8], order: Endianness) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            order,
        }
    }

    /// Start reading at byte `offset`
    pub(crate) fn at(bytes: &'a [u8], offset: usize, order: Endianness) -> Self {
        let mut reader = Self::new(bytes, order);
        reader.cursor.set_position(offset as u64);
        reader
    }

    pub(crate) fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub(crate) fn u8(&mut self) -> Rl2Result<u8> {
        self.cursor.read_u8().map_err(truncated)
    }

    pub(crate) fn u16(&mut self) -> Rl2Result<u16> {
        match self.order {
            Endianness::Little => self.cursor.read_u16::<LittleEndian>(),
            Endianness::Big => self.cursor.read_u16::<BigEndian>(),
        }
        .map_err(truncated)
    }

    pub(crate) fn u32(&mut self) -> Rl2Result<u32> {
        match self.order {
            Endianness::Little => self.cursor.read_u32::<LittleEndian>(),
            Endianness::Big => self.cursor.read_u32::<BigEndian>(),
        }
        .map_err(truncated)
    }

    pub(crate) fn u64(&mut self) -> Rl2Result<u64> {
        match self.order {
            Endianness::Little => self.cursor.read_u64::<LittleEndian>(),
            Endianness::Big => self.cursor.read_u64::<BigEndian>(),
        }
        .map_err(truncated)
    }

    pub(crate) fn f64(&mut self) -> Rl2Result<f64> {
        match self.order {
            Endianness::Little => self.cursor.read_f64::<LittleEndian>(),
            Endianness::Big => self.cursor.read_f64::<BigEndian>(),
        }
        .map_err(truncated)
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Rl2Result<&'a [u8]> {
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.position();
        let end = start
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| Rl2Error::malformed(format!("truncated: {len} bytes expected at {start}")))?;
        self.cursor.set_position(end as u64);
        Ok(&data[start..end])
    }

    /// Read a section written by [`BlobWriter::section`]
    pub(crate) fn section(&mut self) -> Rl2Result<(usize, &'a [u8])> {
        let raw_len = self.u32()? as usize;
        let stored_len = self.u32()? as usize;
        let stored = self.bytes(stored_len)?;
        Ok((raw_len, stored))
    }

    pub(crate) fn expect_marker(&mut self, marker: u8, what: &str) -> Rl2Result<()> {
        let found = self.u8()?;
        if found == marker {
            Ok(())
        } else {
            Err(Rl2Error::malformed(format!(
                "expected {what} marker {marker:#04x}, found {found:#04x}"
            )))
        }
    }
}

fn truncated(err: std::io::Error) -> Rl2Error {
    Rl2Error::malformed(format!("truncated BLOB: {err}"))
}

/// Check the trailing CRC32 of a BLOB and return the covered bytes
pub(crate) fn verify_trailing_crc(blob: &[u8], order: Endianness) -> Rl2Result<&[u8]> {
    if blob.len() < 4 {
        return Err(Rl2Error::malformed("BLOB too short for a checksum"));
    }
    let (body, tail) = blob.split_at(blob.len() - 4);
    let stored = match order {
        Endianness::Little => LittleEndian::read_u32(tail),
        Endianness::Big => BigEndian::read_u32(tail),
    };
    let actual = crc32(body);
    if stored != actual {
        return Err(Rl2Error::malformed(format!(
            "checksum mismatch: stored {stored:#010x}, computed {actual:#010x}"
        )));
    }
    Ok(body)
}
