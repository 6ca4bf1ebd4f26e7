//! Shared binary primitives for the session formats.
//!
//! Cursor-based readers and writers over a byte buffer, generic over byte
//! order. The tdata container uses Qt's serialization conventions: integers
//! and UTF-16 text in big endian, byte arrays prefixed with a `u32` length
//! where `0xFFFFFFFF` marks a null value. The session-string formats reuse
//! the same big-endian reader; little-endian appears in the tdata file
//! headers and length fields.
//!
//! Every reader fails with [`Error::TruncatedData`] when fewer bytes remain
//! than the field requires; no partially-read value is ever returned.

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::marker::PhantomData;

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};

use crate::{Error, Result};

/// Marker for a null length-prefixed value (Qt's null QByteArray/QString)
const NULL_MARKER: u32 = 0xFFFF_FFFF;

/// Marker for an extended 64-bit length (Qt 6.7+, not seen in tdata)
const EXTENDED_LENGTH_MARKER: u32 = 0xFFFF_FFFE;

/// Big-endian reader, as used by the Qt data streams inside tdata
pub type QtReader<'a> = WireReader<'a, BigEndian>;

/// Big-endian writer, symmetric to [`QtReader`]
pub type QtWriter = WireWriter<BigEndian>;

/// Little-endian reader, for the tdata file headers
pub type LeReader<'a> = WireReader<'a, LittleEndian>;

/// Little-endian writer, symmetric to [`LeReader`]
pub type LeWriter = WireWriter<LittleEndian>;

/// Cursor-based reader over a borrowed byte buffer
pub struct WireReader<'a, E: ByteOrder> {
    cursor: Cursor<&'a [u8]>,
    _order: PhantomData<E>,
}

impl<'a, E: ByteOrder> WireReader<'a, E> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
            _order: PhantomData,
        }
    }

    /// Current position in the stream
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Whether the whole buffer has been consumed
    pub fn at_end(&self) -> bool {
        self.cursor.position() >= self.cursor.get_ref().len() as u64
    }

    /// Remaining bytes count
    pub fn remaining(&self) -> usize {
        let pos = self.cursor.position() as usize;
        self.cursor.get_ref().len().saturating_sub(pos)
    }

    /// Skip n bytes
    pub fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(self.truncated());
        }
        self.cursor
            .seek(SeekFrom::Current(n as i64))
            .map_err(|_| self.truncated())?;
        Ok(())
    }

    fn truncated(&self) -> Error {
        Error::TruncatedData {
            offset: self.position(),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(|_| self.truncated())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.cursor.read_u16::<E>().map_err(|_| self.truncated())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.cursor.read_u32::<E>().map_err(|_| self.truncated())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.cursor.read_i32::<E>().map_err(|_| self.truncated())
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.cursor.read_u64::<E>().map_err(|_| self.truncated())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.cursor.read_i64::<E>().map_err(|_| self.truncated())
    }

    /// Read raw bytes of the specified length
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        if self.remaining() < len {
            return Err(self.truncated());
        }
        let mut buf = vec![0u8; len];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| self.truncated())?;
        Ok(buf)
    }

    /// Read a length-prefixed byte array (QByteArray convention)
    ///
    /// Wire format:
    /// - 4 bytes: length (u32)
    ///   - 0xFFFFFFFF = null value (returns an empty vec)
    ///   - 0xFFFFFFFE = extended 64-bit length (followed by a u64)
    /// - N bytes: raw data
    pub fn read_prefixed_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32()?;
        match len {
            NULL_MARKER => Ok(Vec::new()),
            EXTENDED_LENGTH_MARKER => {
                let real_len = self.read_u64()? as usize;
                self.read_bytes(real_len)
            }
            _ => self.read_bytes(len as usize),
        }
    }

    /// Read a length-prefixed UTF-16 string (QString convention)
    ///
    /// Wire format:
    /// - 4 bytes: length in BYTES (not chars) of the UTF-16 data,
    ///   0xFFFFFFFF for a null string
    /// - N bytes: UTF-16 code units in stream byte order
    pub fn read_prefixed_text(&mut self) -> Result<String> {
        let byte_len = self.read_u32()?;
        if byte_len == NULL_MARKER {
            return Ok(String::new());
        }
        if byte_len % 2 != 0 {
            return Err(Error::invalid_format("UTF-16 byte length is not even"));
        }

        let char_count = (byte_len / 2) as usize;
        let mut utf16 = Vec::with_capacity(char_count);
        for _ in 0..char_count {
            utf16.push(self.read_u16()?);
        }
        String::from_utf16(&utf16).map_err(|_| Error::InvalidUtf16)
    }
}

/// Growable writer producing a byte buffer, symmetric to [`WireReader`]
pub struct WireWriter<E: ByteOrder> {
    buf: Vec<u8>,
    _order: PhantomData<E>,
}

impl<E: ByteOrder> Default for WireWriter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ByteOrder> WireWriter<E> {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            _order: PhantomData,
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
            _order: PhantomData,
        }
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer and return the produced buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        let mut raw = [0u8; 2];
        E::write_u16(&mut raw, v);
        self.buf.extend_from_slice(&raw);
    }

    pub fn write_u32(&mut self, v: u32) {
        let mut raw = [0u8; 4];
        E::write_u32(&mut raw, v);
        self.buf.extend_from_slice(&raw);
    }

    pub fn write_i32(&mut self, v: i32) {
        let mut raw = [0u8; 4];
        E::write_i32(&mut raw, v);
        self.buf.extend_from_slice(&raw);
    }

    pub fn write_u64(&mut self, v: u64) {
        let mut raw = [0u8; 8];
        E::write_u64(&mut raw, v);
        self.buf.extend_from_slice(&raw);
    }

    pub fn write_i64(&mut self, v: i64) {
        let mut raw = [0u8; 8];
        E::write_i64(&mut raw, v);
        self.buf.extend_from_slice(&raw);
    }

    /// Write raw bytes with no prefix
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Write a length-prefixed byte array (QByteArray convention)
    pub fn write_prefixed_bytes(&mut self, data: &[u8]) {
        self.write_u32(data.len() as u32);
        self.buf.extend_from_slice(data);
    }

    /// Write a length-prefixed UTF-16 string (QString convention)
    pub fn write_prefixed_text(&mut self, text: &str) {
        let units: Vec<u16> = text.encode_utf16().collect();
        self.write_u32((units.len() * 2) as u32);
        for unit in units {
            self.write_u16(unit);
        }
    }
}
