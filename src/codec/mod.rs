//! Binary field codec
//!
//! Every persisted record is a flat little-endian byte buffer. The codec
//! writes and reads one field at a time and advances a position; any access
//! past the end of the buffer fails with [`Error::OutOfBounds`] instead of
//! truncating.
//!
//! ```text
//! bool        [u8]               0 or 1
//! integers    [N bytes LE]       u8/u16/u32/u64/i16/i32/i64
//! f64         [8 bytes LE]
//! text        [len u32][utf-8]   no terminator, invalid UTF-8 is rejected
//! [u8; N]     [N bytes]          fixed codes (country codes)
//! tstamp      see tstamp.rs
//! ```
//!
//! Field-offset accessors use [`skip_field`] and [`field_slice`] to locate
//! a single field inside a record buffer without materializing the record.

mod tstamp;

pub use tstamp::Tstamp;

use crate::error::{Error, Result};

/// Sequential writer over a fixed buffer
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Reserve `n` bytes at the current position and advance past them
    pub fn reserve(&mut self, n: usize) -> Result<&mut [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len());
        match end {
            Some(end) => {
                let start = self.pos;
                self.pos = end;
                Ok(&mut self.buf[start..end])
            }
            None => Err(Error::OutOfBounds {
                offset: self.pos,
                needed: n,
                len: self.buf.len(),
            }),
        }
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Write length-prefixed text from a borrowed string
    pub fn put_str(&mut self, value: &str) -> Result<()> {
        let len = u32::try_from(value.len()).map_err(|_| Error::OutOfBounds {
            offset: self.pos,
            needed: value.len(),
            len: u32::MAX as usize,
        })?;
        self.put(&len)?;
        self.put_bytes(value.as_bytes())
    }

    pub fn put<T: Field>(&mut self, value: &T) -> Result<()> {
        value.write(self)
    }
}

/// Sequential reader over a fixed buffer
#[derive(Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Reader positioned at `pos`; positioning past the end is not an error
    /// until something is read.
    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    /// Look at the next `n` bytes without advancing
    pub fn peek(&self, n: usize) -> Result<&'a [u8]> {
        match self.pos.checked_add(n) {
            Some(end) if end <= self.buf.len() => Ok(&self.buf[self.pos..end]),
            _ => Err(Error::OutOfBounds {
                offset: self.pos,
                needed: n,
                len: self.buf.len(),
            }),
        }
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let bytes = self.peek(n)?;
        self.pos += n;
        Ok(bytes)
    }

    pub fn get<T: Field>(&mut self) -> Result<T> {
        T::read(self)
    }

    /// Advance past one encoded `T` without decoding it
    pub fn skip<T: Field>(&mut self) -> Result<()> {
        let size = T::encoded_size(self)?;
        self.take(size).map(|_| ())
    }
}

/// A value with a fixed wire representation
pub trait Field: Sized {
    /// Encoded size of this value
    fn size_of(&self) -> usize;

    fn write(&self, w: &mut Writer<'_>) -> Result<()>;

    fn read(r: &mut Reader<'_>) -> Result<Self>;

    /// Encoded size of the field starting at the reader position,
    /// inspecting only the bytes needed to determine it.
    fn encoded_size(r: &Reader<'_>) -> Result<usize>;
}

macro_rules! fixed_width_field {
    ($($ty:ty),*) => {
        $(
            impl Field for $ty {
                fn size_of(&self) -> usize {
                    std::mem::size_of::<$ty>()
                }

                fn write(&self, w: &mut Writer<'_>) -> Result<()> {
                    w.put_bytes(&self.to_le_bytes())
                }

                fn read(r: &mut Reader<'_>) -> Result<Self> {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(r.take(std::mem::size_of::<$ty>())?);
                    Ok(<$ty>::from_le_bytes(raw))
                }

                fn encoded_size(_r: &Reader<'_>) -> Result<usize> {
                    Ok(std::mem::size_of::<$ty>())
                }
            }
        )*
    };
}

fixed_width_field!(u8, u16, u32, u64, i16, i32, i64, f64);

impl Field for bool {
    fn size_of(&self) -> usize {
        1
    }

    fn write(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(&(*self as u8))
    }

    fn read(r: &mut Reader<'_>) -> Result<Self> {
        Ok(r.get::<u8>()? != 0)
    }

    fn encoded_size(_r: &Reader<'_>) -> Result<usize> {
        Ok(1)
    }
}

impl Field for String {
    fn size_of(&self) -> usize {
        4 + self.len()
    }

    fn write(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put_str(self)
    }

    fn read(r: &mut Reader<'_>) -> Result<Self> {
        let len = r.get::<u32>()? as usize;
        let offset = r.position();
        let bytes = r.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::InvalidText {
            offset: offset + e.utf8_error().valid_up_to(),
        })
    }

    fn encoded_size(r: &Reader<'_>) -> Result<usize> {
        let mut ahead = r.clone();
        Ok(4 + ahead.get::<u32>()? as usize)
    }
}

impl<const N: usize> Field for [u8; N] {
    fn size_of(&self) -> usize {
        N
    }

    fn write(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put_bytes(self)
    }

    fn read(r: &mut Reader<'_>) -> Result<Self> {
        let mut raw = [0u8; N];
        raw.copy_from_slice(r.take(N)?);
        Ok(raw)
    }

    fn encoded_size(_r: &Reader<'_>) -> Result<usize> {
        Ok(N)
    }
}

/// Encoded size of a value, computed without I/O
pub fn size_of<T: Field>(value: &T) -> usize {
    value.size_of()
}

/// Encoded size of borrowed text
pub fn size_of_str(value: &str) -> usize {
    4 + value.len()
}

/// Offset just past the `T` field that starts at `offset`
pub fn skip_field<T: Field>(buf: &[u8], offset: usize) -> Result<usize> {
    let mut r = Reader::at(buf, offset);
    r.skip::<T>()?;
    Ok(r.position())
}

/// Raw bytes of the `T` field that starts at `offset`
pub fn field_slice<T: Field>(buf: &[u8], offset: usize) -> Result<&[u8]> {
    let r = Reader::at(buf, offset);
    let size = T::encoded_size(&r)?;
    r.peek(size)
}

/// Decode one `T` at `offset`
pub fn read_at<T: Field>(buf: &[u8], offset: usize) -> Result<T> {
    Reader::at(buf, offset).get::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_layout() -> Result<()> {
        let mut buf = [0u8; 15];
        let mut w = Writer::new(&mut buf);
        w.put(&0x0102u16)?;
        w.put(&true)?;
        w.put(&0x0a0b0c0d_0e0f1011u64)?;
        w.put(&-2i32)?;
        assert_eq!(w.position(), 15);

        assert_eq!(&buf[..3], &[0x02, 0x01, 0x01]);
        assert_eq!(&buf[3..11], &[0x11, 0x10, 0x0f, 0x0e, 0x0d, 0x0c, 0x0b, 0x0a]);

        let mut r = Reader::new(&buf);
        assert_eq!(r.get::<u16>()?, 0x0102);
        assert!(r.get::<bool>()?);
        assert_eq!(r.get::<u64>()?, 0x0a0b0c0d_0e0f1011);
        assert_eq!(r.get::<i32>()?, -2);
        assert_eq!(r.remaining(), 0);
        Ok(())
    }

    #[test]
    fn test_text_is_length_prefixed() -> Result<()> {
        let text = "example.com".to_string();
        let mut buf = vec![0u8; size_of(&text)];
        Writer::new(&mut buf).put(&text)?;

        assert_eq!(&buf[..4], &11u32.to_le_bytes());
        assert_eq!(&buf[4..], b"example.com");
        assert_eq!(read_at::<String>(&buf, 0)?, text);
        assert_eq!(skip_field::<String>(&buf, 0)?, 15);
        Ok(())
    }

    #[test]
    fn test_write_past_end_fails() {
        let mut buf = [0u8; 3];
        let mut w = Writer::new(&mut buf);
        assert!(w.put(&1u16).is_ok());
        match w.put(&1u16) {
            Err(Error::OutOfBounds { offset, needed, len }) => {
                assert_eq!((offset, needed, len), (2, 2, 3));
            }
            other => panic!("expected out of bounds, got {:?}", other),
        }
    }

    #[test]
    fn test_read_past_end_fails() {
        // declared text length runs past the buffer
        let mut buf = vec![0u8; 6];
        buf[..4].copy_from_slice(&10u32.to_le_bytes());
        assert!(matches!(
            read_at::<String>(&buf, 0),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(matches!(read_at::<u64>(&buf, 0), Err(Error::OutOfBounds { .. })));
        assert!(matches!(
            field_slice::<u16>(&buf, 5),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_field_slice_locates_without_decoding() -> Result<()> {
        let mut buf = [0u8; 2 + 4 + 3 + 8];
        let mut w = Writer::new(&mut buf);
        w.put(&7u16)?;
        w.put(&"abc".to_string())?;
        w.put(&99u64)?;

        let offset = skip_field::<String>(&buf, 2)?;
        assert_eq!(offset, 9);
        assert_eq!(field_slice::<u64>(&buf, offset)?, &99u64.to_le_bytes());
        Ok(())
    }

    #[test]
    fn test_invalid_text_rejected() {
        let mut buf = vec![0u8; 2 + 4 + 3];
        buf[2..6].copy_from_slice(&3u32.to_le_bytes());
        buf[6..].copy_from_slice(&[b'a', 0xff, b'b']);
        match read_at::<String>(&buf, 2) {
            Err(Error::InvalidText { offset }) => assert_eq!(offset, 7),
            other => panic!("expected invalid text, got {:?}", other),
        }
        // the size is still known without decoding
        assert_eq!(skip_field::<String>(&buf, 2).ok(), Some(9));
    }

    #[test]
    fn test_fixed_array() -> Result<()> {
        let mut buf = [0u8; 2];
        Writer::new(&mut buf).put(b"ca")?;
        assert_eq!(read_at::<[u8; 2]>(&buf, 0)?, *b"ca");
        Ok(())
    }
}
