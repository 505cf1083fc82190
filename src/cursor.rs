use crate::error::{IcoError, Result};
use byteorder::ByteOrder;
use std::mem;

//===========================================================================//

/// A read/write position over an existing byte buffer.
///
/// Every multi-byte accessor takes its byte order as an explicit type
/// parameter (ICO and BMP data is always `LittleEndian`).  Reads advance the
/// cursor by the width of the value read.  Writes either advance the cursor
/// (when no offset is given) or go to an explicit offset and leave the cursor
/// alone, which lets two regions of one output buffer be filled in
/// interleaved order.  Any access that would run past the end of the buffer
/// fails with [`IcoError::OutOfRange`] and leaves the cursor where it was.
#[derive(Clone, Debug)]
pub struct ByteCursor<B> {
    buffer: B,
    position: usize,
}

macro_rules! cursor_getters {
    ($($get:ident, $get_array:ident, $ty:ty, $read:ident;)*) => {$(
        #[doc = concat!("Reads a `", stringify!($ty),
                        "` with byte order `E` and advances the cursor.")]
        pub fn $get<E: ByteOrder>(&mut self) -> Result<$ty> {
            let bytes = self.take(mem::size_of::<$ty>())?;
            Ok(E::$read(bytes))
        }

        #[doc = concat!("Reads `count` consecutive `", stringify!($ty),
                        "` values with byte order `E`.")]
        pub fn $get_array<E: ByteOrder>(
            &mut self,
            count: usize,
        ) -> Result<Vec<$ty>> {
            self.check_array(count, mem::size_of::<$ty>())?;
            (0..count).map(|_| self.$get::<E>()).collect()
        }
    )*};
}

macro_rules! cursor_setters {
    ($($set:ident, $ty:ty, $write:ident;)*) => {$(
        #[doc = concat!("Writes a `", stringify!($ty),
                        "` with byte order `E`; see [`ByteCursor::set_u8`] \
                         for how `offset` is handled.")]
        pub fn $set<E: ByteOrder>(
            &mut self,
            value: $ty,
            offset: Option<usize>,
        ) -> Result<usize> {
            let (start, end) = self.place(offset, mem::size_of::<$ty>())?;
            E::$write(&mut self.buffer.as_mut()[start..end], value);
            Ok(end)
        }
    )*};
}

impl<B: AsRef<[u8]>> ByteCursor<B> {
    /// Wraps `buffer`, with the cursor at the start.
    pub fn new(buffer: B) -> ByteCursor<B> {
        ByteCursor { buffer, position: 0 }
    }

    /// Returns the current cursor position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves the cursor.  Positions past the end are allowed; the next
    /// access from there will fail.
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    /// Returns the length of the underlying buffer.
    pub fn len(&self) -> usize {
        self.buffer.as_ref().len()
    }

    /// Returns true if the underlying buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of bytes between the cursor and the end of the
    /// buffer.
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position)
    }

    /// Returns the underlying buffer.
    pub fn get_ref(&self) -> &[u8] {
        self.buffer.as_ref()
    }

    /// Unwraps the cursor, returning the underlying buffer.
    pub fn into_inner(self) -> B {
        self.buffer
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        let size = self.len();
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(()),
            _ => Err(IcoError::OutOfRange { offset, len, size }),
        }
    }

    fn check_array(&self, count: usize, width: usize) -> Result<()> {
        match count.checked_mul(width) {
            Some(len) => self.check(self.position, len),
            None => Err(IcoError::OutOfRange {
                offset: self.position,
                len: usize::MAX,
                size: self.len(),
            }),
        }
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let start = self.position;
        self.check(start, len)?;
        self.position = start + len;
        Ok(&self.buffer.as_ref()[start..(start + len)])
    }

    /// Advances the cursor by `count` bytes without reading them.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// Reads a single byte and advances the cursor.
    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a single signed byte and advances the cursor.
    pub fn get_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    /// Reads `count` bytes into a new vector.
    pub fn get_u8_array(&mut self, count: usize) -> Result<Vec<u8>> {
        Ok(self.take(count)?.to_vec())
    }

    /// Borrows the next `count` bytes and advances past them.
    pub fn get_bytes(&mut self, count: usize) -> Result<&[u8]> {
        self.take(count)
    }

    /// Borrows `count` bytes at an absolute `offset`, without touching the
    /// cursor.
    pub fn bytes_at(&self, offset: usize, count: usize) -> Result<&[u8]> {
        self.check(offset, count)?;
        Ok(&self.buffer.as_ref()[offset..(offset + count)])
    }

    cursor_getters! {
        get_u16, get_u16_array, u16, read_u16;
        get_i16, get_i16_array, i16, read_i16;
        get_u32, get_u32_array, u32, read_u32;
        get_i32, get_i32_array, i32, read_i32;
        get_u64, get_u64_array, u64, read_u64;
        get_i64, get_i64_array, i64, read_i64;
        get_f32, get_f32_array, f32, read_f32;
        get_f64, get_f64_array, f64, read_f64;
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> ByteCursor<B> {
    // Returns the (start, end) byte range for a write of `len` bytes, moving
    // the cursor only when no explicit offset was given.
    fn place(
        &mut self,
        offset: Option<usize>,
        len: usize,
    ) -> Result<(usize, usize)> {
        let start = offset.unwrap_or(self.position);
        self.check(start, len)?;
        let end = start + len;
        if offset.is_none() {
            self.position = end;
        }
        Ok((start, end))
    }

    /// Writes a single byte.  With `offset == None` the byte goes at the
    /// cursor and the cursor advances; otherwise it goes at `offset` and the
    /// cursor doesn't move.  Either way, returns the position just past the
    /// written byte.
    pub fn set_u8(
        &mut self,
        value: u8,
        offset: Option<usize>,
    ) -> Result<usize> {
        let (start, end) = self.place(offset, 1)?;
        self.buffer.as_mut()[start] = value;
        Ok(end)
    }

    /// Writes a single signed byte; see [`ByteCursor::set_u8`].
    pub fn set_i8(
        &mut self,
        value: i8,
        offset: Option<usize>,
    ) -> Result<usize> {
        self.set_u8(value as u8, offset)
    }

    /// Copies `bytes` into the buffer; see [`ByteCursor::set_u8`].
    pub fn set_bytes(
        &mut self,
        bytes: &[u8],
        offset: Option<usize>,
    ) -> Result<usize> {
        let (start, end) = self.place(offset, bytes.len())?;
        self.buffer.as_mut()[start..end].copy_from_slice(bytes);
        Ok(end)
    }

    cursor_setters! {
        set_u16, u16, write_u16;
        set_i16, i16, write_i16;
        set_u32, u32, write_u32;
        set_i32, i32, write_i32;
        set_u64, u64, write_u64;
        set_i64, i64, write_i64;
        set_f32, f32, write_f32;
        set_f64, f64, write_f64;
    }
}

//===========================================================================//


//===========================================================================//
