//! Owned, growable byte buffers used to stage payloads before they are
//! compressed and written to disk, and to replay bytes read back off disk
//! before they are handed to a [`crate::stream::Streamable`].
//!
//! `WriteBuffer` owns its storage and grows capacity to the next power of two
//! whenever a write would overrun it. `ReadBuffer` is immutable after
//! construction; only its read cursor moves.

use bytemuck::Pod;

use crate::error::{Result, VfsError};

/// A fixed-size, owned view over bytes with a read cursor.
#[derive(Debug, Clone)]
pub struct ReadBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl ReadBuffer {
    /// An owned, zeroed buffer of exactly `size` bytes.
    pub fn with_size(size: usize) -> Self {
        Self { data: vec![0u8; size], pos: 0 }
    }

    /// Takes ownership of bytes already in hand (e.g. the output of decompression).
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// The buffer's backing storage, for callers that write into it directly
    /// (e.g. the package reader filling it from a file before handing it off).
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copies the next `dst.len()` bytes into `dst`, advancing the cursor.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<()> {
        let n = dst.len();
        if self.pos + n > self.data.len() {
            return Err(VfsError::Format(format!(
                "read of {n} bytes at position {} overruns buffer of size {}",
                self.pos,
                self.data.len()
            )));
        }
        dst.copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(())
    }

    /// Reads a `Pod` value (a plain-old-data struct, e.g. a fixed-size header).
    pub fn read_pod<T: Pod>(&mut self) -> Result<T> {
        let mut val = T::zeroed();
        self.read(bytemuck::bytes_of_mut(&mut val))?;
        Ok(val)
    }

    /// Reads a `u64`-length-prefixed UTF-8 string.
    ///
    /// This is the generic `Streamable` string convention (see crate docs); it is
    /// distinct from the u16-length convention used inside `FileRecord`'s own fields.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u64()? as usize;
        let mut bytes = vec![0u8; len];
        self.read(&mut bytes)?;
        String::from_utf8(bytes).map_err(|e| VfsError::Format(format!("invalid UTF-8 string: {e}")))
    }
}

macro_rules! read_buffer_primitive {
    ($name:ident, $ty:ty) => {
        impl ReadBuffer {
            pub fn $name(&mut self) -> Result<$ty> {
                let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                self.read(&mut bytes)?;
                Ok(<$ty>::from_le_bytes(bytes))
            }
        }
    };
}

read_buffer_primitive!(read_u8, u8);
read_buffer_primitive!(read_u16, u16);
read_buffer_primitive!(read_u32, u32);
read_buffer_primitive!(read_u64, u64);
read_buffer_primitive!(read_i8, i8);
read_buffer_primitive!(read_i16, i16);
read_buffer_primitive!(read_i32, i32);
read_buffer_primitive!(read_i64, i64);
read_buffer_primitive!(read_f32, f32);
read_buffer_primitive!(read_f64, f64);

impl ReadBuffer {
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }
}

/// An owned, growable byte buffer with a write cursor.
///
/// `size` is the logical length written so far; `capacity` (the backing `Vec`'s
/// capacity) is always `>= size` and grows by doubling to the next power of two.
#[derive(Debug, Clone, Default)]
pub struct WriteBuffer {
    data: Vec<u8>,
    size: usize,
    pos: usize,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self { data: Vec::new(), size: 0, pos: 0 }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut buf = Self::new();
        buf.set_capacity(capacity);
        buf
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Reallocates to at least `n` bytes of capacity, preserving contents.
    pub fn set_capacity(&mut self, n: usize) {
        if n > self.data.len() {
            self.data.resize(n, 0);
        }
    }

    /// Sets the logical size. Growing exposes zeroed bytes; shrinking just
    /// truncates the logical view (the backing capacity is left alone).
    pub fn set_size(&mut self, n: usize) {
        self.set_capacity(n);
        self.size = n;
    }

    /// Moves the write cursor. Does not by itself grow `size`.
    pub fn set_position(&mut self, n: usize) {
        self.pos = n;
    }

    /// Copies `src` starting at the current cursor, growing capacity to the next
    /// power of two if needed, then advances the cursor and extends `size` if the
    /// cursor moved past it.
    pub fn write(&mut self, src: &[u8]) {
        let end = self.pos + src.len();
        if end > self.data.len() {
            self.set_capacity(next_power_of_two(end));
        }
        self.data[self.pos..end].copy_from_slice(src);
        self.pos = end;
        if self.pos > self.size {
            self.size = self.pos;
        }
    }

    /// Writes a `Pod` value (a plain-old-data struct) at the current cursor.
    pub fn write_pod<T: Pod>(&mut self, val: &T) {
        self.write(bytemuck::bytes_of(val));
    }

    /// Writes a `u64` length prefix followed by the UTF-8 bytes of `s`.
    ///
    /// This is the generic `Streamable` string convention (see crate docs); it is
    /// distinct from the u16-length convention used inside `FileRecord`'s own fields.
    pub fn write_string(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write(s.as_bytes());
    }

    /// The written bytes, `[0, size)`. Bytes beyond `size` (if capacity overshot it)
    /// are not part of the logical content.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.size]
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.truncate(self.size);
        self.data
    }
}

macro_rules! write_buffer_primitive {
    ($name:ident, $ty:ty) => {
        impl WriteBuffer {
            pub fn $name(&mut self, val: $ty) {
                self.write(&val.to_le_bytes());
            }
        }
    };
}

write_buffer_primitive!(write_u8, u8);
write_buffer_primitive!(write_u16, u16);
write_buffer_primitive!(write_u32, u32);
write_buffer_primitive!(write_u64, u64);
write_buffer_primitive!(write_i8, i8);
write_buffer_primitive!(write_i16, i16);
write_buffer_primitive!(write_i32, i32);
write_buffer_primitive!(write_i64, i64);
write_buffer_primitive!(write_f32, f32);
write_buffer_primitive!(write_f64, f64);

impl WriteBuffer {
    pub fn write_bool(&mut self, val: bool) {
        self.write_u8(val as u8);
    }
}

fn next_power_of_two(n: usize) -> usize {
    n.next_power_of_two().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_primitives() {
        let mut w = WriteBuffer::new();
        w.write_u32(5);
        w.write_f32(3.1415);
        w.write_bool(true);

        let mut r = ReadBuffer::from_vec(w.into_vec());
        assert_eq!(r.read_u32().unwrap(), 5);
        assert_eq!(r.read_f32().unwrap(), 3.1415);
        assert!(r.read_bool().unwrap());
    }

    #[test]
    fn write_then_read_string() {
        let mut w = WriteBuffer::new();
        w.write_string("hello, vfs");
        let mut r = ReadBuffer::from_vec(w.into_vec());
        assert_eq!(r.read_string().unwrap(), "hello, vfs");
    }

    #[test]
    fn capacity_grows_to_next_power_of_two() {
        let mut w = WriteBuffer::new();
        w.write(&[0u8; 3]);
        assert!(w.data.len() >= 3);
        assert_eq!(w.data.len(), (w.data.len()).next_power_of_two());
    }

    #[test]
    fn read_past_end_fails() {
        let mut r = ReadBuffer::with_size(2);
        let mut dst = [0u8; 4];
        assert!(r.read(&mut dst).is_err());
    }

    #[test]
    fn set_size_then_as_slice_only_exposes_logical_len() {
        let mut w = WriteBuffer::new();
        w.write(&[1, 2, 3]);
        w.set_size(2);
        assert_eq!(w.as_slice(), &[1, 2]);
    }
}
