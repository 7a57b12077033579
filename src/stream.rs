//! The `Streamable` capability: the contract a user payload type implements so the
//! facade (C6) can serialize/deserialize it generically, without ever naming the
//! concrete type itself.
//!
//! There is no type tagging anywhere in this layer — the schema a `Streamable` reads
//! back is exactly the schema it wrote, gated only by the container's `FormatVersion`.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::Result;

/// A type that can serialize itself into a [`WriteBuffer`] and rehydrate itself
/// from a [`ReadBuffer`]. `read` operates on `&mut self` rather than returning `Self`
/// so that callers can reuse an existing value (and its allocations) across repeated
/// `read_file` calls, mirroring the "hydrate `out`" contract of the facade.
pub trait Streamable {
    fn write(&self, buf: &mut WriteBuffer);
    fn read(&mut self, buf: &mut ReadBuffer) -> Result<()>;
}

macro_rules! impl_streamable_primitive {
    ($ty:ty, $write:ident, $read:ident) => {
        impl Streamable for $ty {
            fn write(&self, buf: &mut WriteBuffer) {
                buf.$write(*self);
            }
            fn read(&mut self, buf: &mut ReadBuffer) -> Result<()> {
                *self = buf.$read()?;
                Ok(())
            }
        }
    };
}

impl_streamable_primitive!(u8, write_u8, read_u8);
impl_streamable_primitive!(u16, write_u16, read_u16);
impl_streamable_primitive!(u32, write_u32, read_u32);
impl_streamable_primitive!(u64, write_u64, read_u64);
impl_streamable_primitive!(i8, write_i8, read_i8);
impl_streamable_primitive!(i16, write_i16, read_i16);
impl_streamable_primitive!(i32, write_i32, read_i32);
impl_streamable_primitive!(i64, write_i64, read_i64);
impl_streamable_primitive!(f32, write_f32, read_f32);
impl_streamable_primitive!(f64, write_f64, read_f64);
impl_streamable_primitive!(bool, write_bool, read_bool);

impl Streamable for String {
    fn write(&self, buf: &mut WriteBuffer) {
        buf.write_string(self);
    }
    fn read(&mut self, buf: &mut ReadBuffer) -> Result<()> {
        *self = buf.read_string()?;
        Ok(())
    }
}

/// Vectors of streamables: a u64 element count, then each element's own `write`/`read`
/// in order. `T: Default` lets `read` materialize fresh elements to read into.
impl<T: Streamable + Default> Streamable for Vec<T> {
    fn write(&self, buf: &mut WriteBuffer) {
        buf.write_u64(self.len() as u64);
        for item in self {
            item.write(buf);
        }
    }

    fn read(&mut self, buf: &mut ReadBuffer) -> Result<()> {
        let len = buf.read_u64()? as usize;
        self.clear();
        self.reserve(len);
        for _ in 0..len {
            let mut item = T::default();
            item.read(buf)?;
            self.push(item);
        }
        Ok(())
    }
}

/// Serializes `payload` into a freshly allocated [`WriteBuffer`]. The package writer
/// (C3) uses this to stage a whole payload in memory before deciding whether to
/// compress it.
pub fn stage(payload: &impl Streamable) -> WriteBuffer {
    let mut buf = WriteBuffer::new();
    payload.write(&mut buf);
    buf
}

/// Hydrates `out` from raw bytes already read off disk and (if applicable) decompressed.
pub fn hydrate(out: &mut impl Streamable, bytes: Vec<u8>) -> Result<()> {
    let mut buf = ReadBuffer::from_vec(bytes);
    out.read(&mut buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Pod3 {
        a: u32,
        b: f32,
        c: bool,
    }

    impl Streamable for Pod3 {
        fn write(&self, buf: &mut WriteBuffer) {
            self.a.write(buf);
            self.b.write(buf);
            self.c.write(buf);
        }
        fn read(&mut self, buf: &mut ReadBuffer) -> Result<()> {
            self.a.read(buf)?;
            self.b.read(buf)?;
            self.c.read(buf)
        }
    }

    #[test]
    fn struct_round_trip() {
        let payload = Pod3 { a: 5, b: 3.1415, c: true };
        let buf = stage(&payload);
        let mut out = Pod3::default();
        hydrate(&mut out, buf.into_vec()).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn vec_round_trip() {
        let payload: Vec<u32> = vec![1, 2, 3, 4, 5];
        let buf = stage(&payload);
        let mut out: Vec<u32> = Vec::new();
        hydrate(&mut out, buf.into_vec()).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn string_round_trip() {
        let payload = "the quick brown fox".to_string();
        let buf = stage(&payload);
        let mut out = String::new();
        hydrate(&mut out, buf.into_vec()).unwrap();
        assert_eq!(out, payload);
    }
}
