// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! Serialization of typed values into flat byte buffers.
//!
//! Values are appended to a [SerializeBuffer] in argument order and extracted
//! from a [DeserializeBuffer] in the same order. The byte layout is a private
//! contract between the two sides of a single send: fixed-width scalars are
//! written big-endian and variable-length sequences carry a `u64` length
//! prefix. All hosts run the same program image, so there is no versioning.
//!
//! Implement [Serializable] by hand, or derive it with
//! `#[derive(Serializable)]` for structs and enums whose fields are all
//! [Serializable].

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::{BuildHasher, Hash};

use bytes::Bytes;

use crate::SerializationErr;

mod buffer;

pub use buffer::{DeserializeBuffer, SerializeBuffer};

/// A type which can be appended to a [SerializeBuffer] and later extracted
/// from a [DeserializeBuffer].
///
/// The round-trip law must hold: reading a value back out of a buffer it was
/// written into yields an equal value.
pub trait Serializable {
    /// Append this value's encoding to the buffer
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr>;

    /// Extract a value from the buffer's cursor position
    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr>
    where
        Self: Sized;
}

/// Upper bound for pre-allocating a decoded sequence, so a corrupt length
/// prefix can't trigger a giant allocation before the underrun is noticed
fn bounded_capacity(len: usize, buf: &DeserializeBuffer) -> usize {
    len.min(buf.remaining())
}

// ============== Primitives ============== //

macro_rules! implement_numeric {
    {$ty:ty} => {
        impl Serializable for $ty {
            fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
                buf.put_slice(&self.to_be_bytes())
            }
            fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
                Ok(<$ty>::from_be_bytes(buf.take_array()?))
            }
        }
    };
}

implement_numeric! {u8}
implement_numeric! {u16}
implement_numeric! {u32}
implement_numeric! {u64}
implement_numeric! {u128}
implement_numeric! {i8}
implement_numeric! {i16}
implement_numeric! {i32}
implement_numeric! {i64}
implement_numeric! {i128}
implement_numeric! {f32}
implement_numeric! {f64}

impl Serializable for usize {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        (*self as u64).serialize(buf)
    }
    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        usize::try_from(u64::deserialize(buf)?).map_err(|_| SerializationErr::InvalidData("usize"))
    }
}

impl Serializable for isize {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        (*self as i64).serialize(buf)
    }
    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        isize::try_from(i64::deserialize(buf)?).map_err(|_| SerializationErr::InvalidData("isize"))
    }
}

impl Serializable for bool {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        u8::from(*self).serialize(buf)
    }
    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        match u8::deserialize(buf)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(SerializationErr::InvalidData("bool")),
        }
    }
}

impl Serializable for char {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        u32::from(*self).serialize(buf)
    }
    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        char::from_u32(u32::deserialize(buf)?).ok_or(SerializationErr::InvalidData("char"))
    }
}

impl Serializable for () {
    fn serialize(&self, _buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        Ok(())
    }
    fn deserialize(_buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        Ok(())
    }
}

// ============== Strings & bytes ============== //

// borrowed strings can be sent, but are always received as [String]
impl Serializable for str {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        buf.put_len(self.len())?;
        buf.put_slice(self.as_bytes())
    }
    // `deserialize` is bounded on `Self: Sized`, so it is omitted for `str`
}

impl Serializable for &str {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        (**self).serialize(buf)
    }
    fn deserialize(_buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        Err(SerializationErr::InvalidData("&str, read a String instead"))
    }
}

impl Serializable for String {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        self.as_str().serialize(buf)
    }
    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        let len = buf.take_len()?;
        let bytes = buf.take_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SerializationErr::InvalidData("String"))
    }
}

impl Serializable for Bytes {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        buf.put_len(self.len())?;
        buf.put_slice(self)
    }
    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        let len = buf.take_len()?;
        buf.take_bytes(len)
    }
}

// ============== Sequences ============== //

// borrowed slices can be sent, but are always received as [Vec]
impl<T: Serializable> Serializable for &[T] {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        buf.put_len(self.len())?;
        for item in self.iter() {
            item.serialize(buf)?;
        }
        Ok(())
    }
    fn deserialize(_buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        Err(SerializationErr::InvalidData("&[T], read a Vec instead"))
    }
}

impl<T: Serializable> Serializable for Vec<T> {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        self.as_slice().serialize(buf)
    }
    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        let len = buf.take_len()?;
        let mut out = Vec::with_capacity(bounded_capacity(len, buf));
        for _ in 0..len {
            out.push(T::deserialize(buf)?);
        }
        Ok(out)
    }
}

impl<T: Serializable> Serializable for VecDeque<T> {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        buf.put_len(self.len())?;
        for item in self {
            item.serialize(buf)?;
        }
        Ok(())
    }
    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        let len = buf.take_len()?;
        let mut out = VecDeque::with_capacity(bounded_capacity(len, buf));
        for _ in 0..len {
            out.push_back(T::deserialize(buf)?);
        }
        Ok(out)
    }
}

// fixed-size arrays carry no length prefix, both sides know `N`
impl<T: Serializable, const N: usize> Serializable for [T; N] {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        for item in self {
            item.serialize(buf)?;
        }
        Ok(())
    }
    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        let mut items = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::deserialize(buf)?);
        }
        items
            .try_into()
            .map_err(|_| SerializationErr::InvalidData("array"))
    }
}

impl<K: Serializable + Ord, V: Serializable> Serializable for BTreeMap<K, V> {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        buf.put_len(self.len())?;
        for (key, value) in self {
            key.serialize(buf)?;
            value.serialize(buf)?;
        }
        Ok(())
    }
    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        let len = buf.take_len()?;
        let mut out = BTreeMap::new();
        for _ in 0..len {
            let key = K::deserialize(buf)?;
            let value = V::deserialize(buf)?;
            out.insert(key, value);
        }
        Ok(out)
    }
}

impl<K, V, S> Serializable for HashMap<K, V, S>
where
    K: Serializable + Eq + Hash,
    V: Serializable,
    S: BuildHasher + Default,
{
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        buf.put_len(self.len())?;
        for (key, value) in self {
            key.serialize(buf)?;
            value.serialize(buf)?;
        }
        Ok(())
    }
    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        let len = buf.take_len()?;
        let mut out = HashMap::with_capacity_and_hasher(bounded_capacity(len, buf), S::default());
        for _ in 0..len {
            let key = K::deserialize(buf)?;
            let value = V::deserialize(buf)?;
            out.insert(key, value);
        }
        Ok(out)
    }
}

// ============== Wrappers ============== //

impl<T: Serializable> Serializable for Option<T> {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        match self {
            None => 0u8.serialize(buf),
            Some(value) => {
                1u8.serialize(buf)?;
                value.serialize(buf)
            }
        }
    }
    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        match u8::deserialize(buf)? {
            0 => Ok(None),
            1 => Ok(Some(T::deserialize(buf)?)),
            _ => Err(SerializationErr::InvalidData("Option")),
        }
    }
}

impl<T: Serializable> Serializable for Box<T> {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        self.as_ref().serialize(buf)
    }
    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        Ok(Box::new(T::deserialize(buf)?))
    }
}

// ============== Tuples ============== //

macro_rules! implement_tuple {
    {$($name:ident),+} => {
        impl<$($name: Serializable),+> Serializable for ($($name,)+) {
            #[allow(non_snake_case)]
            fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
                let ($($name,)+) = self;
                $( $name.serialize(buf)?; )+
                Ok(())
            }
            fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
                Ok(($( $name::deserialize(buf)?, )+))
            }
        }
    };
}

implement_tuple! {A}
implement_tuple! {A, B}
implement_tuple! {A, B, C}
implement_tuple! {A, B, C, D}
implement_tuple! {A, B, C, D, E}
implement_tuple! {A, B, C, D, E, F}
