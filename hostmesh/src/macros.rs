// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! Macro helpers for marshaling several values at once

/// `serialize!` appends every value to a [crate::SerializeBuffer] in argument
/// order. The buffer is given as a `&mut SerializeBuffer`.
///
/// Evaluates to `Result<(), SerializationErr>`, stopping at the first failure.
///
/// ```rust
/// use hostmesh::{serialize, SerializeBuffer};
///
/// let mut buf = SerializeBuffer::new();
/// serialize!(&mut buf, 42u32, "answer", vec![1u8, 2, 3]).expect("Failed to serialize");
/// ```
#[macro_export]
macro_rules! serialize {
    ($buf:expr, $($value:expr),+ $(,)?) => {{
        let buffer: &mut $crate::SerializeBuffer = $buf;
        let mut result: ::std::result::Result<(), $crate::SerializationErr> = Ok(());
        $(
            if result.is_ok() {
                result = buffer.write(&$value);
            }
        )+
        result
    }};
}

/// `deserialize!` extracts values from a [crate::DeserializeBuffer] into the
/// given destinations, in argument order. The buffer is given as a
/// `&mut DeserializeBuffer`. The destinations' types decide what
/// is read, so they must match the types which were serialized.
///
/// Evaluates to `Result<(), SerializationErr>`, stopping at the first failure.
///
/// ```rust
/// use hostmesh::{deserialize, serialize, DeserializeBuffer, SerializeBuffer};
///
/// let mut buf = SerializeBuffer::new();
/// serialize!(&mut buf, 42u32, "answer").unwrap();
///
/// let mut reader = DeserializeBuffer::from(buf);
/// let mut value = 0u32;
/// let mut name = String::new();
/// deserialize!(&mut reader, value, name).unwrap();
/// assert_eq!(42, value);
/// assert_eq!("answer", name);
/// ```
#[macro_export]
macro_rules! deserialize {
    ($buf:expr, $($dest:expr),+ $(,)?) => {{
        let buffer: &mut $crate::DeserializeBuffer = $buf;
        let mut result: ::std::result::Result<(), $crate::SerializationErr> = Ok(());
        $(
            if result.is_ok() {
                result = buffer.read_into(&mut $dest);
            }
        )+
        result
    }};
}
