// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

use hostmesh::{DeserializeBuffer, Serializable, SerializationErr, SerializeBuffer};

fn reencode<T: Serializable>(value: &T) -> (T, usize) {
    let mut buf = SerializeBuffer::new();
    buf.write(value).expect("Failed to serialize");
    let len = buf.len();
    let mut read = DeserializeBuffer::new(buf.freeze());
    let decoded = read.read::<T>().expect("Failed to deserialize");
    assert_eq!(0, read.remaining());
    (decoded, len)
}

#[test]
fn test_named_struct_generation() {
    #[derive(hostmesh::Serializable, Debug, PartialEq)]
    struct Sample {
        id: u32,
        label: String,
        weights: Vec<f64>,
    }

    let value = Sample {
        id: 7,
        label: "seven".to_string(),
        weights: vec![0.5, 1.5],
    };
    let (decoded, _) = reencode(&value);
    assert_eq!(value, decoded);
}

#[test]
fn test_fields_encode_in_declaration_order() {
    #[derive(hostmesh::Serializable)]
    struct Pair {
        first: u8,
        second: u32,
    }

    let mut buf = SerializeBuffer::new();
    buf.write(&Pair {
        first: 1,
        second: 2,
    })
    .expect("Failed to serialize");
    let mut read = DeserializeBuffer::new(buf.freeze());
    assert_eq!(Ok(1u8), read.read::<u8>());
    assert_eq!(Ok(2u32), read.read::<u32>());
}

#[test]
fn test_tuple_and_unit_struct_generation() {
    #[derive(hostmesh::Serializable, Debug, PartialEq)]
    struct Point(i32, i32, Option<u8>);

    #[derive(hostmesh::Serializable, Debug, PartialEq)]
    struct Marker;

    let (point, _) = reencode(&Point(-3, 4, Some(9)));
    assert_eq!(Point(-3, 4, Some(9)), point);

    let (marker, len) = reencode(&Marker);
    assert_eq!(Marker, marker);
    assert_eq!(0, len);
}

#[test]
fn test_enum_generation() {
    #[derive(hostmesh::Serializable, Debug, PartialEq)]
    enum Command {
        Stop,
        Move(u32, u32),
        Rename { from: String, to: String },
    }

    for value in [
        Command::Stop,
        Command::Move(3, 4),
        Command::Rename {
            from: "a".to_string(),
            to: "b".to_string(),
        },
    ] {
        let (decoded, _) = reencode(&value);
        assert_eq!(value, decoded);
    }

    // the tag is the variant's declaration index
    let mut buf = SerializeBuffer::new();
    buf.write(&Command::Move(1, 2)).expect("Failed to serialize");
    let mut read = DeserializeBuffer::new(buf.freeze());
    assert_eq!(Ok(1u32), read.read::<u32>());
}

#[test]
fn test_invalid_enum_tag() {
    #[derive(hostmesh::Serializable, Debug)]
    enum Toggle {
        On,
        Off,
    }

    let mut buf = SerializeBuffer::new();
    buf.write(&2u32).expect("Failed to serialize");
    let mut read = DeserializeBuffer::new(buf.freeze());
    assert_eq!(
        Err(SerializationErr::InvalidData("Toggle")),
        read.read::<Toggle>().map(|_| ())
    );

    // both real variants still decode
    let (on, _) = reencode(&Toggle::On);
    assert!(matches!(on, Toggle::On));
    let (off, _) = reencode(&Toggle::Off);
    assert!(matches!(off, Toggle::Off));
}

#[test]
fn test_generic_struct_generation() {
    #[derive(hostmesh::Serializable, Debug, PartialEq)]
    struct Tagged<T> {
        tag: u16,
        value: T,
    }

    let value = Tagged {
        tag: 2,
        value: vec!["x".to_string(), "y".to_string()],
    };
    let (decoded, _) = reencode(&value);
    assert_eq!(value, decoded);

    let nested = Tagged {
        tag: 3,
        value: Tagged { tag: 4, value: 5u64 },
    };
    let (decoded, _) = reencode(&nested);
    assert_eq!(nested, decoded);
}

#[test]
fn test_truncated_struct_underruns() {
    #[derive(hostmesh::Serializable, Debug)]
    struct Wide {
        a: u64,
        b: u64,
    }

    let mut buf = SerializeBuffer::new();
    buf.write(&1u64).expect("Failed to serialize");
    let mut read = DeserializeBuffer::new(buf.freeze());
    assert!(matches!(
        read.read::<Wide>(),
        Err(SerializationErr::Underrun { .. })
    ));
}
