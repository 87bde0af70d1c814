// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! Protobuf specifications for the connection handshake between hosts.
//! Generated via [prost]

/// Connection handshake protocol
pub(crate) mod hello {
    #![allow(unreachable_pub)]
    include!(concat!(env!("OUT_DIR"), "/hello.rs"));
}

pub(crate) use hello::Hello;

/// The framing protocol version hosts must agree on
pub(crate) const PROTOCOL_VERSION: u32 = 1;
