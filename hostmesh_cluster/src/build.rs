// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! Generates the `Hello` handshake message from `src/protocol/hello.proto`
//! with `prost-build`, using the vendored `protoc` binary so no system
//! install is needed.

/// Directory holding the handshake schema, also used as the include path
const PROTO_DIR: &str = "src/protocol";
/// The handshake schema
const HELLO_PROTO: &str = "src/protocol/hello.proto";

fn main() {
    let protoc = protoc_bin_vendored::protoc_bin_path().expect("No vendored protoc for this target");
    std::env::set_var("PROTOC", protoc);

    println!("cargo:rerun-if-changed={HELLO_PROTO}");
    prost_build::compile_protos(&[HELLO_PROTO], &[PROTO_DIR])
        .expect("Failed to generate the handshake message");
}
