// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! TCP transport for `hostmesh` host groups.
//!
//! Each host process is launched with its own host id and the list of every
//! host's listening address, either directly or through the environment
//! ([TcpTransportConfig::from_env]). [TcpTransport::connect] then establishes
//! a full mesh of TCP sessions and validates that every host agrees on the
//! group's size, after which the transport is handed to a
//! [hostmesh::NetworkBuilder].
//!
//! ```no_run
//! use hostmesh::NetworkBuilder;
//! use hostmesh_cluster::{TcpTransport, TcpTransportConfig};
//!
//! let config = TcpTransportConfig::from_env().expect("Missing host topology");
//! let transport = TcpTransport::connect(config).expect("Failed to connect the mesh");
//! let mut network = NetworkBuilder::new()
//!     .build(transport)
//!     .expect("Failed to build the network");
//! network.terminate().expect("Failed to terminate");
//! ```
//!
//! ## Wire format
//!
//! Every object on a session is written as a big-endian `u64` length followed
//! by the object's bytes. The first object in each direction is a protobuf
//! `Hello { host_id, num_hosts, protocol_version }` handshake, every later one
//! an engine frame.

#![warn(unused_imports)]
#![warn(unsafe_code)]
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]


pub mod config;
mod errors;
mod net;
mod protocol;
mod transport;

pub use config::TcpTransportConfig;
pub use errors::ClusterErr;
pub use transport::TcpTransport;
