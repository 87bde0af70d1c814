// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! `hostmesh`: active messages and per-host replicated objects for a fixed
//! group of cooperating host processes running the same program (SPMD).
//!
//! ## Overview
//!
//! * The [serialization] codec marshals ordered sequences of typed values into
//!   flat [SerializeBuffer]s and back out of [DeserializeBuffer]s.
//! * A [transport::Transport] moves opaque frames between hosts, reliably and in
//!   order per sender. [transport::LocalTransport] connects threads of one
//!   process; `hostmesh_cluster` provides a TCP mesh between processes.
//! * The [Network] is the active message engine: it tags buffers with a
//!   landing-pad identity, sends and broadcasts them, and dispatches whatever
//!   has arrived when the host calls [Network::handle_receives].
//! * [PerHost] objects are replicated one instance per host, constructed and
//!   destroyed in lock-step across the group.
//!
//! ## Getting started
//!
//! Landing pads are registered on a [NetworkBuilder] during startup. Every host
//! registers the same pads in the same order, which is what makes a pad's id
//! agree across hosts.
//!
//! ```rust
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! use hostmesh::transport::LocalTransport;
//! use hostmesh::{serialize, NetworkBuilder, SerializeBuffer};
//!
//! let landed = Arc::new(AtomicU32::new(0));
//! let mut hosts = LocalTransport::mesh(2).into_iter().map(|transport| {
//!     let landed = landed.clone();
//!     std::thread::spawn(move || {
//!         let mut builder = NetworkBuilder::new();
//!         let pad = builder.register(move |_network, buf| {
//!             landed.store(buf.read::<u32>()?, Ordering::SeqCst);
//!             Ok(())
//!         });
//!         let mut network = builder.build(transport).expect("Failed to build the network");
//!         if network.id() == 0 {
//!             let mut buf = SerializeBuffer::new();
//!             serialize!(&mut buf, 42u32).unwrap();
//!             network.send(1, pad, buf).unwrap();
//!             network.terminate().unwrap();
//!         } else {
//!             network.start().unwrap();
//!         }
//!     })
//! }).collect::<Vec<_>>();
//! for host in hosts.drain(..) {
//!     host.join().unwrap();
//! }
//! assert_eq!(42, landed.load(Ordering::SeqCst));
//! ```
//!
//! ## Scheduling
//!
//! Each host has exactly one thread of control driving both computation and
//! message progress. Handlers only run inside [Network::handle_receives] (and
//! the calls which poll internally: [Network::start], [Network::terminate] and
//! [PerHost::allocate]) on the calling thread, so they can touch host-local
//! state through the `&mut Network` they're given without any locking. A slow
//! handler stalls all further message progress on its host.
//!
//! ## Failures
//!
//! Errors returned from the polling calls are fatal: an unknown landing pad, a
//! corrupt frame or a buffer underrun all mean the hosts disagree about the
//! program they're running. Log them and exit. Since [Network::terminate] needs
//! every host to take part, a host which exits early will leave its peers
//! waiting in the termination barrier.

#![warn(unused_imports)]
#![warn(unsafe_code)]
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// lets `#[derive(Serializable)]` resolve `::hostmesh` paths inside this crate
extern crate self as hostmesh;

#[cfg(test)]
use criterion as _;

pub mod errors;
pub mod macros;
pub mod network;
pub mod per_host;
pub mod registry;
pub mod serialization;
pub mod transport;

/// A host's position in the group, in `[0, num_hosts)`
pub type HostId = u32;

// ============== Re-exports ============== //
pub use errors::{NetworkErr, SerializationErr, TransportErr};
pub use network::{HostState, Network, NetworkBuilder, NetworkConfig, NetworkStats};
pub use per_host::{Did, PerHost, PerHostObject, RemoteRef};
pub use registry::{AltLandingPad, HandlerId, HandlerRegistry, LandingPad};
pub use serialization::{DeserializeBuffer, Serializable, SerializeBuffer};

#[cfg(feature = "derive")]
pub use hostmesh_derive::Serializable;
