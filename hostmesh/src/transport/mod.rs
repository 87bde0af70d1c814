// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! The point-to-point transport contract the active message engine runs on.
//!
//! A transport moves opaque byte frames between the hosts of a fixed-size
//! group. It must be reliable and preserve ordering per sender; it performs no
//! dispatch of its own. Receipt is polled: the engine calls
//! [Transport::try_recv] from the host's own thread of control, so a transport
//! which does I/O in the background (like the TCP transport in
//! `hostmesh_cluster`) only hands frames over through a queue.

use bytes::Bytes;

use crate::{HostId, TransportErr};

pub mod local;

pub use local::LocalTransport;

/// A reliable, per-sender ordered, point-to-point byte transport
pub trait Transport: Send {
    /// The id of the host this endpoint belongs to
    fn host_id(&self) -> HostId;

    /// The number of hosts in the group
    fn num_hosts(&self) -> u32;

    /// Enqueue a frame for delivery to `destination`. This must not block
    /// waiting on the destination host.
    fn send(&mut self, destination: HostId, frame: Bytes) -> Result<(), TransportErr>;

    /// Take the next frame which has arrived at this endpoint, if there is one,
    /// along with the id of the host which sent it
    fn try_recv(&mut self) -> Result<Option<(HostId, Bytes)>, TransportErr>;

    /// Flush anything still queued and release the endpoint. Called once, after
    /// the termination barrier
    fn shutdown(&mut self) -> Result<(), TransportErr> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn host_id(&self) -> HostId {
        (**self).host_id()
    }

    fn num_hosts(&self) -> u32 {
        (**self).num_hosts()
    }

    fn send(&mut self, destination: HostId, frame: Bytes) -> Result<(), TransportErr> {
        (**self).send(destination, frame)
    }

    fn try_recv(&mut self) -> Result<Option<(HostId, Bytes)>, TransportErr> {
        (**self).try_recv()
    }

    fn shutdown(&mut self) -> Result<(), TransportErr> {
        (**self).shutdown()
    }
}
