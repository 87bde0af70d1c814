// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! An in-process transport which connects every host of a mesh through
//! unbounded channels. Useful to run a whole SPMD group as threads of one
//! process, e.g. for tests.

use bytes::Bytes;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::Transport;
use crate::{HostId, TransportErr};

type Envelope = (HostId, Bytes);

/// One host's endpoint of an in-process mesh. Build all the endpoints at once
/// with [LocalTransport::mesh] and hand one to each host's thread.
pub struct LocalTransport {
    host_id: HostId,
    peers: Vec<UnboundedSender<Envelope>>,
    inbox: UnboundedReceiver<Envelope>,
    closed: bool,
}

impl LocalTransport {
    /// Create the endpoints for a fully connected mesh of `num_hosts` hosts.
    /// Endpoint `i` in the returned vector belongs to host `i`.
    pub fn mesh(num_hosts: u32) -> Vec<LocalTransport> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..num_hosts).map(|_| unbounded_channel()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(host_id, inbox)| LocalTransport {
                host_id: host_id as HostId,
                peers: senders.clone(),
                inbox,
                closed: false,
            })
            .collect()
    }
}

impl Transport for LocalTransport {
    fn host_id(&self) -> HostId {
        self.host_id
    }

    fn num_hosts(&self) -> u32 {
        self.peers.len() as u32
    }

    fn send(&mut self, destination: HostId, frame: Bytes) -> Result<(), TransportErr> {
        if self.closed {
            return Err(TransportErr::Closed(destination));
        }
        let peer = self
            .peers
            .get(destination as usize)
            .ok_or(TransportErr::UnknownHost(destination))?;
        peer.send((self.host_id, frame))
            .map_err(|_| TransportErr::Closed(destination))
    }

    fn try_recv(&mut self) -> Result<Option<(HostId, Bytes)>, TransportErr> {
        match self.inbox.try_recv() {
            Ok(envelope) => Ok(Some(envelope)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportErr::Closed(self.host_id)),
        }
    }

    fn shutdown(&mut self) -> Result<(), TransportErr> {
        log::debug!("Local transport for host {} shut down", self.host_id);
        self.closed = true;
        self.peers.clear();
        Ok(())
    }
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport")
            .field("host_id", &self.host_id)
            .field("num_hosts", &self.peers.len())
            .finish()
    }
}
