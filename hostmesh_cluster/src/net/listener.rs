// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! TCP server accepting the connections of higher-numbered hosts

use std::collections::BTreeMap;

use hostmesh::HostId;
use tokio::net::{TcpListener, TcpStream};

use super::session::{read_message, write_message};
use crate::protocol::Hello;
use crate::ClusterErr;

/// Accepts every peer with a higher host id than this one. Each connecting
/// peer introduces itself with a [Hello], which is answered with this host's
/// own [Hello] before it is validated, so the peer can report a mismatch too.
pub(crate) struct Listener {
    listener: TcpListener,
    hello: Hello,
}

impl Listener {
    pub(crate) fn new(listener: TcpListener, hello: Hello) -> Self {
        Self { listener, hello }
    }

    /// Accept connections until every expected peer has completed the
    /// handshake
    pub(crate) async fn accept_peers(self) -> Result<BTreeMap<HostId, TcpStream>, ClusterErr> {
        let own = self.hello.host_id;
        let expected = self.hello.num_hosts - own - 1;
        let mut peers = BTreeMap::new();

        while (peers.len() as u32) < expected {
            let (mut stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(socket_accept_error) => {
                    log::warn!("Error accepting socket {socket_accept_error} on host {own}");
                    continue;
                }
            };
            stream.set_nodelay(true)?;

            let hello: Hello = read_message(&mut stream).await?;
            write_message(&mut stream, &self.hello).await?;
            super::validate_hello(&self.hello, &hello)?;
            if hello.host_id <= own {
                return Err(ClusterErr::Topology(format!(
                    "host {} connected to host {own}, but only higher hosts connect",
                    hello.host_id
                )));
            }
            if peers.contains_key(&hello.host_id) {
                return Err(ClusterErr::Topology(format!(
                    "host {} connected to host {own} twice",
                    hello.host_id
                )));
            }
            log::info!("TCP Session opened for host {} ({addr})", hello.host_id);
            peers.insert(hello.host_id, stream);
        }
        Ok(peers)
    }
}
