// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! TCP listener, connector and session tasks which establish and run the
//! full mesh between hosts

use std::time::Duration;

use hostmesh::HostId;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::protocol::{Hello, PROTOCOL_VERSION};
use crate::ClusterErr;

pub(crate) mod listener;
pub(crate) mod session;

/// The handshake message a host introduces itself with
pub(crate) fn hello(host_id: HostId, num_hosts: u32) -> Hello {
    Hello {
        host_id,
        num_hosts,
        protocol_version: PROTOCOL_VERSION,
    }
}

/// Check a peer's [Hello] against this host's
pub(crate) fn validate_hello(own: &Hello, peer: &Hello) -> Result<(), ClusterErr> {
    if peer.protocol_version != own.protocol_version {
        return Err(ClusterErr::Topology(format!(
            "host {} speaks protocol version {}, host {} speaks {}",
            peer.host_id, peer.protocol_version, own.host_id, own.protocol_version
        )));
    }
    if peer.num_hosts != own.num_hosts {
        return Err(ClusterErr::Topology(format!(
            "host {} was launched with {} hosts, host {} with {}",
            peer.host_id, peer.num_hosts, own.host_id, own.num_hosts
        )));
    }
    if peer.host_id >= own.num_hosts || peer.host_id == own.host_id {
        return Err(ClusterErr::Topology(format!(
            "host {} received a handshake from invalid host id {}",
            own.host_id, peer.host_id
        )));
    }
    Ok(())
}

/// Connect to the lower-numbered `peer` at `addr`, retrying while it is not
/// listening yet, then run the handshake
pub(crate) async fn connect(
    own: &Hello,
    peer: HostId,
    addr: &str,
    timeout: Duration,
    retry_interval: Duration,
) -> Result<TcpStream, ClusterErr> {
    let deadline = Instant::now() + timeout;
    let mut stream = loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => break stream,
            Err(err) => {
                if Instant::now() >= deadline {
                    log::warn!("Failed to connect to host {peer} at {addr} '{err}'");
                    return Err(ClusterErr::Timeout(peer));
                }
                log::trace!("Host {peer} at {addr} is not reachable yet '{err}'");
                tokio::time::sleep(retry_interval).await;
            }
        }
    };
    stream.set_nodelay(true)?;

    session::write_message(&mut stream, own).await?;
    let reply: Hello = session::read_message(&mut stream).await?;
    validate_hello(own, &reply)?;
    if reply.host_id != peer {
        return Err(ClusterErr::Topology(format!(
            "expected host {peer} at {addr}, but host {} answered",
            reply.host_id
        )));
    }
    log::info!("TCP Session opened for host {peer} ({addr})");
    Ok(stream)
}
