// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! The TCP full-mesh [Transport]

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use hostmesh::transport::Transport;
use hostmesh::{HostId, TransportErr};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::net::listener::Listener;
use crate::net::session::{SessionReader, SessionWriter};
use crate::{net, ClusterErr, TcpTransportConfig};

/// How long [Transport::shutdown] waits for queued frames to be written out
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// A [Transport] over one TCP connection per pair of hosts.
///
/// Every host listens on its own address. Host `i` connects to every host
/// `j < i` and accepts a connection from every host `j > i`, then the sockets
/// are handed to reader and writer tasks on a private tokio runtime. Those
/// tasks only move frames between the sockets and queues. Landing pads run on
/// the thread polling the [hostmesh::Network].
///
/// The blocking calls ([TcpTransport::connect], [TcpTransport::with_listener]
/// and [Transport::shutdown]) must not be made from inside another tokio
/// runtime.
pub struct TcpTransport {
    host_id: HostId,
    num_hosts: u32,
    runtime: Option<Runtime>,
    peers: Vec<Option<UnboundedSender<Bytes>>>,
    inbound: UnboundedReceiver<(HostId, Bytes)>,
    writers: Vec<JoinHandle<()>>,
}

impl TcpTransport {
    /// Listen on this host's configured address and establish the mesh,
    /// blocking until every peer has completed the handshake
    pub fn connect(config: TcpTransportConfig) -> Result<Self, ClusterErr> {
        config.validate()?;
        let runtime = build_runtime(&config)?;
        let addr = &config.hosts[config.host_id as usize];
        let listener = runtime.block_on(TcpListener::bind(addr))?;
        log::info!("Host {} listening on {addr}", config.host_id);
        Self::establish(config, runtime, listener)
    }

    /// Establish the mesh accepting peers on an already-bound listener
    pub fn with_listener(
        config: TcpTransportConfig,
        listener: std::net::TcpListener,
    ) -> Result<Self, ClusterErr> {
        config.validate()?;
        let runtime = build_runtime(&config)?;
        listener.set_nonblocking(true)?;
        let listener = {
            let _guard = runtime.enter();
            TcpListener::from_std(listener)?
        };
        Self::establish(config, runtime, listener)
    }

    fn establish(
        config: TcpTransportConfig,
        runtime: Runtime,
        listener: TcpListener,
    ) -> Result<Self, ClusterErr> {
        let own = net::hello(config.host_id, config.num_hosts());
        let streams = runtime.block_on(async {
            let accept = async {
                let accepting = Listener::new(listener, own.clone()).accept_peers();
                match tokio::time::timeout(config.connect_timeout, accepting).await {
                    Ok(accepted) => accepted,
                    Err(_) => Err(ClusterErr::Topology(format!(
                        "host {} timed out waiting for the higher hosts to connect",
                        own.host_id
                    ))),
                }
            };
            let connect = async {
                let mut streams = BTreeMap::new();
                for peer in 0..own.host_id {
                    let stream = net::connect(
                        &own,
                        peer,
                        &config.hosts[peer as usize],
                        config.connect_timeout,
                        config.connect_retry_interval,
                    )
                    .await?;
                    streams.insert(peer, stream);
                }
                Ok::<_, ClusterErr>(streams)
            };
            let (mut accepted, connected) = tokio::try_join!(accept, connect)?;
            accepted.extend(connected);
            Ok::<_, ClusterErr>(accepted)
        })?;

        let (inbound_tx, inbound) = unbounded_channel();
        let mut peers = (0..config.num_hosts()).map(|_| None).collect::<Vec<_>>();
        let mut writers = Vec::with_capacity(streams.len());
        for (peer, stream) in streams {
            let (read, write) = stream.into_split();
            let (outbound_tx, outbound) = unbounded_channel();
            writers.push(runtime.spawn(
                SessionWriter {
                    peer,
                    stream: write,
                    outbound,
                }
                .run(),
            ));
            runtime.spawn(
                SessionReader {
                    peer,
                    stream: read,
                    inbound: inbound_tx.clone(),
                }
                .run(),
            );
            peers[peer as usize] = Some(outbound_tx);
        }
        log::info!(
            "Host {} connected to all {} peers",
            config.host_id,
            writers.len()
        );

        Ok(Self {
            host_id: config.host_id,
            num_hosts: config.num_hosts(),
            runtime: Some(runtime),
            peers,
            inbound,
            writers,
        })
    }
}

fn build_runtime(config: &TcpTransportConfig) -> Result<Runtime, ClusterErr> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.io_threads)
        .thread_name(format!("hostmesh-io-{}", config.host_id))
        .enable_all()
        .build()?)
}

impl Transport for TcpTransport {
    fn host_id(&self) -> HostId {
        self.host_id
    }

    fn num_hosts(&self) -> u32 {
        self.num_hosts
    }

    fn send(&mut self, destination: HostId, frame: Bytes) -> Result<(), TransportErr> {
        match self.peers.get(destination as usize) {
            Some(Some(peer)) => peer
                .send(frame)
                .map_err(|_| TransportErr::Closed(destination)),
            Some(None) if destination == self.host_id => Err(TransportErr::UnknownHost(destination)),
            Some(None) => Err(TransportErr::Closed(destination)),
            None => Err(TransportErr::UnknownHost(destination)),
        }
    }

    fn try_recv(&mut self) -> Result<Option<(HostId, Bytes)>, TransportErr> {
        match self.inbound.try_recv() {
            Ok(envelope) => Ok(Some(envelope)),
            // every reader has stopped: the peers closed their ends. Nothing
            // more will arrive, which is not an error on its own.
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
        }
    }

    fn shutdown(&mut self) -> Result<(), TransportErr> {
        // closing the outbound queues lets each writer drain and close its socket
        self.peers.clear();
        let Some(runtime) = self.runtime.take() else {
            return Ok(());
        };
        let writers = std::mem::take(&mut self.writers);
        let flushed = runtime.block_on(async {
            tokio::time::timeout(FLUSH_TIMEOUT, async {
                for writer in writers {
                    let _ = writer.await;
                }
            })
            .await
        });
        if flushed.is_err() {
            log::warn!(
                "Host {} gave up flushing its sessions after {FLUSH_TIMEOUT:?}",
                self.host_id
            );
        }
        runtime.shutdown_timeout(Duration::from_millis(100));
        log::info!("TCP transport for host {} shut down", self.host_id);
        Ok(())
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("host_id", &self.host_id)
            .field("num_hosts", &self.num_hosts)
            .field("open", &self.runtime.is_some())
            .finish()
    }
}
