// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! Different test scenarios are defined here. Each one runs as one host of a
//! group: launch one process per host with the same arguments apart from
//! `--host-id`.

use clap::Parser;
use hostmesh_cluster::{TcpTransport, TcpTransportConfig};

pub mod broadcast;

/// Where this process sits in the host group
#[derive(clap::Args, Debug, Clone)]
pub struct Topology {
    /// This process's host id. Read from HOSTMESH_HOST_ID when absent
    #[arg(long, requires = "hosts")]
    host_id: Option<u32>,
    /// Comma-separated `addr:port` list of every host. Read from HOSTMESH_HOSTS
    /// when absent
    #[arg(long, requires = "host_id")]
    hosts: Option<String>,
}

impl Topology {
    /// Establish this host's TCP mesh, or `None` (logged) on failure
    fn connect(&self) -> Option<TcpTransport> {
        let config = match (self.host_id, &self.hosts) {
            (Some(host_id), Some(hosts)) => Ok(TcpTransportConfig::new(
                host_id,
                hostmesh_cluster::config::parse_hosts(hosts),
            )),
            _ => TcpTransportConfig::from_env(),
        };
        match config.and_then(TcpTransport::connect) {
            Ok(transport) => Some(transport),
            Err(err) => {
                log::error!("Failed to establish the host group: {err}");
                None
            }
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub enum TestCase {
    /// Host 0 exchanges ping-pongs with every other host
    PingPong(ping_pong::PingPongConfig),
    /// Every host broadcasts to every other
    Broadcast(broadcast::BroadcastConfig),
    /// Host 0 replicates per-host objects and every host verifies its replicas
    PerHost(per_host::PerHostConfig),
    /// Not-a-Host: Don't run any test and exit this process with code 0
    Nan,
}

/// Run a test case over TCP, returning the exit code
pub fn run(case: TestCase) -> i32 {
    let topology = match &case {
        TestCase::PingPong(config) => &config.topology,
        TestCase::Broadcast(config) => &config.topology,
        TestCase::PerHost(config) => &config.topology,
        TestCase::Nan => return 0,
    };
    let Some(transport) = topology.connect() else {
        return -1;
    };
    match &case {
        TestCase::PingPong(config) => ping_pong::test(transport, config),
        TestCase::Broadcast(config) => broadcast::test(transport, config),
        TestCase::PerHost(config) => per_host::test(transport, config),
        TestCase::Nan => 0,
    }
}

/// Run `body` on one thread per host of an in-process mesh, returning each
/// host's exit code
#[cfg(test)]
pub(crate) fn run_local<F>(num_hosts: u32, body: F) -> Vec<i32>
where
    F: Fn(hostmesh::transport::LocalTransport) -> i32 + Send + Sync + 'static,
{
    let _ = env_logger::builder().is_test(true).try_init();
    let body = std::sync::Arc::new(body);
    let hosts = hostmesh::transport::LocalTransport::mesh(num_hosts)
        .into_iter()
        .map(|transport| {
            let body = body.clone();
            std::thread::spawn(move || body(transport))
        })
        .collect::<Vec<_>>();
    hosts
        .into_iter()
        .map(|host| host.join().expect("Host thread panicked"))
        .collect()
}

/// Run `body` on one thread per host of a loopback TCP mesh, returning each
/// host's exit code
#[cfg(test)]
pub(crate) fn run_tcp<F>(num_hosts: u32, body: F) -> Vec<i32>
where
    F: Fn(TcpTransport) -> i32 + Send + Sync + 'static,
{
    let _ = env_logger::builder().is_test(true).try_init();
    let listeners = (0..num_hosts)
        .map(|_| std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind"))
        .collect::<Vec<_>>();
    let addrs = listeners
        .iter()
        .map(|listener| listener.local_addr().expect("No local address").to_string())
        .collect::<Vec<_>>();
    let body = std::sync::Arc::new(body);
    let hosts = listeners
        .into_iter()
        .enumerate()
        .map(|(host_id, listener)| {
            let body = body.clone();
            let config = TcpTransportConfig::new(host_id as u32, addrs.clone());
            std::thread::spawn(move || {
                let transport =
                    TcpTransport::with_listener(config, listener).expect("Failed to connect");
                body(transport)
            })
        })
        .collect::<Vec<_>>();
    hosts
        .into_iter()
        .map(|host| host.join().expect("Host thread panicked"))
        .collect()
}
