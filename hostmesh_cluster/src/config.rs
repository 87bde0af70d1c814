// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! Configuration of the TCP mesh

use std::time::Duration;

use hostmesh::HostId;

use crate::ClusterErr;

/// The environment variable holding this process's host id
pub const HOST_ID_ENV: &str = "HOSTMESH_HOST_ID";
/// The environment variable holding the comma-separated `addr:port` list of
/// every host, in host id order
pub const HOSTS_ENV: &str = "HOSTMESH_HOSTS";

/// Where this host sits in the group and how to reach its peers
#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// This host's id, its position in `hosts`
    pub host_id: HostId,
    /// The `addr:port` every host listens on, in host id order
    pub hosts: Vec<String>,
    /// How long to keep retrying a peer which is not listening yet
    pub connect_timeout: Duration,
    /// The pause between connection attempts
    pub connect_retry_interval: Duration,
    /// The number of worker threads doing socket I/O
    pub io_threads: usize,
}

impl TcpTransportConfig {
    /// Create a configuration with default timeouts
    pub fn new(host_id: HostId, hosts: Vec<String>) -> Self {
        Self {
            host_id,
            hosts,
            connect_timeout: Duration::from_secs(30),
            connect_retry_interval: Duration::from_millis(100),
            io_threads: 2,
        }
    }

    /// Read the host id and host list an external launcher put in the
    /// environment
    pub fn from_env() -> Result<Self, ClusterErr> {
        let host_id = std::env::var(HOST_ID_ENV)
            .map_err(|_| ClusterErr::Config(format!("{HOST_ID_ENV} is not set")))?;
        let host_id = host_id.trim().parse::<HostId>().map_err(|err| {
            ClusterErr::Config(format!("{HOST_ID_ENV}='{host_id}' is not a host id ({err})"))
        })?;
        let hosts = std::env::var(HOSTS_ENV)
            .map_err(|_| ClusterErr::Config(format!("{HOSTS_ENV} is not set")))?;
        let config = Self::new(host_id, parse_hosts(&hosts));
        config.validate()?;
        Ok(config)
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the pause between connection attempts
    pub fn with_connect_retry_interval(mut self, interval: Duration) -> Self {
        self.connect_retry_interval = interval;
        self
    }

    /// Set the number of socket I/O threads
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads;
        self
    }

    /// The number of hosts in the group
    pub fn num_hosts(&self) -> u32 {
        self.hosts.len() as u32
    }

    /// Check the host id falls inside the host list
    pub fn validate(&self) -> Result<(), ClusterErr> {
        if self.hosts.is_empty() {
            return Err(ClusterErr::Config("the host list is empty".to_string()));
        }
        if self.host_id >= self.num_hosts() {
            return Err(ClusterErr::Config(format!(
                "host id {} is outside a list of {} hosts",
                self.host_id,
                self.hosts.len()
            )));
        }
        if self.io_threads == 0 {
            return Err(ClusterErr::Config("io_threads must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Split a comma-separated host list, ignoring whitespace and empty entries
pub fn parse_hosts(hosts: &str) -> Vec<String> {
    hosts
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(String::from)
        .collect()
}
