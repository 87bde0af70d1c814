// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

use std::env;

use clap::Parser;
use hostmesh::transport::LocalTransport;
use hostmesh_cluster::{TcpTransport, TcpTransportConfig};


#[derive(Debug, clap::Subcommand)]
enum Cli {
    /// Run the two-host network test as one process of a TCP group. Without
    /// `--host-id` and `--hosts` the topology is read from HOSTMESH_HOST_ID
    /// and HOSTMESH_HOSTS
    NetworkTest {
        /// This process's host id
        #[arg(long, requires = "hosts")]
        host_id: Option<u32>,
        /// Comma-separated `addr:port` list of every host, in host id order
        #[arg(long, requires = "host_id")]
        hosts: Option<String>,
        /// Messages sent by each timing loop
        #[arg(long, default_value_t = 1_000_000)]
        iterations: u32,
    },
    /// Run the same network test with both hosts as threads of this process
    LocalNetworkTest {
        /// Messages sent by each timing loop
        #[arg(long, default_value_t = 1_000_000)]
        iterations: u32,
    },
}

#[derive(Parser, Debug)]
struct Args {
    #[command(subcommand)]
    command: Cli,
}

// MAIN //
fn main() {
    let args = Args::parse();

    // if it's not set, set the log level to info
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::builder().format_timestamp_millis().init();

    // parse the CLI and run the correct playground scenario
    let code = match args.command {
        Cli::NetworkTest {
            host_id,
            hosts,
            iterations,
        } => {
            let config = match (host_id, hosts) {
                (Some(host_id), Some(hosts)) => Ok(TcpTransportConfig::new(
                    host_id,
                    hostmesh_cluster::config::parse_hosts(&hosts),
                )),
                _ => TcpTransportConfig::from_env(),
            };
            match config.and_then(TcpTransport::connect) {
                Ok(transport) => network_test::run_host(transport, iterations),
                Err(err) => {
                    log::error!("Failed to establish the host group: {err}");
                    -1
                }
            }
        }
        Cli::LocalNetworkTest { iterations } => {
            let hosts = LocalTransport::mesh(2)
                .into_iter()
                .map(|transport| {
                    std::thread::spawn(move || network_test::run_host(transport, iterations))
                })
                .collect::<Vec<_>>();
            hosts
                .into_iter()
                .map(|host| host.join().unwrap_or(-1))
                .min()
                .unwrap_or(0)
        }
    };

    if code < 0 {
        log::error!("Network test failed with code {code}");
        std::process::exit(code);
    }
}
