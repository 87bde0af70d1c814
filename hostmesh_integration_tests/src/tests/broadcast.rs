// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! Broadcast test. Every host broadcasts `messages` buffers of random length,
//! each carrying its sequence number and a checksum of its payload, and then
//! terminates. A host passes when, after termination, it has received every
//! other host's messages exactly once, in send order, with intact payloads.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use clap::Args;
use hostmesh::transport::Transport;
use hostmesh::{HostId, NetworkBuilder, NetworkErr, SerializeBuffer};
use rand::Rng;

use super::Topology;

/// Configuration for the broadcast test
#[derive(Args, Debug, Clone)]
pub struct BroadcastConfig {
    #[command(flatten)]
    pub(crate) topology: Topology,
    /// Messages broadcast by each host
    #[arg(long, default_value_t = 500)]
    messages: u32,
    /// Upper bound on each message's payload size, in bytes
    #[arg(long, default_value_t = 4096)]
    max_payload: usize,
}

/// What one host has received from each of its peers
#[derive(Debug, Default)]
struct Received {
    next_seq: BTreeMap<HostId, u32>,
    corrupt: u32,
    out_of_order: u32,
}

fn checksum(payload: &[u8]) -> u64 {
    payload
        .iter()
        .fold(0xcbf29ce484222325u64, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(0x100000001b3)
        })
}

/// Run one host of the broadcast test, returning the exit code
pub fn test<T: Transport + 'static>(transport: T, config: &BroadcastConfig) -> i32 {
    run(transport, config.messages, config.max_payload)
}

pub(crate) fn run<T: Transport + 'static>(transport: T, messages: u32, max_payload: usize) -> i32 {
    match broadcast(transport, messages, max_payload) {
        Ok(code) => code,
        Err(err) => {
            log::error!("Broadcast failed: {err}");
            -2
        }
    }
}

fn broadcast<T: Transport + 'static>(
    transport: T,
    messages: u32,
    max_payload: usize,
) -> Result<i32, NetworkErr> {
    let received = Arc::new(Mutex::new(Received::default()));

    let mut builder = NetworkBuilder::new();
    let tally = received.clone();
    let pad = builder.register(move |network, buf| {
        let from = network.message_source().unwrap_or(network.id());
        let seq = buf.read::<u32>()?;
        let payload = buf.read::<Vec<u8>>()?;
        let sum = buf.read::<u64>()?;

        let mut guard = tally.lock().unwrap_or_else(|poison| poison.into_inner());
        let tally = &mut *guard;
        if sum != checksum(&payload) {
            tally.corrupt += 1;
        }
        let next = tally.next_seq.entry(from).or_default();
        if *next != seq {
            tally.out_of_order += 1;
        }
        *next = seq + 1;
        Ok(())
    });
    let mut network = builder.build(transport)?;

    let mut rng = rand::thread_rng();
    for seq in 0..messages {
        let len = rng.gen_range(0..=max_payload);
        let payload = (0..len).map(|_| rng.gen::<u8>()).collect::<Vec<u8>>();
        let mut buf = SerializeBuffer::new();
        buf.write(&seq)?;
        buf.write(&payload)?;
        buf.write(&checksum(&payload))?;
        network.broadcast(pad, buf)?;
        network.handle_receives()?;
    }
    network.terminate()?;

    let received = received.lock().unwrap_or_else(|poison| poison.into_inner());
    let host = network.id();
    if received.corrupt > 0 || received.out_of_order > 0 {
        log::error!(
            "Host {host} saw {} corrupt and {} reordered messages",
            received.corrupt,
            received.out_of_order
        );
        return Ok(-3);
    }
    for peer in (0..network.num_hosts()).filter(|peer| *peer != host) {
        let got = received.next_seq.get(&peer).copied().unwrap_or_default();
        if got != messages {
            log::error!("Host {host} received {got} of {messages} messages from host {peer}");
            return Ok(-4);
        }
    }
    if received.next_seq.contains_key(&host) {
        log::error!("Host {host} received its own broadcast");
        return Ok(-5);
    }
    log::info!("Host {host} received every broadcast");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{run_local, run_tcp};

    #[test]
    fn test_checksum_detects_changes() {
        assert_eq!(checksum(&[]), checksum(&[]));
        assert_ne!(checksum(&[1, 2, 3]), checksum(&[1, 2, 4]));
        assert_ne!(checksum(&[1, 2, 3]), checksum(&[3, 2, 1]));
    }

    #[test]
    fn test_broadcast_local() {
        let codes = run_local(4, |transport| run(transport, 100, 512));
        assert_eq!(vec![0, 0, 0, 0], codes);
    }

    #[test]
    fn test_broadcast_tcp() {
        let codes = run_tcp(3, |transport| run(transport, 50, 64 * 1024));
        assert_eq!(vec![0, 0, 0], codes);
    }
}
