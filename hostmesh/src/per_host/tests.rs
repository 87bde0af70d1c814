// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

use super::*;
use crate::network::tests::run_hosts;
use crate::transport::LocalTransport;
use crate::{HostState, NetworkBuilder};

#[derive(Debug, PartialEq, Eq)]
enum Built {
    Local,
    Remote,
}

struct Graph {
    owner: HostId,
    name: String,
    edges: Vec<u64>,
    built: Built,
}

impl PerHostObject for Graph {
    fn from_local_init(_handle: PerHost<Self>, network: &Network) -> Self {
        Self {
            owner: network.id(),
            name: format!("graph-{}", network.id()),
            edges: vec![1, 2, 3],
            built: Built::Local,
        }
    }

    fn get_init_data(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        crate::serialize!(buf, self.name, self.edges)
    }

    fn from_remote_init(
        handle: PerHost<Self>,
        network: &Network,
        buf: &mut DeserializeBuffer,
    ) -> Result<Self, NetworkErr> {
        assert_ne!(did_host(handle.did()), network.id());
        Ok(Self {
            owner: network.id(),
            name: buf.read()?,
            edges: buf.read()?,
            built: Built::Remote,
        })
    }
}

struct Unregistered;

impl PerHostObject for Unregistered {
    fn from_local_init(_handle: PerHost<Self>, _network: &Network) -> Self {
        Self
    }

    fn get_init_data(&self, _buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        Ok(())
    }

    fn from_remote_init(
        _handle: PerHost<Self>,
        _network: &Network,
        _buf: &mut DeserializeBuffer,
    ) -> Result<Self, NetworkErr> {
        Ok(Self)
    }
}

#[test]
fn test_allocate_replicates_on_every_host() {
    const HOSTS: u32 = 3;

    let results = run_hosts(HOSTS, |transport| {
        let mut builder = NetworkBuilder::new();
        builder.register_per_host::<Graph>();
        // every host reports what its replica looked like once the handle
        // arrived, then acknowledges with a message of its own
        let report = builder.register_alt(|network, graph: PerHost<Graph>| {
            let replica = graph
                .local(network)
                .ok_or(NetworkErr::UnknownObject(graph.did()))?;
            assert_eq!(Built::Remote, replica.built);
            assert_eq!("graph-0", replica.name);
            assert_eq!(vec![1, 2, 3], replica.edges);
            assert_eq!(network.id(), replica.owner);
            Ok(())
        });
        let mut network = builder.build(transport).unwrap();

        if network.id() == 0 {
            let graph = PerHost::<Graph>::allocate(&mut network).unwrap();
            let local = graph.local(&network).unwrap();
            assert_eq!(Built::Local, local.built);
            assert_eq!(0, local.owner);
            // the barrier means every replica already exists
            network.broadcast_alt(report, graph).unwrap();
            network.terminate().unwrap();
            Some(graph.did())
        } else {
            network.start().unwrap();
            None
        }
    });
    assert_eq!(Some(0), results[0]);
}

#[test]
fn test_deallocate_destroys_everywhere() {
    let remaining = run_hosts(2, |transport| {
        let mut builder = NetworkBuilder::new();
        builder.register_per_host::<Graph>();
        let mut network = builder.build(transport).unwrap();

        if network.id() == 0 {
            let first = PerHost::<Graph>::allocate(&mut network).unwrap();
            let second = PerHost::<Graph>::allocate(&mut network).unwrap();
            assert_ne!(first, second);
            first.deallocate(&mut network).unwrap();
            assert!(first.local(&network).is_none());
            assert!(second.local(&network).is_some());
            assert!(matches!(
                first.deallocate(&mut network),
                Err(NetworkErr::UnknownObject(_))
            ));

            // ids are never reissued
            let third = PerHost::<Graph>::allocate(&mut network).unwrap();
            assert_ne!(first.did(), third.did());
            assert_ne!(second.did(), third.did());
            second.deallocate(&mut network).unwrap();
            third.deallocate(&mut network).unwrap();
            network.terminate().unwrap();
        } else {
            network.start().unwrap();
        }
        network.objects.len()
    });
    assert_eq!(vec![0, 0], remaining);
}

#[test]
fn test_any_host_may_allocate() {
    let dids = run_hosts(3, |transport| {
        let mut builder = NetworkBuilder::new();
        builder.register_per_host::<Graph>();
        let mut network = builder.build(transport).unwrap();
        let mine = PerHost::<Graph>::allocate(&mut network).unwrap();
        network.terminate().unwrap();

        // each host holds its own local instance plus a replica of the others'
        assert_eq!(3, network.objects.len());
        assert_eq!(Built::Local, mine.local(&network).unwrap().built);
        mine.did()
    });
    let hosts = dids.iter().map(|did| did_host(*did)).collect::<Vec<_>>();
    assert_eq!(vec![0, 1, 2], hosts);
}

#[test]
fn test_allocate_with_overrides_local_construction() {
    let mut builder = NetworkBuilder::new();
    builder.register_per_host::<Graph>();
    let mut network = builder.build(LocalTransport::mesh(1).remove(0)).unwrap();
    let graph = PerHost::<Graph>::allocate_with(&mut network, |_handle, network| Graph {
        owner: network.id(),
        name: "custom".to_string(),
        edges: vec![],
        built: Built::Local,
    })
    .unwrap();
    assert_eq!("custom", graph.local(&network).unwrap().name);

    graph.local_mut(&mut network).unwrap().edges.push(9);
    assert_eq!(vec![9], graph.local(&network).unwrap().edges);
}

#[test]
fn test_unregistered_type_is_rejected() {
    let mut network = NetworkBuilder::new()
        .build(LocalTransport::mesh(1).remove(0))
        .unwrap();
    assert!(matches!(
        PerHost::<Unregistered>::allocate(&mut network),
        Err(NetworkErr::UnregisteredType(_))
    ));
}

#[test]
fn test_allocate_after_terminate_is_rejected() {
    let mut builder = NetworkBuilder::new();
    builder.register_per_host::<Graph>();
    let mut network = builder.build(LocalTransport::mesh(1).remove(0)).unwrap();
    network.terminate().unwrap();
    assert!(matches!(
        PerHost::<Graph>::allocate(&mut network),
        Err(NetworkErr::InvalidState {
            operation: "allocate",
            state: HostState::Terminated
        })
    ));
}

#[test]
fn test_remote_refs_resolve_only_on_their_host() {
    let resolved = run_hosts(2, |transport| {
        let mut builder = NetworkBuilder::new();
        builder.register_per_host::<Graph>();
        let visit = builder.register_alt(|network, target: RemoteRef<Graph>| {
            let graph = target.resolve_mut(network)?;
            graph.edges.push(42);
            Ok(())
        });
        let mut network = builder.build(transport).unwrap();

        if network.id() == 0 {
            let graph = PerHost::<Graph>::allocate(&mut network).unwrap();
            let on_one = graph.remote(1);
            assert_eq!(format!("[1,{}]", graph.did()), on_one.to_string());
            assert!(matches!(
                on_one.resolve(&network),
                Err(NetworkErr::InvalidHost(1))
            ));
            assert_eq!(Built::Local, graph.remote(0).resolve(&network).unwrap().built);

            network.send_alt(1, visit, on_one).unwrap();
            network.terminate().unwrap();
            graph.local(&network).unwrap().edges.clone()
        } else {
            network.start().unwrap();
            let graph = PerHost::<Graph>::from_did(0);
            graph.local(&network).unwrap().edges.clone()
        }
    });
    assert_eq!(vec![1, 2, 3], resolved[0]);
    assert_eq!(vec![1, 2, 3, 42], resolved[1]);
}

#[test]
fn test_stale_remote_ref_reports_unknown_object() {
    let mut builder = NetworkBuilder::new();
    builder.register_per_host::<Graph>();
    let mut network = builder.build(LocalTransport::mesh(1).remove(0)).unwrap();
    let graph = PerHost::<Graph>::allocate(&mut network).unwrap();
    let remote = graph.remote(0);
    graph.deallocate(&mut network).unwrap();
    assert!(matches!(
        remote.resolve(&network),
        Err(NetworkErr::UnknownObject(did)) if did == graph.did()
    ));
}

#[test]
fn test_duplicate_construction_is_fatal() {
    let mut transports = LocalTransport::mesh(2);
    let mut builder = NetworkBuilder::new();
    builder.register_per_host::<Graph>();
    let mut network = builder.build(transports.remove(1)).unwrap();
    let mut rogue = transports.remove(0);

    // forge the same construction message twice
    let pad = network.per_host_pad(TypeId::of::<Graph>()).unwrap();
    let mut payload = SerializeBuffer::new();
    crate::serialize!(&mut payload, 7u64, "graph-0", vec![1u64]).unwrap();
    let frame = crate::network::frame::encode(pad, payload).unwrap();
    crate::transport::Transport::send(&mut rogue, 1, frame.clone()).unwrap();
    crate::transport::Transport::send(&mut rogue, 1, frame).unwrap();

    assert!(matches!(
        network.handle_receives(),
        Err(NetworkErr::DuplicateObject(7))
    ));
}

#[test]
fn test_handles_serialize_as_ids() {
    let handle = PerHost::<Graph>::from_did(0x0000_0002_0000_0005);
    assert_eq!(2, did_host(handle.did()));
    let remote = handle.remote(3);

    let mut buf = SerializeBuffer::new();
    crate::serialize!(&mut buf, handle, remote).unwrap();
    let mut reader = DeserializeBuffer::from(buf);
    assert_eq!(handle, reader.read::<PerHost<Graph>>().unwrap());
    let back = reader.read::<RemoteRef<Graph>>().unwrap();
    assert_eq!(remote, back);
    assert_eq!(handle, back.handle());
    assert_eq!(3, back.host());
}

#[test]
fn test_distributed_ids_are_not_reissued_after_the_last() {
    let mut table = PerHostTable::default();
    assert_eq!(0x0000_0003_0000_0000, table.next_did(3).unwrap());
    table.next_sequence = u64::from(u32::MAX);
    assert_eq!(0x0000_0003_FFFF_FFFF, table.next_did(3).unwrap());
    for _ in 0..2 {
        assert!(matches!(table.next_did(3), Err(NetworkErr::DidsExhausted(3))));
    }

    let mut builder = NetworkBuilder::new();
    builder.register_per_host::<Graph>();
    let mut network = builder.build(LocalTransport::mesh(1).remove(0)).unwrap();
    network.objects.next_sequence = u64::from(u32::MAX);
    let last = PerHost::<Graph>::allocate(&mut network).unwrap();
    assert_eq!(u64::from(u32::MAX), last.did());
    assert!(matches!(
        PerHost::<Graph>::allocate(&mut network),
        Err(NetworkErr::DidsExhausted(0))
    ));
    assert_eq!(1, network.objects.len());
    assert!(last.local(&network).is_some());
}

struct Counter {
    total: u64,
}

impl PerHostObject for Counter {
    fn from_local_init(_handle: PerHost<Self>, _network: &Network) -> Self {
        Self { total: 0 }
    }

    fn get_init_data(&self, _buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        Ok(())
    }

    fn from_remote_init(
        _handle: PerHost<Self>,
        _network: &Network,
        _buf: &mut DeserializeBuffer,
    ) -> Result<Self, NetworkErr> {
        Ok(Self { total: 0 })
    }
}

#[test]
fn test_handlers_mutate_host_state_through_local_mut() {
    let totals = run_hosts(2, |transport| {
        let mut builder = NetworkBuilder::new();
        builder.register_per_host::<Counter>();
        let add = builder.register_alt(|network, (handle, amount): (PerHost<Counter>, u64)| {
            let counter = handle
                .local_mut(network)
                .ok_or(NetworkErr::UnknownObject(handle.did()))?;
            counter.total += amount;
            Ok(())
        });
        let mut network = builder.build(transport).unwrap();

        let counter = if network.id() == 0 {
            let counter = PerHost::<Counter>::allocate(&mut network).unwrap();
            for amount in 1..=10u64 {
                network.send_alt(1, add, (counter, amount)).unwrap();
                network.send_alt(0, add, (counter, 2 * amount)).unwrap();
            }
            network.terminate().unwrap();
            counter
        } else {
            network.start().unwrap();
            PerHost::<Counter>::from_did(0)
        };
        counter.local(&network).unwrap().total
    });
    assert_eq!(vec![110, 55], totals);
}
