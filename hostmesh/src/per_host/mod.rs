// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! Per-host replicated objects.
//!
//! A [PerHost] handle names an object which has exactly one instance on every
//! host of the group. Handles are plain arena indices ([Did]s) into each host's
//! object table, so they can be copied freely and embedded in messages. They
//! never carry a pointer across a host boundary.
//!
//! ## Construction and destruction
//!
//! [PerHost::allocate] builds the allocating host's instance with
//! [PerHostObject::from_local_init], asks it for its initialization payload
//! with [PerHostObject::get_init_data] and broadcasts that payload. Every
//! other host builds its own instance with [PerHostObject::from_remote_init]
//! and acknowledges. `allocate` returns once every host has acknowledged, so
//! the handle is usable anywhere in the group from then on.
//!
//! [PerHost::deallocate] broadcasts a destruction message and drops the local
//! instance. Distributed ids are qualified by the allocating host and never
//! reissued, so a stale handle resolves to nothing rather than to a newer
//! object.
//!
//! ## Example
//!
//! ```rust
//! use hostmesh::transport::LocalTransport;
//! use hostmesh::{
//!     DeserializeBuffer, Network, NetworkBuilder, NetworkErr, PerHost, PerHostObject,
//!     SerializationErr, SerializeBuffer,
//! };
//!
//! struct Tally {
//!     origin: u32,
//! }
//!
//! impl PerHostObject for Tally {
//!     fn from_local_init(_handle: PerHost<Self>, network: &Network) -> Self {
//!         Self { origin: network.id() }
//!     }
//!
//!     fn get_init_data(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
//!         buf.write(&self.origin)
//!     }
//!
//!     fn from_remote_init(
//!         _handle: PerHost<Self>,
//!         _network: &Network,
//!         buf: &mut DeserializeBuffer,
//!     ) -> Result<Self, NetworkErr> {
//!         Ok(Self { origin: buf.read()? })
//!     }
//! }
//!
//! let threads = LocalTransport::mesh(2).into_iter().map(|transport| {
//!     std::thread::spawn(move || {
//!         let mut builder = NetworkBuilder::new();
//!         builder.register_per_host::<Tally>();
//!         let mut network = builder.build(transport).unwrap();
//!         if network.id() == 0 {
//!             let tally = PerHost::<Tally>::allocate(&mut network).unwrap();
//!             assert_eq!(Some(0), tally.local(&network).map(|t| t.origin));
//!             tally.deallocate(&mut network).unwrap();
//!             network.terminate().unwrap();
//!         } else {
//!             network.start().unwrap();
//!         }
//!     })
//! }).collect::<Vec<_>>();
//! for thread in threads {
//!     thread.join().unwrap();
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Display;
use std::marker::PhantomData;

use crate::network::{CONSTRUCT_ACK_PAD, DESTROY_PAD};
use crate::serialization::{DeserializeBuffer, Serializable, SerializeBuffer};
use crate::{HostId, Network, NetworkErr, SerializationErr};

#[cfg(test)]
mod tests;

/// A distributed id: the index of a per-host object in every host's object
/// table. The upper 32 bits hold the allocating host, the lower 32 bits that
/// host's allocation sequence number.
pub type Did = u64;

fn did_host(did: Did) -> HostId {
    (did >> 32) as HostId
}

/// The construction capabilities of a type which can be replicated with
/// [PerHost]. The object manager picks which constructor runs: the allocating
/// host uses [PerHostObject::from_local_init], every other host
/// [PerHostObject::from_remote_init] over the allocator's init data.
pub trait PerHostObject: Sized + Send + 'static {
    /// Build the allocating host's instance from locally available state
    fn from_local_init(handle: PerHost<Self>, network: &Network) -> Self;

    /// Write the payload the other hosts will construct their replicas from
    fn get_init_data(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr>;

    /// Build a replica from the allocating host's init data
    fn from_remote_init(
        handle: PerHost<Self>,
        network: &Network,
        buf: &mut DeserializeBuffer,
    ) -> Result<Self, NetworkErr>;
}

/// This host's table of live per-host objects
#[derive(Default)]
pub(crate) struct PerHostTable {
    objects: HashMap<Did, Box<dyn Any + Send>>,
    // wider than a sequence number so the last one can still be issued
    next_sequence: u64,
    acks: HashMap<Did, u32>,
}

impl PerHostTable {
    fn next_did(&mut self, host: HostId) -> Result<Did, NetworkErr> {
        let sequence =
            u32::try_from(self.next_sequence).map_err(|_| NetworkErr::DidsExhausted(host))?;
        self.next_sequence += 1;
        Ok(((host as Did) << 32) | sequence as Did)
    }

    fn insert<T: Send + 'static>(&mut self, did: Did, value: T) -> Result<(), NetworkErr> {
        if self.objects.contains_key(&did) {
            return Err(NetworkErr::DuplicateObject(did));
        }
        self.objects.insert(did, Box::new(value));
        Ok(())
    }

    fn remove(&mut self, did: Did) -> bool {
        self.acks.remove(&did);
        self.objects.remove(&did).is_some()
    }

    fn get<T: 'static>(&self, did: Did) -> Option<&T> {
        self.objects.get(&did)?.downcast_ref()
    }

    fn get_mut<T: 'static>(&mut self, did: Did) -> Option<&mut T> {
        self.objects.get_mut(&did)?.downcast_mut()
    }

    fn acks(&self, did: Did) -> u32 {
        self.acks.get(&did).copied().unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.len()
    }
}

/// A handle to an object replicated once per host
pub struct PerHost<T> {
    did: Did,
    _ty: PhantomData<fn() -> T>,
}

impl<T> PerHost<T> {
    /// Rebuild a handle from its distributed id
    pub fn from_did(did: Did) -> Self {
        Self {
            did,
            _ty: PhantomData,
        }
    }

    /// The handle's distributed id
    pub fn did(&self) -> Did {
        self.did
    }

    /// A reference to `host`'s instance, which can be sent in a message and
    /// resolved on that host
    pub fn remote(&self, host: HostId) -> RemoteRef<T> {
        RemoteRef {
            host,
            did: self.did,
            _ty: PhantomData,
        }
    }
}

impl<T: PerHostObject> PerHost<T> {
    /// Construct a new object on every host, blocking until every host has
    /// built its replica
    pub fn allocate(network: &mut Network) -> Result<Self, NetworkErr> {
        Self::allocate_with(network, |handle, network| T::from_local_init(handle, network))
    }

    /// Like [PerHost::allocate], but the allocating host's instance is built by
    /// `init` instead of [PerHostObject::from_local_init]
    pub fn allocate_with<F>(network: &mut Network, init: F) -> Result<Self, NetworkErr>
    where
        F: FnOnce(PerHost<T>, &Network) -> T,
    {
        network.ensure_running("allocate")?;
        let pad = network
            .per_host_pad(TypeId::of::<T>())
            .ok_or(NetworkErr::UnregisteredType(std::any::type_name::<T>()))?;

        let host = network.id();
        let handle = Self::from_did(network.objects.next_did(host)?);
        let value = init(handle, network);

        let mut buf = SerializeBuffer::new();
        buf.write(&handle.did)?;
        value.get_init_data(&mut buf)?;
        network.objects.insert(handle.did, value)?;

        let peers = network.num_hosts() - 1;
        if peers > 0 {
            network.broadcast_control(pad, buf)?;
            network.poll_until(|network| network.objects.acks(handle.did) >= peers)?;
            network.objects.acks.remove(&handle.did);
        }
        log::debug!(
            "Host {host} allocated {} as {}",
            std::any::type_name::<T>(),
            handle.did
        );
        Ok(handle)
    }

    /// Destroy the object on every host. The local instance is dropped right
    /// away, the other hosts drop theirs when they next dispatch.
    pub fn deallocate(self, network: &mut Network) -> Result<(), NetworkErr> {
        network.ensure_running("deallocate")?;
        if network.objects.get::<T>(self.did).is_none() {
            return Err(NetworkErr::UnknownObject(self.did));
        }
        let mut buf = SerializeBuffer::new();
        buf.write(&self.did)?;
        network.broadcast_control(DESTROY_PAD, buf)?;
        network.objects.remove(self.did);
        log::debug!("Host {} deallocated {}", network.id(), self.did);
        Ok(())
    }

    /// This host's instance, or `None` if it was never constructed here or has
    /// been destroyed
    pub fn local<'a>(&self, network: &'a Network) -> Option<&'a T> {
        network.objects.get(self.did)
    }

    /// This host's instance, mutably. Handlers mutate host-local state through
    /// this rather than through locks captured at registration, since only the
    /// host's own thread ever holds its `&mut Network`.
    pub fn local_mut<'a>(&self, network: &'a mut Network) -> Option<&'a mut T> {
        network.objects.get_mut(self.did)
    }
}

impl<T> Clone for PerHost<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PerHost<T> {}

impl<T> PartialEq for PerHost<T> {
    fn eq(&self, other: &Self) -> bool {
        self.did == other.did
    }
}

impl<T> Eq for PerHost<T> {}

impl<T> std::hash::Hash for PerHost<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.did.hash(state);
    }
}

impl<T> std::fmt::Debug for PerHost<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerHost")
            .field("did", &self.did)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Serializable for PerHost<T> {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        buf.write(&self.did)
    }

    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        Ok(Self::from_did(buf.read()?))
    }
}

/// A host-qualified reference to one replica of a [PerHost] object. It only
/// resolves on the host it names.
pub struct RemoteRef<T> {
    host: HostId,
    did: Did,
    _ty: PhantomData<fn() -> T>,
}

impl<T> RemoteRef<T> {
    /// The host holding the referenced replica
    pub fn host(&self) -> HostId {
        self.host
    }

    /// The referenced object's distributed id
    pub fn did(&self) -> Did {
        self.did
    }

    /// The handle naming the object on every host
    pub fn handle(&self) -> PerHost<T> {
        PerHost::from_did(self.did)
    }
}

impl<T: PerHostObject> RemoteRef<T> {
    /// The referenced replica. Fails on any host other than the named one.
    pub fn resolve<'a>(&self, network: &'a Network) -> Result<&'a T, NetworkErr> {
        if network.id() != self.host {
            return Err(NetworkErr::InvalidHost(self.host));
        }
        network
            .objects
            .get(self.did)
            .ok_or(NetworkErr::UnknownObject(self.did))
    }

    /// The referenced replica, mutably
    pub fn resolve_mut<'a>(&self, network: &'a mut Network) -> Result<&'a mut T, NetworkErr> {
        if network.id() != self.host {
            return Err(NetworkErr::InvalidHost(self.host));
        }
        network
            .objects
            .get_mut(self.did)
            .ok_or(NetworkErr::UnknownObject(self.did))
    }
}

impl<T> Clone for RemoteRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RemoteRef<T> {}

impl<T> PartialEq for RemoteRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.did == other.did
    }
}

impl<T> Eq for RemoteRef<T> {}

impl<T> std::fmt::Debug for RemoteRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRef")
            .field("host", &self.host)
            .field("did", &self.did)
            .finish()
    }
}

impl<T> Display for RemoteRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.host, self.did)
    }
}

impl<T> Serializable for RemoteRef<T> {
    fn serialize(&self, buf: &mut SerializeBuffer) -> Result<(), SerializationErr> {
        buf.write(&self.host)?;
        buf.write(&self.did)
    }

    fn deserialize(buf: &mut DeserializeBuffer) -> Result<Self, SerializationErr> {
        let host = buf.read()?;
        let did = buf.read()?;
        Ok(Self {
            host,
            did,
            _ty: PhantomData,
        })
    }
}

// ============== Control landing pads ============== //

/// Builds this host's replica of a `T` and acknowledges to the allocator
pub(crate) fn construct_pad<T: PerHostObject>(
    network: &mut Network,
    buf: &mut DeserializeBuffer,
) -> Result<(), NetworkErr> {
    let did = buf.read::<Did>()?;
    let value = T::from_remote_init(PerHost::from_did(did), network, buf)?;
    network.objects.insert(did, value)?;
    log::trace!(
        "Host {} constructed {} as {did}",
        network.id(),
        std::any::type_name::<T>()
    );

    let mut ack = SerializeBuffer::new();
    ack.write(&did)?;
    network.send_control(did_host(did), CONSTRUCT_ACK_PAD, ack)
}

pub(crate) fn construct_ack_pad(
    network: &mut Network,
    buf: &mut DeserializeBuffer,
) -> Result<(), NetworkErr> {
    let did = buf.read::<Did>()?;
    *network.objects.acks.entry(did).or_default() += 1;
    Ok(())
}

pub(crate) fn destroy_pad(network: &mut Network, buf: &mut DeserializeBuffer) -> Result<(), NetworkErr> {
    let did = buf.read::<Did>()?;
    if !network.objects.remove(did) {
        return Err(NetworkErr::UnknownObject(did));
    }
    log::trace!("Host {} destroyed {did}", network.id());
    Ok(())
}
