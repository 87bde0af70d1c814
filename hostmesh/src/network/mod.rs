// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! The active message engine.
//!
//! A [Network] is the explicit runtime context of one host. It's constructed
//! once at process start by a [NetworkBuilder], which also owns the landing-pad
//! registration, and is passed by `&mut` to every landing pad it dispatches.
//! It's torn down by [Network::terminate].
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --start()--> Started --(peer terminates)--> Terminating --> Terminated
//!   \                                                  ^
//!    `----------------------terminate()---------------'
//! ```
//!
//! A host whose only role is to answer incoming messages calls
//! [Network::start], which serves until a peer initiates termination. A host
//! driving computation sends, polls [Network::handle_receives] as it goes, and
//! finally calls [Network::terminate].

use std::any::TypeId;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::per_host::{self, PerHostObject, PerHostTable};
use crate::registry::{AltLandingPad, HandlerId, HandlerRegistry, LandingPad};
use crate::serialization::{DeserializeBuffer, Serializable, SerializeBuffer};
use crate::transport::Transport;
use crate::{HostId, NetworkErr, TransportErr};

pub(crate) mod frame;
mod termination;

use termination::Termination;

/// Built-in landing pads, registered ahead of any user pad on every host
pub(crate) const TERMINATION_PAD: HandlerId = 0;
pub(crate) const CONSTRUCT_ACK_PAD: HandlerId = 1;
pub(crate) const DESTROY_PAD: HandlerId = 2;

/// A host's lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostState {
    /// Built, but neither started nor terminating
    Idle,
    /// Serving incoming messages inside [Network::start]
    Started,
    /// Inside the termination barrier
    Terminating,
    /// Every host crossed the termination barrier, the transport is closed
    Terminated,
}

/// Tunables for a host's [Network]
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// How long a blocking call ([Network::start], [Network::terminate],
    /// [crate::PerHost::allocate]) sleeps after a poll which dispatched
    /// nothing. Zero only yields the thread.
    pub idle_backoff: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            idle_backoff: Duration::from_micros(50),
        }
    }
}

/// Message counters for a single host
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NetworkStats {
    /// Frames handed to the transport or loopback, including control frames
    pub messages_sent: u64,
    /// Frames taken off the transport or loopback and dispatched
    pub messages_received: u64,
    /// Payload bytes sent
    pub bytes_sent: u64,
    /// Payload bytes received
    pub bytes_received: u64,
}

/// Registers landing pads and per-host types, then builds the [Network].
///
/// Registration order is the handler identity: every host must make the same
/// registration calls in the same order.
pub struct NetworkBuilder {
    registry: HandlerRegistry,
    config: NetworkConfig,
}

impl Default for NetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkBuilder {
    /// Create a builder holding only the built-in control pads
    pub fn new() -> Self {
        let mut registry = HandlerRegistry::new();
        let marker = registry.push("hostmesh::termination_marker", Box::new(termination::marker_pad));
        let ack = registry.push("hostmesh::construct_ack", Box::new(per_host::construct_ack_pad));
        let destroy = registry.push("hostmesh::destroy", Box::new(per_host::destroy_pad));
        debug_assert_eq!(
            (TERMINATION_PAD, CONSTRUCT_ACK_PAD, DESTROY_PAD),
            (marker, ack, destroy)
        );
        Self {
            registry,
            config: NetworkConfig::default(),
        }
    }

    /// Replace the default [NetworkConfig]
    pub fn with_config(mut self, config: NetworkConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a buffer-based landing pad.
    ///
    /// The frozen registry is shared with the dispatch loop, so handlers must
    /// be `Send + Sync`. Mutable state a handler keeps on its host belongs in a
    /// [crate::PerHost] object, reached without a lock through
    /// [crate::PerHost::local_mut] on the `&mut Network` the handler is given.
    pub fn register<F>(&mut self, handler: F) -> LandingPad
    where
        F: Fn(&mut Network, &mut DeserializeBuffer) -> Result<(), NetworkErr>
            + Send
            + Sync
            + 'static,
    {
        self.registry.register(handler)
    }

    /// Register a fixed-arity landing pad, whose arguments `A` (a tuple, or
    /// `()` for none) are decoded before the handler is invoked. Handler state
    /// follows the same rules as [NetworkBuilder::register].
    pub fn register_alt<A, F>(&mut self, handler: F) -> AltLandingPad<A>
    where
        A: Serializable + 'static,
        F: Fn(&mut Network, A) -> Result<(), NetworkErr> + Send + Sync + 'static,
    {
        self.registry.register_alt(handler)
    }

    /// Register a type which will be replicated with [crate::PerHost]. This
    /// registers the type's remote-construction landing pad.
    pub fn register_per_host<T: PerHostObject>(&mut self) -> &mut Self {
        let id = self.registry.push(
            std::any::type_name::<T>(),
            Box::new(per_host::construct_pad::<T>),
        );
        self.registry.set_per_host_pad(TypeId::of::<T>(), id);
        self
    }

    /// Freeze the registry and attach this host to the transport
    pub fn build<T: Transport + 'static>(self, transport: T) -> Result<Network, NetworkErr> {
        let host_id = transport.host_id();
        let num_hosts = transport.num_hosts();
        if num_hosts == 0 || host_id >= num_hosts {
            return Err(NetworkErr::Transport(TransportErr::Topology(format!(
                "host id {host_id} is not in a group of {num_hosts} hosts"
            ))));
        }
        log::info!(
            "Host {host_id} of {num_hosts} built with {} landing pads",
            self.registry.len()
        );
        Ok(Network {
            host_id,
            num_hosts,
            state: HostState::Idle,
            config: self.config,
            registry: Arc::new(self.registry),
            transport: Box::new(transport),
            loopback: VecDeque::new(),
            source: None,
            objects: PerHostTable::default(),
            termination: Termination::default(),
            stats: NetworkStats::default(),
        })
    }
}

/// One host's active message engine
pub struct Network {
    host_id: HostId,
    num_hosts: u32,
    state: HostState,
    config: NetworkConfig,
    registry: Arc<HandlerRegistry>,
    transport: Box<dyn Transport>,
    loopback: VecDeque<Bytes>,
    source: Option<HostId>,
    pub(crate) objects: PerHostTable,
    pub(crate) termination: Termination,
    stats: NetworkStats,
}

impl Network {
    /// This host's id
    pub fn id(&self) -> HostId {
        self.host_id
    }

    /// The number of hosts in the group
    pub fn num_hosts(&self) -> u32 {
        self.num_hosts
    }

    /// This host's lifecycle state
    pub fn state(&self) -> HostState {
        self.state
    }

    /// This host's message counters
    pub fn stats(&self) -> NetworkStats {
        self.stats
    }

    /// The frozen landing-pad registry
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// The host which sent the message currently being dispatched, when called
    /// from inside a landing pad
    pub fn message_source(&self) -> Option<HostId> {
        self.source
    }

    /// Enqueue `buf` for delivery to the `pad` landing pad on `host`. The buffer
    /// is consumed; the call doesn't wait for the transmission.
    pub fn send(&mut self, host: HostId, pad: LandingPad, buf: SerializeBuffer) -> Result<(), NetworkErr> {
        self.ensure_running("send")?;
        self.send_frame(host, frame::encode(pad.id(), buf)?, true)
    }

    /// Serialize `args` and enqueue them for the fixed-arity `pad` on `host`
    pub fn send_alt<A: Serializable>(
        &mut self,
        host: HostId,
        pad: AltLandingPad<A>,
        args: A,
    ) -> Result<(), NetworkErr> {
        self.ensure_running("send")?;
        let mut buf = SerializeBuffer::new();
        buf.write(&args)?;
        self.send_frame(host, frame::encode(pad.id(), buf)?, true)
    }

    /// Send an independent copy of `buf` to the `pad` landing pad of every host
    /// except this one. Hosts observe the broadcast at unsynchronized times.
    pub fn broadcast(&mut self, pad: LandingPad, buf: SerializeBuffer) -> Result<(), NetworkErr> {
        self.ensure_running("broadcast")?;
        self.broadcast_frame(frame::encode(pad.id(), buf)?, true)
    }

    /// Serialize `args` once and send them to the fixed-arity `pad` of every
    /// host except this one
    pub fn broadcast_alt<A: Serializable>(
        &mut self,
        pad: AltLandingPad<A>,
        args: A,
    ) -> Result<(), NetworkErr> {
        self.ensure_running("broadcast")?;
        let mut buf = SerializeBuffer::new();
        buf.write(&args)?;
        self.broadcast_frame(frame::encode(pad.id(), buf)?, true)
    }

    /// Dispatch every message which has arrived since the last call, in arrival
    /// order per sender, on the calling thread. Never blocks waiting for new
    /// messages.
    ///
    /// Returns the number of messages dispatched. An error is fatal for the
    /// host (see the crate documentation).
    pub fn handle_receives(&mut self) -> Result<usize, NetworkErr> {
        self.ensure_running("handle receives")?;
        let mut dispatched = 0;

        // only what was looped back before this call, so a pad which sends to
        // its own host can't spin here forever
        let pending_local = self.loopback.len();
        for _ in 0..pending_local {
            if let Some(frame) = self.loopback.pop_front() {
                self.dispatch(self.host_id, frame)?;
                dispatched += 1;
            }
        }

        while let Some((source, frame)) = self.transport.try_recv()? {
            self.dispatch(source, frame)?;
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// Serve incoming messages until another host initiates termination, then
    /// take part in the termination barrier. When this returns `Ok` the host
    /// is [HostState::Terminated].
    ///
    /// In a group of one there is nobody to initiate termination, so the host
    /// is left [HostState::Started] and this returns immediately.
    pub fn start(&mut self) -> Result<(), NetworkErr> {
        if self.state != HostState::Idle {
            return Err(NetworkErr::InvalidState {
                operation: "start",
                state: self.state,
            });
        }
        self.state = HostState::Started;
        log::info!("Host {} started", self.host_id);
        if self.num_hosts == 1 {
            return Ok(());
        }

        self.poll_until(|network| {
            network.termination.requested() || network.state != HostState::Started
        })?;
        if self.state == HostState::Terminated {
            // a landing pad already ran the barrier
            return Ok(());
        }
        log::info!("Host {} received a termination request", self.host_id);
        self.terminate()
    }

    /// Signal termination, then block until every host has called `terminate`
    /// (or been drawn in from [Network::start]) and no message is left in
    /// flight or undispatched anywhere in the group. Afterwards the transport
    /// is shut down and sending is no longer valid.
    pub fn terminate(&mut self) -> Result<(), NetworkErr> {
        if matches!(self.state, HostState::Terminating | HostState::Terminated) {
            return Err(NetworkErr::InvalidState {
                operation: "terminate",
                state: self.state,
            });
        }
        self.state = HostState::Terminating;
        log::info!("Host {} terminating", self.host_id);

        let mut round = 0u32;
        loop {
            // a host was active in a round if it sent anything since its
            // previous marker. Round 0 is always active so at least one full
            // round follows the signal.
            let active = self.termination.take_activity() || round == 0;
            let mut marker = SerializeBuffer::new();
            marker.write(&(round, active))?;
            self.broadcast_frame(frame::encode(TERMINATION_PAD, marker)?, false)?;

            let peers = self.num_hosts - 1;
            self.poll_until(|network| network.termination.markers(round) >= peers)?;
            let any_active = self.termination.finish_round(round) || active;
            log::debug!(
                "Host {} finished termination round {round} (active = {any_active})",
                self.host_id
            );
            if !any_active {
                break;
            }
            round += 1;
        }

        self.transport.shutdown()?;
        self.state = HostState::Terminated;
        log::info!(
            "Host {} terminated after {} rounds ({} messages sent, {} received)",
            self.host_id,
            round + 1,
            self.stats.messages_sent,
            self.stats.messages_received
        );
        Ok(())
    }

    /// Poll [Network::handle_receives] until `done` holds, backing off while
    /// nothing arrives. Polls at least once, so anything looped back before the
    /// call is dispatched even when `done` already holds.
    pub(crate) fn poll_until<F>(&mut self, done: F) -> Result<(), NetworkErr>
    where
        F: Fn(&Network) -> bool,
    {
        loop {
            let dispatched = self.handle_receives()?;
            if done(self) {
                return Ok(());
            }
            if dispatched == 0 {
                self.idle();
            }
        }
    }

    pub(crate) fn ensure_running(&self, operation: &'static str) -> Result<(), NetworkErr> {
        if self.state == HostState::Terminated {
            Err(NetworkErr::InvalidState {
                operation,
                state: self.state,
            })
        } else {
            Ok(())
        }
    }

    pub(crate) fn per_host_pad(&self, ty: TypeId) -> Option<HandlerId> {
        self.registry.per_host_pad(ty)
    }

    /// Send a control message to a built-in or per-host pad
    pub(crate) fn send_control(
        &mut self,
        host: HostId,
        pad: HandlerId,
        buf: SerializeBuffer,
    ) -> Result<(), NetworkErr> {
        self.send_frame(host, frame::encode(pad, buf)?, true)
    }

    /// Broadcast a control message to a built-in or per-host pad
    pub(crate) fn broadcast_control(
        &mut self,
        pad: HandlerId,
        buf: SerializeBuffer,
    ) -> Result<(), NetworkErr> {
        self.broadcast_frame(frame::encode(pad, buf)?, true)
    }

    fn broadcast_frame(&mut self, frame: Bytes, activity: bool) -> Result<(), NetworkErr> {
        let me = self.host_id;
        for host in (0..self.num_hosts).filter(|host| *host != me) {
            // `Bytes` clones share the frozen frame, every destination gets its own handle
            self.send_frame(host, frame.clone(), activity)?;
        }
        Ok(())
    }

    fn send_frame(&mut self, host: HostId, frame: Bytes, activity: bool) -> Result<(), NetworkErr> {
        if host >= self.num_hosts {
            return Err(NetworkErr::InvalidHost(host));
        }
        if activity {
            self.termination.note_activity();
        }
        self.stats.messages_sent += 1;
        self.stats.bytes_sent += (frame.len() - frame::HEADER_LEN) as u64;

        if host == self.host_id {
            self.loopback.push_back(frame);
        } else {
            self.transport.send(host, frame)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, source: HostId, frame: Bytes) -> Result<(), NetworkErr> {
        let (id, payload) = frame::decode(frame)?;
        let registry = self.registry.clone();
        let handler = registry.get(id).ok_or_else(|| {
            log::error!(
                "Host {} received a message for unknown landing pad {id} from host {source}",
                self.host_id
            );
            NetworkErr::UnknownHandler(id)
        })?;

        self.stats.messages_received += 1;
        self.stats.bytes_received += payload.len() as u64;
        log::trace!(
            "Host {} dispatching '{}' ({id}) from host {source}, {} bytes",
            self.host_id,
            handler.name,
            payload.len()
        );

        let mut buf = DeserializeBuffer::new(payload);
        let outer_source = self.source.replace(source);
        let result = (handler.call)(self, &mut buf);
        self.source = outer_source;

        if let Err(err) = result {
            log::error!(
                "Landing pad '{}' ({id}) failed on host {} for a message from host {source}: {err}",
                handler.name,
                self.host_id
            );
            return Err(err);
        }
        if !buf.is_empty() {
            log::warn!(
                "Landing pad '{}' ({id}) left {} bytes unread",
                handler.name,
                buf.remaining()
            );
        }
        Ok(())
    }

    fn idle(&self) {
        if self.config.idle_backoff.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(self.config.idle_backoff);
        }
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("host_id", &self.host_id)
            .field("num_hosts", &self.num_hosts)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .field("objects", &self.objects.len())
            .finish()
    }
}
