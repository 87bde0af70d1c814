// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! The landing-pad registry.
//!
//! A handler's identity is its index in the registry, assigned sequentially as
//! handlers are registered. Every host of an SPMD group runs the same program
//! and so registers the same handlers in the same order during startup, which
//! makes the index agree on every host without ever comparing code addresses.
//! The registry is frozen when the [crate::Network] is built and is read-only
//! from then on.

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;

use crate::serialization::{DeserializeBuffer, Serializable};
use crate::{Network, NetworkErr};

/// A landing pad's wire identity
pub type HandlerId = u32;

/// The signature every registered handler is erased to
pub(crate) type HandlerFn =
    dyn Fn(&mut Network, &mut DeserializeBuffer) -> Result<(), NetworkErr> + Send + Sync;

/// A buffer-based landing pad. The handler receives the message payload as a
/// [DeserializeBuffer] and reads values out of it in send order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LandingPad(pub(crate) HandlerId);

impl LandingPad {
    /// The pad's wire identity
    pub fn id(&self) -> HandlerId {
        self.0
    }
}

/// A fixed-arity landing pad. The handler receives its decoded arguments
/// directly; `A` is `()` or a tuple of [Serializable] values.
pub struct AltLandingPad<A> {
    pub(crate) id: HandlerId,
    _args: PhantomData<fn(A)>,
}

impl<A> AltLandingPad<A> {
    /// The pad's wire identity
    pub fn id(&self) -> HandlerId {
        self.id
    }
}

impl<A> Clone for AltLandingPad<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for AltLandingPad<A> {}

impl<A> std::fmt::Debug for AltLandingPad<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AltLandingPad")
            .field("id", &self.id)
            .field("args", &std::any::type_name::<A>())
            .finish()
    }
}

pub(crate) struct Handler {
    pub(crate) name: &'static str,
    pub(crate) call: Box<HandlerFn>,
}

/// The ordered table of every landing pad known to this host
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Handler>,
    per_host: HashMap<TypeId, HandlerId>,
}

impl HandlerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler has been registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// The diagnostic name of a handler, if it exists
    pub fn name(&self, id: HandlerId) -> Option<&'static str> {
        self.handlers.get(id as usize).map(|handler| handler.name)
    }

    pub(crate) fn get(&self, id: HandlerId) -> Option<&Handler> {
        self.handlers.get(id as usize)
    }

    pub(crate) fn push(&mut self, name: &'static str, call: Box<HandlerFn>) -> HandlerId {
        let id = self.handlers.len() as HandlerId;
        log::debug!("Registered landing pad {id} '{name}'");
        self.handlers.push(Handler { name, call });
        id
    }

    pub(crate) fn register<F>(&mut self, handler: F) -> LandingPad
    where
        F: Fn(&mut Network, &mut DeserializeBuffer) -> Result<(), NetworkErr>
            + Send
            + Sync
            + 'static,
    {
        LandingPad(self.push(std::any::type_name::<F>(), Box::new(handler)))
    }

    pub(crate) fn register_alt<A, F>(&mut self, handler: F) -> AltLandingPad<A>
    where
        A: Serializable + 'static,
        F: Fn(&mut Network, A) -> Result<(), NetworkErr> + Send + Sync + 'static,
    {
        let id = self.push(
            std::any::type_name::<F>(),
            Box::new(move |network, buf| {
                let args = buf.read::<A>()?;
                handler(network, args)
            }),
        );
        AltLandingPad {
            id,
            _args: PhantomData,
        }
    }

    pub(crate) fn set_per_host_pad(&mut self, ty: TypeId, id: HandlerId) {
        self.per_host.insert(ty, id);
    }

    pub(crate) fn per_host_pad(&self, ty: TypeId) -> Option<HandlerId> {
        self.per_host.get(&ty).copied()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|handler| handler.name))
            .finish()
    }
}
