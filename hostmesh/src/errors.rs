// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! Runtime error types

use std::fmt::Display;

use crate::per_host::Did;
use crate::{HandlerId, HostId, HostState};

/// Errors marshaling values into, or out of, a message buffer
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SerializationErr {
    /// A read asked for more bytes than remain in the buffer. This means the
    /// serialize and deserialize call shapes disagree, which is a programming
    /// defect rather than a recoverable condition
    Underrun {
        /// The number of bytes the read needed
        needed: usize,
        /// The number of bytes left in the buffer
        remaining: usize,
    },
    /// The buffer could not grow to hold the value being written
    Allocation(usize),
    /// The bytes were present but do not decode to the requested type
    InvalidData(&'static str),
}

impl std::error::Error for SerializationErr {}

impl Display for SerializationErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Underrun { needed, remaining } => {
                write!(
                    f,
                    "Buffer underrun reading {needed} bytes with only {remaining} remaining"
                )
            }
            Self::Allocation(size) => {
                write!(f, "Failed to grow the serialize buffer by {size} bytes")
            }
            Self::InvalidData(what) => {
                write!(f, "Invalid encoding for {what}")
            }
        }
    }
}

/// Errors raised by a [crate::transport::Transport] implementation
#[derive(Debug)]
pub enum TransportErr {
    /// The configured host count or host id disagree with the launched processes
    Topology(String),
    /// The destination host is not part of this mesh
    UnknownHost(HostId),
    /// The channel to the given host has been closed
    Closed(HostId),
    /// An underlying I/O failure
    Io(std::io::Error),
}

impl std::error::Error for TransportErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(inner) => Some(inner),
            _ => None,
        }
    }
}

impl Display for TransportErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Topology(reason) => write!(f, "Host topology mismatch: {reason}"),
            Self::UnknownHost(host) => write!(f, "Host {host} is not part of the mesh"),
            Self::Closed(host) => write!(f, "The channel to host {host} is closed"),
            Self::Io(err) => write!(f, "Transport I/O error '{err}'"),
        }
    }
}

impl From<std::io::Error> for TransportErr {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Errors from the active message engine and the per-host object manager.
///
/// Any error returned out of [crate::Network::handle_receives] (and the calls
/// which poll internally) is fatal for the host: the program images disagree or
/// the message stream is corrupt. The caller is expected to log it and exit.
#[derive(Debug)]
pub enum NetworkErr {
    /// Marshaling failure
    Serialization(SerializationErr),
    /// Transport failure
    Transport(TransportErr),
    /// A message arrived tagged with a handler id this host never registered
    UnknownHandler(HandlerId),
    /// A frame's header does not agree with its length
    MalformedFrame(String),
    /// The host id is outside of `[0, num_hosts)`
    InvalidHost(HostId),
    /// The operation is not allowed in the host's current lifecycle state
    InvalidState {
        /// The rejected operation
        operation: &'static str,
        /// The state the host was in
        state: HostState,
    },
    /// A per-host type was used without being registered on the builder
    UnregisteredType(&'static str),
    /// No live object with this distributed id exists on this host
    UnknownObject(Did),
    /// A construction message named a distributed id which is already live
    DuplicateObject(Did),
    /// This host has issued every distributed id it owns
    DidsExhausted(HostId),
}

impl std::error::Error for NetworkErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialization(inner) => Some(inner),
            Self::Transport(inner) => Some(inner),
            _ => None,
        }
    }
}

impl Display for NetworkErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(err) => {
                if f.alternate() {
                    write!(f, "Serialization failed '{err:#}'")
                } else {
                    write!(f, "Serialization failed '{err}'")
                }
            }
            Self::Transport(err) => {
                if f.alternate() {
                    write!(f, "Transport failed '{err:#}'")
                } else {
                    write!(f, "Transport failed '{err}'")
                }
            }
            Self::UnknownHandler(id) => {
                write!(
                    f,
                    "Received a message for unknown handler {id}, are all hosts running the same program?"
                )
            }
            Self::MalformedFrame(reason) => write!(f, "Malformed frame: {reason}"),
            Self::InvalidHost(host) => write!(f, "Host {host} is out of range"),
            Self::InvalidState { operation, state } => {
                write!(f, "Cannot {operation} while the host is {state:?}")
            }
            Self::UnregisteredType(name) => {
                write!(f, "Per-host type '{name}' was never registered")
            }
            Self::UnknownObject(did) => write!(f, "No live per-host object with id {did}"),
            Self::DuplicateObject(did) => {
                write!(f, "Per-host object {did} was constructed twice")
            }
            Self::DidsExhausted(host) => {
                write!(f, "Host {host} has no distributed ids left to allocate")
            }
        }
    }
}

impl From<SerializationErr> for NetworkErr {
    fn from(value: SerializationErr) -> Self {
        Self::Serialization(value)
    }
}

impl From<TransportErr> for NetworkErr {
    fn from(value: TransportErr) -> Self {
        Self::Transport(value)
    }
}
