// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! Cluster error types

use std::fmt::Display;

use hostmesh::{HostId, TransportErr};

/// Errors establishing or running the TCP mesh
#[derive(Debug)]
pub enum ClusterErr {
    /// The transport configuration is incomplete or malformed
    Config(String),
    /// A peer disagrees about the group's shape, or connected twice
    Topology(String),
    /// A peer could not be reached before the connect timeout
    Timeout(HostId),
    /// A handshake message failed to decode
    Decode(prost::DecodeError),
    /// A socket failure
    Io(std::io::Error),
}

impl std::error::Error for ClusterErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(inner) => Some(inner),
            Self::Io(inner) => Some(inner),
            _ => None,
        }
    }
}

impl Display for ClusterErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(reason) => write!(f, "Invalid transport configuration: {reason}"),
            Self::Topology(reason) => write!(f, "Host topology mismatch: {reason}"),
            Self::Timeout(host) => write!(f, "Timed out connecting to host {host}"),
            Self::Decode(err) => write!(f, "Failed to decode handshake '{err}'"),
            Self::Io(err) => write!(f, "Socket error '{err}'"),
        }
    }
}

impl From<std::io::Error> for ClusterErr {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<prost::DecodeError> for ClusterErr {
    fn from(value: prost::DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<ClusterErr> for TransportErr {
    fn from(value: ClusterErr) -> Self {
        match value {
            ClusterErr::Io(err) => TransportErr::Io(err),
            other => TransportErr::Topology(other.to_string()),
        }
    }
}
