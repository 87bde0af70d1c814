// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! A TCP session with one peer host.
//!
//! Every object sent over a session, handshake or engine frame, is written as
//! two parts: exactly 8 bytes holding the object's length (a big-endian
//! `u64`), followed by the object. This tells the reader how much data to read
//! off the wire.
//!
//! Once the handshake is done the socket is split. A [SessionWriter] drains
//! the host's outbound queue for that peer and a [SessionReader] forwards
//! every complete frame into the host's shared inbound queue.

use bytes::Bytes;
use hostmesh::HostId;
use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ErrorKind};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::ClusterErr;

/// Helper method to read exactly `len` bytes from the stream into a pre-allocated buffer
/// of bytes
pub(crate) async fn read_n_bytes<R>(stream: &mut R, len: usize) -> Result<Vec<u8>, tokio::io::Error>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    let mut c_len = 0;
    while c_len < len {
        let n = stream.read(&mut buf[c_len..]).await?;
        if n == 0 {
            // EOF
            return Err(tokio::io::Error::new(
                tokio::io::ErrorKind::UnexpectedEof,
                "EOF",
            ));
        }
        c_len += n;
    }
    Ok(buf)
}

/// Read one length-prefixed object off the stream
pub(crate) async fn read_object<R>(stream: &mut R) -> Result<Bytes, tokio::io::Error>
where
    R: AsyncRead + Unpin,
{
    let length = stream.read_u64().await?;
    log::trace!("Payload length message ({length}) received");
    let len = usize::try_from(length).map_err(|_| {
        tokio::io::Error::new(
            ErrorKind::InvalidData,
            format!("object length {length} does not fit in memory"),
        )
    })?;
    let buf = read_n_bytes(stream, len).await?;
    Ok(Bytes::from(buf))
}

/// Write one length-prefixed object to the stream and flush it
pub(crate) async fn write_object<W>(stream: &mut W, object: &[u8]) -> Result<(), tokio::io::Error>
where
    W: AsyncWrite + Unpin,
{
    stream.write_u64(object.len() as u64).await?;
    stream.write_all(object).await?;
    stream.flush().await
}

/// Read one length-prefixed protobuf message off the stream
pub(crate) async fn read_message<M, R>(stream: &mut R) -> Result<M, ClusterErr>
where
    M: Message + Default,
    R: AsyncRead + Unpin,
{
    let bytes = read_object(stream).await?;
    Ok(M::decode(bytes)?)
}

/// Write one length-prefixed protobuf message to the stream
pub(crate) async fn write_message<M, W>(stream: &mut W, message: &M) -> Result<(), ClusterErr>
where
    M: Message,
    W: AsyncWrite + Unpin,
{
    write_object(stream, &message.encode_to_vec()).await?;
    Ok(())
}

// ========================= Session writer ========================= //

/// Writes every frame queued for one peer, in queue order
pub(crate) struct SessionWriter {
    pub(crate) peer: HostId,
    pub(crate) stream: OwnedWriteHalf,
    pub(crate) outbound: UnboundedReceiver<Bytes>,
}

impl SessionWriter {
    /// Run until the outbound queue is closed and drained, then close the
    /// write side of the socket
    pub(crate) async fn run(mut self) {
        while let Some(frame) = self.outbound.recv().await {
            log::trace!("Writing frame (len={}) to host {}", frame.len(), self.peer);
            if let Err(write_err) = write_object(&mut self.stream, &frame).await {
                log::warn!(
                    "Error writing to the stream for host {} '{write_err}'",
                    self.peer
                );
                return;
            }
        }
        if let Err(err) = self.stream.shutdown().await {
            log::debug!("Error closing the stream to host {} '{err}'", self.peer);
        }
        log::debug!("TCP Session writer for host {} closed", self.peer);
    }
}

// ========================= Session reader ========================= //

/// Forwards every frame received from one peer to the host's inbound queue
pub(crate) struct SessionReader {
    pub(crate) peer: HostId,
    pub(crate) stream: OwnedReadHalf,
    pub(crate) inbound: UnboundedSender<(HostId, Bytes)>,
}

impl SessionReader {
    /// Run until the peer closes the connection or the host stops listening
    pub(crate) async fn run(mut self) {
        loop {
            match read_object(&mut self.stream).await {
                Ok(frame) => {
                    log::trace!("Payload of length({}) received from host {}", frame.len(), self.peer);
                    if self.inbound.send((self.peer, frame)).is_err() {
                        // the host dropped its transport
                        return;
                    }
                }
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                    log::debug!("TCP Session reader for host {} reached EOF", self.peer);
                    return;
                }
                Err(err) => {
                    log::warn!("Error reading from host {} '{err}'", self.peer);
                    return;
                }
            }
        }
    }
}
