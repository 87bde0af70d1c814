// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! The active message wire shape: `[handler-id][payload-length][payload-bytes]`
//!
//! The handler id is a big-endian `u32` and the payload length a big-endian
//! `u64`. Since every host runs the same build, these widths are not
//! negotiated.

use bytes::Bytes;

use crate::serialization::SerializeBuffer;
use crate::{HandlerId, NetworkErr, SerializationErr};

/// The number of header bytes ahead of a frame's payload
pub(crate) const HEADER_LEN: usize = std::mem::size_of::<HandlerId>() + std::mem::size_of::<u64>();

/// Tag a payload with the handler which must process it on arrival. The
/// payload's buffer becomes the frame, so a failure to grow it by the header
/// is reported to the sender.
pub(crate) fn encode(
    handler: HandlerId,
    payload: SerializeBuffer,
) -> Result<Bytes, SerializationErr> {
    let mut header = [0u8; HEADER_LEN];
    header[..4].copy_from_slice(&handler.to_be_bytes());
    header[4..].copy_from_slice(&(payload.len() as u64).to_be_bytes());
    payload.freeze_with_header(&header)
}

/// Split a received frame into its handler id and payload
pub(crate) fn decode(mut frame: Bytes) -> Result<(HandlerId, Bytes), NetworkErr> {
    if frame.len() < HEADER_LEN {
        return Err(NetworkErr::MalformedFrame(format!(
            "frame of {} bytes is shorter than the {HEADER_LEN} byte header",
            frame.len()
        )));
    }
    let header = frame.split_to(HEADER_LEN);
    let mut id_bytes = [0u8; 4];
    id_bytes.copy_from_slice(&header[..4]);
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&header[4..]);

    let handler = HandlerId::from_be_bytes(id_bytes);
    let len = u64::from_be_bytes(len_bytes);
    if len != frame.len() as u64 {
        return Err(NetworkErr::MalformedFrame(format!(
            "handler {handler} frame claims {len} payload bytes but carries {}",
            frame.len()
        )));
    }
    Ok((handler, frame))
}
