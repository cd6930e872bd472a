// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stream adapters bridging external token and offset sequences to the actor protocol.
mod announce;
mod resolve;

pub use announce::{AnnounceError, AnnounceOffsets, AnnounceOffsetsExt};
pub use resolve::{ResolveOffsets, ResolveOffsetsExt};
