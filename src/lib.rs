// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg_attr(doctest, doc=include_str!("../README.md"))]

//! Token-to-offset coordination for data-access-governance pipelines.
//!
//! A client which opens a response channel knows only its opaque request token. The position in
//! the downstream log at which its approved resources begin is discovered asynchronously by the
//! upstream pipeline and persisted to a durable store. This crate bridges the two sides: a
//! getter asks for the offset of a token and is answered as soon as either the store or an
//! upstream announcement provides it, whichever comes first.
//!
//! Internally a single coordinator actor owns a registry of one-shot worker actors, one per
//! outstanding token lookup. A worker feeds its own store-read result back through the same
//! mailbox as externally announced offsets, so both information sources are serialized through
//! one single-consumer queue and the race between them is resolved without locks or shared
//! flags.
//!
//! The two public operations are stream adapters:
//! [`resolve_offsets`](ResolveOffsetsExt::resolve_offsets) processes a stream of tokens into a
//! stream of per-token results, strictly preserving input order, and
//! [`announce_offsets`](AnnounceOffsetsExt::announce_offsets) consumes a stream of
//! already-persisted (token, offset) pairs. [`OffsetService`] wraps both behind one handle.
pub mod actors;
mod config;
mod service;
mod store;
mod stream;
#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use service::{OffsetService, OffsetServiceError};
pub use store::{MemoryOffsetStore, OffsetStore};
pub use stream::{
    AnnounceError, AnnounceOffsets, AnnounceOffsetsExt, ResolveOffsets, ResolveOffsetsExt,
};

use thiserror::Error;

/// Opaque identifier correlating one client request across every pipeline stage.
///
/// Tokens are created upstream when a request is first accepted, live for the duration of one
/// client's resource stream and are never reused for a different request.
pub type Token = String;

/// Position in the downstream ordered log at which a client's resources begin.
///
/// An offset is set at most once per token and never changes once observed. Absence of an
/// offset is a valid state ("not yet known"), not an error.
pub type Offset = u64;

/// A resolved (token, offset) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenOffset {
    pub token: Token,
    pub offset: Offset,
}

impl TokenOffset {
    pub fn new(token: impl Into<Token>, offset: Offset) -> Self {
        Self {
            token: token.into(),
            offset,
        }
    }
}

/// Reasons a single token's offset could not be resolved.
///
/// Failures are always scoped to one token; a failed element never aborts its siblings in the
/// same batch.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The durable offset store failed while resolving this token.
    ///
    /// The store is not retried at this layer; callers wanting a retry re-issue the lookup.
    #[error("offset store failed for token {token}: {message}")]
    Store { token: Token, message: String },

    /// The coordinator went away or produced a reply which could not be delivered.
    ///
    /// This indicates a defect or a shutdown in progress, not an expected runtime condition.
    #[error("offset coordination unavailable for token {token}")]
    Coordinator { token: Token },

    /// A configured resolve timeout expired before the offset was announced.
    #[error("timed out waiting for the offset of token {token}")]
    Timeout { token: Token },
}
