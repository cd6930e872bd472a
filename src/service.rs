// SPDX-License-Identifier: MIT OR Apache-2.0

use futures_util::stream::Stream;
use ractor::errors::SpawnErr;
use ractor::{Actor, ActorRef};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::actors::{Coordinator, ToCoordinator};
use crate::store::OffsetStore;
use crate::stream::{AnnounceOffsets, AnnounceOffsetsExt, ResolveOffsets, ResolveOffsetsExt};
use crate::{Config, Token, TokenOffset};

/// Handle to a running token-to-offset coordination service.
///
/// Spawning the service starts the coordinator actor which owns the registry of in-flight
/// token lookups. The handle is the public boundary of the subsystem: downstream response
/// channels resolve tokens through [`get_offsets`](OffsetService::get_offsets) while the
/// upstream log reader announces persisted pairs through
/// [`announce_offsets`](OffsetService::announce_offsets).
#[derive(Debug)]
pub struct OffsetService {
    config: Config,
    coordinator: ActorRef<ToCoordinator>,
    coordinator_handle: JoinHandle<()>,
}

impl OffsetService {
    /// Spawns the coordinator actor over the given durable offset store.
    ///
    /// The coordinator is spawned anonymously so multiple services can coexist within one
    /// process.
    pub async fn spawn<S>(store: S, config: Config) -> Result<Self, OffsetServiceError>
    where
        S: OffsetStore + Clone + Send + Sync + 'static,
    {
        let (coordinator, coordinator_handle) =
            Actor::spawn(None, Coordinator::default(), store).await?;

        Ok(Self {
            config,
            coordinator,
            coordinator_handle,
        })
    }

    /// Returns a reference to the coordinator actor.
    ///
    /// Useful for composing [`ResolveOffsetsExt`] or [`AnnounceOffsetsExt`] directly onto an
    /// existing stream pipeline.
    pub fn coordinator(&self) -> ActorRef<ToCoordinator> {
        self.coordinator.clone()
    }

    /// Resolves a stream of tokens into a stream of per-token results, in input order.
    pub fn get_offsets<St>(&self, tokens: St) -> ResolveOffsets<St>
    where
        St: Stream<Item = Token>,
    {
        tokens.resolve_offsets(self.coordinator.clone(), self.config.resolve_timeout)
    }

    /// Announces a stream of already-persisted (token, offset) pairs to in-flight waiters.
    pub fn announce_offsets<St>(&self, pairs: St) -> AnnounceOffsets<St>
    where
        St: Stream<Item = TokenOffset>,
    {
        pairs.announce_offsets(self.coordinator.clone())
    }

    /// Stops the coordinator, tearing down any still-waiting workers, and waits for it to
    /// wind down.
    pub async fn shutdown(self) -> Result<(), OffsetServiceError> {
        self.coordinator.stop(None);
        self.coordinator_handle.await?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum OffsetServiceError {
    #[error(transparent)]
    ActorSpawnError(#[from] SpawnErr),

    #[error("coordinator task failed during shutdown")]
    Shutdown(#[from] tokio::task::JoinError),
}
