// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot worker actor resolving a single token's offset.
use std::marker::PhantomData;

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tracing::{trace, warn};

use crate::store::OffsetStore;
use crate::{Offset, ResolveError, Token, TokenOffset};

pub enum ToWorker {
    /// Resolve the offset for the given token and deliver the single result to the reply port.
    GetOffset(Token, RpcReplyPort<WorkerReply>),

    /// An offset became known for the given token.
    SetOffset(Token, Offset),
}


/// The one reply a worker delivers before terminating.
#[derive(Debug)]
pub enum WorkerReply {
    Resolved(TokenOffset),
    Failed(ResolveError),
}

pub struct WorkerState<S> {
    store: S,
    token: Option<Token>,
    reply: Option<RpcReplyPort<WorkerReply>>,
}

/// Short-lived actor which resolves exactly one offset-or-error and then stops itself.
///
/// The worker consults two independent information sources: the durable store and offsets
/// announced by the upstream pipeline. A store hit is re-delivered through the worker's own
/// mailbox so that both sources compete through the same single-consumer queue; whichever
/// `SetOffset` arrives first wins and the worker replies exactly once, never zero times, never
/// twice.
pub struct Worker<S> {
    _marker: PhantomData<S>,
}

impl<S> Default for Worker<S> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<S> Actor for Worker<S>
where
    S: OffsetStore + Send + Sync + 'static,
{
    type State = WorkerState<S>;
    type Msg = ToWorker;
    type Arguments = S;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        store: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        Ok(WorkerState {
            store,
            token: None,
            reply: None,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ToWorker::GetOffset(token, reply) => {
                state.token = Some(token.clone());
                state.reply = Some(reply);

                match state.store.find(&token).await {
                    Ok(Some(offset)) => {
                        trace!(%token, offset, "offset already persisted");

                        // Deliver the stored value through our own mailbox so it competes
                        // fairly with announcements forwarded by the coordinator.
                        myself.send_message(ToWorker::SetOffset(token, offset))?;
                    }
                    Ok(None) => {
                        trace!(%token, "offset not yet persisted, waiting for announcement");
                    }
                    Err(err) => {
                        // A store fault is not retried at this layer; report it and stop.
                        if let Some(reply) = state.reply.take() {
                            if !reply.is_closed() {
                                let _ = reply.send(WorkerReply::Failed(ResolveError::Store {
                                    token,
                                    message: err.to_string(),
                                }));
                            }
                        }
                        myself.stop(None);
                    }
                }
            }
            ToWorker::SetOffset(token, offset) => {
                if state.token.as_ref() != Some(&token) {
                    warn!(%token, offset, "ignoring offset for foreign token");
                    return Ok(());
                }

                if let Some(reply) = state.reply.take() {
                    if !reply.is_closed() {
                        let _ = reply.send(WorkerReply::Resolved(TokenOffset { token, offset }));
                    }
                    myself.stop(None);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use ractor::Actor;
    use ractor::rpc::CallResult;
    use tokio::time::sleep;
    use tracing_test::traced_test;

    use crate::store::{MemoryOffsetStore, OffsetStore};
    use crate::test_utils::FaultyOffsetStore;
    use crate::{ResolveError, TokenOffset};

    use super::{ToWorker, Worker, WorkerReply};

    #[tokio::test]
    async fn replies_with_the_stored_offset() {
        let store = MemoryOffsetStore::new();
        store.overwrite(&"five".to_string(), 5).await.unwrap();

        let (worker, worker_handle) = Actor::spawn(None, Worker::default(), store).await.unwrap();

        let reply = worker
            .call(
                |reply| ToWorker::GetOffset("five".to_string(), reply),
                Some(Duration::from_secs(1)),
            )
            .await
            .unwrap();

        assert_matches!(
            reply,
            CallResult::Success(WorkerReply::Resolved(TokenOffset { token, offset }))
                if token == "five" && offset == 5
        );

        // The worker stops itself after its single reply.
        worker_handle.await.unwrap();
    }

    #[tokio::test]
    async fn reports_a_store_fault_and_stops() {
        let store = FaultyOffsetStore::new();
        store.fail_for("six");

        let (worker, worker_handle) = Actor::spawn(None, Worker::default(), store).await.unwrap();

        let reply = worker
            .call(
                |reply| ToWorker::GetOffset("six".to_string(), reply),
                Some(Duration::from_secs(1)),
            )
            .await
            .unwrap();

        assert_matches!(
            reply,
            CallResult::Success(WorkerReply::Failed(ResolveError::Store { token, .. }))
                if token == "six"
        );

        worker_handle.await.unwrap();
    }

    #[tokio::test]
    #[traced_test]
    async fn ignores_offsets_for_foreign_tokens() {
        let store = MemoryOffsetStore::new();

        let (worker, worker_handle) = Actor::spawn(None, Worker::default(), store).await.unwrap();

        let pending = tokio::task::spawn({
            let worker = worker.clone();
            async move {
                worker
                    .call(|reply| ToWorker::GetOffset("own".to_string(), reply), None)
                    .await
            }
        });

        // Allow the worker to finish its store read and start waiting.
        sleep(Duration::from_millis(50)).await;

        worker
            .cast(ToWorker::SetOffset("other".to_string(), 9))
            .unwrap();
        sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        worker
            .cast(ToWorker::SetOffset("own".to_string(), 4))
            .unwrap();

        let reply = pending.await.unwrap().unwrap();
        assert_matches!(
            reply,
            CallResult::Success(WorkerReply::Resolved(TokenOffset { token, offset }))
                if token == "own" && offset == 4
        );

        assert!(logs_contain("ignoring offset for foreign token"));

        worker_handle.await.unwrap();
    }
}
