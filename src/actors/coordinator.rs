// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coordinator actor owning the token → waiter registry.
use std::collections::HashMap;
use std::marker::PhantomData;

use ractor::{
    Actor, ActorId, ActorProcessingErr, ActorRef, RpcReplyPort, SupervisionEvent,
};
use tracing::{trace, warn};

use crate::store::OffsetStore;
use crate::{Offset, Token};

use super::worker::{ToWorker, Worker, WorkerReply};

pub enum ToCoordinator {
    /// Spawn a worker which resolves the offset for the given token and delivers the single
    /// result to the reply port.
    SpawnWorker(Token, RpcReplyPort<WorkerReply>),

    /// An already-persisted offset became known for the given token; forward it to every
    /// registered waiter. The acknowledgement is sent whether or not a waiter was found,
    /// absence of a waiter is not an error.
    AnnounceOffset(Token, Offset, RpcReplyPort<()>),
}


pub struct CoordinatorState<S> {
    store: S,

    /// Live workers per token.
    ///
    /// Announcements fan out to every registered waiter, so concurrent requests for the same
    /// token all resolve from a single announcement instead of the newest waiter shadowing the
    /// older ones.
    registry: HashMap<Token, Vec<ActorRef<ToWorker>>>,
}

/// Long-lived actor which is the single authority for "is anyone waiting on this token".
///
/// The registry is in-memory only and lives for the lifetime of the process; it is rebuilt
/// implicitly as new requests arrive. Workers are spawned linked so the coordinator learns
/// through supervision when one terminates and can drop its registration.
pub struct Coordinator<S> {
    _marker: PhantomData<S>,
}

impl<S> Default for Coordinator<S> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<S> Actor for Coordinator<S>
where
    S: OffsetStore + Clone + Send + Sync + 'static,
{
    type State = CoordinatorState<S>;
    type Msg = ToCoordinator;
    type Arguments = S;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        store: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        Ok(CoordinatorState {
            store,
            registry: HashMap::new(),
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ToCoordinator::SpawnWorker(token, reply) => {
                let (worker, _) = Actor::spawn_linked(
                    None,
                    Worker::default(),
                    state.store.clone(),
                    myself.clone().into(),
                )
                .await?;

                worker.send_message(ToWorker::GetOffset(token.clone(), reply))?;

                trace!(%token, worker_id = %worker.get_id(), "registered waiter");
                state.registry.entry(token).or_default().push(worker);
            }
            ToCoordinator::AnnounceOffset(token, offset, ack) => {
                match state.registry.get(&token) {
                    Some(workers) => {
                        for worker in workers {
                            // The worker may have resolved and stopped before its termination
                            // notice reached us; a failed forward is not an error.
                            if worker
                                .send_message(ToWorker::SetOffset(token.clone(), offset))
                                .is_err()
                            {
                                trace!(%token, worker_id = %worker.get_id(), "waiter already gone");
                            }
                        }
                    }
                    None => {
                        // Nobody asked for this token (yet). The value is already persisted,
                        // so a later worker will pick it up from the store.
                        trace!(%token, offset, "no waiter registered");
                    }
                }

                if !ack.is_closed() {
                    let _ = ack.send(());
                }
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(actor_cell, _, _) => {
                trace!(worker_id = %actor_cell.get_id(), "worker terminated");
                deregister(state, actor_cell.get_id());
            }
            SupervisionEvent::ActorFailed(actor_cell, err) => {
                // A failed worker drops its reply port, which the original caller observes as
                // a coordination error.
                warn!(worker_id = %actor_cell.get_id(), "worker failed: {err}");
                deregister(state, actor_cell.get_id());
            }
            _ => (),
        }

        Ok(())
    }
}

/// Removes every registry entry naming the given worker.
fn deregister<S>(state: &mut CoordinatorState<S>, id: ActorId) {
    state.registry.retain(|_, workers| {
        workers.retain(|worker| worker.get_id() != id);
        !workers.is_empty()
    });
}
