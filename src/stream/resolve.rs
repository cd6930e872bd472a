// SPDX-License-Identifier: MIT OR Apache-2.0

use std::pin::Pin;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::ready;
use futures_util::stream::{Fuse, FusedStream, Stream, StreamExt};
use futures_util::task::{Context, Poll};
use pin_project::pin_project;
use ractor::ActorRef;
use ractor::rpc::CallResult;

use crate::actors::{ToCoordinator, WorkerReply};
use crate::{ResolveError, Token, TokenOffset};

/// An extension trait for `Stream`s that provides a convenient
/// [`resolve_offsets`](ResolveOffsetsExt::resolve_offsets) method.
pub trait ResolveOffsetsExt: Stream<Item = Token> {
    /// Resolves every token in the stream to the log offset at which its resources begin.
    ///
    /// One result is produced per input token, in input order. Each token spawns a worker via
    /// the coordinator and the stream waits for that worker's single reply before touching the
    /// next token: an unresolved head element delays every later element. This strict ordering
    /// is the delivery contract of the downstream response channel, not an accident.
    ///
    /// With `timeout` set to `None` the per-token wait is unbounded; the upstream pipeline is
    /// trusted to announce every offset eventually.
    fn resolve_offsets(
        self,
        coordinator: ActorRef<ToCoordinator>,
        timeout: Option<Duration>,
    ) -> ResolveOffsets<Self>
    where
        Self: Sized,
    {
        ResolveOffsets::new(self, coordinator, timeout)
    }
}

impl<T: ?Sized> ResolveOffsetsExt for T where T: Stream<Item = Token> {}

/// Stream for the [`resolve_offsets`](ResolveOffsetsExt::resolve_offsets) method.
#[pin_project]
#[must_use = "streams do nothing unless polled"]
pub struct ResolveOffsets<St>
where
    St: Stream<Item = Token>,
{
    #[pin]
    stream: Fuse<St>,
    coordinator: ActorRef<ToCoordinator>,
    timeout: Option<Duration>,
    in_flight: Option<BoxFuture<'static, Result<TokenOffset, ResolveError>>>,
}

impl<St> ResolveOffsets<St>
where
    St: Stream<Item = Token>,
{
    pub(super) fn new(
        stream: St,
        coordinator: ActorRef<ToCoordinator>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            stream: stream.fuse(),
            coordinator,
            timeout,
            in_flight: None,
        }
    }
}

impl<St> Stream for ResolveOffsets<St>
where
    St: Stream<Item = Token>,
{
    type Item = Result<TokenOffset, ResolveError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(fut) = this.in_flight.as_mut() {
                let result = ready!(fut.as_mut().poll(cx));
                *this.in_flight = None;
                return Poll::Ready(Some(result));
            }

            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(token) => {
                    *this.in_flight = Some(Box::pin(resolve_one(
                        this.coordinator.clone(),
                        token,
                        *this.timeout,
                    )));
                }
                None => return Poll::Ready(None),
            }
        }
    }
}

impl<St> FusedStream for ResolveOffsets<St>
where
    St: Stream<Item = Token>,
{
    fn is_terminated(&self) -> bool {
        self.stream.is_terminated() && self.in_flight.is_none()
    }
}

/// Asks the coordinator to spawn a worker for the token and awaits its single reply.
async fn resolve_one(
    coordinator: ActorRef<ToCoordinator>,
    token: Token,
    timeout: Option<Duration>,
) -> Result<TokenOffset, ResolveError> {
    let reply = coordinator
        .call(
            |reply| ToCoordinator::SpawnWorker(token.clone(), reply),
            timeout,
        )
        .await;

    match reply {
        Ok(CallResult::Success(WorkerReply::Resolved(pair))) => Ok(pair),
        Ok(CallResult::Success(WorkerReply::Failed(err))) => Err(err),
        Ok(CallResult::Timeout) => Err(ResolveError::Timeout { token }),
        // A dropped reply port means the worker or the coordinator went away without
        // answering.
        Ok(CallResult::SenderError) | Err(_) => Err(ResolveError::Coordinator { token }),
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use futures_util::stream::iter;
    use ractor::Actor;

    use crate::TokenOffset;
    use crate::actors::Coordinator;
    use crate::store::{MemoryOffsetStore, OffsetStore};
    use crate::stream::AnnounceOffsetsExt;

    use super::ResolveOffsetsExt;

    #[tokio::test]
    async fn resolves_tokens_already_in_the_store() {
        let store = MemoryOffsetStore::new();
        store.overwrite(&"five".to_string(), 5).await.unwrap();

        let (coordinator, coordinator_handle) =
            Actor::spawn(None, Coordinator::default(), store).await.unwrap();

        let results: Vec<_> = iter(vec!["five".to_string()])
            .resolve_offsets(coordinator.clone(), None)
            .collect()
            .await;

        assert_eq!(results, vec![Ok(TokenOffset::new("five", 5))]);

        coordinator.stop(None);
        coordinator_handle.await.unwrap();
    }

    #[tokio::test]
    async fn preserves_input_order_across_late_announcements() {
        let store = MemoryOffsetStore::new();
        store.overwrite(&"five".to_string(), 5).await.unwrap();

        let (coordinator, coordinator_handle) =
            Actor::spawn(None, Coordinator::default(), store.clone())
                .await
                .unwrap();

        let tokens = vec!["five".to_string(), "six".to_string(), "seven".to_string()];
        let results = tokio::task::spawn(
            iter(tokens)
                .resolve_offsets(coordinator.clone(), None)
                .collect::<Vec<_>>(),
        );

        // Persist before announcing; waiters check the store and the announcement
        // independently.
        store.put_if_absent(&"seven".to_string(), 7).await.unwrap();
        store.put_if_absent(&"six".to_string(), 6).await.unwrap();
        iter(vec![TokenOffset::new("seven", 7), TokenOffset::new("six", 6)])
            .announce_offsets(coordinator.clone())
            .await
            .unwrap();

        // Results arrive in input order even though "seven" was announced before "six".
        assert_eq!(
            results.await.unwrap(),
            vec![
                Ok(TokenOffset::new("five", 5)),
                Ok(TokenOffset::new("six", 6)),
                Ok(TokenOffset::new("seven", 7)),
            ]
        );

        coordinator.stop(None);
        coordinator_handle.await.unwrap();
    }
}
