// SPDX-License-Identifier: MIT OR Apache-2.0

use std::pin::Pin;

use futures_util::future::BoxFuture;
use futures_util::ready;
use futures_util::stream::{Fuse, Stream, StreamExt};
use futures_util::task::{Context, Poll};
use pin_project::pin_project;
use ractor::ActorRef;
use ractor::rpc::CallResult;
use thiserror::Error;

use crate::actors::ToCoordinator;
use crate::{Token, TokenOffset};

/// An extension trait for `Stream`s that provides a convenient
/// [`announce_offsets`](AnnounceOffsetsExt::announce_offsets) method.
pub trait AnnounceOffsetsExt: Stream<Item = TokenOffset> {
    /// Announces every (token, offset) pair in the stream to the coordinator.
    ///
    /// Pairs must already be durably persisted by the caller before they are fed into this
    /// adapter. Waiters check the store and the announcement independently, so an unpersisted
    /// announcement can leave a later waiter reporting "not found" although a value exists.
    ///
    /// Each pair is acknowledged by the coordinator whether or not a waiter was found, and the
    /// acknowledgement is discarded. No result sequence is produced.
    fn announce_offsets(self, coordinator: ActorRef<ToCoordinator>) -> AnnounceOffsets<Self>
    where
        Self: Sized,
    {
        AnnounceOffsets::new(self, coordinator)
    }
}

impl<T: ?Sized> AnnounceOffsetsExt for T where T: Stream<Item = TokenOffset> {}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AnnounceError {
    /// The coordinator was unreachable or failed to acknowledge.
    #[error("offset coordination unavailable while announcing token {token}")]
    Coordinator { token: Token },
}

/// Future for the [`announce_offsets`](AnnounceOffsetsExt::announce_offsets) method.
///
/// Resolves once the input stream is exhausted and every pair has been acknowledged.
#[pin_project]
#[must_use = "futures do nothing unless polled"]
pub struct AnnounceOffsets<St>
where
    St: Stream<Item = TokenOffset>,
{
    #[pin]
    stream: Fuse<St>,
    coordinator: ActorRef<ToCoordinator>,
    in_flight: Option<BoxFuture<'static, Result<(), AnnounceError>>>,
}

impl<St> AnnounceOffsets<St>
where
    St: Stream<Item = TokenOffset>,
{
    pub(super) fn new(stream: St, coordinator: ActorRef<ToCoordinator>) -> Self {
        Self {
            stream: stream.fuse(),
            coordinator,
            in_flight: None,
        }
    }
}

impl<St> Future for AnnounceOffsets<St>
where
    St: Stream<Item = TokenOffset>,
{
    type Output = Result<(), AnnounceError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        loop {
            if let Some(fut) = this.in_flight.as_mut() {
                ready!(fut.as_mut().poll(cx))?;
                *this.in_flight = None;
            }

            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(pair) => {
                    *this.in_flight =
                        Some(Box::pin(announce_one(this.coordinator.clone(), pair)));
                }
                None => return Poll::Ready(Ok(())),
            }
        }
    }
}

/// Announces a single pair and awaits the coordinator's acknowledgement.
async fn announce_one(
    coordinator: ActorRef<ToCoordinator>,
    pair: TokenOffset,
) -> Result<(), AnnounceError> {
    let TokenOffset { token, offset } = pair;

    match coordinator
        .call(
            |ack| ToCoordinator::AnnounceOffset(token.clone(), offset, ack),
            None,
        )
        .await
    {
        Ok(CallResult::Success(())) => Ok(()),
        Ok(_) | Err(_) => Err(AnnounceError::Coordinator { token }),
    }
}
