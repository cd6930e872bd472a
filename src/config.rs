// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

/// Configuration for an [`OffsetService`](crate::OffsetService).
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Upper bound on the wait for a single token's offset.
    ///
    /// `None` waits indefinitely. The upstream pipeline is expected to eventually announce an
    /// offset for every accepted token, so the unbounded wait is deliberate policy rather than
    /// an oversight. Configure a bound to surface "still waiting" to clients as a per-token
    /// timeout error instead.
    pub resolve_timeout: Option<Duration>,
}

impl Config {
    /// Returns a configuration which bounds every per-token wait by the given duration.
    pub fn with_resolve_timeout(timeout: Duration) -> Self {
        Self {
            resolve_timeout: Some(timeout),
        }
    }
}
