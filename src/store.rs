// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interface to the durable offset store and an in-memory implementation.
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{Offset, Token};

/// Durable key-value store mapping tokens to offsets.
///
/// The store is owned by an external collaborator; this subsystem only reads and writes through
/// this interface and never touches underlying storage directly. Implementations are assumed to
/// be internally safe for concurrent use, no additional locking is applied around them.
///
/// Written values are exposed to readers with eventual but not necessarily immediate
/// consistency.
pub trait OffsetStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the offset persisted for the given token, if any.
    fn find(
        &self,
        token: &Token,
    ) -> impl Future<Output = Result<Option<Offset>, Self::Error>> + Send;

    /// Persists the offset for the given token unless one is already present.
    fn put_if_absent(
        &self,
        token: &Token,
        offset: Offset,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Persists the offset for the given token, replacing any previous value.
    fn overwrite(
        &self,
        token: &Token,
        offset: Offset,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// An in-memory offset store.
///
/// This does not persist data permanently, all changes are lost when the process ends. Use this
/// only in development or test contexts.
#[derive(Clone, Debug, Default)]
pub struct MemoryOffsetStore {
    inner: Arc<RwLock<HashMap<Token, Offset>>>,
}

impl MemoryOffsetStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtain a read-lock on the store.
    fn read_store(&self) -> RwLockReadGuard<'_, HashMap<Token, Offset>> {
        self.inner
            .read()
            .expect("acquire shared read access on store")
    }

    /// Obtain a write-lock on the store.
    fn write_store(&self) -> RwLockWriteGuard<'_, HashMap<Token, Offset>> {
        self.inner
            .write()
            .expect("acquire exclusive write access on store")
    }
}

impl OffsetStore for MemoryOffsetStore {
    type Error = Infallible;

    async fn find(&self, token: &Token) -> Result<Option<Offset>, Self::Error> {
        Ok(self.read_store().get(token).copied())
    }

    async fn put_if_absent(&self, token: &Token, offset: Offset) -> Result<(), Self::Error> {
        self.write_store().entry(token.clone()).or_insert(offset);
        Ok(())
    }

    async fn overwrite(&self, token: &Token, offset: Offset) -> Result<(), Self::Error> {
        self.write_store().insert(token.clone(), offset);
        Ok(())
    }
}
