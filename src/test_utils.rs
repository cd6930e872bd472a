// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::store::{MemoryOffsetStore, OffsetStore};
use crate::{Offset, Token};

/// Store wrapper which fails `find` for a configured set of tokens.
#[derive(Clone, Debug, Default)]
pub struct FaultyOffsetStore {
    inner: MemoryOffsetStore,
    failing: Arc<RwLock<HashSet<Token>>>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("offset store unavailable for token {0}")]
pub struct FaultyStoreError(pub Token);

impl FaultyOffsetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `find` for the given token fail.
    pub fn fail_for(&self, token: &str) {
        self.failing
            .write()
            .expect("acquire exclusive write access on fault set")
            .insert(token.to_string());
    }
}

impl OffsetStore for FaultyOffsetStore {
    type Error = FaultyStoreError;

    async fn find(&self, token: &Token) -> Result<Option<Offset>, Self::Error> {
        let failing = self
            .failing
            .read()
            .expect("acquire shared read access on fault set")
            .contains(token);
        if failing {
            return Err(FaultyStoreError(token.clone()));
        }
        Ok(self.inner.find(token).await.unwrap())
    }

    async fn put_if_absent(&self, token: &Token, offset: Offset) -> Result<(), Self::Error> {
        self.inner.put_if_absent(token, offset).await.unwrap();
        Ok(())
    }

    async fn overwrite(&self, token: &Token, offset: Offset) -> Result<(), Self::Error> {
        self.inner.overwrite(token, offset).await.unwrap();
        Ok(())
    }
}
