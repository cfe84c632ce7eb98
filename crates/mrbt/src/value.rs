// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Value codec of the tree.
//!
//! Stored values are opaque to the engine; all it requires is a
//! deterministic byte encoding (same value, same bytes, across runs and
//! machines), which bcs provides for any serde type. A [`ValueObject`]
//! carries a value together with its canonical encoding so that leaf digests
//! and cross-tree comparisons work on the raw bytes.

use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;

/// Marker trait for values storable in the tree.
pub trait Value: Clone + Serialize + DeserializeOwned {}

impl<T: Clone + Serialize + DeserializeOwned> Value for T {}

/// A value together with its canonical byte encoding.
///
/// Equality and ordering are over the raw bytes, which is exactly the
/// equality the digests certify.
#[derive(Clone)]
pub(crate) struct ValueObject<V> {
    origin: V,
    raw: Vec<u8>,
}

impl<V: Value> ValueObject<V> {
    pub fn from_origin(origin: V) -> Result<Self> {
        let raw = bcs::to_bytes(&origin)?;
        Ok(Self { origin, raw })
    }
}

impl<V> ValueObject<V> {
    pub fn origin(&self) -> &V {
        &self.origin
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

impl<V> PartialEq for ValueObject<V> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<V> Eq for ValueObject<V> {}

impl<V> PartialOrd for ValueObject<V> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<V> Ord for ValueObject<V> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<V> fmt::Debug for ValueObject<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueObject(0x{})", hex::encode(&self.raw))
    }
}
