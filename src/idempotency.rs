// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Deterministic idempotency key derivation.
//!
//! The server de-duplicates replays of the same logical write by key, so the
//! key must be a pure function of `(mutation_key, variables)`: identical inputs
//! always produce the identical key, across retries, process restarts, and
//! replays from the durable outbox.

use sha2::{Digest, Sha256};

use crate::record::MutationKey;

/// Client-generated token letting the server recognize and discard duplicate
/// executions of a logically identical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Derive the key for one logical write.
    ///
    /// Each key segment is length-prefixed before hashing so that segment
    /// boundaries are unambiguous (`["ab", "c"]` must not collide with
    /// `["a", "bc"]`), then the raw payload bytes are appended.
    #[must_use]
    pub fn derive(mutation_key: &MutationKey, variables: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        for segment in mutation_key.segments() {
            hasher.update((segment.len() as u64).to_le_bytes());
            hasher.update(segment.as_bytes());
        }
        hasher.update((variables.len() as u64).to_le_bytes());
        hasher.update(variables);
        Self(hex::encode(hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
