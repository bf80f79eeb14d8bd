//! Client-address hash selection.
//!
//! Maps a client key to `hash(key) % healthy.len()`. Stable while the size
//! of the healthy set is unchanged; any health flip reshuffles most clients.

use std::sync::Arc;

use crate::config::HashFunction;
use crate::load_balancer::{backend::Backend, SelectError, Selector};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1.
pub fn fnv1_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        hash.wrapping_mul(FNV_PRIME) ^ u32::from(b)
    })
}

/// 32-bit FNV-1a.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Hash-mod-count selector keyed on the client key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientHash {
    function: HashFunction,
}

impl ClientHash {
    pub fn new(function: HashFunction) -> Self {
        Self { function }
    }

    pub fn hash(&self, key: &str) -> u32 {
        match self.function {
            HashFunction::Fnv1 => fnv1_32(key.as_bytes()),
            HashFunction::Fnv1a => fnv1a_32(key.as_bytes()),
        }
    }
}

impl Selector for ClientHash {
    fn select(&self, client_key: &str, healthy: &[Arc<Backend>]) -> Result<Arc<Backend>, SelectError> {
        if healthy.is_empty() {
            return Err(SelectError::NoHealthyBackend);
        }

        let hash = self.hash(client_key);
        let index = hash as usize % healthy.len();
        tracing::trace!(client_key, hash, index, "Selected backend index");
        Ok(healthy[index].clone())
    }
}
