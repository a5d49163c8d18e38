//! Ports of the proposal store.

mod outbound;

pub use outbound::{InMemoryKvStore, KeyValueStore, KvStoreError};
