//! Counter storage backends.
//!
//! All admission state lives behind the [`CounterStore`] trait: a Redis
//! backend for shared deployments and an in-memory backend for
//! single-instance use and tests.

mod backend;
mod memory;
mod redis;

pub use self::backend::{CounterStore, StoreError, StoreValue};
pub use self::memory::MemoryStore;
pub use self::redis::{RedisStore, RedisStoreConfig};
