//! Persistence boundary for the gateway: a small key/value contract with
//! store-native expiry, plus the default in-process implementation.

mod kv;

pub use kv::{KeyValueStore, MemoryKv, StoreError};
