//! Session persistence.
//!
//! This module provides:
//! - `Session`: reads credentials for each request and writes/clears them
//! - `KeyValueStore`: the storage capability the session lives in
//! - `FileStore`, `KeyringStore`, `MemoryStore`: storage backends
//!
//! Nothing here caches session state in memory; every read goes to storage.

pub mod credentials;
pub mod session;
pub mod store;

pub use credentials::KeyringStore;
pub use session::{Credentials, Session, SessionData};
pub use store::{FileStore, KeyValueStore, MemoryStore, StorageKey};
