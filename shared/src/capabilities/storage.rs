//! Persistent key-value storage for the auth session.
//!
//! Rides on `crux_kv`: the shell maps `KeyValueOperation` onto whatever the
//! platform offers (browser `localStorage`, mobile keychain/preferences).
//! Values are UTF-8 byte blobs; interpretation lives in [`crate::session`].

pub use crux_kv::{error::KeyValueError, KeyValueOperation, KeyValueResponse, KeyValueResult};

pub type Storage<Ev> = crux_kv::KeyValue<Ev>;
