//! Durable persisted-flag storage.

pub mod json_file_store;

pub use json_file_store::JsonFileFlagStore;
