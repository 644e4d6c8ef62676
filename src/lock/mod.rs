//! Distributed lock over the shared backing store.

pub mod manager;
pub mod types;


pub use manager::LockManager;
pub use types::{LockHandle, LockOptions, LockOutcome};
