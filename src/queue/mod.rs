//! Wait queues for matchmaking
//!
//! Players join a named mode queue and are released strictly oldest-first
//! by the matcher.

pub mod store;

pub use store::WaitQueueStore;
