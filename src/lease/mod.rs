//! Scraping-account leases shared between worker processes.

pub mod pool;
pub mod store;

pub use pool::{AccountLeasePool, Lease};
pub use store::{Account, AccountRow, LeaseStore, LeaseTransaction, MemoryLeaseStore};
