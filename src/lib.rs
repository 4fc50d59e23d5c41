//! rcache - a clustered build-artifact cache.
//!
//! Build clients store and retrieve batches of output artifacts keyed by the
//! content hash of the build action that produced them. In cluster mode a
//! fixed number of nodes splits a consistent-hash ring: every batch stored on
//! a node is forwarded to one replica (best effort), and deletes fan out to
//! every member. The cluster size is fixed at seed time; there is no online
//! rehashing, so growing a cluster means restarting it with a new size.
//!
//! The cache is strictly best effort. A lost replica or an unreachable node
//! costs cache misses, never build correctness, which is why replication
//! failures are logged rather than surfaced to clients.
pub mod cache;
pub mod client;
pub mod cluster;
pub mod cmd;
pub mod error;
pub mod server;
pub mod store;
pub mod telemetry;
pub mod test_utils;
pub mod utils;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
