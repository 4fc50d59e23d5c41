//! Commands used for cluster administration. Never issued by build clients,
//! only by other rcache nodes.
pub mod cluster_state;
pub mod heartbeat;
pub mod join;
