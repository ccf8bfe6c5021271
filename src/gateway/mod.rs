//! Domain gateways: thin per-resource callers of the RPC client.
//! Each function shapes backend method names and params for one capability
//! and adds no retry or error handling of its own; the shared error/retry
//! contract lives in [`crate::rpc`].

pub mod dashboards;
pub mod groups;
pub mod hosts;
pub mod users;
