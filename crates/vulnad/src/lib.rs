//! Vulna tool server library: CVE store, operation catalog and socket server.

pub mod catalog;
pub mod import;
pub mod server;
pub mod store;
