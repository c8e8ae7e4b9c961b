//! Decoded chain records as handed over by the node RPC layer.
//!
//! The node client returns these parsed structures together with the raw
//! payload bytes; the block store keeps the raw bytes and the runner decodes
//! them back on the way to the indexers.

mod common;
mod contract;
mod exchange;
mod platform;

pub use common::*;
pub use contract::*;
pub use exchange::*;
pub use platform::*;
