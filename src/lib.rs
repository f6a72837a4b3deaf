//! Kalah Game Protocol server (workspace facade crate).
//!
//! The implementation lives in dedicated crates under `crates/`; this
//! package re-exports them as `kgp_server::{core,engine,proto,store,types}`
//! and hosts the binary.

pub mod tracing_init;

pub use kgp_core as core;
pub use kgp_engine as engine;
pub use kgp_proto as proto;
pub use kgp_store as store;
pub use kgp_types as types;
