//! wbalance Library
//!
//! Weighted backend selection for reverse-proxy load balancers: given a
//! pool of backends tagged with static weights and liveness/load state,
//! pick one backend per request under one of four disciplines (simple
//! weighted round robin, smooth weighted round robin, sticky hashing,
//! smooth weighted least-connections).
//!
//! The engine consumes configuration snapshots and per-backend liveness
//! signals; it performs no I/O on the request path. This library can be
//! embedded in any proxy that supplies those inputs.

pub mod balance;
pub mod config;
pub mod error;
pub mod health;

pub use balance::{Algorithm, Backend, BackendRef, Balancer};
pub use config::{BackendConf, SubClusterSnapshot};
pub use error::{Error, Result};
