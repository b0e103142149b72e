//! Weighted backend selection.
//!
//! Four disciplines over one pool of weighted backends:
//! - simple weighted round robin (bursty within a cycle)
//! - smooth weighted round robin (maximally interleaved)
//! - sticky hashing for session affinity
//! - smooth weighted least-connections
//!
//! Concurrency model: the pool lives behind a single mutex and every
//! `select` and `update` runs as one critical section, so selectors never
//! observe a half-applied snapshot. Connection accounting happens through
//! atomics on the shared backend records, off the pool lock.

pub mod backend;
mod pool;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub use backend::{Backend, BackendRef};

use crate::config::BackendConf;
use crate::error::{Error, Result};
use pool::BackendPool;

/// Selection discipline identifiers.
///
/// The numeric mapping is part of the wire contract shared with peer
/// processes and must not change across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum Algorithm {
    /// Weighted round robin, bursty within a cycle.
    WrrSimple = 0,
    /// Smooth weighted round robin.
    WrrSmooth = 1,
    /// Hash-of-key session stickiness.
    Sticky = 2,
    /// Smooth weighted least connections.
    WlcSmooth = 3,
}

impl Algorithm {
    /// Stable wire id of this discipline.
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Resolve a wire id.
    pub fn from_id(id: u16) -> Result<Self> {
        match id {
            0 => Ok(Self::WrrSimple),
            1 => Ok(Self::WrrSmooth),
            2 => Ok(Self::Sticky),
            3 => Ok(Self::WlcSmooth),
            other => Err(Error::UnknownAlgorithm(other)),
        }
    }
}

impl TryFrom<u16> for Algorithm {
    type Error = Error;

    fn try_from(id: u16) -> Result<Self> {
        Self::from_id(id)
    }
}

/// Thread-safe selection engine over one backend pool.
///
/// Request workers call [`Balancer::select`] and report connection
/// acquisition/release on the returned [`BackendRef`]; the configuration
/// watcher calls [`Balancer::update`]; the health layer flips liveness via
/// [`Balancer::set_avail`]. All three may run concurrently.
pub struct Balancer {
    pool: Mutex<BackendPool>,
}

impl Balancer {
    /// Build a balancer from an initial snapshot.
    pub fn new(snapshot: &[BackendConf]) -> Result<Self> {
        Ok(Self {
            pool: Mutex::new(BackendPool::new(snapshot)?),
        })
    }

    /// Pick one available backend under the given discipline.
    ///
    /// The key is consulted by [`Algorithm::Sticky`] only and must be
    /// non-empty there; the other disciplines ignore it.
    pub fn select(&self, algorithm: Algorithm, key: &[u8]) -> Result<BackendRef> {
        self.pool.lock().select(algorithm, key)
    }

    /// Pick by wire id.
    pub fn select_by_id(&self, algo_id: u16, key: &[u8]) -> Result<BackendRef> {
        self.select(Algorithm::from_id(algo_id)?, key)
    }

    /// Apply a full reconfiguration snapshot.
    pub fn update(&self, snapshot: &[BackendConf]) -> Result<()> {
        self.pool.lock().update(snapshot)
    }

    /// Flip a backend's liveness by name.
    ///
    /// Returns false when the name is not in the pool.
    pub fn set_avail(&self, name: &str, avail: bool) -> bool {
        self.pool.lock().set_avail(name, avail)
    }

    /// Look up a backend handle by name.
    pub fn backend(&self, name: &str) -> Option<BackendRef> {
        self.pool.lock().backend(name)
    }

    /// Handles to every backend currently in the pool.
    pub fn backends(&self) -> Vec<BackendRef> {
        self.pool.lock().backends()
    }

    pub fn len(&self) -> usize {
        self.pool.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
