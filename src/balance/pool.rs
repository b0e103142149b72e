//! Backend pool and the weighted selection algorithms.
//!
//! A pool is an ordered collection of weighted backends for one
//! sub-cluster. Selection picks among the currently-available entries
//! only; reconfiguration replaces membership in place while preserving
//! the connection counters of surviving backends.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use xxhash_rust::xxh32::xxh32;

use crate::balance::backend::{Backend, BackendRef};
use crate::balance::Algorithm;
use crate::config::{self, BackendConf};
use crate::error::{Error, Result};

/// Pairs a backend record with its configured weight and the mutable
/// scheduling state of the round-robin disciplines.
#[derive(Debug)]
struct WeightedBackend {
    weight: i64,
    current: i64,
    backend: BackendRef,
}

impl WeightedBackend {
    fn new(conf: &BackendConf) -> Self {
        let weight = i64::from(conf.weight);
        Self {
            weight,
            current: weight,
            backend: Arc::new(Backend::new(conf)),
        }
    }

    /// Apply a snapshot weight. Scheduling state restarts from the new
    /// weight; accumulated smoothing does not survive a reconfigure.
    fn update_weight(&mut self, weight: i32) {
        self.weight = i64::from(weight);
        self.current = self.weight;
    }
}

/// Ordered collection of weighted backends for one sub-cluster.
///
/// `sorted` tracks whether the entries are currently in ascending name
/// order; sticky selection sorts lazily and sets it, reconfiguration
/// clears it.
pub(crate) struct BackendPool {
    entries: Vec<WeightedBackend>,
    sorted: bool,
}

impl BackendPool {
    pub(crate) fn new(snapshot: &[BackendConf]) -> Result<Self> {
        config::validate_snapshot(snapshot)?;
        Ok(Self {
            entries: snapshot.iter().map(WeightedBackend::new).collect(),
            sorted: false,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn backend(&self, name: &str) -> Option<BackendRef> {
        self.entries
            .iter()
            .find(|e| e.backend.name() == name)
            .map(|e| e.backend.clone())
    }

    pub(crate) fn backends(&self) -> Vec<BackendRef> {
        self.entries.iter().map(|e| e.backend.clone()).collect()
    }

    pub(crate) fn set_avail(&self, name: &str, avail: bool) -> bool {
        match self.backend(name) {
            Some(backend) => {
                backend.set_avail(avail);
                true
            }
            None => false,
        }
    }

    pub(crate) fn select(&mut self, algorithm: Algorithm, key: &[u8]) -> Result<BackendRef> {
        match algorithm {
            Algorithm::WrrSimple => self.simple_balance(),
            Algorithm::WrrSmooth => self.smooth_balance(),
            Algorithm::Sticky => self.sticky_balance(key),
            Algorithm::WlcSmooth => self.least_conns_balance(),
        }
    }

    /// Classic weighted round robin.
    ///
    /// Each backend is picked `weight` times per cycle. Within a cycle the
    /// entry with the largest remaining share (`current / weight`) wins,
    /// compared in integers by cross-multiplication; ties keep the earlier
    /// entry. Once every available entry has exhausted its share, available
    /// entries restart at full weight and the scan runs once more.
    fn simple_balance(&mut self) -> Result<BackendRef> {
        for refilled in [false, true] {
            let mut best: Option<usize> = None;
            for (i, cand) in self.entries.iter().enumerate() {
                if !cand.backend.avail() || cand.current <= 0 {
                    continue;
                }
                best = match best {
                    None => Some(i),
                    Some(b) => {
                        let held = &self.entries[b];
                        if cand.current * held.weight > held.current * cand.weight {
                            Some(i)
                        } else {
                            Some(b)
                        }
                    }
                };
            }
            if let Some(i) = best {
                let entry = &mut self.entries[i];
                entry.current -= 1;
                return Ok(entry.backend.clone());
            }
            if refilled {
                break;
            }
            for entry in &mut self.entries {
                if entry.backend.avail() {
                    entry.current = entry.weight;
                }
            }
        }
        Err(Error::NoAvailableBackend)
    }

    /// Smooth weighted round robin.
    ///
    /// Same long-run frequencies as [`Self::simple_balance`] but picks are
    /// interleaved instead of bursting. The available entry with the
    /// highest `current` wins (ties keep the earlier entry); afterwards
    /// every available entry gains its weight and the winner pays back the
    /// available weight sum. Unavailable entries are skipped in both steps
    /// and resume later with their stored `current` unchanged.
    fn smooth_balance(&mut self) -> Result<BackendRef> {
        let mut best: Option<usize> = None;
        let mut total = 0i64;
        for (i, cand) in self.entries.iter().enumerate() {
            if !cand.backend.avail() {
                continue;
            }
            total += cand.weight;
            if best.map_or(true, |b| cand.current > self.entries[b].current) {
                best = Some(i);
            }
        }
        let Some(i) = best else {
            return Err(Error::NoAvailableBackend);
        };
        for entry in &mut self.entries {
            if entry.backend.avail() {
                entry.current += entry.weight;
            }
        }
        let entry = &mut self.entries[i];
        entry.current -= total;
        Ok(entry.backend.clone())
    }

    /// Smooth weighted least-connections.
    ///
    /// Round-robin smoothing over load-adjusted weights
    /// `weight * (cmax + 1 - conn_num)`, where `cmax` is the highest
    /// connection count among available entries, so lightly loaded
    /// backends catch up without starving the rest. Ties on `current` go
    /// to the later entry. Connection counts are read without a lock;
    /// transient staleness is acceptable and self-correcting.
    fn least_conns_balance(&mut self) -> Result<BackendRef> {
        let mut best: Option<usize> = None;
        let mut cmax = 0i64;
        for (i, cand) in self.entries.iter().enumerate() {
            if !cand.backend.avail() {
                continue;
            }
            cmax = cmax.max(cand.backend.conn_num());
            if best.map_or(true, |b| cand.current >= self.entries[b].current) {
                best = Some(i);
            }
        }
        let Some(i) = best else {
            return Err(Error::NoAvailableBackend);
        };
        let mut total = 0i64;
        for entry in &mut self.entries {
            if !entry.backend.avail() {
                continue;
            }
            let adjusted = entry.weight * (cmax + 1 - entry.backend.conn_num());
            entry.current += adjusted;
            total += adjusted;
        }
        let entry = &mut self.entries[i];
        entry.current -= total;
        Ok(entry.backend.clone())
    }

    /// Keyed selection: equal keys map to the same backend for as long as
    /// the available membership and the weights hold still.
    ///
    /// Entries are kept in ascending name order while sticky runs, so the
    /// mapping survives storage-order permutations and process restarts.
    /// The key hash is xxh32 with seed 0; it must stay identical across
    /// every process sharing a key space.
    fn sticky_balance(&mut self, key: &[u8]) -> Result<BackendRef> {
        if key.is_empty() {
            return Err(Error::EmptyHashKey);
        }
        if !self.sorted {
            self.entries
                .sort_by(|a, b| a.backend.name().cmp(b.backend.name()));
            self.sorted = true;
        }
        let total: i64 = self
            .entries
            .iter()
            .filter(|e| e.backend.avail())
            .map(|e| e.weight)
            .sum();
        if total <= 0 {
            return Err(Error::NoAvailableBackend);
        }
        let mut slot = i64::from(xxh32(key, 0)) % total;
        for entry in &self.entries {
            if !entry.backend.avail() {
                continue;
            }
            slot -= entry.weight;
            if slot < 0 {
                return Ok(entry.backend.clone());
            }
        }
        Err(Error::NoAvailableBackend)
    }

    /// Reconcile the pool against a full snapshot.
    ///
    /// The post-state equals the snapshot in membership, order and
    /// weights. Surviving backends keep their record and its connection
    /// counter; only the endpoint and the weight are refreshed. Records
    /// dropped here stay alive for any in-flight handles. An invalid
    /// snapshot is rejected wholesale and the prior pool remains intact.
    pub(crate) fn update(&mut self, snapshot: &[BackendConf]) -> Result<()> {
        config::validate_snapshot(snapshot)?;

        let mut existing: HashMap<String, WeightedBackend> = self
            .entries
            .drain(..)
            .map(|entry| (entry.backend.name().to_string(), entry))
            .collect();

        let mut entries = Vec::with_capacity(snapshot.len());
        for conf in snapshot {
            match existing.remove(&conf.name) {
                Some(mut entry) => {
                    entry.backend.update_endpoint(&conf.addr, conf.port);
                    entry.update_weight(conf.weight);
                    entries.push(entry);
                }
                None => entries.push(WeightedBackend::new(conf)),
            }
        }
        let dropped = existing.len();
        self.entries = entries;
        // snapshot order is not name order
        self.sorted = false;
        debug!(backends = self.entries.len(), dropped, "pool reconciled");
        Ok(())
    }
}
