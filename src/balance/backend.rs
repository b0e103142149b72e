//! Backend records shared between the pool and in-flight request handles.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::config::BackendConf;

/// Shared handle to a backend record.
///
/// The pool holds one strong reference per entry and every in-flight
/// request holds another, so a record dropped by a snapshot update stays
/// usable until its last handle releases it.
pub type BackendRef = Arc<Backend>;

/// One downstream service endpoint.
///
/// The name is immutable for the record's lifetime and unique within a
/// pool. The endpoint address may be refreshed by a snapshot update while
/// request handles still hold the record, so it lives behind a lock;
/// liveness and the connection counter are atomics so handle holders never
/// contend with selection.
#[derive(Debug)]
pub struct Backend {
    name: String,
    endpoint: RwLock<Endpoint>,
    avail: AtomicBool,
    conn_num: AtomicI64,
}

#[derive(Debug, Clone)]
struct Endpoint {
    addr: String,
    port: u16,
    addr_info: String,
}

impl Endpoint {
    fn new(addr: &str, port: u16) -> Self {
        Self {
            addr: addr.to_string(),
            port,
            addr_info: format!("{}:{}", addr, port),
        }
    }
}

impl Backend {
    pub(crate) fn new(conf: &BackendConf) -> Self {
        Self {
            name: conf.name.clone(),
            endpoint: RwLock::new(Endpoint::new(&conf.addr, conf.port)),
            avail: AtomicBool::new(true),
            conn_num: AtomicI64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> String {
        self.endpoint.read().addr.clone()
    }

    pub fn port(&self) -> u16 {
        self.endpoint.read().port
    }

    /// Display form `addr:port`.
    pub fn addr_info(&self) -> String {
        self.endpoint.read().addr_info.clone()
    }

    pub(crate) fn update_endpoint(&self, addr: &str, port: u16) {
        *self.endpoint.write() = Endpoint::new(addr, port);
    }

    pub fn avail(&self) -> bool {
        self.avail.load(Ordering::Relaxed)
    }

    pub fn set_avail(&self, avail: bool) {
        self.avail.store(avail, Ordering::Relaxed);
    }

    pub fn conn_num(&self) -> i64 {
        self.conn_num.load(Ordering::Relaxed)
    }

    /// Record one acquired connection.
    pub fn add_conn(&self) {
        self.conn_num.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one released connection.
    ///
    /// Releasing more connections than were acquired is a caller bug; the
    /// counter clamps at zero instead of going negative.
    pub fn sub_conn(&self) {
        let res = self
            .conn_num
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                if n > 0 {
                    Some(n - 1)
                } else {
                    None
                }
            });
        if res.is_err() {
            warn!(backend = %self.name, "connection counter underflow, clamped at zero");
        }
    }
}
