//! Snapshot configuration for the balance engine.
//!
//! A snapshot is the full backend membership of one sub-cluster, never a
//! delta. At the JSON boundary the field names are exactly `name`,
//! `Addr`, `Port`, `weight`.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub mod watcher;

pub use watcher::SnapshotWatcher;

/// One backend record inside a sub-cluster snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConf {
    pub name: String,
    #[serde(rename = "Addr")]
    pub addr: String,
    #[serde(rename = "Port")]
    pub port: u16,
    pub weight: i32,
}

/// Full reconfiguration input for one pool.
pub type SubClusterSnapshot = Vec<BackendConf>;

/// Parse and validate a JSON snapshot.
pub fn parse_snapshot(bytes: &[u8]) -> Result<SubClusterSnapshot> {
    let snapshot: SubClusterSnapshot =
        serde_json::from_slice(bytes).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;
    validate_snapshot(&snapshot)?;
    Ok(snapshot)
}

/// Load and validate a snapshot from a JSON file.
pub fn load_snapshot(path: &Path) -> Result<SubClusterSnapshot> {
    let bytes = std::fs::read(path)?;
    parse_snapshot(&bytes)
}

/// Reject snapshots that would corrupt a pool.
///
/// A duplicate name, an empty name or a non-positive weight fails the
/// snapshot wholesale; the caller keeps its prior pool.
pub fn validate_snapshot(snapshot: &[BackendConf]) -> Result<()> {
    let mut names = HashSet::with_capacity(snapshot.len());
    for conf in snapshot {
        if conf.name.is_empty() {
            return Err(Error::InvalidSnapshot("backend name is empty".to_string()));
        }
        if !names.insert(conf.name.as_str()) {
            return Err(Error::InvalidSnapshot(format!(
                "duplicate backend name: {}",
                conf.name
            )));
        }
        if conf.weight <= 0 {
            return Err(Error::InvalidSnapshot(format!(
                "backend {} has non-positive weight {}",
                conf.name, conf.weight
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_wire_field_names() {
        let snapshot = parse_snapshot(
            br#"[{"name":"b1", "Addr":"10.0.0.1", "Port":8080, "weight":5}]"#,
        )
        .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "b1");
        assert_eq!(snapshot[0].addr, "10.0.0.1");
        assert_eq!(snapshot[0].port, 8080);
        assert_eq!(snapshot[0].weight, 5);
    }

    #[test]
    fn serialize_wire_field_names() {
        let conf = BackendConf {
            name: "b1".to_string(),
            addr: "10.0.0.1".to_string(),
            port: 8080,
            weight: 5,
        };
        let json = serde_json::to_string(&conf).unwrap();
        assert!(json.contains("\"Addr\""));
        assert!(json.contains("\"Port\""));
        assert!(json.contains("\"name\""));
        assert!(json.contains("\"weight\""));
    }

    #[test]
    fn missing_field_is_invalid() {
        let err = parse_snapshot(br#"[{"name":"b1", "Addr":"10.0.0.1", "weight":5}]"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(_)));
    }

    #[test]
    fn duplicate_name_is_invalid() {
        let err = parse_snapshot(
            br#"[{"name":"b1", "Addr":"a", "Port":1, "weight":1},
                 {"name":"b1", "Addr":"b", "Port":2, "weight":1}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(_)));
    }

    #[test]
    fn non_positive_weight_is_invalid() {
        for weight in ["0", "-3"] {
            let json = format!(r#"[{{"name":"b1", "Addr":"a", "Port":1, "weight":{}}}]"#, weight);
            let err = parse_snapshot(json.as_bytes()).unwrap_err();
            assert!(matches!(err, Error::InvalidSnapshot(_)));
        }
    }
}
