//! Cursor record for ingestion progress tracking.
//!
//! A cursor maps named progress markers (source offsets, file positions) to
//! positions, plus a schema version for forward compatibility. The record is
//! only ever replaced whole; `CursorStore` never mutates the file in place.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default schema version for cursor records.
fn default_schema_version() -> u32 {
    1
}

/// Durable record of ingestion progress.
///
/// # Example
///
/// ```json
/// {
///   "schema_version": 1,
///   "positions": {
///     "updates": 184203,
///     "events": 991273
///   },
///   "last_update_ts": 1738100500
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CursorRecord {
    /// Schema version for forward compatibility.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Named progress markers, e.g. record offsets keyed by stream name.
    #[serde(default)]
    pub positions: HashMap<String, u64>,
    /// Unix timestamp of last cursor update.
    #[serde(default)]
    pub last_update_ts: i64,
}

impl Default for CursorRecord {
    fn default() -> Self {
        Self {
            schema_version: 1,
            positions: HashMap::new(),
            last_update_ts: 0,
        }
    }
}

impl CursorRecord {
    /// Get the position for a named marker.
    pub fn position(&self, name: &str) -> Option<u64> {
        self.positions.get(name).copied()
    }

    /// Set a marker position unconditionally.
    pub fn set(&mut self, name: &str, position: u64) {
        self.positions.insert(name.to_string(), position);
        self.touch();
    }

    /// Advance a marker position if the new value is greater.
    ///
    /// Returns `true` if the marker moved forward.
    pub fn advance(&mut self, name: &str, position: u64) -> bool {
        let should_update = match self.positions.get(name) {
            None => true,
            Some(current) => position > *current,
        };

        if should_update {
            debug!(marker = %name, position, "Cursor position advanced");
            self.positions.insert(name.to_string(), position);
            self.touch();
        }

        should_update
    }

    fn touch(&mut self) {
        self.last_update_ts = chrono::Utc::now().timestamp();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_record_default() {
        let record = CursorRecord::default();
        assert_eq!(record.schema_version, 1);
        assert!(record.positions.is_empty());
        assert_eq!(record.last_update_ts, 0);
    }

    #[test]
    fn test_cursor_record_serialization() {
        let mut record = CursorRecord::default();
        record.set("updates", 184203);
        record.set("events", 991273);

        let json = serde_json::to_string_pretty(&record).unwrap();
        let restored: CursorRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, record);
        assert_eq!(restored.position("updates"), Some(184203));
        assert_eq!(restored.position("events"), Some(991273));
    }

    #[test]
    fn test_schema_version_defaults_when_absent() {
        let restored: CursorRecord = serde_json::from_str(r#"{"positions":{"a":1}}"#).unwrap();
        assert_eq!(restored.schema_version, 1);
        assert_eq!(restored.position("a"), Some(1));
    }

    #[test]
    fn test_advance_only_moves_forward() {
        let mut record = CursorRecord::default();

        assert!(record.advance("updates", 100));
        assert_eq!(record.position("updates"), Some(100));

        assert!(record.advance("updates", 200));
        assert_eq!(record.position("updates"), Some(200));

        // Lesser position should not move the marker
        assert!(!record.advance("updates", 150));
        assert_eq!(record.position("updates"), Some(200));

        // Equal position should not move the marker
        assert!(!record.advance("updates", 200));
    }

    #[test]
    fn test_set_overwrites_unconditionally() {
        let mut record = CursorRecord::default();
        record.set("events", 500);
        record.set("events", 100);
        assert_eq!(record.position("events"), Some(100));
    }

    #[test]
    fn test_markers_are_independent() {
        let mut record = CursorRecord::default();
        record.advance("updates", 10);
        record.advance("events", 20);

        assert_eq!(record.position("updates"), Some(10));
        assert_eq!(record.position("events"), Some(20));
        assert!(record.position("missing").is_none());
    }
}
