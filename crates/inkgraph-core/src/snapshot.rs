//! Document snapshots for persistence.

use crate::error::{EditorError, Result};
use crate::records::{Record, RecordScope};
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};

/// Current snapshot format. Snapshots of any other version are rejected;
/// migrating them is up to the caller.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The document records of a store at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub records: Vec<Record>,
}

impl StoreSnapshot {
    /// Capture the document records of `store`, sorted by id.
    pub fn capture(store: &RecordStore) -> Self {
        let mut records: Vec<Record> = store.read(|view| {
            view.records()
                .filter(|r| r.scope() == RecordScope::Document)
                .cloned()
                .collect()
        });
        records.sort_by_key(Record::id);
        Self {
            version: SNAPSHOT_VERSION,
            records,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot, rejecting other format versions.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: StoreSnapshot = serde_json::from_str(json)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    fn check_version(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(EditorError::UnsupportedSnapshot {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(())
    }

    /// Replace the contents of `store` with this snapshot. Shape and binding
    /// types must be known to the store's schema.
    pub fn restore(&self, store: &RecordStore) -> Result<()> {
        self.check_version()?;
        let schema = store.schema();
        for record in &self.records {
            match record {
                Record::Shape(shape) if schema.shape_util(&shape.shape_type).is_none() => {
                    return Err(EditorError::UnknownShapeType(shape.shape_type.clone()));
                }
                Record::Binding(binding) if schema.binding_util(&binding.binding_type).is_none() => {
                    return Err(EditorError::UnknownBindingType(binding.binding_type.clone()));
                }
                _ => {}
            }
        }
        store.replace_all(self.records.clone())?;
        log::debug!("restored snapshot with {} record(s)", self.records.len());
        Ok(())
    }
}
