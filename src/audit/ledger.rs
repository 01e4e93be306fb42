//! The audit ledger: ordered detections awaiting or done with verification.

use crate::error::Result;
use crate::loader::{load_detections_from_file, save_json_pretty};
use crate::types::Detection;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ordered list of audit records, persisted as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLedger {
    entries: Vec<Detection>,
}

impl AuditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, detection: Detection) {
        self.entries.push(detection);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[Detection] {
        &self.entries
    }

    pub fn into_inner(self) -> Vec<Detection> {
        self.entries
    }

    /// True when every entry carries a suggested action.
    pub fn is_sealed(&self) -> bool {
        self.entries.iter().all(|d| d.vlm_suggested_action.is_some())
    }

    /// Load a ledger previously written with [`persist`](Self::persist).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            entries: load_detections_from_file(path)?,
        })
    }

    /// Atomically write the ledger as pretty-printed JSON.
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_json_pretty(&self.entries, path)
    }
}

impl From<Vec<Detection>> for AuditLedger {
    fn from(entries: Vec<Detection>) -> Self {
        Self { entries }
    }
}

impl FromIterator<Detection> for AuditLedger {
    fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for AuditLedger {
    type Item = Detection;
    type IntoIter = std::vec::IntoIter<Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
