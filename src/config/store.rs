//! Authoritative risk threshold snapshot.
//!
//! Readers take an immutable `Arc<RiskScorer>` snapshot per operation, so
//! one ingestion or preview never mixes two threshold sets. Writers (the
//! threshold editor and the file watcher) build a candidate, validate it,
//! then swap it in atomically; a rejected candidate leaves the current
//! snapshot untouched.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::risk::{RiskError, RiskScorer};
use crate::types::{RiskThresholds, ThresholdField};

/// One editor row: `{id, name, value}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdEntry {
    pub id: u32,
    pub name: &'static str,
    pub value: f64,
}

impl ThresholdEntry {
    pub fn new(field: ThresholdField, thresholds: &RiskThresholds) -> Self {
        Self {
            id: field.id(),
            name: field.name(),
            value: thresholds.get(field),
        }
    }
}

/// A single field that changed between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdChange {
    pub field: ThresholdField,
    pub old: f64,
    pub new: f64,
}

impl std::fmt::Display for ThresholdChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.old, self.new)
    }
}

/// Per-field differences from `old` to `new`, in editor order.
pub fn diff_thresholds(old: &RiskThresholds, new: &RiskThresholds) -> Vec<ThresholdChange> {
    ThresholdField::ALL
        .into_iter()
        .filter_map(|field| {
            let (o, n) = (old.get(field), new.get(field));
            (o.to_bits() != n.to_bits()).then_some(ThresholdChange {
                field,
                old: o,
                new: n,
            })
        })
        .collect()
}

/// Lock-free current-threshold holder.
#[derive(Debug)]
pub struct ThresholdStore {
    current: ArcSwap<RiskScorer>,
    // Serializes read-modify-write edits; readers never take it
    write_lock: Mutex<()>,
}

impl ThresholdStore {
    pub fn new(scorer: RiskScorer) -> Self {
        Self {
            current: ArcSwap::from_pointee(scorer),
            write_lock: Mutex::new(()),
        }
    }

    /// Validate and wrap `thresholds`.
    pub fn from_thresholds(thresholds: RiskThresholds) -> Result<Self, RiskError> {
        Ok(Self::new(RiskScorer::new(thresholds)?))
    }

    /// Current validated scorer.
    pub fn snapshot(&self) -> Arc<RiskScorer> {
        self.current.load_full()
    }

    pub fn thresholds(&self) -> RiskThresholds {
        *self.current.load().thresholds()
    }

    /// All nine fields as editor rows.
    pub fn entries(&self) -> Vec<ThresholdEntry> {
        let t = self.thresholds();
        ThresholdField::ALL
            .into_iter()
            .map(|f| ThresholdEntry::new(f, &t))
            .collect()
    }

    /// Set one field. Rejected (and nothing stored) if the result is degenerate.
    pub fn set_field(&self, field: ThresholdField, value: f64) -> Result<ThresholdEntry, RiskError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| {
            tracing::warn!("Threshold store write lock poisoned, recovering");
            e.into_inner()
        });
        let next = RiskScorer::new(self.thresholds().with(field, value))?;
        self.current.store(Arc::new(next));
        Ok(ThresholdEntry::new(field, next.thresholds()))
    }

    /// Replace the whole set (file reload). Returns what changed.
    pub fn replace(&self, thresholds: RiskThresholds) -> Result<Vec<ThresholdChange>, RiskError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| {
            tracing::warn!("Threshold store write lock poisoned, recovering");
            e.into_inner()
        });
        let next = RiskScorer::new(thresholds)?;
        let changes = diff_thresholds(&self.thresholds(), &thresholds);
        if !changes.is_empty() {
            self.current.store(Arc::new(next));
        }
        Ok(changes)
    }
}

impl Default for ThresholdStore {
    fn default() -> Self {
        Self::new(RiskScorer::default())
    }
}
