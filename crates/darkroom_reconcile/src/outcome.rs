//! Per-asset states, outcomes and the run report.

use darkroom_core::{AssetId, StoragePath};
use darkroom_error::{DarkroomError, DarkroomErrorKind, ReserveErrorKind, StorageErrorKind};
use serde::{Deserialize, Serialize};

/// Where an asset is in its reconciliation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    /// Not yet looked at
    #[display("pending")]
    Pending,
    /// Computing the target path
    #[display("resolving")]
    Resolving,
    /// Claiming the target path in the index
    #[display("reserving")]
    Reserving,
    /// Filesystem move in progress
    #[display("moving")]
    Moving,
    /// Moved or placed
    #[display("done")]
    Done,
    /// Already in place, or a duplicate
    #[display("skipped")]
    Skipped,
    /// Gave up on this asset
    #[display("failed")]
    Failed,
}

/// Stable tag describing why an asset failed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Template did not compile
    #[display("syntax")]
    Syntax,
    /// Reservation refused because of identical content
    #[display("duplicate")]
    Duplicate,
    /// No free suffixed path left
    #[display("exhausted_suffix_space")]
    ExhaustedSuffixSpace,
    /// Filesystem move failed
    #[display("move")]
    Move,
    /// Index disagrees with the disk and could not be repaired
    #[display("index_corruption")]
    IndexCorruption,
    /// Catalog lookup failed
    #[display("catalog")]
    Catalog,
    /// Index persistence or other storage failure
    #[display("storage")]
    Storage,
}

impl FailureKind {
    /// Classify an error.
    pub fn of(err: &DarkroomError) -> Self {
        match err.kind() {
            DarkroomErrorKind::Template(_) => Self::Syntax,
            DarkroomErrorKind::Reserve(e) => match e.kind {
                ReserveErrorKind::DuplicateDetected { .. } => Self::Duplicate,
                ReserveErrorKind::ExhaustedSuffixSpace { .. } => Self::ExhaustedSuffixSpace,
            },
            DarkroomErrorKind::Move(_) => Self::Move,
            DarkroomErrorKind::Storage(e) => match e.kind {
                StorageErrorKind::IndexCorruption(_) => Self::IndexCorruption,
                _ => Self::Storage,
            },
            DarkroomErrorKind::Catalog(_) => Self::Catalog,
            DarkroomErrorKind::Config(_) => Self::Storage,
        }
    }
}

/// What reconciliation did to one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssetOutcome {
    /// Relocated from an indexed path
    Moved {
        /// Previous path
        from: StoragePath,
        /// New path
        to: StoragePath,
    },
    /// First placement from the asset's original path
    Placed {
        /// New path
        to: StoragePath,
    },
    /// Already where the template puts it
    Unchanged {
        /// Current path
        path: StoragePath,
    },
    /// Identical content already stored by another asset; nothing moved
    Duplicate {
        /// Asset holding the content
        existing: AssetId,
    },
    /// Reconciliation of this asset failed
    Failed {
        /// Failure tag
        kind: FailureKind,
        /// Human-readable cause
        message: String,
    },
    /// The run was cancelled before this asset's move started
    Cancelled,
}

impl AssetOutcome {
    /// Build a failure outcome from an error.
    pub fn failed(err: &DarkroomError) -> Self {
        Self::Failed {
            kind: FailureKind::of(err),
            message: err.to_string(),
        }
    }

    /// Terminal state this outcome corresponds to. `Cancelled` maps to
    /// `Pending` since the asset was never processed.
    pub fn state(&self) -> AssetState {
        match self {
            Self::Moved { .. } | Self::Placed { .. } => AssetState::Done,
            Self::Unchanged { .. } | Self::Duplicate { .. } => AssetState::Skipped,
            Self::Failed { .. } => AssetState::Failed,
            Self::Cancelled => AssetState::Pending,
        }
    }

    /// The asset's path after this outcome, if it has one.
    pub fn path(&self) -> Option<&StoragePath> {
        match self {
            Self::Moved { to, .. } | Self::Placed { to } => Some(to),
            Self::Unchanged { path } => Some(path),
            _ => None,
        }
    }
}

/// A failed asset in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// The asset
    pub asset_id: AssetId,
    /// Failure tag
    pub kind: FailureKind,
    /// Human-readable cause
    pub message: String,
}

/// An asset whose content is already stored under another asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicatePair {
    /// The asset that was not moved
    pub asset_id: AssetId,
    /// The asset holding the content
    pub existing: AssetId,
}

/// One asset's line in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResult {
    /// The asset
    pub asset_id: AssetId,
    /// What happened to it
    #[serde(flatten)]
    pub outcome: AssetOutcome,
}

/// Summary of a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Template version the run resolved against
    pub template_version: u64,
    /// Assets considered
    pub total: usize,
    /// Moved or placed
    pub moved: usize,
    /// Unchanged or duplicate
    pub skipped: usize,
    /// Failed
    pub failed: usize,
    /// Not processed because the run was cancelled
    pub cancelled: usize,
    /// Details of each failure
    pub failures: Vec<Failure>,
    /// Content duplicates found
    pub duplicates: Vec<DuplicatePair>,
    /// Every asset's outcome, ordered by asset id
    pub results: Vec<AssetResult>,
}

impl ReconcileReport {
    /// Start an empty report for a template version.
    pub fn new(template_version: u64) -> Self {
        Self {
            template_version,
            ..Self::default()
        }
    }

    /// Account for one asset.
    pub fn record(&mut self, asset_id: AssetId, outcome: AssetOutcome) {
        self.total += 1;
        match &outcome {
            AssetOutcome::Moved { .. } | AssetOutcome::Placed { .. } => self.moved += 1,
            AssetOutcome::Unchanged { .. } => self.skipped += 1,
            AssetOutcome::Duplicate { existing } => {
                self.skipped += 1;
                self.duplicates.push(DuplicatePair {
                    asset_id,
                    existing: *existing,
                });
            }
            AssetOutcome::Failed { kind, message } => {
                self.failed += 1;
                self.failures.push(Failure {
                    asset_id,
                    kind: *kind,
                    message: message.clone(),
                });
            }
            AssetOutcome::Cancelled => self.cancelled += 1,
        }
        self.results.push(AssetResult { asset_id, outcome });
    }

    /// Sort every list by asset id.
    pub fn finish(mut self) -> Self {
        self.results.sort_by_key(|r| r.asset_id);
        self.failures.sort_by_key(|f| f.asset_id);
        self.duplicates.sort_by_key(|d| d.asset_id);
        self
    }

    /// Outcome recorded for an asset.
    pub fn outcome(&self, asset_id: AssetId) -> Option<&AssetOutcome> {
        self.results
            .iter()
            .find(|r| r.asset_id == asset_id)
            .map(|r| &r.outcome)
    }

    /// Whether every asset was either moved or skipped.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darkroom_error::{MoveError, MoveErrorKind, ReserveError, StorageError};
    use strum::IntoEnumIterator;

    #[test]
    fn test_failure_tags_are_stable() {
        let tags: Vec<String> = FailureKind::iter().map(|k| k.to_string()).collect();
        assert_eq!(
            tags,
            [
                "syntax",
                "duplicate",
                "exhausted_suffix_space",
                "move",
                "index_corruption",
                "catalog",
                "storage"
            ]
        );
        for kind in FailureKind::iter() {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }

    #[test]
    fn test_failure_kind_classifies_errors() {
        let err: DarkroomError = MoveError::new(MoveErrorKind::StorageFull("disk".into())).into();
        assert_eq!(FailureKind::of(&err), FailureKind::Move);

        let err: DarkroomError =
            StorageError::new(StorageErrorKind::IndexCorruption("gone".into())).into();
        assert_eq!(FailureKind::of(&err), FailureKind::IndexCorruption);

        let err: DarkroomError = StorageError::new(StorageErrorKind::Persist("ro".into())).into();
        assert_eq!(FailureKind::of(&err), FailureKind::Storage);

        // What resolve_and_reserve surfaces for identical content
        let err: DarkroomError = ReserveError::new(ReserveErrorKind::DuplicateDetected {
            existing: uuid::Uuid::nil(),
            path: "2024/a.jpg".into(),
        })
        .into();
        assert_eq!(FailureKind::of(&err), FailureKind::Duplicate);
    }

    #[test]
    fn test_report_counts() {
        let mut report = ReconcileReport::new(3);
        let path = StoragePath::new("a.jpg").unwrap();
        let (a, b, c, d) = (AssetId::new(), AssetId::new(), AssetId::new(), AssetId::new());
        report.record(a, AssetOutcome::Placed { to: path.clone() });
        report.record(b, AssetOutcome::Unchanged { path });
        report.record(c, AssetOutcome::Duplicate { existing: a });
        report.record(
            d,
            AssetOutcome::Failed {
                kind: FailureKind::Move,
                message: "denied".into(),
            },
        );
        let report = report.finish();

        assert_eq!((report.total, report.moved, report.skipped, report.failed), (4, 1, 2, 1));
        assert_eq!(report.duplicates, vec![DuplicatePair { asset_id: c, existing: a }]);
        assert_eq!(report.failures[0].asset_id, d);
        assert!(!report.is_clean());
        assert!(report.results.windows(2).all(|w| w[0].asset_id < w[1].asset_id));
    }

    #[test]
    fn test_report_serializes_outcome_tags() {
        let mut report = ReconcileReport::new(1);
        report.record(
            AssetId::new(),
            AssetOutcome::Unchanged {
                path: StoragePath::new("x/y.jpg").unwrap(),
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"][0]["outcome"], "unchanged");
        assert_eq!(json["results"][0]["path"], "x/y.jpg");
    }
}
