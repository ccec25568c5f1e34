//! Outcome of a scan or a single-file update.

use codeindex_graph::UnitDelta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// What an indexing run did, unit by unit and in aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReindexReport {
    /// Units parsed and written to the graph
    pub indexed: usize,
    /// Units skipped because their content hash did not change
    pub unchanged: usize,
    /// Units removed from the graph
    pub removed: usize,
    /// Files without a registered adapter (only when reporting is enabled)
    pub skipped: Vec<(PathBuf, String)>,
    /// Files that could not be indexed, with the reason
    pub failed: Vec<(PathBuf, String)>,
    /// Indexed units whose parse needed error recovery, with the number of
    /// syntax diagnostics
    pub partial: Vec<(PathBuf, usize)>,

    pub entities_added: usize,
    pub entities_removed: usize,
    pub entities_modified: usize,
    pub edges_added: usize,
    pub edges_removed: usize,
    pub edges_modified: usize,
    /// Edges of other units that lost their target
    pub edges_dangled: usize,
    /// Dangling edges of other units bound to newly indexed entities
    pub edges_reconciled: usize,

    /// The run stopped early; units not yet applied were left untouched
    pub cancelled: bool,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl ReindexReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the counters of one graph mutation.
    pub fn record_delta(&mut self, delta: &UnitDelta) {
        self.entities_added += delta.entities_added;
        self.entities_removed += delta.entities_removed;
        self.entities_modified += delta.entities_modified;
        self.edges_added += delta.edges_added;
        self.edges_removed += delta.edges_removed;
        self.edges_modified += delta.edges_modified;
        self.edges_dangled += delta.edges_demoted;
    }

    /// Add a failed file
    pub fn add_failure(&mut self, path: PathBuf, reason: impl Into<String>) {
        self.failed.push((path, reason.into()));
    }

    /// Add a file without an adapter
    pub fn add_skipped(&mut self, path: PathBuf, reason: impl Into<String>) {
        self.skipped.push((path, reason.into()));
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: ReindexReport) {
        self.indexed += other.indexed;
        self.unchanged += other.unchanged;
        self.removed += other.removed;
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
        self.partial.extend(other.partial);
        self.entities_added += other.entities_added;
        self.entities_removed += other.entities_removed;
        self.entities_modified += other.entities_modified;
        self.edges_added += other.edges_added;
        self.edges_removed += other.edges_removed;
        self.edges_modified += other.edges_modified;
        self.edges_dangled += other.edges_dangled;
        self.edges_reconciled += other.edges_reconciled;
        self.cancelled |= other.cancelled;
        self.elapsed += other.elapsed;
    }

    /// No failures and not cancelled.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    /// True if the graph was not modified.
    pub fn is_noop(&self) -> bool {
        self.indexed == 0
            && self.removed == 0
            && self.entities_added == 0
            && self.entities_removed == 0
            && self.entities_modified == 0
            && self.edges_added == 0
            && self.edges_removed == 0
            && self.edges_modified == 0
            && self.edges_reconciled == 0
    }

    /// Calculate success rate as percentage of attempted units
    pub fn success_rate(&self) -> f64 {
        let succeeded = self.indexed + self.unchanged;
        let total = succeeded + self.failed.len();
        if total == 0 {
            return 100.0;
        }
        (succeeded as f64 / total as f64) * 100.0
    }
}

impl fmt::Display for ReindexReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} indexed, {} unchanged, {} removed, {} failed, {} skipped, {} partial; \
             entities +{} -{} ~{}; edges +{} -{} ~{}, {} reconciled, {} dangled in {}ms",
            self.indexed,
            self.unchanged,
            self.removed,
            self.failed.len(),
            self.skipped.len(),
            self.partial.len(),
            self.entities_added,
            self.entities_removed,
            self.entities_modified,
            self.edges_added,
            self.edges_removed,
            self.edges_modified,
            self.edges_reconciled,
            self.edges_dangled,
            self.elapsed.as_millis()
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeindex_graph::{UnitId, UnitState};

    #[test]
    fn test_success_rate() {
        let mut report = ReindexReport::new();
        assert_eq!(report.success_rate(), 100.0);

        report.indexed = 3;
        report.add_failure(PathBuf::from("bad.c"), "not valid UTF-8");
        assert_eq!(report.success_rate(), 75.0);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_record_delta_and_merge() {
        let mut delta = UnitDelta::new(UnitId::new("a.c"), UnitState::Indexed);
        delta.entities_added = 4;
        delta.edges_added = 7;
        delta.edges_demoted = 1;

        let mut first = ReindexReport::new();
        first.indexed = 1;
        first.record_delta(&delta);

        let mut second = ReindexReport::new();
        second.unchanged = 2;
        second.edges_reconciled = 3;
        second.cancelled = true;

        first.merge(second);
        assert_eq!(first.indexed, 1);
        assert_eq!(first.unchanged, 2);
        assert_eq!(first.entities_added, 4);
        assert_eq!(first.edges_added, 7);
        assert_eq!(first.edges_dangled, 1);
        assert_eq!(first.edges_reconciled, 3);
        assert!(first.cancelled);
        assert!(!first.is_clean());
        assert!(!first.is_noop());
    }

    #[test]
    fn test_display_summary() {
        let mut report = ReindexReport::new();
        report.indexed = 2;
        report.unchanged = 1;
        let text = report.to_string();
        assert!(text.starts_with("2 indexed, 1 unchanged, 0 removed, 0 failed"));
        assert!(!text.contains("cancelled"));

        report.cancelled = true;
        assert!(report.to_string().ends_with("(cancelled)"));
    }

    #[test]
    fn test_default_is_clean_noop() {
        let report = ReindexReport::default();
        assert!(report.is_clean());
        assert!(report.is_noop());
    }
}
