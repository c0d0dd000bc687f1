use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A record's required field could not be parsed; the record was kept as UNMATCHED
    UnparseableRecord,
    /// Candidates existed but a better pair claimed the partner
    AmbiguousMatch,
    /// Pad coordinates fell outside the indexed hazard geometry
    ProximityLookupMiss,
    /// No coordinates could be resolved for the record's pad, so no lookup was attempted
    UnlocatedPad,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Record fingerprint or launch id the entry is about
    pub subject: String,
    pub detail: String,
}

/// Batch-level summary of recovered conditions. Nothing in here aborts a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchDiagnostics {
    pub entries: Vec<Diagnostic>,
    pub raw_records: usize,
    pub matched_exact: usize,
    pub matched_fuzzy: usize,
    pub unmatched: usize,
    /// Attributes resolved by priority over a disagreeing value
    pub conflicts: usize,
}

impl BatchDiagnostics {
    pub fn push(&mut self, kind: DiagnosticKind, subject: impl Into<String>, detail: impl Into<String>) {
        self.entries.push(Diagnostic {
            kind,
            subject: subject.into(),
            detail: detail.into(),
        });
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    /// Entries are produced in deterministic order per stage; merge keeps stage order
    pub fn merge(&mut self, other: BatchDiagnostics) {
        self.entries.extend(other.entries);
        self.raw_records += other.raw_records;
        self.matched_exact += other.matched_exact;
        self.matched_fuzzy += other.matched_fuzzy;
        self.unmatched += other.unmatched;
        self.conflicts += other.conflicts;
    }

    pub fn log_summary(&self) {
        info!(
            raw_records = self.raw_records,
            exact = self.matched_exact,
            fuzzy = self.matched_fuzzy,
            unmatched = self.unmatched,
            conflicts = self.conflicts,
            "Batch diagnostics"
        );
        for kind in [
            DiagnosticKind::UnparseableRecord,
            DiagnosticKind::AmbiguousMatch,
            DiagnosticKind::ProximityLookupMiss,
            DiagnosticKind::UnlocatedPad,
        ] {
            let n = self.count(kind);
            if n > 0 {
                warn!("{} {:?} diagnostics recorded", n, kind);
            }
        }
    }
}
