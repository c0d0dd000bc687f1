// Batch pipeline: reconciliation, feature derivation, and versioned storage

pub mod diagnostics;
pub mod orchestrator;
pub mod processing;
pub mod storage;

pub use diagnostics::{BatchDiagnostics, Diagnostic, DiagnosticKind};
pub use orchestrator::{BatchReport, Pipeline};
