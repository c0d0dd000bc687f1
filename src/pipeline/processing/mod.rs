// Pipeline processing: matching, conflict resolution, and feature derivation

pub mod features;
pub mod priority;
pub mod proximity;
pub mod reconcile;
pub mod similarity;

pub use features::{DerivedFeatures, FeatureDeriver};
pub use priority::SourcePriority;
pub use proximity::{HazardLookup, NearestHazard, ProximityIndex};
pub use reconcile::{ReconcileConfig, ReconcileOutput, Reconciler, RecordReconciler};
