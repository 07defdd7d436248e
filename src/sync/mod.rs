//! Sync core: planning, transformation and concurrent upload.

pub mod engine;
pub mod exclude;
pub mod marker;
pub mod pipeline;
pub mod planner;
pub mod transform;
pub mod types;

pub use engine::{SyncConfig, SyncEngine};
pub use exclude::ExcludePatterns;
pub use marker::RevisionMarker;
pub use pipeline::UploadPipeline;
pub use planner::DiffPlanner;
pub use transform::{ContentTransformer, TransformOptions, TransformedObject};
pub use types::{
    join_key, AssetRecord, DecisionReason, Failure, LocalSignal, RunState, RunSummary,
    UploadDecision, UploadOutcome, UploadResult, UploadTask,
};
