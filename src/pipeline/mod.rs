//! Verification-code relay pipeline.
//!
//! Every inbound message flows through:
//! 1. `DedupGuard::should_process()`: drops platform redeliveries
//! 2. global enable check against a fresh settings snapshot
//! 3. `CodeExtractor::extract()`: pluggable rules
//! 4. `ModeResolver::resolve()`: picks the auto-fill strategy
//! 5. `ActionDispatcher::dispatch()`: copy, toast, fill, housekeeping
//!
//! Runs are serialized per queue by `spawn_pipeline_worker`.

pub mod dedup;
pub mod dispatcher;
pub mod matcher;
pub mod mode;
pub mod processor;
pub mod types;
pub mod worker;

pub use dedup::DedupGuard;
pub use dispatcher::ActionDispatcher;
pub use matcher::{MatchOutcome, MessageMatcher};
pub use mode::{ModeResolver, Strategy};
pub use processor::{Pipeline, PipelineDeps};
pub use types::{ExtractedCode, InboundMessage, MatchCriteria, RunOutcome, StoreOp};
pub use worker::{DEFAULT_QUEUE_CAPACITY, PipelineQueue, spawn_pipeline_worker};
