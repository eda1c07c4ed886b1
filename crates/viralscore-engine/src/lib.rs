//! Scoring and rewards engine: the pure scoring rules, the bounded-concurrency
//! pipeline, and the submission service that ties them to a store and ledger.

pub mod adjust;
pub mod aggregate;
pub mod collaborators;
pub mod duration;
pub mod error;
pub mod fingerprint;
pub mod frame_score;
pub mod outlier;
pub mod pipeline;
pub mod retry;
pub mod reward;
pub mod runs;
pub mod service;
pub mod showcase;
pub mod store;
pub mod validate;

pub use adjust::{adjust_credits, credits_diff, reward_owed, ScoreAdjustment};
pub use aggregate::{viral_score, DimensionBreakdown};
pub use collaborators::{
    CollaboratorError, CreditLedger, DurationProbe, ExtractedFrame, FrameExtractor, FrameScorer,
    FrameVerdict,
};
pub use duration::{plan_frame_timestamps, validate_duration, MAX_DURATION_SECONDS};
pub use error::{EngineError, ErrorClass};
pub use fingerprint::{fingerprint, fingerprint_key};
pub use frame_score::frame_score;
pub use outlier::drop_outliers;
pub use pipeline::{Collaborators, PipelineConfig, ScoredVideo, ScoringPipeline};
pub use retry::{retry_with_backoff, RetryPolicy, Transient};
pub use reward::{reward_for, reward_for_score};
pub use runs::{RunGuard, RunRegistry, RunStatus};
pub use service::{
    AdjustOutcome, RunOutcome, SubmissionService, SubmissionView, SubmitOutcome, SubmitWarning,
    SweepReport,
};
pub use showcase::{should_showcase, SHOWCASE_MIN_SCORE};
pub use store::{
    InMemorySubmissionStore, NewSubmission, RunRecord, ScoreRecord, StoreError, SubmissionStore,
};
pub use validate::{validate_submission, SubmissionInput, ValidationIssue, MAX_TITLE_CHARS};
