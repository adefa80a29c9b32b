pub mod cleanup;
pub mod engine;
pub(crate) mod util;

pub use cleanup::{completeness_score, plan_cleanup, CleanupPlan, DuplicateGroup, GroupKey};
pub use engine::{MatchReason, ReconciliationEngine, ReconciliationVerdict};
