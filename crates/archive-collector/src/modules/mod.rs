//! 수집 모듈.

pub mod dispatch;
pub mod gap;
pub mod reconcile;
pub mod runner;

pub use dispatch::{FetchDispatcher, FetchJob, FetchTarget, JobOutcome, JobReport, JobRunner};
pub use gap::{compute_kbar_gap, compute_tick_gap, KBarGap};
pub use reconcile::{run_pass, KindSelection, PassContext};
pub use runner::ArchiveJobRunner;
