//! 작업 디스패치 모듈.
//!
//! 각 작업은 호출자와 분리된 tokio 태스크에서 실행됩니다. 한 종목의 패닉이나
//! 멈춤이 다른 종목을 오염시키지 않도록 다음을 보장합니다:
//!
//! - 패닉은 `JoinError`로 잡혀 `JobOutcome::Crashed`가 됨
//! - 마감 시한을 넘기면 태스크를 abort 하고 종료까지 기다림 (고아 태스크 없음)
//! - 이미 기록된 거래일은 그대로 유지, 남은 갭은 다음 패스에서 다시 계산

use archive_core::{DataKind, Security};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// 작업 대상.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTarget {
    /// 일봉 구간 (양 끝 포함)
    KBar { start: NaiveDate, end: NaiveDate },
    /// 틱 거래일 목록 (오름차순)
    Tick { dates: Vec<NaiveDate> },
}

/// 디스패치 단위 작업.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub security: Security,
    pub target: FetchTarget,
}

impl FetchJob {
    /// 일봉 구간 작업 생성.
    pub fn kbar(security: Security, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            security,
            target: FetchTarget::KBar { start, end },
        }
    }

    /// 틱 작업 생성. 거래일은 오름차순으로 정렬됩니다.
    pub fn tick(security: Security, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        let mut dates: Vec<NaiveDate> = dates.into_iter().collect();
        dates.sort();
        dates.dedup();
        Self {
            security,
            target: FetchTarget::Tick { dates },
        }
    }

    pub fn kind(&self) -> DataKind {
        match self.target {
            FetchTarget::KBar { .. } => DataKind::KBar,
            FetchTarget::Tick { .. } => DataKind::Tick,
        }
    }
}

impl fmt::Display for FetchJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            FetchTarget::KBar { start, end } => {
                write!(f, "{} kbar [{} ~ {}]", self.security, start, end)
            }
            FetchTarget::Tick { dates } => {
                write!(f, "{} tick ({} days)", self.security, dates.len())
            }
        }
    }
}

/// 작업 하나의 기록 결과.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    /// 새로 기록한 일봉 수
    pub kbars_written: usize,
    /// 관측 틱으로 기록한 거래일 수
    pub ticks_observed: usize,
    /// 합성 틱으로 기록한 거래일 수
    pub ticks_synthesized: usize,
    /// 같은 내용이 이미 있던 기록 수
    pub unchanged: usize,
    /// 소스에 새 일봉이 없던 요청 수
    pub no_data: usize,
    /// 합성 기준 일봉이 없어 남겨둔 거래일 수
    pub missing_anchor: usize,
    /// 해석할 수 없는 응답 수
    pub unclassifiable: usize,
    /// 재시도 소진 등 일시적 실패 수
    pub transient_failures: usize,
    /// 추가 전용 불변식 위반으로 거부된 기록 수
    pub conflicts: usize,
    /// 그 외 기록 실패 수 (디스크 오류 등)
    pub write_errors: usize,
}

impl JobReport {
    /// 다음 패스로 넘어가는 미해결 건수.
    pub fn unresolved(&self) -> usize {
        self.missing_anchor
            + self.unclassifiable
            + self.transient_failures
            + self.conflicts
            + self.write_errors
    }

    /// 디스크에 기록된 건수.
    pub fn written(&self) -> usize {
        self.kbars_written + self.ticks_observed + self.ticks_synthesized
    }

    pub fn merge(&mut self, other: &JobReport) {
        self.kbars_written += other.kbars_written;
        self.ticks_observed += other.ticks_observed;
        self.ticks_synthesized += other.ticks_synthesized;
        self.unchanged += other.unchanged;
        self.no_data += other.no_data;
        self.missing_anchor += other.missing_anchor;
        self.unclassifiable += other.unclassifiable;
        self.transient_failures += other.transient_failures;
        self.conflicts += other.conflicts;
        self.write_errors += other.write_errors;
    }
}

/// 작업 종료 상태.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// 정상 종료 (일부 거래일이 미해결일 수 있음)
    Completed(JobReport),
    /// 작업 자체가 실패
    Failed(String),
    /// 작업 태스크가 패닉
    Crashed(String),
    /// 마감 시한 초과로 강제 종료
    TimedOut,
}

/// 작업 실행기.
///
/// 디스패처는 실행기를 별도 태스크에서 호출하므로 `'static`이어야 합니다.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(&self, job: FetchJob) -> crate::Result<JobReport>;
}

/// 작업 디스패처.
#[derive(Clone)]
pub struct FetchDispatcher {
    runner: Arc<dyn JobRunner>,
    deadline: Duration,
}

impl FetchDispatcher {
    pub fn new(runner: Arc<dyn JobRunner>, deadline: Duration) -> Self {
        Self { runner, deadline }
    }

    /// 작업을 실행하고 종료 상태가 될 때까지 기다립니다.
    pub async fn dispatch(&self, job: FetchJob) -> JobOutcome {
        let label = job.to_string();
        let runner = Arc::clone(&self.runner);
        let mut handle = tokio::spawn(async move { runner.run(job).await });

        match tokio::time::timeout(self.deadline, &mut handle).await {
            Ok(Ok(Ok(report))) => {
                tracing::debug!(job = %label, written = report.written(), "작업 완료");
                JobOutcome::Completed(report)
            }
            Ok(Ok(Err(e))) => {
                tracing::error!(job = %label, error = %e, "작업 실패");
                JobOutcome::Failed(e.to_string())
            }
            Ok(Err(join_error)) => {
                tracing::error!(job = %label, error = %join_error, "작업 태스크 비정상 종료");
                JobOutcome::Crashed(join_error.to_string())
            }
            Err(_) => {
                handle.abort();
                // abort 이후 태스크가 실제로 정리될 때까지 대기
                let _ = handle.await;
                tracing::warn!(
                    job = %label,
                    deadline_secs = self.deadline.as_secs(),
                    "마감 시한 초과, 작업 강제 종료 (남은 갭은 다음 패스에서 처리)"
                );
                JobOutcome::TimedOut
            }
        }
    }
}
