//! 수집 통계 구조체.

use crate::modules::dispatch::{JobOutcome, JobReport};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 수집 패스 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 처리한 종목 수
    pub securities: usize,
    /// 디스패치한 작업 수
    pub jobs: usize,
    /// 정상 종료 작업 수
    pub completed: usize,
    /// 실패한 작업 수 (크롤 엔진 구성 실패 등)
    pub failed: usize,
    /// 패닉으로 종료된 작업 수
    pub crashed: usize,
    /// 마감 시한 초과 작업 수
    pub timed_out: usize,
    /// 갭이 없어 건너뛴 작업 수
    pub skipped: usize,
    /// 캘린더/아카이브 조회 실패로 갭을 계산하지 못한 횟수
    pub gap_errors: usize,
    /// 작업별 기록 결과 합계
    pub records: JobReport,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 작업 결과 반영
    pub fn record_outcome(&mut self, outcome: &JobOutcome) {
        self.jobs += 1;
        match outcome {
            JobOutcome::Completed(report) => {
                self.completed += 1;
                self.records.merge(report);
            }
            JobOutcome::Failed(_) => self.failed += 1,
            JobOutcome::Crashed(_) => self.crashed += 1,
            JobOutcome::TimedOut => self.timed_out += 1,
        }
    }

    /// 다른 통계 합산 (종목별 통계를 패스 통계로)
    pub fn merge(&mut self, other: &CollectionStats) {
        self.securities += other.securities;
        self.jobs += other.jobs;
        self.completed += other.completed;
        self.failed += other.failed;
        self.crashed += other.crashed;
        self.timed_out += other.timed_out;
        self.skipped += other.skipped;
        self.gap_errors += other.gap_errors;
        self.records.merge(&other.records);
    }

    /// 작업 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.jobs == 0 {
            0.0
        } else {
            (self.completed as f64 / self.jobs as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            securities = self.securities,
            jobs = self.jobs,
            completed = self.completed,
            failed = self.failed,
            crashed = self.crashed,
            timed_out = self.timed_out,
            skipped = self.skipped,
            gap_errors = self.gap_errors,
            kbars_written = self.records.kbars_written,
            tick_days_observed = self.records.ticks_observed,
            tick_days_synthesized = self.records.ticks_synthesized,
            unchanged = self.records.unchanged,
            unresolved = self.records.unresolved(),
            conflicts = self.records.conflicts,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}
