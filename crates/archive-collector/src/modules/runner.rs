//! 아카이브 작업 실행기.
//!
//! 작업 하나를 크롤 엔진에 제출하고, 응답을 분류한 뒤 아카이브에 기록합니다.
//! 응답 하나의 실패는 해당 거래일만 미해결로 남기고 나머지 처리를 계속합니다.

use super::dispatch::{FetchJob, FetchTarget, JobReport, JobRunner};
use crate::Result;
use archive_core::{DataKind, Security, TickProvenance, TickRecord};
use archive_data::source::{netease, sina};
use archive_data::{
    classify_kbar_response, classify_tick_response, ArchiveInspector, ArchiveWriter, CrawlEngine,
    CrawlFailure, DataError, KBarDecision, TickDecision, WriteOutcome,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 크롤 엔진과 아카이브를 연결하는 기본 실행기.
pub struct ArchiveJobRunner {
    crawler: Arc<dyn CrawlEngine>,
    inspector: ArchiveInspector,
    writer: ArchiveWriter,
}

impl ArchiveJobRunner {
    pub fn new(crawler: Arc<dyn CrawlEngine>, inspector: ArchiveInspector) -> Self {
        let writer = ArchiveWriter::new(inspector.layout().clone());
        Self {
            crawler,
            inspector,
            writer,
        }
    }

    async fn run_kbar(
        &self,
        security: &Security,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<JobReport> {
        let mut report = JobReport::default();
        let mut responses = self
            .crawler
            .submit(vec![netease::kdata_work_item(security, start, end)]);

        while let Some(result) = responses.next().await {
            let response = match result {
                Ok(response) => response,
                Err(failure) => {
                    log_failure(&failure);
                    report.transient_failures += 1;
                    continue;
                }
            };

            match classify_kbar_response(&response, start, end) {
                KBarDecision::Bars(bars) => {
                    for (date, result) in self.writer.write_kbars(security, &bars) {
                        match result {
                            Ok(outcome) if outcome.is_write() => report.kbars_written += 1,
                            Ok(_) => report.unchanged += 1,
                            Err(e) => {
                                record_write_error(&mut report, security, date, DataKind::KBar, e)
                            }
                        }
                    }
                    info!(
                        security = %security,
                        start = %start,
                        end = %end,
                        bars = bars.len(),
                        "일봉 수신"
                    );
                }
                KBarDecision::Empty => {
                    debug!(security = %security, start = %start, end = %end, "새 일봉 없음");
                    report.no_data += 1;
                }
                KBarDecision::Unclassifiable { reason } => {
                    error!(
                        security = %security,
                        url = %response.url,
                        content_kind = ?response.content_kind,
                        reason = %reason,
                        "해석할 수 없는 일봉 응답"
                    );
                    report.unclassifiable += 1;
                }
            }
        }

        Ok(report)
    }

    async fn run_tick(&self, security: &Security, dates: &[NaiveDate]) -> Result<JobReport> {
        let mut report = JobReport::default();
        let items = dates
            .iter()
            .map(|date| sina::tick_work_item(security, *date))
            .collect();
        let mut responses = self.crawler.submit(items);

        while let Some(result) = responses.next().await {
            let response = match result {
                Ok(response) => response,
                Err(failure) => {
                    log_failure(&failure);
                    report.transient_failures += 1;
                    continue;
                }
            };
            let Some(date) = response.meta.date else {
                warn!(security = %security, url = %response.url, "거래일 없는 틱 응답 무시");
                report.unclassifiable += 1;
                continue;
            };

            let anchor = match self.inspector.read_kbar(security, date) {
                Ok(anchor) => anchor,
                Err(e) => {
                    error!(
                        security = %security,
                        date = %date,
                        error = %e,
                        "합성 기준 일봉 읽기 실패"
                    );
                    report.write_errors += 1;
                    continue;
                }
            };
            match classify_tick_response(&response, date, anchor.as_ref()) {
                TickDecision::Observed(rows) => {
                    let provenance = TickProvenance::Observed;
                    self.store_ticks(&mut report, security, date, &rows, provenance)
                }
                TickDecision::Synthesized(rows) => {
                    let provenance = TickProvenance::Synthesized;
                    self.store_ticks(&mut report, security, date, &rows, provenance)
                }
                TickDecision::MissingAnchor => {
                    info!(
                        security = %security,
                        date = %date,
                        "당일 틱 없음, 합성 기준 일봉 대기 (다음 패스에서 재시도)"
                    );
                    report.missing_anchor += 1;
                }
                TickDecision::Unclassifiable { reason } => {
                    error!(
                        security = %security,
                        date = %date,
                        url = %response.url,
                        content_kind = ?response.content_kind,
                        reason = %reason,
                        "해석할 수 없는 틱 응답"
                    );
                    report.unclassifiable += 1;
                }
            }
        }

        Ok(report)
    }

    fn store_ticks(
        &self,
        report: &mut JobReport,
        security: &Security,
        date: NaiveDate,
        rows: &[TickRecord],
        provenance: TickProvenance,
    ) {
        match self.writer.write_ticks(security, date, rows) {
            Ok(WriteOutcome::Unchanged) => report.unchanged += 1,
            Ok(_) => {
                match provenance {
                    TickProvenance::Observed => report.ticks_observed += 1,
                    TickProvenance::Synthesized => report.ticks_synthesized += 1,
                }
                debug!(
                    security = %security,
                    date = %date,
                    rows = rows.len(),
                    provenance = ?provenance,
                    "틱 기록"
                );
            }
            Err(e) => record_write_error(report, security, date, DataKind::Tick, e),
        }
    }
}

#[async_trait]
impl JobRunner for ArchiveJobRunner {
    async fn run(&self, job: FetchJob) -> Result<JobReport> {
        match &job.target {
            FetchTarget::KBar { start, end } => self.run_kbar(&job.security, *start, *end).await,
            FetchTarget::Tick { dates } => self.run_tick(&job.security, dates).await,
        }
    }
}

fn log_failure(failure: &CrawlFailure) {
    warn!(
        security = %failure.meta.security,
        date = ?failure.meta.date,
        kind = %failure.meta.kind,
        url = %failure.url,
        reason = %failure.reason,
        "요청 실패 (다음 패스에서 재시도)"
    );
}

fn record_write_error(
    report: &mut JobReport,
    security: &Security,
    date: NaiveDate,
    kind: DataKind,
    err: DataError,
) {
    if err.is_conflict() {
        error!(
            security = %security,
            date = %date,
            kind = %kind,
            error = %err,
            "기존 레코드와 내용이 달라 기록 거부"
        );
        report.conflicts += 1;
    } else {
        error!(
            security = %security,
            date = %date,
            kind = %kind,
            error = %err,
            "레코드 기록 실패"
        );
        report.write_errors += 1;
    }
}
