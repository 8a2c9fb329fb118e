//! 갭 조정 패스.
//!
//! 종목마다 일봉 갭을 먼저 채운 뒤 틱 갭을 계산합니다. 같은 패스에서 받은
//! 일봉이 틱 합성의 기준이 될 수 있도록 순서를 지킵니다. 거래일은 저장된
//! 일봉에 따라 달라지므로 틱 갭 계산 전에 다시 조회합니다.

use super::dispatch::{FetchDispatcher, FetchJob};
use super::gap::{compute_kbar_gap, compute_tick_gap};
use crate::config::GapConfig;
use crate::error::CollectorError;
use crate::{CollectionStats, Result};
use archive_core::{security_span, DataKind, Security, SecurityItem};
use archive_data::{ArchiveInspector, CalendarProvider};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// 패스에서 다룰 데이터 종류.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KindSelection {
    #[default]
    All,
    KBar,
    Tick,
}

impl KindSelection {
    pub fn includes(&self, kind: DataKind) -> bool {
        match self {
            KindSelection::All => true,
            KindSelection::KBar => kind == DataKind::KBar,
            KindSelection::Tick => kind == DataKind::Tick,
        }
    }
}

impl FromStr for KindSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(KindSelection::All),
            "kbar" | "kdata" => Ok(KindSelection::KBar),
            "tick" => Ok(KindSelection::Tick),
            other => Err(format!("unknown data kind: {}", other)),
        }
    }
}

impl fmt::Display for KindSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindSelection::All => write!(f, "all"),
            KindSelection::KBar => write!(f, "kbar"),
            KindSelection::Tick => write!(f, "tick"),
        }
    }
}

/// 패스 실행에 필요한 협력 객체 묶음.
pub struct PassContext {
    pub provider: Arc<dyn CalendarProvider>,
    pub dispatcher: FetchDispatcher,
    pub inspector: ArchiveInspector,
    pub gap: GapConfig,
    /// 동시에 처리하는 종목 수
    pub concurrency: usize,
    /// 지정하면 해당 종목만 처리
    pub symbols: Option<BTreeSet<Security>>,
    pub kinds: KindSelection,
}

/// 갭 조정 패스를 한 번 실행합니다.
///
/// 종목 목록을 얻지 못하면 패스 전체가 실패합니다. 그 밖의 종목별 실패는
/// 통계에만 반영되고, 남은 갭은 다음 패스에서 다시 계산됩니다.
pub async fn run_pass(ctx: &PassContext, today: NaiveDate) -> Result<CollectionStats> {
    let start = Instant::now();

    let mut securities = ctx
        .provider
        .list_securities()
        .await
        .map_err(|e| CollectorError::Provider(e.to_string()))?;

    if let Some(symbols) = &ctx.symbols {
        securities.retain(|item| symbols.contains(&item.security));
    }

    tracing::info!(
        securities = securities.len(),
        today = %today,
        kinds = %ctx.kinds,
        concurrency = ctx.concurrency,
        "갭 조정 패스 시작"
    );

    let mut stats = stream::iter(securities)
        .map(|item| {
            let span = security_span!("reconcile", item.security);
            reconcile_security(ctx, item, today).instrument(span)
        })
        .buffer_unordered(ctx.concurrency.max(1))
        .fold(CollectionStats::new(), |mut acc, s| async move {
            acc.merge(&s);
            acc
        })
        .await;

    stats.elapsed = start.elapsed();
    Ok(stats)
}

/// 종목 하나의 일봉/틱 갭을 채웁니다.
async fn reconcile_security(
    ctx: &PassContext,
    item: SecurityItem,
    today: NaiveDate,
) -> CollectionStats {
    let mut stats = CollectionStats {
        securities: 1,
        ..Default::default()
    };
    let security = &item.security;

    if ctx.kinds.includes(DataKind::KBar) {
        let Some(calendar) = trading_dates(ctx, &item, &mut stats).await else {
            return stats;
        };
        match ctx.provider.last_downloaded_kbar_date(security).await {
            Ok(last_stored) => {
                match compute_kbar_gap(&item, &calendar, last_stored, today, &ctx.gap) {
                    Some(gap) => {
                        tracing::debug!(start = %gap.start, end = %gap.end, "일봉 갭");
                        let job = FetchJob::kbar(security.clone(), gap.start, gap.end);
                        stats.record_outcome(&ctx.dispatcher.dispatch(job).await);
                    }
                    None => stats.skipped += 1,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "마지막 일봉 조회 실패");
                stats.gap_errors += 1;
            }
        }
    }

    if ctx.kinds.includes(DataKind::Tick) {
        let Some(calendar) = trading_dates(ctx, &item, &mut stats).await else {
            return stats;
        };
        match ctx.inspector.valid_dates(security, DataKind::Tick) {
            Ok(stored) => {
                let dates = compute_tick_gap(&calendar, &stored, today, &ctx.gap);
                if dates.is_empty() {
                    stats.skipped += 1;
                } else {
                    tracing::debug!(
                        days = dates.len(),
                        first = ?dates.first(),
                        last = ?dates.last(),
                        "틱 갭"
                    );
                    let job = FetchJob::tick(security.clone(), dates);
                    stats.record_outcome(&ctx.dispatcher.dispatch(job).await);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "저장된 틱 조회 실패");
                stats.gap_errors += 1;
            }
        }
    }

    stats
}

async fn trading_dates(
    ctx: &PassContext,
    item: &SecurityItem,
    stats: &mut CollectionStats,
) -> Option<Vec<NaiveDate>> {
    match ctx.provider.trading_dates(item).await {
        Ok(calendar) => Some(calendar),
        Err(e) => {
            tracing::warn!(error = %e, "거래일 조회 실패, 종목 건너뜀");
            stats.gap_errors += 1;
            None
        }
    }
}
