//! K-data / tick archive collector CLI.

use anyhow::Context;
use archive_collector::config::parse_date;
use archive_collector::modules::{
    self, ArchiveJobRunner, FetchDispatcher, KindSelection, PassContext,
};
use archive_collector::CollectorConfig;
use archive_core::{init_logging, LogConfig, Security};
use archive_data::{ArchiveInspector, ArchiveLayout, FileCalendarProvider, HttpCrawler};
use chrono::Utc;
use chrono_tz::Asia::Shanghai;
use clap::Parser;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "archive-collector")]
#[command(about = "A-share k-data / tick archive collector", long_about = None)]
#[command(version)]
struct Cli {
    /// 틱 데이터 시작일 (YYYY-MM-DD, TICK_AVAILABLE_FROM 대체)
    #[arg(long)]
    tick_from: Option<String>,

    /// 작업당 마감 시한 (초, JOB_DEADLINE_SECS 대체)
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// 특정 종목만 수집 (쉼표로 구분, 예: "SH600000,SZ000001")
    #[arg(long)]
    symbols: Option<String>,

    /// 수집할 데이터 종류 (all, kbar, tick)
    #[arg(long, default_value = "all")]
    kind: KindSelection,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 로깅 초기화 (RUST_LOG가 있으면 우선)
    init_logging(LogConfig::from_env_with_level(&cli.log_level)).map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!("Archive Collector 시작");

    // 설정 로드 및 CLI 대체 값 반영
    let mut config = CollectorConfig::from_env()?;
    if let Some(tick_from) = &cli.tick_from {
        config.gap.tick_available_from =
            parse_date(tick_from).with_context(|| format!("--tick-from 날짜 형식 오류: {}", tick_from))?;
    }
    if let Some(secs) = cli.deadline_secs {
        config.dispatch.job_deadline_secs = secs;
    }
    config.validate()?;

    let symbols = cli.symbols.as_deref().map(parse_symbols).transpose()?;

    tracing::debug!(
        archive_root = %config.archive_root.display(),
        tick_available_from = %config.gap.tick_available_from,
        deadline_secs = config.dispatch.job_deadline_secs,
        "설정 로드 완료"
    );

    let inspector = ArchiveInspector::new(ArchiveLayout::new(&config.archive_root));
    let provider = FileCalendarProvider::load(
        &config.security_list_path,
        &config.calendar_path,
        inspector.clone(),
    )?;
    let crawler = HttpCrawler::new(config.crawl.to_crawl_config())?;
    let runner = ArchiveJobRunner::new(Arc::new(crawler), inspector.clone());

    let ctx = PassContext {
        provider: Arc::new(provider),
        dispatcher: FetchDispatcher::new(Arc::new(runner), config.dispatch.job_deadline()),
        inspector,
        gap: config.gap,
        concurrency: config.dispatch.job_concurrency,
        symbols,
        kinds: cli.kind,
    };

    // 거래일 기준 "오늘"은 상해 시간
    let today = Utc::now().with_timezone(&Shanghai).date_naive();

    let stats = modules::run_pass(&ctx, today).await?;
    stats.log_summary("갭 조정 패스");

    tracing::info!("Archive Collector 종료");
    Ok(())
}

fn parse_symbols(raw: &str) -> anyhow::Result<BTreeSet<Security>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Security>()
                .with_context(|| format!("잘못된 종목 코드: {}", s))
        })
        .collect()
}
