//! 환경변수 기반 설정 모듈.

use crate::error::CollectorError;
use crate::Result;
use archive_data::CrawlConfig;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 아카이브 루트 디렉터리
    pub archive_root: PathBuf,
    /// 종목 목록 CSV 경로
    pub security_list_path: PathBuf,
    /// 거래소 캘린더 CSV 경로
    pub calendar_path: PathBuf,
    /// 갭 계산 설정
    pub gap: GapConfig,
    /// 작업 디스패치 설정
    pub dispatch: DispatchConfig,
    /// 크롤러 설정
    pub crawl: CrawlSettings,
}

/// 갭 계산 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapConfig {
    /// 틱 데이터가 제공되기 시작한 날짜 (이전 거래일은 틱 갭에서 제외)
    pub tick_available_from: NaiveDate,
    /// 상장일을 모를 때 일봉을 받기 시작하는 최소 날짜
    pub history_floor: NaiveDate,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            tick_available_from: NaiveDate::from_ymd_opt(2004, 10, 8).unwrap_or(NaiveDate::MIN),
            history_floor: NaiveDate::from_ymd_opt(1990, 12, 19).unwrap_or(NaiveDate::MIN),
        }
    }
}

/// 작업 디스패치 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// 작업당 마감 시한 (초)
    pub job_deadline_secs: u64,
    /// 동시에 처리하는 종목 수
    pub job_concurrency: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            job_deadline_secs: 300,
            job_concurrency: 1,
        }
    }
}

/// 크롤러 설정 (요청 예의)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSettings {
    /// 같은 호스트 요청 간 딜레이 (밀리초)
    pub request_delay_ms: u64,
    /// 같은 호스트 동시 요청 수
    pub max_in_flight_per_target: usize,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 최대 재시도 횟수
    pub max_retries: u32,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            request_delay_ms: 1000,
            max_in_flight_per_target: 8,
            request_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let gap_defaults = GapConfig::default();
        let dispatch_defaults = DispatchConfig::default();
        let crawl_defaults = CrawlSettings::default();

        let config = Self {
            archive_root: env_var_path("ARCHIVE_ROOT", "./data/archive"),
            security_list_path: env_var_path("SECURITY_LIST_PATH", "./data/securities.csv"),
            calendar_path: env_var_path("CALENDAR_PATH", "./data/calendar.csv"),
            gap: GapConfig {
                tick_available_from: env_var_date(
                    "TICK_AVAILABLE_FROM",
                    gap_defaults.tick_available_from,
                )?,
                history_floor: env_var_date("KDATA_HISTORY_FLOOR", gap_defaults.history_floor)?,
            },
            dispatch: DispatchConfig {
                job_deadline_secs: env_var_parse(
                    "JOB_DEADLINE_SECS",
                    dispatch_defaults.job_deadline_secs,
                ),
                job_concurrency: env_var_parse(
                    "JOB_CONCURRENCY",
                    dispatch_defaults.job_concurrency,
                ),
            },
            crawl: CrawlSettings {
                request_delay_ms: env_var_parse(
                    "REQUEST_DELAY_MS",
                    crawl_defaults.request_delay_ms,
                ),
                max_in_flight_per_target: env_var_parse(
                    "MAX_IN_FLIGHT_PER_TARGET",
                    crawl_defaults.max_in_flight_per_target,
                ),
                request_timeout_secs: env_var_parse(
                    "REQUEST_TIMEOUT_SECS",
                    crawl_defaults.request_timeout_secs,
                ),
                max_retries: env_var_parse("MAX_RETRIES", crawl_defaults.max_retries),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// 설정 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.job_deadline_secs == 0 {
            return Err(CollectorError::Config(
                "JOB_DEADLINE_SECS는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.dispatch.job_concurrency == 0 {
            return Err(CollectorError::Config(
                "JOB_CONCURRENCY는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.crawl.max_in_flight_per_target == 0 {
            return Err(CollectorError::Config(
                "MAX_IN_FLIGHT_PER_TARGET는 0보다 커야 합니다".to_string(),
            ));
        }
        Ok(())
    }
}

impl DispatchConfig {
    /// 작업 마감 시한을 Duration으로 반환
    pub fn job_deadline(&self) -> Duration {
        Duration::from_secs(self.job_deadline_secs)
    }
}

impl CrawlSettings {
    /// 크롤 엔진 설정으로 변환
    pub fn to_crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            request_delay: Duration::from_millis(self.request_delay_ms),
            max_in_flight_per_target: self.max_in_flight_per_target,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
            ..CrawlConfig::default()
        }
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 경로 읽기
fn env_var_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

/// 환경변수에서 날짜(YYYY-MM-DD) 파싱. 값이 있는데 형식이 틀리면 에러.
fn env_var_date(key: &str, default: NaiveDate) -> Result<NaiveDate> {
    match std::env::var(key) {
        Ok(v) => parse_date(&v)
            .map_err(|_| CollectorError::Config(format!("{} 날짜 형식 오류: {}", key, v))),
        Err(_) => Ok(default),
    }
}

/// YYYY-MM-DD 또는 YYYYMMDD 날짜 파싱
pub fn parse_date(s: &str) -> std::result::Result<NaiveDate, chrono::ParseError> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d").or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
}
