//! 아카이브 데이터 계층.
//!
//! 이 crate는 다음을 제공합니다:
//! - 디스크 아카이브 레이아웃, 검사기(Inspector), 기록기(Writer)
//! - 거래일 캘린더 및 종목 목록 제공자
//! - 크롤 엔진 경계와 reqwest 기반 구현
//! - 데이터 소스 어댑터 (시나 틱, 넷이즈 일봉)
//! - 응답 분류 및 틱 합성

pub mod classify;
pub mod error;
pub mod provider;
pub mod source;
pub mod storage;

pub use error::{DataError, Result};

pub use classify::{classify_kbar_response, classify_tick_response, KBarDecision, TickDecision};
pub use provider::{CalendarProvider, FileCalendarProvider};
pub use source::crawl::{
    CrawlConfig, CrawlEngine, CrawlFailure, CrawlResponse, CrawlResult, HttpCrawler, JobMeta,
    WorkItem,
};
pub use storage::{ArchiveInspector, ArchiveLayout, ArchiveWriter, WriteOutcome};
