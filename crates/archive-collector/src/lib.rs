//! 일봉/틱 아카이브 수집기.
//!
//! 이 crate는 아카이브와 거래일 캘린더의 차이를 메우는 수집 패스를 제공합니다:
//! - 갭 계산 (일봉 구간, 틱 거래일 집합)
//! - 종목별 격리 작업 디스패치 (마감 시한, 동시성 제한)
//! - 응답 분류 결과를 아카이브에 반영

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use stats::CollectionStats;
