//! 거래일 캘린더 및 종목 목록 제공자.
//!
//! 수집기는 `CalendarProvider` trait만 바라봅니다. 기본 구현인
//! `FileCalendarProvider`는 CSV 파일 두 개와 아카이브 검사기를 조합합니다.

mod calendar;

pub use calendar::{FileCalendarProvider, SecurityListRow};

use crate::error::Result;
use archive_core::{Security, SecurityItem};
use async_trait::async_trait;
use chrono::NaiveDate;

/// 종목 목록과 거래일 캘린더 제공자.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// 전체 종목 목록 (정렬된 순서).
    async fn list_securities(&self) -> Result<Vec<SecurityItem>>;

    /// 종목의 거래일 목록 (오름차순).
    async fn trading_dates(&self, item: &SecurityItem) -> Result<Vec<NaiveDate>>;

    /// 이미 내려받은 가장 최근 일봉 거래일.
    async fn last_downloaded_kbar_date(&self, security: &Security) -> Result<Option<NaiveDate>>;
}
