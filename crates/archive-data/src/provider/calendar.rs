//! 파일 기반 캘린더 제공자.
//!
//! - `securities.csv`: `exchange,code,name,list_date`
//! - `calendar.csv`: `exchange,date` (거래소 개장일)
//!
//! 종목의 거래일은 해당 거래소 개장일 중 상장일 이후 날짜에서 출발합니다.
//! 마지막으로 저장된 일봉까지의 구간은 실제로 일봉이 저장된 날만 거래일로
//! 인정합니다. 일봉 소스가 돌려주지 않은 날(거래정지일)은 이미 확정된
//! 구간 안에 있으므로 거래일에서 빠집니다. 그 이후의 개장일은 아직 받지
//! 않았으므로 그대로 거래일로 둡니다.

use super::CalendarProvider;
use crate::error::{DataError, Result};
use crate::storage::ArchiveInspector;
use archive_core::{CoreError, DataKind, Exchange, Security, SecurityItem};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

/// `securities.csv` 행.
#[derive(Debug, Deserialize)]
pub struct SecurityListRow {
    pub exchange: Exchange,
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub list_date: Option<NaiveDate>,
}

impl TryFrom<SecurityListRow> for SecurityItem {
    type Error = CoreError;

    fn try_from(row: SecurityListRow) -> std::result::Result<Self, Self::Error> {
        Ok(SecurityItem {
            security: Security::try_new(row.exchange, &row.code)?,
            name: row.name.filter(|n| !n.trim().is_empty()),
            list_date: row.list_date,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CalendarRow {
    exchange: Exchange,
    date: NaiveDate,
}

/// 파일 기반 캘린더 제공자.
#[derive(Debug, Clone)]
pub struct FileCalendarProvider {
    securities: Vec<SecurityItem>,
    calendar: BTreeMap<Exchange, BTreeSet<NaiveDate>>,
    inspector: ArchiveInspector,
}

impl FileCalendarProvider {
    /// 종목 목록과 캘린더 파일을 읽어 제공자를 생성합니다.
    ///
    /// 어느 파일이든 읽을 수 없으면 오류입니다.
    pub fn load(
        security_list_path: impl AsRef<Path>,
        calendar_path: impl AsRef<Path>,
        inspector: ArchiveInspector,
    ) -> Result<Self> {
        let security_list_path = security_list_path.as_ref();
        let calendar_path = calendar_path.as_ref();

        let mut securities = Vec::new();
        for row in csv::Reader::from_path(security_list_path)
            .map_err(|e| open_error(security_list_path, e))?
            .deserialize::<SecurityListRow>()
        {
            securities.push(SecurityItem::try_from(row?)?);
        }
        securities.sort_by(|a, b| a.security.cmp(&b.security));
        securities.dedup_by(|a, b| a.security == b.security);

        let mut calendar: BTreeMap<Exchange, BTreeSet<NaiveDate>> = BTreeMap::new();
        for row in csv::Reader::from_path(calendar_path)
            .map_err(|e| open_error(calendar_path, e))?
            .deserialize::<CalendarRow>()
        {
            let row = row?;
            calendar.entry(row.exchange).or_default().insert(row.date);
        }

        info!(
            securities = securities.len(),
            exchanges = calendar.len(),
            "종목 목록 및 캘린더 로드 완료"
        );

        Ok(Self::from_parts(securities, calendar, inspector))
    }

    /// 메모리 상의 목록으로 제공자를 생성합니다.
    pub fn from_parts(
        securities: Vec<SecurityItem>,
        calendar: BTreeMap<Exchange, BTreeSet<NaiveDate>>,
        inspector: ArchiveInspector,
    ) -> Self {
        Self {
            securities,
            calendar,
            inspector,
        }
    }
}

fn open_error(path: &Path, err: csv::Error) -> DataError {
    DataError::ConfigError(format!("{} 읽기 실패: {}", path.display(), err))
}

#[async_trait]
impl CalendarProvider for FileCalendarProvider {
    async fn list_securities(&self) -> Result<Vec<SecurityItem>> {
        Ok(self.securities.clone())
    }

    async fn trading_dates(&self, item: &SecurityItem) -> Result<Vec<NaiveDate>> {
        let Some(days) = self.calendar.get(&item.security.exchange) else {
            return Ok(Vec::new());
        };
        let exchange_days: Vec<NaiveDate> = match item.list_date {
            Some(listed) => days.range(listed..).copied().collect(),
            None => days.iter().copied().collect(),
        };

        let stored = self.inspector.valid_dates(&item.security, DataKind::KBar)?;
        let Some(&last_stored) = stored.last() else {
            return Ok(exchange_days);
        };
        Ok(exchange_days
            .into_iter()
            .filter(|d| *d > last_stored || stored.contains(d))
            .collect())
    }

    async fn last_downloaded_kbar_date(&self, security: &Security) -> Result<Option<NaiveDate>> {
        self.inspector.last_valid_date(security, DataKind::KBar)
    }
}
