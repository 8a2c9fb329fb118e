//! 아카이브 검사기.
//!
//! 특정 (종목, 거래일, 종류) 레코드가 디스크에 존재하고 구조적으로 유효한지
//! 판단합니다. 유효성은 존재 여부와 파싱 가능 여부까지만 봅니다.

use super::codec::{parse_kbars, parse_ticks};
use super::layout::ArchiveLayout;
use crate::error::Result;
use archive_core::{DataKind, KBarRecord, Security, TickRecord};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use tracing::debug;

/// 아카이브 검사기.
#[derive(Debug, Clone)]
pub struct ArchiveInspector {
    layout: ArchiveLayout,
}

impl ArchiveInspector {
    pub fn new(layout: ArchiveLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    /// 레코드 파일 내용을 읽습니다. 파일이 없으면 `None`.
    fn read_raw(
        &self,
        security: &Security,
        date: NaiveDate,
        kind: DataKind,
    ) -> Result<Option<Vec<u8>>> {
        let path = self.layout.record_path(security, date, kind);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 레코드가 존재하고 유효한지 확인합니다.
    pub fn has_valid(&self, security: &Security, date: NaiveDate, kind: DataKind) -> bool {
        match kind {
            DataKind::KBar => self.read_kbar(security, date).ok().flatten().is_some(),
            DataKind::Tick => self.read_ticks(security, date).ok().flatten().is_some(),
        }
    }

    /// 유효한 일봉을 읽습니다. 없거나 깨진 파일이면 `Ok(None)`.
    ///
    /// 파일 안의 행 날짜가 파일명의 거래일과 다르면 유효하지 않은 것으로 봅니다.
    pub fn read_kbar(&self, security: &Security, date: NaiveDate) -> Result<Option<KBarRecord>> {
        let Some(bytes) = self.read_raw(security, date, DataKind::KBar)? else {
            return Ok(None);
        };

        match parse_kbars(&bytes) {
            Ok(bars) => match bars.as_slice() {
                [bar] if bar.date == date => Ok(Some(bar.clone())),
                _ => {
                    debug!(
                        security = %security,
                        date = %date,
                        rows = bars.len(),
                        "일봉 파일 형식 불일치"
                    );
                    Ok(None)
                }
            },
            Err(e) => {
                debug!(security = %security, date = %date, error = %e, "일봉 파일 파싱 실패");
                Ok(None)
            }
        }
    }

    /// 유효한 하루치 틱을 읽습니다. 없거나 깨진 파일이면 `Ok(None)`.
    pub fn read_ticks(
        &self,
        security: &Security,
        date: NaiveDate,
    ) -> Result<Option<Vec<TickRecord>>> {
        let Some(bytes) = self.read_raw(security, date, DataKind::Tick)? else {
            return Ok(None);
        };

        match parse_ticks(&bytes) {
            Ok(ticks) if ticks.iter().all(|t| t.date() == date) => Ok(Some(ticks)),
            Ok(_) => {
                debug!(security = %security, date = %date, "틱 파일에 다른 거래일 행 포함");
                Ok(None)
            }
            Err(e) => {
                debug!(security = %security, date = %date, error = %e, "틱 파일 파싱 실패");
                Ok(None)
            }
        }
    }

    /// 유효한 레코드가 있는 거래일 집합.
    ///
    /// 디렉터리가 없으면 빈 집합입니다.
    pub fn valid_dates(&self, security: &Security, kind: DataKind) -> Result<BTreeSet<NaiveDate>> {
        let dir = self.layout.kind_dir(security, kind);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut dates = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(date) = name.to_str().and_then(ArchiveLayout::date_from_file_name) else {
                continue;
            };
            if self.has_valid(security, date, kind) {
                dates.insert(date);
            }
        }
        Ok(dates)
    }

    /// 가장 최근의 유효한 레코드 거래일.
    pub fn last_valid_date(
        &self,
        security: &Security,
        kind: DataKind,
    ) -> Result<Option<NaiveDate>> {
        Ok(self.valid_dates(security, kind)?.last().copied())
    }
}
