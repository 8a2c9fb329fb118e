//! 아카이브 기록기.
//!
//! 레코드는 추가 전용(append-only)입니다:
//! - 같은 내용으로 두 번 기록하면 두 번 모두 성공 (`Unchanged`)
//! - 이미 유효한 파일과 다른 내용이면 거부 (`DataError::Conflict`)
//! - 깨진 파일은 유효한 레코드가 아니므로 교체 (`Repaired`)
//!
//! 모든 기록은 같은 디렉터리의 임시 파일에 쓴 뒤 rename 하므로
//! 하루치 행은 전부 반영되거나 전혀 반영되지 않습니다.

use super::codec::{render_kbar, render_ticks};
use super::inspector::ArchiveInspector;
use super::layout::{ArchiveLayout, TMP_SUFFIX};
use crate::error::{DataError, Result};
use archive_core::{DataKind, KBarRecord, Security, TickRecord};
use chrono::NaiveDate;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// 기록 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// 새 파일 생성
    Created,
    /// 같은 내용이 이미 존재
    Unchanged,
    /// 깨진 파일을 교체
    Repaired,
}

impl WriteOutcome {
    /// 디스크 내용이 바뀌었는지 여부.
    pub fn is_write(&self) -> bool {
        !matches!(self, WriteOutcome::Unchanged)
    }
}

/// 아카이브 기록기.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    inspector: ArchiveInspector,
}

impl ArchiveWriter {
    pub fn new(layout: ArchiveLayout) -> Self {
        Self {
            inspector: ArchiveInspector::new(layout),
        }
    }

    fn layout(&self) -> &ArchiveLayout {
        self.inspector.layout()
    }

    /// 직렬화된 하루치 행을 기록합니다.
    pub fn write(
        &self,
        security: &Security,
        date: NaiveDate,
        kind: DataKind,
        rendered: &[u8],
    ) -> Result<WriteOutcome> {
        let path = self.layout().record_path(security, date, kind);

        let outcome = if path.exists() {
            if self.inspector.has_valid(security, date, kind) {
                if fs::read(&path)? == rendered {
                    return Ok(WriteOutcome::Unchanged);
                }
                return Err(DataError::Conflict { path });
            }
            warn!(security = %security, date = %date, kind = %kind, "깨진 레코드 파일 교체");
            WriteOutcome::Repaired
        } else {
            WriteOutcome::Created
        };

        write_atomic(&path, rendered)?;
        debug!(security = %security, date = %date, kind = %kind, bytes = rendered.len(), "레코드 기록");
        Ok(outcome)
    }

    /// 일봉 목록을 거래일별 파일로 기록합니다.
    ///
    /// 한 거래일의 충돌은 다른 거래일 기록을 막지 않으며, 결과는 입력 순서대로 반환됩니다.
    pub fn write_kbars(
        &self,
        security: &Security,
        bars: &[KBarRecord],
    ) -> Vec<(NaiveDate, Result<WriteOutcome>)> {
        bars.iter()
            .map(|bar| {
                let result = render_kbar(bar)
                    .and_then(|bytes| self.write(security, bar.date, DataKind::KBar, &bytes));
                (bar.date, result)
            })
            .collect()
    }

    /// 하루치 틱을 기록합니다.
    pub fn write_ticks(
        &self,
        security: &Security,
        date: NaiveDate,
        rows: &[TickRecord],
    ) -> Result<WriteOutcome> {
        if rows.is_empty() {
            return Err(DataError::InvalidData(format!(
                "{} {}: refusing to write an empty tick day",
                security, date
            )));
        }
        if let Some(stray) = rows.iter().find(|t| t.date() != date) {
            return Err(DataError::InvalidData(format!(
                "{} {}: tick row belongs to {}",
                security,
                date,
                stray.date()
            )));
        }
        let bytes = render_ticks(rows)?;
        self.write(security, date, DataKind::Tick, &bytes)
    }
}

/// 임시 파일에 쓴 뒤 rename으로 교체합니다.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(TMP_SUFFIX);
    let tmp_path = Path::new(&tmp_name);

    let result = (|| {
        let mut file = fs::File::create(tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(tmp_path);
    }
    Ok(result?)
}
