//! 디스크 아카이브 경로 규칙.
//!
//! `{root}/{securityKey}/{kind}/{date}.csv`

use super::codec::DATE_FORMAT;
use archive_core::{DataKind, Security};
use chrono::NaiveDate;
use std::path::PathBuf;

/// 임시 파일 확장자 (원자적 교체용).
pub(crate) const TMP_SUFFIX: &str = ".tmp";

/// 아카이브 경로 계산기.
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    root: PathBuf,
}

impl ArchiveLayout {
    /// 아카이브 루트로 레이아웃을 생성합니다.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 종목/데이터 종류 디렉터리.
    pub fn kind_dir(&self, security: &Security, kind: DataKind) -> PathBuf {
        self.root.join(security.key()).join(kind.dir_name())
    }

    /// 특정 거래일 레코드 파일 경로.
    pub fn record_path(&self, security: &Security, date: NaiveDate, kind: DataKind) -> PathBuf {
        self.kind_dir(security, kind)
            .join(format!("{}.csv", date.format(DATE_FORMAT)))
    }

    /// 파일명에서 거래일을 복원합니다. 임시 파일이나 다른 이름은 `None`.
    pub fn date_from_file_name(name: &str) -> Option<NaiveDate> {
        let stem = name.strip_suffix(".csv")?;
        NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_path() {
        let layout = ArchiveLayout::new("/data/archive");
        let path = layout.record_path(
            &Security::sh("600000"),
            NaiveDate::from_ymd_opt(2020, 1, 3).unwrap(),
            DataKind::Tick,
        );
        assert_eq!(path, PathBuf::from("/data/archive/SH600000/tick/2020-01-03.csv"));
    }

    #[test]
    fn test_date_from_file_name() {
        assert_eq!(
            ArchiveLayout::date_from_file_name("2020-01-03.csv"),
            NaiveDate::from_ymd_opt(2020, 1, 3)
        );
        assert_eq!(ArchiveLayout::date_from_file_name("2020-01-03.csv.tmp"), None);
        assert_eq!(ArchiveLayout::date_from_file_name("notes.csv"), None);
    }
}
