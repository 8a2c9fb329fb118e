//! 아카이브 데이터 종류.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 아카이브에 저장되는 데이터 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// 일봉
    KBar,
    /// 체결 틱
    Tick,
}

impl DataKind {
    /// 아카이브 경로 구성요소.
    pub fn dir_name(&self) -> &'static str {
        match self {
            DataKind::KBar => "kbar",
            DataKind::Tick => "tick",
        }
    }

    /// CSV 헤더 컬럼 (고정 순서).
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            DataKind::KBar => &["date", "open", "high", "low", "close", "volume"],
            DataKind::Tick => &["timestamp", "price", "volume", "direction"],
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}
