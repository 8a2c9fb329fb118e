//! 에러 타입 정의.

use std::fmt;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 아카이브/데이터 계층 에러
    Data(archive_data::DataError),
    /// 설정 에러
    Config(String),
    /// 종목 목록/캘린더 제공자 에러 (패스 전체 중단)
    Provider(String),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(e) => write!(f, "Data error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Provider(msg) => write!(f, "Calendar provider error: {}", msg),
        }
    }
}

impl std::error::Error for CollectorError {}

impl From<archive_data::DataError> for CollectorError {
    fn from(err: archive_data::DataError) -> Self {
        Self::Data(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
