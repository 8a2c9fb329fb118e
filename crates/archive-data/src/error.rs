//! 데이터 모듈 오류 타입.

use std::path::PathBuf;
use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 파일 입출력 오류
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV 읽기/쓰기 오류
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 데이터 가져오기 오류 (외부 소스)
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// 이미 유효한 레코드와 다른 내용으로 덮어쓰려는 시도
    #[error("Append-only violation: {} already holds different rows", .path.display())]
    Conflict { path: PathBuf },

    /// 설정 오류
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<archive_core::CoreError> for DataError {
    fn from(err: archive_core::CoreError) -> Self {
        DataError::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        DataError::FetchError(err.to_string())
    }
}

impl DataError {
    /// 아카이브 불변식 위반(충돌) 오류인지 확인합니다.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DataError::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
